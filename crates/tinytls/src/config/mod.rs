//! Engine configuration and the shared context engines are built from.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tinytls_crypto::rand::OsRandom;
use tinytls_crypto::{AlgorithmSet, RandomSource};
use tinytls_types::ConfigError;

use crate::crypt::SuiteRegistry;
use crate::session::{EvictionPolicy, SessionRegistry};

/// Per-engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Suite ids offered (client) or enabled (server). Empty means every
    /// registered suite, in registry order.
    pub cipher_suites: Vec<u8>,
    /// Compression method ids offered (client) or accepted (server), in
    /// preference order.
    pub compression_methods: Vec<u8>,
    /// Empty polls tolerated by `connect` before giving up.
    pub max_connect_attempts: u32,
    /// Delay between empty polls in `connect`.
    pub poll_interval: Duration,
    /// Overall deadline for `connect`.
    pub connect_timeout: Duration,
    /// Offer (client) or accept (server) abbreviated handshakes.
    pub session_resumption: bool,
}

impl EngineConfig {
    /// Create a builder for engine configuration.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// The suite ids this engine offers or enables, in preference order.
    pub fn suite_ids(&self, registry: &SuiteRegistry) -> Vec<u8> {
        if self.cipher_suites.is_empty() {
            registry.ids()
        } else {
            self.cipher_suites.clone()
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfigBuilder::default().build()
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Clone)]
pub struct EngineConfigBuilder {
    cipher_suites: Vec<u8>,
    compression_methods: Vec<u8>,
    max_connect_attempts: u32,
    poll_interval: Duration,
    connect_timeout: Duration,
    session_resumption: bool,
}

impl Default for EngineConfigBuilder {
    fn default() -> Self {
        Self {
            cipher_suites: Vec::new(),
            compression_methods: vec![0],
            max_connect_attempts: 8,
            poll_interval: Duration::from_millis(100),
            connect_timeout: Duration::from_secs(2),
            session_resumption: true,
        }
    }
}

impl EngineConfigBuilder {
    pub fn cipher_suites(mut self, ids: &[u8]) -> Self {
        self.cipher_suites = ids.to_vec();
        self
    }

    pub fn compression_methods(mut self, ids: &[u8]) -> Self {
        self.compression_methods = ids.to_vec();
        self
    }

    pub fn max_connect_attempts(mut self, attempts: u32) -> Self {
        self.max_connect_attempts = attempts;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn session_resumption(mut self, enabled: bool) -> Self {
        self.session_resumption = enabled;
        self
    }

    pub fn build(self) -> EngineConfig {
        EngineConfig {
            cipher_suites: self.cipher_suites,
            compression_methods: self.compression_methods,
            max_connect_attempts: self.max_connect_attempts,
            poll_interval: self.poll_interval,
            connect_timeout: self.connect_timeout,
            session_resumption: self.session_resumption,
        }
    }
}

/// Configuration of a [`SessionRegistry`]. Unbounded by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryConfig {
    pub eviction: EvictionPolicy,
}

impl RegistryConfig {
    pub fn builder() -> RegistryConfigBuilder {
        RegistryConfigBuilder::default()
    }
}

/// Builder for [`RegistryConfig`].
#[derive(Debug, Clone, Default)]
pub struct RegistryConfigBuilder {
    eviction: EvictionPolicy,
}

impl RegistryConfigBuilder {
    pub fn max_entries(mut self, max: usize) -> Self {
        self.eviction.max_entries = Some(max);
        self
    }

    pub fn max_age(mut self, age: Duration) -> Self {
        self.eviction.max_age = Some(age);
        self
    }

    pub fn build(self) -> RegistryConfig {
        RegistryConfig {
            eviction: self.eviction,
        }
    }
}

/// Everything engines share: suites, sessions, algorithms, randomness,
/// plus the configuration of the engines built from it.
///
/// Cloning is cheap; registries are shared, not copied.
#[derive(Clone)]
pub struct TlsContext {
    suites: Arc<SuiteRegistry>,
    sessions: Arc<SessionRegistry>,
    algorithms: Arc<AlgorithmSet>,
    rng: Arc<dyn RandomSource>,
    config: EngineConfig,
}

impl TlsContext {
    /// A context over every compiled-in algorithm, the default suites, an
    /// unbounded session registry and the OS random source.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        let algorithms = AlgorithmSet::all();
        let suites = SuiteRegistry::with_defaults(&algorithms)?;
        Self::from_parts(
            Arc::new(suites),
            Arc::new(SessionRegistry::new(RegistryConfig::default())),
            Arc::new(algorithms),
            Arc::new(OsRandom),
            config,
        )
    }

    /// Assemble a context, checking `config` against the registries.
    pub fn from_parts(
        suites: Arc<SuiteRegistry>,
        sessions: Arc<SessionRegistry>,
        algorithms: Arc<AlgorithmSet>,
        rng: Arc<dyn RandomSource>,
        config: EngineConfig,
    ) -> Result<Self, ConfigError> {
        validate(&config, &suites, &algorithms)?;
        Ok(Self {
            suites,
            sessions,
            algorithms,
            rng,
            config,
        })
    }

    /// The same registries with a different engine configuration.
    pub fn with_config(&self, config: EngineConfig) -> Result<Self, ConfigError> {
        validate(&config, &self.suites, &self.algorithms)?;
        Ok(Self {
            config,
            ..self.clone()
        })
    }

    /// Replace the random source.
    pub fn with_random(mut self, rng: Arc<dyn RandomSource>) -> Self {
        self.rng = rng;
        self
    }

    pub fn suites(&self) -> &Arc<SuiteRegistry> {
        &self.suites
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    pub fn algorithms(&self) -> &Arc<AlgorithmSet> {
        &self.algorithms
    }

    pub fn rng(&self) -> &dyn RandomSource {
        self.rng.as_ref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

fn validate(
    config: &EngineConfig,
    suites: &SuiteRegistry,
    algorithms: &AlgorithmSet,
) -> Result<(), ConfigError> {
    if suites.is_empty() {
        return Err(ConfigError::NoCipherSuites);
    }
    for &id in &config.cipher_suites {
        if suites.find_by_id(id).is_none() {
            return Err(ConfigError::UnknownCipherSuite(id));
        }
    }
    for &id in &config.compression_methods {
        if algorithms.compression(id).is_none() {
            return Err(ConfigError::UnknownCompression(id));
        }
    }
    Ok(())
}

impl fmt::Debug for TlsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsContext")
            .field("suites", &self.suites.ids())
            .field("sessions", &self.sessions.len())
            .field("rng", &self.rng.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_defaults() {
        let config = EngineConfig::builder().build();
        assert!(config.cipher_suites.is_empty());
        assert_eq!(config.compression_methods, vec![0]);
        assert_eq!(config.max_connect_attempts, 8);
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert!(config.session_resumption);
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_engine_config_builder() {
        let config = EngineConfig::builder()
            .cipher_suites(&[0x22, 0x20])
            .max_connect_attempts(3)
            .poll_interval(Duration::from_millis(5))
            .connect_timeout(Duration::from_millis(500))
            .session_resumption(false)
            .build();
        assert_eq!(config.cipher_suites, vec![0x22, 0x20]);
        assert_eq!(config.max_connect_attempts, 3);
        assert!(!config.session_resumption);
    }

    #[test]
    fn test_suite_ids_default_to_registry_order() {
        let ctx = TlsContext::new(EngineConfig::default()).unwrap();
        assert_eq!(ctx.config().suite_ids(ctx.suites()), vec![0x20, 0x21, 0x22, 0x23]);
        let ctx = ctx
            .with_config(EngineConfig::builder().cipher_suites(&[0x23]).build())
            .unwrap();
        assert_eq!(ctx.config().suite_ids(ctx.suites()), vec![0x23]);
    }

    #[test]
    fn test_context_rejects_unknown_ids() {
        let err = TlsContext::new(EngineConfig::builder().cipher_suites(&[0x99]).build()).unwrap_err();
        assert_eq!(err, ConfigError::UnknownCipherSuite(0x99));
        let err = TlsContext::new(EngineConfig::builder().compression_methods(&[64]).build()).unwrap_err();
        assert_eq!(err, ConfigError::UnknownCompression(64));
    }

    #[test]
    fn test_with_config_shares_registries() {
        let ctx = TlsContext::new(EngineConfig::default()).unwrap();
        let other = ctx.with_config(EngineConfig::builder().max_connect_attempts(1).build()).unwrap();
        assert!(Arc::ptr_eq(ctx.sessions(), other.sessions()));
        assert!(Arc::ptr_eq(ctx.suites(), other.suites()));
    }

    #[test]
    fn test_registry_config_builder() {
        let config = RegistryConfig::builder()
            .max_entries(16)
            .max_age(Duration::from_secs(60))
            .build();
        assert_eq!(config.eviction.max_entries, Some(16));
        assert_eq!(config.eviction.max_age, Some(Duration::from_secs(60)));
        assert_eq!(RegistryConfig::default().eviction, EvictionPolicy::unbounded());
    }
}
