//! Cipher suites, the suite registry and the key schedule.

pub mod key_schedule;
pub mod prf;

use std::fmt;
use std::sync::Arc;

use log::debug;
use tinytls_crypto::{AlgorithmSet, CipherAlgorithm, HashAlgorithm, KeyExchangeAlgorithm};
use tinytls_types::{CipherAlgId, ConfigError, HashAlgId, KeyExchangeId};

/// An immutable bundle of one hash, one bulk cipher and one key exchange,
/// identified on the wire by a single byte.
#[derive(Clone)]
pub struct CipherSuite {
    name: String,
    id: u8,
    hash: Arc<dyn HashAlgorithm>,
    cipher: Arc<dyn CipherAlgorithm>,
    key_exchange: Arc<dyn KeyExchangeAlgorithm>,
}

impl CipherSuite {
    pub fn new(
        name: impl Into<String>,
        id: u8,
        hash: Arc<dyn HashAlgorithm>,
        cipher: Arc<dyn CipherAlgorithm>,
        key_exchange: Arc<dyn KeyExchangeAlgorithm>,
    ) -> Self {
        Self {
            name: name.into(),
            id,
            hash,
            cipher,
            key_exchange,
        }
    }

    /// Assemble a suite from algorithm ids, resolving them in `algorithms`.
    pub fn from_ids(
        name: impl Into<String>,
        id: u8,
        key_exchange: KeyExchangeId,
        cipher: CipherAlgId,
        hash: HashAlgId,
        algorithms: &AlgorithmSet,
    ) -> Result<Self, ConfigError> {
        let kx = algorithms
            .key_exchange(key_exchange)
            .ok_or_else(|| ConfigError::MissingAlgorithm(format!("{key_exchange:?}")))?;
        let cipher = algorithms
            .cipher(cipher)
            .ok_or_else(|| ConfigError::MissingAlgorithm(format!("{cipher:?}")))?;
        let hash = algorithms
            .hash(hash)
            .ok_or_else(|| ConfigError::MissingAlgorithm(format!("{hash:?}")))?;
        Ok(Self::new(name, id, hash, cipher, kx))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn hash(&self) -> &dyn HashAlgorithm {
        self.hash.as_ref()
    }

    pub fn cipher(&self) -> &dyn CipherAlgorithm {
        self.cipher.as_ref()
    }

    pub fn key_exchange(&self) -> &dyn KeyExchangeAlgorithm {
        self.key_exchange.as_ref()
    }

    /// MAC key length: the hash output size.
    pub fn mac_key_len(&self) -> usize {
        self.hash.output_size()
    }

    /// Total key block length: MAC keys, cipher keys and IVs for both directions.
    pub fn key_block_len(&self) -> usize {
        2 * (self.mac_key_len() + self.cipher.key_size() + self.cipher.block_size())
    }
}

impl PartialEq for CipherSuite {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.name == other.name
    }
}

impl Eq for CipherSuite {}

impl fmt::Debug for CipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherSuite")
            .field("name", &self.name)
            .field("id", &format_args!("{:#04x}", self.id))
            .field("hash", &self.hash.name())
            .field("cipher", &self.cipher.name())
            .field("key_exchange", &self.key_exchange.name())
            .finish()
    }
}

/// Suites registered by [`SuiteRegistry::with_defaults`], in server
/// preference order.
pub const DEFAULT_SUITES: &[(u8, &str, KeyExchangeId, CipherAlgId, HashAlgId)] = &[
    (0x20, "X25519 AES256 SHA256", KeyExchangeId::X25519, CipherAlgId::Aes256, HashAlgId::Sha256),
    (0x21, "P256 AES256 SHA256", KeyExchangeId::Secp256r1, CipherAlgId::Aes256, HashAlgId::Sha256),
    (0x22, "P256 AES128 SHA1", KeyExchangeId::Secp256r1, CipherAlgId::Aes128, HashAlgId::Sha1),
    (0x23, "X25519 AES128 SHA1", KeyExchangeId::X25519, CipherAlgId::Aes128, HashAlgId::Sha1),
];

/// The cipher suites known to a process, in registration (= preference) order.
///
/// Built once at startup and shared read-only behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct SuiteRegistry {
    suites: Vec<CipherSuite>,
}

impl SuiteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every default suite whose algorithms are present in `algorithms`.
    pub fn with_defaults(algorithms: &AlgorithmSet) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for &(id, name, kx, cipher, hash) in DEFAULT_SUITES {
            match CipherSuite::from_ids(name, id, kx, cipher, hash, algorithms) {
                Ok(suite) => registry.register(suite)?,
                Err(ConfigError::MissingAlgorithm(alg)) => {
                    debug!("skipping cipher suite {name}: {alg} not available");
                }
                Err(e) => return Err(e),
            }
        }
        if registry.is_empty() {
            return Err(ConfigError::NoCipherSuites);
        }
        Ok(registry)
    }

    /// Append a suite. Ids and names must be unique.
    pub fn register(&mut self, suite: CipherSuite) -> Result<(), ConfigError> {
        if self.find_by_id(suite.id()).is_some() {
            return Err(ConfigError::DuplicateCipherSuiteId(suite.id()));
        }
        if self.find_by_name(suite.name()).is_some() {
            return Err(ConfigError::DuplicateCipherSuiteName(suite.name().to_string()));
        }
        self.suites.push(suite);
        Ok(())
    }

    pub fn find_by_id(&self, id: u8) -> Option<&CipherSuite> {
        self.suites.iter().find(|s| s.id() == id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&CipherSuite> {
        self.suites.iter().find(|s| s.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CipherSuite> {
        self.suites.iter()
    }

    /// Suite ids in registration order.
    pub fn ids(&self) -> Vec<u8> {
        self.suites.iter().map(CipherSuite::id).collect()
    }

    pub fn len(&self) -> usize {
        self.suites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suites.is_empty()
    }
}
