//! Per-connection security state and the process-wide session registry.

use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use log::debug;
use tinytls_crypto::compression::NullCompression;
use tinytls_crypto::Compression;
use zeroize::Zeroize;

use crate::alert::{Alert, AlertDescription};
use crate::config::RegistryConfig;
use crate::crypt::key_schedule::{derive_key_material, KeyMaterial};
use crate::crypt::CipherSuite;
use crate::TlsRole;

/// Size of the client and server hello randoms.
pub const RANDOM_SIZE: usize = 32;

/// Longest session id a hello may carry.
pub const MAX_SESSION_ID_SIZE: usize = 32;

/// A connection state shared between its Engine, Handshake and the registry.
pub type SharedState = Arc<RwLock<ConnectionState>>;

/// One entry of a connection's handshake log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateEvent {
    CipherSuite { id: u8, name: String },
    Compression(u8),
    ClientRandom,
    ServerRandom,
    ChangeCipherSpec { role: TlsRole, active: bool },
    SessionId(Vec<u8>),
    MasterSecret,
    SessionInherited(Vec<u8>),
    Reset,
    /// Free-form event recorded by the engine.
    Note(String),
}

/// The negotiated, evolving security parameters of one connection.
pub struct ConnectionState {
    session_id: Vec<u8>,
    peer_id: String,
    role: TlsRole,
    suite: Option<CipherSuite>,
    compression: Arc<dyn Compression>,
    client_random: [u8; RANDOM_SIZE],
    server_random: [u8; RANDOM_SIZE],
    master_secret: Vec<u8>,
    keys: Option<KeyMaterial>,
    change_cipher_spec_client: bool,
    change_cipher_spec_server: bool,
    client_sequence: u64,
    server_sequence: u64,
    created_at: Instant,
    log: Vec<StateEvent>,
}

impl ConnectionState {
    pub fn new(role: TlsRole, peer_id: impl Into<String>) -> Self {
        Self {
            session_id: Vec::new(),
            peer_id: peer_id.into(),
            role,
            suite: None,
            compression: Arc::new(NullCompression),
            client_random: [0u8; RANDOM_SIZE],
            server_random: [0u8; RANDOM_SIZE],
            master_secret: Vec::new(),
            keys: None,
            change_cipher_spec_client: false,
            change_cipher_spec_server: false,
            client_sequence: 0,
            server_sequence: 0,
            created_at: Instant::now(),
            log: Vec::new(),
        }
    }

    /// Wrap into a [`SharedState`].
    pub fn into_shared(self) -> SharedState {
        Arc::new(RwLock::new(self))
    }

    pub fn session_id(&self) -> &[u8] {
        &self.session_id
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    /// The local role.
    pub fn role(&self) -> TlsRole {
        self.role
    }

    pub fn cipher_suite(&self) -> Option<&CipherSuite> {
        self.suite.as_ref()
    }

    pub fn compression(&self) -> &dyn Compression {
        self.compression.as_ref()
    }

    pub fn client_random(&self) -> &[u8; RANDOM_SIZE] {
        &self.client_random
    }

    pub fn server_random(&self) -> &[u8; RANDOM_SIZE] {
        &self.server_random
    }

    pub fn master_secret(&self) -> &[u8] {
        &self.master_secret
    }

    pub fn key_material(&self) -> Option<&KeyMaterial> {
        self.keys.as_ref()
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Every mutation so far, oldest first.
    pub fn handshake_log(&self) -> &[StateEvent] {
        &self.log
    }

    /// The local role when `local` is true, the peer's role otherwise.
    pub fn entity_type(&self, local: bool) -> TlsRole {
        if local {
            self.role
        } else {
            self.role.peer()
        }
    }

    /// Whether records sent by `role` are protected.
    pub fn change_cipher_spec(&self, role: TlsRole) -> bool {
        match role {
            TlsRole::Client => self.change_cipher_spec_client,
            TlsRole::Server => self.change_cipher_spec_server,
        }
    }

    /// Whether records sent by `sender` go through record protection.
    pub fn is_protected(&self, sender: TlsRole) -> bool {
        self.change_cipher_spec(sender) && self.suite.is_some()
    }

    /// Whether this state carries what an abbreviated handshake needs.
    pub fn is_resumable(&self) -> bool {
        !self.session_id.is_empty() && !self.master_secret.is_empty() && self.suite.is_some()
    }

    /// Record sequence number of the next record sent by `sender`.
    pub fn sequence(&self, sender: TlsRole) -> u64 {
        match sender {
            TlsRole::Client => self.client_sequence,
            TlsRole::Server => self.server_sequence,
        }
    }

    pub fn set_cipher_suite(&mut self, suite: CipherSuite) {
        self.log.push(StateEvent::CipherSuite {
            id: suite.id(),
            name: suite.name().to_string(),
        });
        self.suite = Some(suite);
        self.keys = None;
    }

    pub fn set_compression(&mut self, compression: Arc<dyn Compression>) {
        self.log.push(StateEvent::Compression(compression.id() as u8));
        self.compression = compression;
    }

    pub fn set_client_random(&mut self, random: &[u8]) -> Result<(), Alert> {
        self.client_random = check_random(random)?;
        self.log.push(StateEvent::ClientRandom);
        Ok(())
    }

    pub fn set_server_random(&mut self, random: &[u8]) -> Result<(), Alert> {
        self.server_random = check_random(random)?;
        self.log.push(StateEvent::ServerRandom);
        Ok(())
    }

    pub fn set_change_cipher_spec_client(&mut self, active: bool) {
        self.set_change_cipher_spec(TlsRole::Client, active);
    }

    pub fn set_change_cipher_spec_server(&mut self, active: bool) {
        self.set_change_cipher_spec(TlsRole::Server, active);
    }

    pub fn set_change_cipher_spec(&mut self, role: TlsRole, active: bool) {
        match role {
            TlsRole::Client => self.change_cipher_spec_client = active,
            TlsRole::Server => self.change_cipher_spec_server = active,
        }
        self.log.push(StateEvent::ChangeCipherSpec { role, active });
    }

    pub fn set_session_id(&mut self, session_id: Vec<u8>) -> Result<(), Alert> {
        if session_id.len() > MAX_SESSION_ID_SIZE {
            return Err(Alert::fatal(
                AlertDescription::IllegalParameter,
                format!("session id of {} bytes", session_id.len()),
            ));
        }
        self.log.push(StateEvent::SessionId(session_id.clone()));
        self.session_id = session_id;
        Ok(())
    }

    /// Install the master secret and derive record keys from it with the
    /// current suite and randoms.
    pub fn set_master_secret(&mut self, master_secret: Vec<u8>) -> Result<(), Alert> {
        let suite = self.suite.as_ref().ok_or_else(|| {
            Alert::fatal(
                AlertDescription::InternalError,
                "master secret installed before a cipher suite was chosen",
            )
        })?;
        let keys = derive_key_material(
            suite,
            &master_secret,
            &self.server_random,
            &self.client_random,
        )?;
        self.master_secret.zeroize();
        self.master_secret = master_secret;
        self.keys = Some(keys);
        self.log.push(StateEvent::MasterSecret);
        Ok(())
    }

    /// Advance the sequence number of `sender` after a protected record.
    pub fn advance_sequence(&mut self, sender: TlsRole) -> Result<(), Alert> {
        let seq = match sender {
            TlsRole::Client => &mut self.client_sequence,
            TlsRole::Server => &mut self.server_sequence,
        };
        *seq = seq.checked_add(1).ok_or_else(|| {
            Alert::fatal(AlertDescription::InternalError, "sequence number overflow")
        })?;
        Ok(())
    }

    /// Prepare for a fresh negotiation. The session id, suite and master
    /// secret survive so the next handshake can resume them.
    pub fn reset_for_new_connection(&mut self) {
        self.change_cipher_spec_client = false;
        self.change_cipher_spec_server = false;
        self.client_sequence = 0;
        self.server_sequence = 0;
        self.client_random = [0u8; RANDOM_SIZE];
        self.server_random = [0u8; RANDOM_SIZE];
        self.keys = None;
        self.log.push(StateEvent::Reset);
    }

    /// Drop everything a resumption would use.
    pub fn forget_session(&mut self) {
        self.session_id.clear();
        self.master_secret.zeroize();
        self.master_secret.clear();
        self.keys = None;
    }

    /// Take over the resumable session of another state.
    pub fn inherit_session(&mut self, other: &ConnectionState) {
        self.session_id = other.session_id.clone();
        self.suite = other.suite.clone();
        self.compression = other.compression.clone();
        self.master_secret.zeroize();
        self.master_secret = other.master_secret.clone();
        self.keys = None;
        self.log
            .push(StateEvent::SessionInherited(other.session_id.clone()));
    }

    /// Append an engine-level event to the handshake log.
    pub fn record_event(&mut self, note: impl Into<String>) {
        self.log.push(StateEvent::Note(note.into()));
    }
}

fn check_random(random: &[u8]) -> Result<[u8; RANDOM_SIZE], Alert> {
    random.try_into().map_err(|_| {
        Alert::fatal(
            AlertDescription::IllegalParameter,
            format!("random must be {RANDOM_SIZE} bytes, got {}", random.len()),
        )
    })
}

impl Drop for ConnectionState {
    fn drop(&mut self) {
        self.master_secret.zeroize();
        self.client_random.zeroize();
        self.server_random.zeroize();
    }
}

impl fmt::Debug for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionState")
            .field("session_id", &self.session_id)
            .field("peer_id", &self.peer_id)
            .field("role", &self.role)
            .field("suite", &self.suite.as_ref().map(CipherSuite::name))
            .field("compression", &self.compression.name())
            .field("change_cipher_spec_client", &self.change_cipher_spec_client)
            .field("change_cipher_spec_server", &self.change_cipher_spec_server)
            .field("client_sequence", &self.client_sequence)
            .field("server_sequence", &self.server_sequence)
            .finish_non_exhaustive()
    }
}

pub(crate) fn read_state(state: &SharedState) -> Result<RwLockReadGuard<'_, ConnectionState>, Alert> {
    state
        .read()
        .map_err(|_| Alert::fatal(AlertDescription::InternalError, "connection state lock poisoned"))
}

pub(crate) fn write_state(
    state: &SharedState,
) -> Result<RwLockWriteGuard<'_, ConnectionState>, Alert> {
    state
        .write()
        .map_err(|_| Alert::fatal(AlertDescription::InternalError, "connection state lock poisoned"))
}

/// Retention limits for the session registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionPolicy {
    /// Oldest entries are evicted once the registry would exceed this.
    pub max_entries: Option<usize>,
    /// Entries older than this are skipped by lookups and purged.
    pub max_age: Option<Duration>,
}

impl EvictionPolicy {
    /// Keep every entry forever.
    pub fn unbounded() -> Self {
        Self::default()
    }

    fn is_expired(&self, state: &ConnectionState) -> bool {
        self.max_age
            .is_some_and(|max_age| state.created_at().elapsed() > max_age)
    }
}

/// Lookup key for [`SessionRegistry::find_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKey<'a> {
    SessionId(&'a [u8]),
    PeerId(&'a str),
}

/// The process-wide registry of live connection states.
///
/// Appends and lookups may run concurrently; lookups scan in insertion
/// order and return the first match.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    entries: RwLock<Vec<SharedState>>,
    policy: EvictionPolicy,
}

impl SessionRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            policy: config.eviction,
        }
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    /// Append a state, evicting the oldest entries beyond `max_entries`.
    pub fn register(&self, state: SharedState) {
        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.push(state);
        if let Some(max) = self.policy.max_entries {
            if entries.len() > max {
                let excess = entries.len() - max;
                entries.drain(..excess);
                debug!("session registry evicted {excess} oldest entries");
            }
        }
    }

    /// First live state matching `key`. Empty session ids never match.
    pub fn find_state(&self, key: StateKey<'_>) -> Option<SharedState> {
        match key {
            StateKey::SessionId(id) if id.is_empty() => None,
            StateKey::SessionId(id) => self.find(|s| s.session_id() == id),
            StateKey::PeerId(peer) => self.find(|s| s.peer_id() == peer),
        }
    }

    pub fn find_by_session_id(&self, session_id: &[u8]) -> Option<SharedState> {
        self.find_state(StateKey::SessionId(session_id))
    }

    pub fn find_by_peer_id(&self, peer_id: &str) -> Option<SharedState> {
        self.find_state(StateKey::PeerId(peer_id))
    }

    /// First live (non-expired) state satisfying `pred`.
    ///
    /// Each candidate is read-locked in turn; callers must not hold the
    /// write lock of a registered state while searching.
    pub fn find(&self, pred: impl Fn(&ConnectionState) -> bool) -> Option<SharedState> {
        let entries = self.entries.read().ok()?;
        entries
            .iter()
            .find(|entry| {
                entry
                    .read()
                    .map(|s| !self.policy.is_expired(&s) && pred(&s))
                    .unwrap_or(false)
            })
            .cloned()
    }

    /// Remove expired entries, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = entries.len();
        entries.retain(|entry| {
            entry
                .read()
                .map(|s| !self.policy.is_expired(&s))
                .unwrap_or(false)
        });
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypt::SuiteRegistry;
    use tinytls_crypto::AlgorithmSet;

    fn suite(id: u8) -> CipherSuite {
        SuiteRegistry::with_defaults(&AlgorithmSet::all())
            .unwrap()
            .find_by_id(id)
            .unwrap()
            .clone()
    }

    fn state_with_session(role: TlsRole, peer: &str, sid: &[u8]) -> SharedState {
        let mut state = ConnectionState::new(role, peer);
        state.set_session_id(sid.to_vec()).unwrap();
        state.into_shared()
    }

    #[test]
    fn test_randoms_are_size_checked() {
        let mut state = ConnectionState::new(TlsRole::Client, "server");
        assert_eq!(
            state.set_client_random(&[0u8; 31]).unwrap_err().description,
            AlertDescription::IllegalParameter
        );
        assert_eq!(
            state.set_server_random(&[0u8; 33]).unwrap_err().description,
            AlertDescription::IllegalParameter
        );
        state.set_client_random(&[7u8; 32]).unwrap();
        assert_eq!(state.client_random(), &[7u8; 32]);
    }

    #[test]
    fn test_entity_type_and_change_cipher_spec() {
        let mut state = ConnectionState::new(TlsRole::Server, "client");
        assert_eq!(state.entity_type(true), TlsRole::Server);
        assert_eq!(state.entity_type(false), TlsRole::Client);

        assert!(!state.change_cipher_spec(TlsRole::Client));
        state.set_change_cipher_spec_client(true);
        assert!(state.change_cipher_spec(TlsRole::Client));
        assert!(!state.change_cipher_spec(TlsRole::Server));
        state.set_change_cipher_spec_server(true);
        assert!(state.change_cipher_spec(TlsRole::Server));
    }

    #[test]
    fn test_every_mutation_is_logged() {
        let mut state = ConnectionState::new(TlsRole::Client, "server");
        state.set_cipher_suite(suite(0x20));
        state.set_client_random(&[1u8; 32]).unwrap();
        state.set_server_random(&[2u8; 32]).unwrap();
        state.set_change_cipher_spec_client(true);
        state.record_event("hello");
        let log = state.handshake_log();
        assert_eq!(log.len(), 5);
        assert_eq!(
            log[0],
            StateEvent::CipherSuite {
                id: 0x20,
                name: "X25519 AES256 SHA256".into()
            }
        );
        assert_eq!(log[1], StateEvent::ClientRandom);
        assert_eq!(
            log[3],
            StateEvent::ChangeCipherSpec {
                role: TlsRole::Client,
                active: true
            }
        );
        assert_eq!(log[4], StateEvent::Note("hello".into()));
    }

    #[test]
    fn test_set_master_secret_requires_suite() {
        let mut state = ConnectionState::new(TlsRole::Client, "server");
        let err = state.set_master_secret(vec![0u8; 48]).unwrap_err();
        assert_eq!(err.description, AlertDescription::InternalError);

        state.set_cipher_suite(suite(0x21));
        state.set_master_secret(vec![0u8; 48]).unwrap();
        let keys = state.key_material().unwrap();
        assert_eq!(keys.client_key.len(), 32);
    }

    #[test]
    fn test_sequence_numbers_per_direction() {
        let mut state = ConnectionState::new(TlsRole::Client, "server");
        state.advance_sequence(TlsRole::Client).unwrap();
        state.advance_sequence(TlsRole::Client).unwrap();
        state.advance_sequence(TlsRole::Server).unwrap();
        assert_eq!(state.sequence(TlsRole::Client), 2);
        assert_eq!(state.sequence(TlsRole::Server), 1);
        state.reset_for_new_connection();
        assert_eq!(state.sequence(TlsRole::Client), 0);
    }

    #[test]
    fn test_reset_keeps_resumable_session() {
        let mut state = ConnectionState::new(TlsRole::Client, "server");
        state.set_session_id(vec![9u8; 32]).unwrap();
        state.set_cipher_suite(suite(0x20));
        state.set_master_secret(vec![3u8; 48]).unwrap();
        state.set_change_cipher_spec_client(true);
        state.set_change_cipher_spec_server(true);
        state.reset_for_new_connection();

        assert!(state.is_resumable());
        assert!(!state.change_cipher_spec(TlsRole::Client));
        assert!(!state.change_cipher_spec(TlsRole::Server));
        assert!(state.key_material().is_none());
        assert_eq!(state.master_secret(), &[3u8; 48]);
    }

    #[test]
    fn test_inherit_session() {
        let mut old = ConnectionState::new(TlsRole::Client, "server");
        old.set_session_id(vec![5u8; 32]).unwrap();
        old.set_cipher_suite(suite(0x23));
        old.set_master_secret(vec![1u8; 48]).unwrap();

        let mut fresh = ConnectionState::new(TlsRole::Client, "server");
        assert!(!fresh.is_resumable());
        fresh.inherit_session(&old);
        assert!(fresh.is_resumable());
        assert_eq!(fresh.session_id(), old.session_id());
        assert_eq!(fresh.cipher_suite().unwrap().id(), 0x23);
    }

    #[test]
    fn test_session_lookup_by_id_and_peer() {
        let registry = SessionRegistry::default();
        for i in 0u8..10 {
            registry.register(state_with_session(TlsRole::Server, &format!("peer-{i}"), &[i + 1; 32]));
        }
        for i in 0u8..10 {
            let found = registry.find_by_session_id(&[i + 1; 32]).unwrap();
            assert_eq!(found.read().unwrap().session_id(), &[i + 1; 32]);
            let by_peer = registry.find_by_peer_id(&format!("peer-{i}")).unwrap();
            assert!(Arc::ptr_eq(&found, &by_peer));
        }
        assert!(registry.find_by_session_id(&[0xEE; 32]).is_none());
        assert!(registry.find_by_session_id(&[]).is_none());
        assert!(registry.find_by_peer_id("nobody").is_none());
    }

    #[test]
    fn test_lookup_returns_first_match() {
        let registry = SessionRegistry::default();
        let first = state_with_session(TlsRole::Client, "same-peer", &[1; 8]);
        let second = state_with_session(TlsRole::Client, "same-peer", &[1; 8]);
        registry.register(first.clone());
        registry.register(second);
        let found = registry.find_state(StateKey::SessionId(&[1; 8])).unwrap();
        assert!(Arc::ptr_eq(&found, &first));
        let found = registry.find_state(StateKey::PeerId("same-peer")).unwrap();
        assert!(Arc::ptr_eq(&found, &first));
    }

    #[test]
    fn test_max_entries_evicts_oldest() {
        let registry = SessionRegistry::new(RegistryConfig::builder().max_entries(2).build());
        registry.register(state_with_session(TlsRole::Server, "a", &[1]));
        registry.register(state_with_session(TlsRole::Server, "b", &[2]));
        registry.register(state_with_session(TlsRole::Server, "c", &[3]));
        assert_eq!(registry.len(), 2);
        assert!(registry.find_by_peer_id("a").is_none());
        assert!(registry.find_by_peer_id("b").is_some());
        assert!(registry.find_by_peer_id("c").is_some());
    }

    #[test]
    fn test_max_age_skips_and_purges() {
        let registry = SessionRegistry::new(RegistryConfig::builder().max_age(Duration::ZERO).build());
        registry.register(state_with_session(TlsRole::Server, "old", &[1]));
        std::thread::sleep(Duration::from_millis(5));
        assert!(registry.find_by_peer_id("old").is_none());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.purge_expired(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_register_and_lookup() {
        let registry = Arc::new(SessionRegistry::default());
        let handles: Vec<_> = (0u8..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    registry.register(state_with_session(TlsRole::Server, &format!("t{i}"), &[i + 1; 16]));
                    registry.find_by_session_id(&[i + 1; 16]).is_some()
                })
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap());
        }
        assert_eq!(registry.len(), 8);
    }
}
