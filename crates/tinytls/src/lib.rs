#![forbid(unsafe_code)]
#![doc = "A compact TLS-style secure transport engine: record framing, handshake negotiation, cipher-suite selection, session tracking and alert signaling over an abstract peer channel."]

pub mod alert;
pub mod channel;
pub mod config;
pub mod crypt;
pub mod engine;
pub mod handshake;
pub mod record;
pub mod session;

pub use alert::{Alert, AlertDescription, AlertLevel};
pub use channel::{ChannelControl, MemoryChannel, PeerChannel};
pub use config::{EngineConfig, RegistryConfig, TlsContext};
pub use crypt::{CipherSuite, SuiteRegistry};
pub use engine::{Application, Engine, Status};
pub use record::{ContentType, Record};
pub use session::{ConnectionState, SessionRegistry, SharedState, StateKey};

/// The role of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TlsRole {
    Client,
    Server,
}

impl TlsRole {
    /// The role on the other end of the connection.
    pub fn peer(self) -> Self {
        match self {
            TlsRole::Client => TlsRole::Server,
            TlsRole::Server => TlsRole::Client,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_peer() {
        assert_eq!(TlsRole::Client.peer(), TlsRole::Server);
        assert_eq!(TlsRole::Server.peer(), TlsRole::Client);
    }
}
