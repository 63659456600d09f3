//! X25519 Diffie-Hellman key exchange (RFC 7748), backed by `x25519-dalek`.

use tinytls_types::{CryptoError, KeyExchangeId};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

use crate::provider::{KeyExchange, KeyExchangeAlgorithm, RandomSource};

/// X25519 key size in bytes (private, public and shared secret).
pub const X25519_KEY_SIZE: usize = 32;

/// The X25519 key exchange.
#[derive(Debug, Clone, Copy, Default)]
pub struct X25519;

/// An ephemeral X25519 key pair.
pub struct X25519KeyPair {
    secret: StaticSecret,
    public: [u8; X25519_KEY_SIZE],
}

impl KeyExchangeAlgorithm for X25519 {
    fn id(&self) -> KeyExchangeId {
        KeyExchangeId::X25519
    }

    fn name(&self) -> &'static str {
        "X25519"
    }

    fn generate(&self, rng: &dyn RandomSource) -> Result<Box<dyn KeyExchange>, CryptoError> {
        let mut bytes = [0u8; X25519_KEY_SIZE];
        rng.fill(&mut bytes)?;
        let secret = StaticSecret::from(bytes);
        bytes.zeroize();
        let public = PublicKey::from(&secret).to_bytes();
        Ok(Box::new(X25519KeyPair { secret, public }))
    }
}

impl KeyExchange for X25519KeyPair {
    fn public_value(&self) -> &[u8] {
        &self.public
    }

    fn compute_shared_secret(&self, peer_public: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let peer: [u8; X25519_KEY_SIZE] = peer_public
            .try_into()
            .map_err(|_| CryptoError::InvalidPublicKey)?;
        let shared = self.secret.diffie_hellman(&PublicKey::from(peer));
        // Low-order peer points yield an all-zero secret.
        if !shared.was_contributory() {
            return Err(CryptoError::KeyAgreementFail);
        }
        Ok(shared.as_bytes().to_vec())
    }
}
