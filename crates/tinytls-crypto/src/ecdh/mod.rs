//! Ephemeral ECDH over NIST P-256, backed by the `p256` crate.
//!
//! Public values are SEC1 uncompressed points (65 bytes); the shared secret
//! is the affine x-coordinate (32 bytes).

use p256::elliptic_curve::sec1::ToEncodedPoint;
use tinytls_types::{CryptoError, KeyExchangeId};
use zeroize::Zeroize;

use crate::provider::{KeyExchange, KeyExchangeAlgorithm, RandomSource};

/// Attempts at drawing a scalar in range before giving up.
const MAX_KEYGEN_ATTEMPTS: usize = 8;

/// ECDH over secp256r1.
#[derive(Debug, Clone, Copy, Default)]
pub struct EcdhP256;

/// An ephemeral P-256 key pair.
pub struct P256KeyPair {
    secret: p256::SecretKey,
    public: Vec<u8>,
}

impl KeyExchangeAlgorithm for EcdhP256 {
    fn id(&self) -> KeyExchangeId {
        KeyExchangeId::Secp256r1
    }

    fn name(&self) -> &'static str {
        "P256"
    }

    fn generate(&self, rng: &dyn RandomSource) -> Result<Box<dyn KeyExchange>, CryptoError> {
        let mut bytes = [0u8; 32];
        for _ in 0..MAX_KEYGEN_ATTEMPTS {
            rng.fill(&mut bytes)?;
            // Rejects zero and values >= the group order.
            if let Ok(secret) = p256::SecretKey::from_slice(&bytes) {
                bytes.zeroize();
                let public = secret
                    .public_key()
                    .to_encoded_point(false)
                    .as_bytes()
                    .to_vec();
                return Ok(Box::new(P256KeyPair { secret, public }));
            }
        }
        bytes.zeroize();
        Err(CryptoError::EntropyFail)
    }
}

impl KeyExchange for P256KeyPair {
    fn public_value(&self) -> &[u8] {
        &self.public
    }

    fn compute_shared_secret(&self, peer_public: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let peer = p256::PublicKey::from_sec1_bytes(peer_public)
            .map_err(|_| CryptoError::InvalidPublicKey)?;
        let shared = p256::ecdh::diffie_hellman(self.secret.to_nonzero_scalar(), peer.as_affine());
        Ok(shared.raw_secret_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rand::OsRandom;

    #[test]
    fn test_p256_agreement() {
        let a = EcdhP256.generate(&OsRandom).unwrap();
        let b = EcdhP256.generate(&OsRandom).unwrap();
        assert_eq!(a.public_value().len(), 65);
        assert_eq!(a.public_value()[0], 0x04);
        let s1 = a.compute_shared_secret(b.public_value()).unwrap();
        let s2 = b.compute_shared_secret(a.public_value()).unwrap();
        assert_eq!(s1.len(), 32);
        assert_eq!(s1, s2);
    }

    #[test]
    fn test_p256_rejects_invalid_point() {
        let a = EcdhP256.generate(&OsRandom).unwrap();
        let mut bogus = vec![0x04];
        bogus.extend_from_slice(&[0xFF; 64]);
        assert_eq!(
            a.compute_shared_secret(&bogus),
            Err(CryptoError::InvalidPublicKey)
        );
        assert_eq!(a.compute_shared_secret(&[]), Err(CryptoError::InvalidPublicKey));
    }
}
