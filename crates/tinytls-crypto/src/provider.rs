//! Capability traits for the algorithms a cipher suite is assembled from.
//!
//! The record and handshake layers only ever see these traits. Every
//! capability carries a display name and a byte id so suites can be
//! assembled, negotiated and logged without knowing the implementation.

use tinytls_types::{CipherAlgId, CipherDirection, CompressionId, CryptoError, HashAlgId, KeyExchangeId};

/// A running hash / message digest context.
pub trait Digest: Send {
    /// The output size in bytes.
    fn output_size(&self) -> usize;

    /// The internal block size in bytes.
    fn block_size(&self) -> usize;

    /// Feed data into the hash state.
    fn update(&mut self, data: &[u8]) -> Result<(), CryptoError>;

    /// Finalize the hash and write the digest to `out`.
    /// The length of `out` must be at least `output_size()`. The context is
    /// reset afterwards.
    fn finish(&mut self, out: &mut [u8]) -> Result<(), CryptoError>;

    /// Reset the hash state to process a new message.
    fn reset(&mut self);
}

/// A hash algorithm: the factory for [`Digest`] contexts.
pub trait HashAlgorithm: Send + Sync {
    fn id(&self) -> HashAlgId;

    fn name(&self) -> &'static str;

    fn output_size(&self) -> usize;

    fn block_size(&self) -> usize;

    /// Create a new digest context.
    fn new_digest(&self) -> Box<dyn Digest>;

    /// One-shot hash computation.
    fn hash(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut ctx = self.new_digest();
        ctx.update(data)?;
        let mut out = vec![0u8; ctx.output_size()];
        ctx.finish(&mut out)?;
        Ok(out)
    }
}

/// A block cipher context keyed for one direction.
pub trait BlockCipher: Send + Sync {
    /// Block size in bytes.
    fn block_size(&self) -> usize;

    /// The direction this context was initialized for.
    fn direction(&self) -> CipherDirection;

    /// Encrypt or decrypt (per [`direction`](Self::direction)) a single block in place.
    fn process_block(&self, block: &mut [u8]) -> Result<(), CryptoError>;

    /// Process a block-aligned buffer in place, block by block.
    fn process_blocks(&self, data: &mut [u8]) -> Result<(), CryptoError> {
        let bs = self.block_size();
        if data.len() % bs != 0 {
            return Err(CryptoError::NotBlockAligned { block_size: bs });
        }
        for block in data.chunks_exact_mut(bs) {
            self.process_block(block)?;
        }
        Ok(())
    }
}

/// A block cipher algorithm (e.g. AES-128).
pub trait CipherAlgorithm: Send + Sync {
    fn id(&self) -> CipherAlgId;

    fn name(&self) -> &'static str;

    /// Block size in bytes.
    fn block_size(&self) -> usize;

    /// Key size in bytes.
    fn key_size(&self) -> usize;

    /// Create a cipher context for `direction` under `key`.
    fn init(
        &self,
        direction: CipherDirection,
        key: &[u8],
    ) -> Result<Box<dyn BlockCipher>, CryptoError>;
}

/// One side of an ephemeral key exchange.
pub trait KeyExchange: Send {
    /// The encoded public value sent to the peer.
    fn public_value(&self) -> &[u8];

    /// Combine our private value with the peer's public value.
    fn compute_shared_secret(&self, peer_public: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

/// A key exchange algorithm (e.g. X25519).
pub trait KeyExchangeAlgorithm: Send + Sync {
    fn id(&self) -> KeyExchangeId;

    fn name(&self) -> &'static str;

    /// Generate a fresh ephemeral key pair.
    fn generate(&self, rng: &dyn RandomSource) -> Result<Box<dyn KeyExchange>, CryptoError>;
}

/// A record compression method.
pub trait Compression: Send + Sync {
    fn id(&self) -> CompressionId;

    fn name(&self) -> &'static str;

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError>;

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

/// A source of cryptographically secure random bytes.
pub trait RandomSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fill `buf` entirely with random bytes.
    fn fill(&self, buf: &mut [u8]) -> Result<(), CryptoError>;

    /// Allocate and fill `len` random bytes.
    fn random_bytes(&self, len: usize) -> Result<Vec<u8>, CryptoError> {
        let mut out = vec![0u8; len];
        self.fill(&mut out)?;
        Ok(out)
    }
}
