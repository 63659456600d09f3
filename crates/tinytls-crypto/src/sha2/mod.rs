//! SHA-256 (FIPS 180-4), backed by the `sha2` crate.

use ::sha2::Digest as _;
use tinytls_types::{CryptoError, HashAlgId};

use crate::provider::{Digest, HashAlgorithm};

/// SHA-256 output size in bytes.
pub const SHA256_OUTPUT_SIZE: usize = 32;

/// SHA-256 block size in bytes.
pub const SHA256_BLOCK_SIZE: usize = 64;

/// The SHA-256 hash algorithm.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256;

/// A running SHA-256 context.
#[derive(Clone, Default)]
pub struct Sha256Digest(::sha2::Sha256);

impl HashAlgorithm for Sha256 {
    fn id(&self) -> HashAlgId {
        HashAlgId::Sha256
    }

    fn name(&self) -> &'static str {
        "SHA256"
    }

    fn output_size(&self) -> usize {
        SHA256_OUTPUT_SIZE
    }

    fn block_size(&self) -> usize {
        SHA256_BLOCK_SIZE
    }

    fn new_digest(&self) -> Box<dyn Digest> {
        Box::new(Sha256Digest::default())
    }
}

impl Digest for Sha256Digest {
    fn output_size(&self) -> usize {
        SHA256_OUTPUT_SIZE
    }

    fn block_size(&self) -> usize {
        SHA256_BLOCK_SIZE
    }

    fn update(&mut self, data: &[u8]) -> Result<(), CryptoError> {
        self.0.update(data);
        Ok(())
    }

    fn finish(&mut self, out: &mut [u8]) -> Result<(), CryptoError> {
        if out.len() < SHA256_OUTPUT_SIZE {
            return Err(CryptoError::BufferTooSmall {
                need: SHA256_OUTPUT_SIZE,
                got: out.len(),
            });
        }
        out[..SHA256_OUTPUT_SIZE].copy_from_slice(&self.0.finalize_reset());
        Ok(())
    }

    fn reset(&mut self) {
        ::sha2::Digest::reset(&mut self.0);
    }
}
