//! SHA-1 message digest algorithm (FIPS 180-4), backed by the `sha1` crate.
//!
//! **Security warning**: SHA-1 is considered cryptographically weak. It is
//! kept for the legacy suites that MAC with it.

use ::sha1::Digest as _;
use tinytls_types::{CryptoError, HashAlgId};

use crate::provider::{Digest, HashAlgorithm};

/// SHA-1 output size in bytes.
pub const SHA1_OUTPUT_SIZE: usize = 20;

/// SHA-1 block size in bytes.
pub const SHA1_BLOCK_SIZE: usize = 64;

/// The SHA-1 hash algorithm.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha1;

/// A running SHA-1 context.
#[derive(Clone, Default)]
pub struct Sha1Digest(::sha1::Sha1);

impl HashAlgorithm for Sha1 {
    fn id(&self) -> HashAlgId {
        HashAlgId::Sha1
    }

    fn name(&self) -> &'static str {
        "SHA1"
    }

    fn output_size(&self) -> usize {
        SHA1_OUTPUT_SIZE
    }

    fn block_size(&self) -> usize {
        SHA1_BLOCK_SIZE
    }

    fn new_digest(&self) -> Box<dyn Digest> {
        Box::new(Sha1Digest::default())
    }
}

impl Digest for Sha1Digest {
    fn output_size(&self) -> usize {
        SHA1_OUTPUT_SIZE
    }

    fn block_size(&self) -> usize {
        SHA1_BLOCK_SIZE
    }

    fn update(&mut self, data: &[u8]) -> Result<(), CryptoError> {
        self.0.update(data);
        Ok(())
    }

    fn finish(&mut self, out: &mut [u8]) -> Result<(), CryptoError> {
        if out.len() < SHA1_OUTPUT_SIZE {
            return Err(CryptoError::BufferTooSmall {
                need: SHA1_OUTPUT_SIZE,
                got: out.len(),
            });
        }
        out[..SHA1_OUTPUT_SIZE].copy_from_slice(&self.0.finalize_reset());
        Ok(())
    }

    fn reset(&mut self) {
        ::sha1::Digest::reset(&mut self.0);
    }
}
