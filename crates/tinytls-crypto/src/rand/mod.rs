//! Random sources.

use tinytls_types::CryptoError;

use crate::provider::RandomSource;

/// The operating system CSPRNG, via `getrandom`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn name(&self) -> &'static str {
        "OS"
    }

    fn fill(&self, buf: &mut [u8]) -> Result<(), CryptoError> {
        getrandom::getrandom(buf).map_err(|_| CryptoError::EntropyFail)
    }
}
