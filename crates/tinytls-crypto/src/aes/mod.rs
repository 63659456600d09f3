//! AES block cipher (FIPS 197), backed by the `aes` crate.
//!
//! Only single-block processing is exposed; chaining modes live with the
//! record layer that needs them.

use ::aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use tinytls_types::{CipherAlgId, CipherDirection, CryptoError};

use crate::provider::{BlockCipher, CipherAlgorithm};

/// AES block size in bytes.
pub const AES_BLOCK_SIZE: usize = 16;

/// AES with a 128-bit key.
#[derive(Debug, Clone, Copy, Default)]
pub struct Aes128;

/// AES with a 256-bit key.
#[derive(Debug, Clone, Copy, Default)]
pub struct Aes256;

enum AesKey {
    Aes128(::aes::Aes128),
    Aes256(::aes::Aes256),
}

/// An AES context keyed for one direction.
pub struct AesCipher {
    key: AesKey,
    direction: CipherDirection,
}

fn check_key(key: &[u8], expected: usize) -> Result<(), CryptoError> {
    if key.len() != expected {
        return Err(CryptoError::InvalidKeyLength {
            expected,
            got: key.len(),
        });
    }
    Ok(())
}

impl CipherAlgorithm for Aes128 {
    fn id(&self) -> CipherAlgId {
        CipherAlgId::Aes128
    }

    fn name(&self) -> &'static str {
        "AES128"
    }

    fn block_size(&self) -> usize {
        AES_BLOCK_SIZE
    }

    fn key_size(&self) -> usize {
        16
    }

    fn init(
        &self,
        direction: CipherDirection,
        key: &[u8],
    ) -> Result<Box<dyn BlockCipher>, CryptoError> {
        check_key(key, 16)?;
        let cipher = ::aes::Aes128::new_from_slice(key).map_err(|_| CryptoError::InvalidArg)?;
        Ok(Box::new(AesCipher {
            key: AesKey::Aes128(cipher),
            direction,
        }))
    }
}

impl CipherAlgorithm for Aes256 {
    fn id(&self) -> CipherAlgId {
        CipherAlgId::Aes256
    }

    fn name(&self) -> &'static str {
        "AES256"
    }

    fn block_size(&self) -> usize {
        AES_BLOCK_SIZE
    }

    fn key_size(&self) -> usize {
        32
    }

    fn init(
        &self,
        direction: CipherDirection,
        key: &[u8],
    ) -> Result<Box<dyn BlockCipher>, CryptoError> {
        check_key(key, 32)?;
        let cipher = ::aes::Aes256::new_from_slice(key).map_err(|_| CryptoError::InvalidArg)?;
        Ok(Box::new(AesCipher {
            key: AesKey::Aes256(cipher),
            direction,
        }))
    }
}

impl BlockCipher for AesCipher {
    fn block_size(&self) -> usize {
        AES_BLOCK_SIZE
    }

    fn direction(&self) -> CipherDirection {
        self.direction
    }

    fn process_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
        if block.len() != AES_BLOCK_SIZE {
            return Err(CryptoError::NotBlockAligned {
                block_size: AES_BLOCK_SIZE,
            });
        }
        let block = ::aes::Block::from_mut_slice(block);
        match (&self.key, self.direction) {
            (AesKey::Aes128(k), CipherDirection::Encrypt) => k.encrypt_block(block),
            (AesKey::Aes128(k), CipherDirection::Decrypt) => k.decrypt_block(block),
            (AesKey::Aes256(k), CipherDirection::Encrypt) => k.encrypt_block(block),
            (AesKey::Aes256(k), CipherDirection::Decrypt) => k.decrypt_block(block),
        }
        Ok(())
    }
}
