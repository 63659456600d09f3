//! HMAC (Hash-based Message Authentication Code), RFC 2104.
//!
//! HMAC(K, m) = H((K' XOR opad) || H((K' XOR ipad) || m))
//!
//! where K' is the key padded/hashed to block size, ipad = 0x36, opad = 0x5c.
//! Works over any [`HashAlgorithm`], so the record layer can MAC with
//! whatever hash the negotiated suite names.

use crate::provider::{Digest, HashAlgorithm};
use tinytls_types::CryptoError;
use zeroize::Zeroize;

/// HMAC context over a boxed [`Digest`].
pub struct Hmac {
    inner: Box<dyn Digest>,
    outer: Box<dyn Digest>,
    /// Processed key block, kept for [`reset`](Self::reset).
    key_block: Vec<u8>,
}

impl Hmac {
    /// Create a new HMAC instance keyed with `key` over `hash`.
    pub fn new(hash: &dyn HashAlgorithm, key: &[u8]) -> Result<Self, CryptoError> {
        let block_size = hash.block_size();
        let output_size = hash.output_size();

        let mut key_block = vec![0u8; block_size];
        if key.len() > block_size {
            let mut hashed_key = hash.hash(key)?;
            key_block[..output_size].copy_from_slice(&hashed_key);
            hashed_key.zeroize();
        } else {
            key_block[..key.len()].copy_from_slice(key);
        }

        let mut hmac = Self {
            inner: hash.new_digest(),
            outer: hash.new_digest(),
            key_block,
        };
        hmac.absorb_pads()?;
        Ok(hmac)
    }

    fn absorb_pads(&mut self) -> Result<(), CryptoError> {
        let mut pad: Vec<u8> = self.key_block.iter().map(|b| b ^ 0x36).collect();
        self.inner.update(&pad)?;
        for (p, k) in pad.iter_mut().zip(&self.key_block) {
            *p = k ^ 0x5c;
        }
        self.outer.update(&pad)?;
        pad.zeroize();
        Ok(())
    }

    pub fn output_size(&self) -> usize {
        self.outer.output_size()
    }

    /// Feed data into the HMAC computation.
    pub fn update(&mut self, data: &[u8]) -> Result<(), CryptoError> {
        self.inner.update(data)
    }

    /// Finalize the HMAC computation and write the result to `out`.
    pub fn finish(&mut self, out: &mut [u8]) -> Result<(), CryptoError> {
        let mut inner_hash = vec![0u8; self.inner.output_size()];
        self.inner.finish(&mut inner_hash)?;
        self.outer.update(&inner_hash)?;
        inner_hash.zeroize();
        self.outer.finish(out)
    }

    /// Reset the HMAC state for reuse with the same key.
    pub fn reset(&mut self) -> Result<(), CryptoError> {
        self.inner.reset();
        self.outer.reset();
        self.absorb_pads()
    }

    /// One-shot HMAC computation.
    pub fn mac(hash: &dyn HashAlgorithm, key: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut ctx = Self::new(hash, key)?;
        ctx.update(data)?;
        let mut out = vec![0u8; ctx.output_size()];
        ctx.finish(&mut out)?;
        Ok(out)
    }
}

impl Drop for Hmac {
    fn drop(&mut self) {
        self.key_block.zeroize();
    }
}

#[cfg(all(test, feature = "sha1", feature = "sha2"))]
mod tests {
    use super::*;
    use crate::sha1::Sha1;
    use crate::sha2::Sha256;

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    // RFC 4231 Test Case 1
    #[test]
    fn test_hmac_sha256_case1() {
        let key = [0x0b; 20];
        let result = Hmac::mac(&Sha256, &key, b"Hi There").unwrap();
        assert_eq!(
            hex(&result),
            "b0344c61d8db38535ca8afceaf0bf12b881dc200c9833da726e9376c2e32cff7"
        );
    }

    // RFC 4231 Test Case 2
    #[test]
    fn test_hmac_sha256_case2() {
        let result = Hmac::mac(&Sha256, b"Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(
            hex(&result),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    // RFC 4231 Test Case 6 (key longer than block size)
    #[test]
    fn test_hmac_sha256_long_key() {
        let key = [0xaa; 131];
        let data = b"Test Using Larger Than Block-Size Key - Hash Key First";
        let result = Hmac::mac(&Sha256, &key, data).unwrap();
        assert_eq!(
            hex(&result),
            "60e431591ee0b67f0d8a26aacbf5b77f8e0bc6213728c5140546040f0ee37f54"
        );
    }

    // RFC 2202 Test Case 2
    #[test]
    fn test_hmac_sha1_case2() {
        let result = Hmac::mac(&Sha1, b"Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(hex(&result), "effcdf6ae5eb2fa2d27416d5f184df9c259a7c79");
    }

    #[test]
    fn test_hmac_incremental_and_reset() {
        let key = b"incremental key";
        let one_shot = Hmac::mac(&Sha256, key, b"hello world").unwrap();

        let mut ctx = Hmac::new(&Sha256, key).unwrap();
        ctx.update(b"hello ").unwrap();
        ctx.update(b"world").unwrap();
        let mut out = vec![0u8; 32];
        ctx.finish(&mut out).unwrap();
        assert_eq!(out, one_shot);

        ctx.reset().unwrap();
        ctx.update(b"hello world").unwrap();
        let mut again = vec![0u8; 32];
        ctx.finish(&mut again).unwrap();
        assert_eq!(again, one_shot);
    }
}
