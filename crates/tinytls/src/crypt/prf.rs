//! TLS 1.2 PRF (Pseudo-Random Function) as defined in RFC 5246 §5.
//!
//! ```text
//! PRF(secret, label, seed) = P_<hash>(secret, label + seed)
//!
//! P_hash(secret, seed) = HMAC_hash(secret, A(1) + seed) ||
//!                         HMAC_hash(secret, A(2) + seed) || ...
//! A(0) = seed
//! A(i) = HMAC_hash(secret, A(i-1))
//! ```
//!
//! The hash is the negotiated suite's, so every suite carries its own PRF.

use tinytls_crypto::hmac::Hmac;
use tinytls_crypto::HashAlgorithm;
use tinytls_types::CryptoError;

/// Derive `output_len` bytes from `secret`, `label`, and `seed`.
pub fn prf(
    hash: &dyn HashAlgorithm,
    secret: &[u8],
    label: &str,
    seed: &[u8],
    output_len: usize,
) -> Result<Vec<u8>, CryptoError> {
    let mut label_seed = Vec::with_capacity(label.len() + seed.len());
    label_seed.extend_from_slice(label.as_bytes());
    label_seed.extend_from_slice(seed);

    p_hash(hash, secret, &label_seed, output_len)
}

fn p_hash(
    hash: &dyn HashAlgorithm,
    secret: &[u8],
    seed: &[u8],
    output_len: usize,
) -> Result<Vec<u8>, CryptoError> {
    let mut result = Vec::with_capacity(output_len);

    // A(0) = seed
    let mut a = seed.to_vec();

    while result.len() < output_len {
        a = Hmac::mac(hash, secret, &a)?;

        let mut hmac = Hmac::new(hash, secret)?;
        hmac.update(&a)?;
        hmac.update(seed)?;
        let mut block = vec![0u8; hmac.output_size()];
        hmac.finish(&mut block)?;

        result.extend_from_slice(&block);
    }

    result.truncate(output_len);
    Ok(result)
}
