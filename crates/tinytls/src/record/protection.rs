//! MAC-then-encrypt CBC record protection.
//!
//! Payload = CBC(key, iv XOR seq, compressed || MAC || padding)
//! MAC = HMAC(mac_key, seq(8) || type(1) || version(1) || length(2) || compressed)
//! Padding uses the TLS scheme: every padding byte, including the final
//! length byte, equals the padding length.
//!
//! The IV is the sender's fixed IV with the big-endian sequence number
//! XORed into its last eight bytes, so protection is deterministic for a
//! given state.

use subtle::ConstantTimeEq;
use tinytls_crypto::hmac::Hmac;
use tinytls_crypto::{BlockCipher, HashAlgorithm};
use tinytls_types::CipherDirection;
use zeroize::Zeroize;

use super::{ContentType, FRAGMENT_SIZE, VERSION};
use crate::alert::{Alert, AlertDescription};
use crate::crypt::key_schedule::KeyMaterial;
use crate::crypt::CipherSuite;
use crate::session::ConnectionState;
use crate::TlsRole;

/// Largest plaintext whose protected payload still fits one fragment.
pub(super) fn plaintext_limit(suite: &CipherSuite) -> usize {
    let block_size = suite.cipher().block_size();
    let max_ciphertext = FRAGMENT_SIZE - FRAGMENT_SIZE % block_size;
    // At least one padding byte.
    max_ciphertext - suite.mac_key_len() - 1
}

fn bad_record_mac() -> Alert {
    Alert::fatal(AlertDescription::BadRecordMac, "record authentication failed")
}

fn active_keys(state: &ConnectionState) -> Result<(&CipherSuite, &KeyMaterial), Alert> {
    match (state.cipher_suite(), state.key_material()) {
        (Some(suite), Some(keys)) => Ok((suite, keys)),
        _ => Err(Alert::fatal(
            AlertDescription::InternalError,
            "record protection requested without key material",
        )),
    }
}

fn compute_mac(
    hash: &dyn HashAlgorithm,
    mac_key: &[u8],
    seq: u64,
    content_type: ContentType,
    fragment: &[u8],
) -> Result<Vec<u8>, Alert> {
    let mut hmac = Hmac::new(hash, mac_key)?;
    hmac.update(&seq.to_be_bytes())?;
    hmac.update(&[content_type as u8, VERSION])?;
    hmac.update(&(fragment.len() as u16).to_be_bytes())?;
    hmac.update(fragment)?;
    let mut mac = vec![0u8; hmac.output_size()];
    hmac.finish(&mut mac)?;
    Ok(mac)
}

fn build_tls_padding(data_len: usize, block_size: usize) -> Vec<u8> {
    let padding_length = (block_size - ((data_len + 1) % block_size)) % block_size;
    vec![padding_length as u8; padding_length + 1]
}

fn record_iv(fixed_iv: &[u8], seq: u64) -> Vec<u8> {
    let mut iv = fixed_iv.to_vec();
    let offset = iv.len().saturating_sub(8);
    for (b, s) in iv[offset..].iter_mut().zip(seq.to_be_bytes()) {
        *b ^= s;
    }
    iv
}

fn cbc_encrypt(cipher: &dyn BlockCipher, iv: &[u8], data: &mut [u8]) -> Result<(), Alert> {
    let mut prev = iv.to_vec();
    for chunk in data.chunks_mut(cipher.block_size()) {
        for (b, p) in chunk.iter_mut().zip(&prev) {
            *b ^= p;
        }
        cipher.process_block(chunk)?;
        prev.copy_from_slice(chunk);
    }
    Ok(())
}

fn cbc_decrypt(cipher: &dyn BlockCipher, iv: &[u8], data: &mut [u8]) -> Result<(), Alert> {
    let bs = cipher.block_size();
    let mut chain = iv.to_vec();
    chain.extend_from_slice(&data[..data.len().saturating_sub(bs)]);
    cipher.process_blocks(data)?;
    for (b, c) in data.iter_mut().zip(&chain) {
        *b ^= c;
    }
    Ok(())
}

/// Protect `plaintext` sent by `sender`; returns the wire payload.
pub(super) fn protect(
    state: &ConnectionState,
    sender: TlsRole,
    content_type: ContentType,
    plaintext: &[u8],
) -> Result<Vec<u8>, Alert> {
    let (suite, keys) = active_keys(state)?;
    let limit = plaintext_limit(suite);
    if plaintext.len() > limit {
        return Err(Alert::fatal(
            AlertDescription::RecordOverflow,
            format!("{} bytes exceed the {limit} byte protected plaintext limit", plaintext.len()),
        ));
    }
    let compressed = state.compression().compress(plaintext)?;
    if compressed.len() > limit {
        return Err(Alert::fatal(
            AlertDescription::RecordOverflow,
            "compressed fragment exceeds the protected plaintext limit",
        ));
    }

    let seq = state.sequence(sender);
    let mut mac = compute_mac(suite.hash(), keys.mac_key(sender), seq, content_type, &compressed)?;

    let block_size = suite.cipher().block_size();
    let data_len = compressed.len() + mac.len();
    let padding = build_tls_padding(data_len, block_size);
    let mut data = compressed;
    data.extend_from_slice(&mac);
    data.extend_from_slice(&padding);
    mac.zeroize();

    let cipher = suite
        .cipher()
        .init(CipherDirection::Encrypt, keys.cipher_key(sender))?;
    cbc_encrypt(cipher.as_ref(), &record_iv(keys.iv(sender), seq), &mut data)?;
    Ok(data)
}

/// Authenticate and decrypt a payload sent by `sender`.
///
/// Padding and MAC are checked in constant time; every failure is
/// reported as `bad_record_mac`.
pub(super) fn unprotect(
    state: &ConnectionState,
    sender: TlsRole,
    content_type: ContentType,
    payload: &[u8],
) -> Result<Vec<u8>, Alert> {
    let (suite, keys) = active_keys(state)?;
    let block_size = suite.cipher().block_size();
    let mac_len = suite.mac_key_len();

    let min_len = (mac_len + 1).div_ceil(block_size) * block_size;
    if payload.len() < min_len || payload.len() % block_size != 0 {
        return Err(bad_record_mac());
    }

    let seq = state.sequence(sender);
    let mut decrypted = payload.to_vec();
    let cipher = suite
        .cipher()
        .init(CipherDirection::Decrypt, keys.cipher_key(sender))?;
    cbc_decrypt(cipher.as_ref(), &record_iv(keys.iv(sender), seq), &mut decrypted)?;

    let padding_length = decrypted[decrypted.len() - 1] as usize;
    let total_overhead = padding_length + 1 + mac_len;
    let good_length = u8::from(total_overhead <= decrypted.len());

    let pad_start = decrypted.len().saturating_sub(padding_length + 1);
    let mut pad_ok = good_length;
    for &b in &decrypted[pad_start..] {
        pad_ok &= b.ct_eq(&(padding_length as u8)).unwrap_u8();
    }

    let content_len = if good_length == 1 {
        decrypted.len() - total_overhead
    } else {
        0
    };

    // Always computed so a bad padding costs the same as a bad MAC.
    let expected_mac = compute_mac(
        suite.hash(),
        keys.mac_key(sender),
        seq,
        content_type,
        &decrypted[..content_len],
    )?;
    let mac_slice = if good_length == 1 {
        &decrypted[content_len..content_len + mac_len]
    } else {
        &decrypted[..mac_len]
    };
    let mac_ok = mac_slice.ct_eq(expected_mac.as_slice()).unwrap_u8();

    if pad_ok & mac_ok != 1 {
        decrypted.zeroize();
        return Err(bad_record_mac());
    }

    let plaintext = state
        .compression()
        .decompress(&decrypted[..content_len])
        .map_err(|e| Alert::fatal(AlertDescription::DecompressionFailure, e.to_string()))?;
    decrypted.zeroize();
    Ok(plaintext)
}
