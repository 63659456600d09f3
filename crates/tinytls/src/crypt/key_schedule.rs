//! Key derivation (RFC 5246 §6.3, §8.1, §7.4.9) over the suite's PRF.
//!
//! Derives the master secret from the pre-master secret, expands it into
//! per-direction record keys, and computes Finished verify data.

use zeroize::{Zeroize, ZeroizeOnDrop};

use super::prf::prf;
use super::CipherSuite;
use crate::TlsRole;
use tinytls_crypto::HashAlgorithm;
use tinytls_types::CryptoError;

/// Master secret length in bytes.
pub const MASTER_SECRET_SIZE: usize = 48;

/// Finished verify data length in bytes.
pub const VERIFY_DATA_SIZE: usize = 12;

pub const CLIENT_FINISHED_LABEL: &str = "client finished";
pub const SERVER_FINISHED_LABEL: &str = "server finished";

/// Record protection keys for both directions.
///
/// Layout of the key block, in order: client MAC key, server MAC key,
/// client cipher key, server cipher key, client IV, server IV.
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    pub client_mac_key: Vec<u8>,
    pub server_mac_key: Vec<u8>,
    pub client_key: Vec<u8>,
    pub server_key: Vec<u8>,
    pub client_iv: Vec<u8>,
    pub server_iv: Vec<u8>,
}

impl KeyMaterial {
    /// MAC key used by records sent by `sender`.
    pub fn mac_key(&self, sender: TlsRole) -> &[u8] {
        match sender {
            TlsRole::Client => &self.client_mac_key,
            TlsRole::Server => &self.server_mac_key,
        }
    }

    /// Cipher key used by records sent by `sender`.
    pub fn cipher_key(&self, sender: TlsRole) -> &[u8] {
        match sender {
            TlsRole::Client => &self.client_key,
            TlsRole::Server => &self.server_key,
        }
    }

    /// Fixed IV used by records sent by `sender`.
    pub fn iv(&self, sender: TlsRole) -> &[u8] {
        match sender {
            TlsRole::Client => &self.client_iv,
            TlsRole::Server => &self.server_iv,
        }
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("mac_key_len", &self.client_mac_key.len())
            .field("key_len", &self.client_key.len())
            .field("iv_len", &self.client_iv.len())
            .finish_non_exhaustive()
    }
}

/// master_secret = PRF(pre_master_secret, "master secret",
///                     client_random + server_random)[0..47]
pub fn derive_master_secret(
    hash: &dyn HashAlgorithm,
    pre_master_secret: &[u8],
    client_random: &[u8; 32],
    server_random: &[u8; 32],
) -> Result<Vec<u8>, CryptoError> {
    let mut seed = Vec::with_capacity(64);
    seed.extend_from_slice(client_random);
    seed.extend_from_slice(server_random);
    prf(hash, pre_master_secret, "master secret", &seed, MASTER_SECRET_SIZE)
}

/// key_block = PRF(master_secret, "key expansion",
///                 server_random + client_random)
pub fn derive_key_material(
    suite: &CipherSuite,
    master_secret: &[u8],
    server_random: &[u8; 32],
    client_random: &[u8; 32],
) -> Result<KeyMaterial, CryptoError> {
    // Reversed from the master secret seed.
    let mut seed = Vec::with_capacity(64);
    seed.extend_from_slice(server_random);
    seed.extend_from_slice(client_random);

    let mut key_block = prf(
        suite.hash(),
        master_secret,
        "key expansion",
        &seed,
        suite.key_block_len(),
    )?;

    let mac_len = suite.mac_key_len();
    let key_len = suite.cipher().key_size();
    let iv_len = suite.cipher().block_size();

    let mut offset = 0;
    let mut take = |len: usize| {
        let part = key_block[offset..offset + len].to_vec();
        offset += len;
        part
    };
    let keys = KeyMaterial {
        client_mac_key: take(mac_len),
        server_mac_key: take(mac_len),
        client_key: take(key_len),
        server_key: take(key_len),
        client_iv: take(iv_len),
        server_iv: take(iv_len),
    };
    key_block.zeroize();
    Ok(keys)
}

/// verify_data = PRF(master_secret, finished_label, Hash(handshake_messages))[0..11]
pub fn compute_verify_data(
    hash: &dyn HashAlgorithm,
    master_secret: &[u8],
    label: &str,
    handshake_messages: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let handshake_hash = hash.hash(handshake_messages)?;
    prf(hash, master_secret, label, &handshake_hash, VERIFY_DATA_SIZE)
}

/// The Finished label for messages sent by `sender`.
pub fn finished_label(sender: TlsRole) -> &'static str {
    match sender {
        TlsRole::Client => CLIENT_FINISHED_LABEL,
        TlsRole::Server => SERVER_FINISHED_LABEL,
    }
}
