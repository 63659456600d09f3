use std::sync::Arc;

use tinytls_types::{CipherAlgId, HashAlgId, KeyExchangeId};

use crate::provider::{CipherAlgorithm, Compression, HashAlgorithm, KeyExchangeAlgorithm};

/// The set of capability implementations available to suite assembly.
#[derive(Clone, Default)]
pub struct AlgorithmSet {
    pub hashes: Vec<Arc<dyn HashAlgorithm>>,
    pub ciphers: Vec<Arc<dyn CipherAlgorithm>>,
    pub key_exchanges: Vec<Arc<dyn KeyExchangeAlgorithm>>,
    pub compressions: Vec<Arc<dyn Compression>>,
}

impl AlgorithmSet {
    /// An empty set; populate it with the `with_*` methods.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every implementation compiled into this crate.
    pub fn all() -> Self {
        #[allow(unused_mut)]
        let mut set = Self::new().with_compression(Arc::new(crate::compression::NullCompression));
        #[cfg(feature = "sha1")]
        {
            set = set.with_hash(Arc::new(crate::sha1::Sha1));
        }
        #[cfg(feature = "sha2")]
        {
            set = set.with_hash(Arc::new(crate::sha2::Sha256));
        }
        #[cfg(feature = "aes")]
        {
            set = set
                .with_cipher(Arc::new(crate::aes::Aes128))
                .with_cipher(Arc::new(crate::aes::Aes256));
        }
        #[cfg(feature = "x25519")]
        {
            set = set.with_key_exchange(Arc::new(crate::x25519::X25519));
        }
        #[cfg(feature = "p256")]
        {
            set = set.with_key_exchange(Arc::new(crate::ecdh::EcdhP256));
        }
        #[cfg(feature = "deflate")]
        {
            set = set.with_compression(Arc::new(crate::compression::DeflateCompression));
        }
        set
    }

    pub fn with_hash(mut self, hash: Arc<dyn HashAlgorithm>) -> Self {
        self.hashes.push(hash);
        self
    }

    pub fn with_cipher(mut self, cipher: Arc<dyn CipherAlgorithm>) -> Self {
        self.ciphers.push(cipher);
        self
    }

    pub fn with_key_exchange(mut self, kx: Arc<dyn KeyExchangeAlgorithm>) -> Self {
        self.key_exchanges.push(kx);
        self
    }

    pub fn with_compression(mut self, compression: Arc<dyn Compression>) -> Self {
        self.compressions.push(compression);
        self
    }

    pub fn hash(&self, id: HashAlgId) -> Option<Arc<dyn HashAlgorithm>> {
        self.hashes.iter().find(|h| h.id() == id).cloned()
    }

    pub fn cipher(&self, id: CipherAlgId) -> Option<Arc<dyn CipherAlgorithm>> {
        self.ciphers.iter().find(|c| c.id() == id).cloned()
    }

    pub fn key_exchange(&self, id: KeyExchangeId) -> Option<Arc<dyn KeyExchangeAlgorithm>> {
        self.key_exchanges.iter().find(|k| k.id() == id).cloned()
    }

    /// Look up a compression method by its wire id.
    pub fn compression(&self, id: u8) -> Option<Arc<dyn Compression>> {
        self.compressions.iter().find(|c| c.id() as u8 == id).cloned()
    }
}

impl std::fmt::Debug for AlgorithmSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlgorithmSet")
            .field("hashes", &self.hashes.iter().map(|h| h.name()).collect::<Vec<_>>())
            .field("ciphers", &self.ciphers.iter().map(|c| c.name()).collect::<Vec<_>>())
            .field(
                "key_exchanges",
                &self.key_exchanges.iter().map(|k| k.name()).collect::<Vec<_>>(),
            )
            .field(
                "compressions",
                &self.compressions.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(all(
    test,
    feature = "sha1",
    feature = "sha2",
    feature = "aes",
    feature = "x25519",
    feature = "p256",
    feature = "deflate"
))]
mod tests {
    use super::*;

    #[test]
    fn test_all_enumerates_every_family() {
        let set = AlgorithmSet::all();
        assert_eq!(set.hashes.len(), 2);
        assert_eq!(set.ciphers.len(), 2);
        assert_eq!(set.key_exchanges.len(), 2);
        assert_eq!(set.compressions.len(), 2);
    }

    #[test]
    fn test_lookup_by_id() {
        let set = AlgorithmSet::all();
        assert_eq!(set.hash(HashAlgId::Sha256).unwrap().name(), "SHA256");
        assert_eq!(set.cipher(CipherAlgId::Aes128).unwrap().key_size(), 16);
        assert_eq!(set.key_exchange(KeyExchangeId::X25519).unwrap().name(), "X25519");
        assert_eq!(set.compression(0).unwrap().name(), "NULL");
        assert_eq!(set.compression(1).unwrap().name(), "DEFLATE");
        assert!(set.compression(2).is_none());
    }

    #[test]
    fn test_empty_set_finds_nothing() {
        let set = AlgorithmSet::new();
        assert!(set.hash(HashAlgId::Sha1).is_none());
        assert!(set.cipher(CipherAlgId::Aes256).is_none());
        assert!(set.key_exchange(KeyExchangeId::Secp256r1).is_none());
    }
}
