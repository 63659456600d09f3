#![doc = "Cryptographic capabilities for tinytls: the traits a cipher suite is assembled from and RustCrypto-backed implementations of them."]
#![forbid(unsafe_code)]

// Core traits
pub mod provider;

// Hash algorithms
#[cfg(feature = "sha1")]
pub mod sha1;
#[cfg(feature = "sha2")]
pub mod sha2;

// Symmetric ciphers
#[cfg(feature = "aes")]
pub mod aes;

// MAC algorithms
pub mod hmac;

// Key exchange
#[cfg(feature = "p256")]
pub mod ecdh;
#[cfg(feature = "x25519")]
pub mod x25519;

pub mod compression;
pub mod rand;

mod algorithms;

pub use algorithms::AlgorithmSet;
pub use provider::{
    BlockCipher, CipherAlgorithm, Compression, Digest, HashAlgorithm, KeyExchange,
    KeyExchangeAlgorithm, RandomSource,
};
