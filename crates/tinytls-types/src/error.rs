/// Errors raised by the cryptographic capability implementations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    // General errors
    #[error("null or empty input")]
    NullInput,
    #[error("invalid argument")]
    InvalidArg,
    #[error("operation not supported")]
    NotSupported,

    // Buffer errors
    #[error("buffer length not enough: need {need}, got {got}")]
    BufferTooSmall { need: usize, got: usize },
    #[error("input is not a multiple of the block size {block_size}")]
    NotBlockAligned { block_size: usize },

    // Symmetric cipher errors
    #[error("invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },
    #[error("cipher context was initialized for the other direction")]
    WrongDirection,

    // Key exchange errors
    #[error("key exchange: invalid peer public value")]
    InvalidPublicKey,
    #[error("key exchange: shared secret computation failed")]
    KeyAgreementFail,

    // Random source errors
    #[error("random source: failed to obtain entropy")]
    EntropyFail,

    // Compression errors
    #[error("compression: input could not be processed")]
    CompressionFail,
}

/// Errors raised while assembling registries and configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("cipher suite id {0:#04x} is already registered")]
    DuplicateCipherSuiteId(u8),
    #[error("cipher suite name {0:?} is already registered")]
    DuplicateCipherSuiteName(String),
    #[error("unknown cipher suite id {0:#04x}")]
    UnknownCipherSuite(u8),
    #[error("unknown compression method {0}")]
    UnknownCompression(u8),
    #[error("no cipher suites enabled")]
    NoCipherSuites,
    #[error("algorithm {0:?} is not available")]
    MissingAlgorithm(String),
}
