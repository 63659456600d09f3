//! Byte identities for the algorithm families negotiated by the handshake.

/// Hash algorithm identifiers (TLS HashAlgorithm registry values).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HashAlgId {
    Sha1 = 2,
    Sha256 = 4,
}

/// Bulk block cipher identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CipherAlgId {
    Aes128 = 1,
    Aes256 = 2,
}

/// Key exchange identifiers (low byte of the TLS NamedGroup value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum KeyExchangeId {
    Secp256r1 = 0x17,
    X25519 = 0x1D,
}

/// Compression method identifiers (TLS CompressionMethod registry values).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CompressionId {
    Null = 0,
    Deflate = 1,
}

/// Direction a block cipher context is keyed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherDirection {
    Encrypt,
    Decrypt,
}

impl HashAlgId {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            2 => Some(Self::Sha1),
            4 => Some(Self::Sha256),
            _ => None,
        }
    }
}

impl CipherAlgId {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::Aes128),
            2 => Some(Self::Aes256),
            _ => None,
        }
    }
}

impl KeyExchangeId {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0x17 => Some(Self::Secp256r1),
            0x1D => Some(Self::X25519),
            _ => None,
        }
    }
}

impl CompressionId {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Null),
            1 => Some(Self::Deflate),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithm_id_values() {
        assert_eq!(HashAlgId::Sha1 as u8, 2);
        assert_eq!(HashAlgId::Sha256 as u8, 4);
        assert_eq!(KeyExchangeId::X25519 as u8, 0x1D);
        assert_eq!(CompressionId::Null as u8, 0);
        assert_eq!(CompressionId::Deflate as u8, 1);
    }

    #[test]
    fn test_from_u8() {
        assert_eq!(HashAlgId::from_u8(4), Some(HashAlgId::Sha256));
        assert_eq!(CipherAlgId::from_u8(2), Some(CipherAlgId::Aes256));
        assert_eq!(KeyExchangeId::from_u8(0x17), Some(KeyExchangeId::Secp256r1));
        assert_eq!(CompressionId::from_u8(0), Some(CompressionId::Null));
        assert_eq!(HashAlgId::from_u8(0), None);
        assert_eq!(CipherAlgId::from_u8(9), None);
        assert_eq!(KeyExchangeId::from_u8(0xFF), None);
        assert_eq!(CompressionId::from_u8(1), Some(CompressionId::Deflate));
        assert_eq!(CompressionId::from_u8(2), None);
    }
}
