//! Record compression methods.

use tinytls_types::{CompressionId, CryptoError};

use crate::provider::Compression;

/// The null compression method: data passes through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCompression;

impl Compression for NullCompression {
    fn id(&self) -> CompressionId {
        CompressionId::Null
    }

    fn name(&self) -> &'static str {
        "NULL"
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Ok(data.to_vec())
    }
}

/// Upper bound on one decompressed fragment: 2^14 plus the 1024 byte
/// expansion a compressed record may carry.
#[cfg(feature = "deflate")]
pub const MAX_DECOMPRESSED_LEN: usize = 16384 + 1024;

/// zlib-format DEFLATE. Each record is compressed on its own; no
/// dictionary carries over between records.
#[cfg(feature = "deflate")]
#[derive(Debug, Clone, Copy, Default)]
pub struct DeflateCompression;

#[cfg(feature = "deflate")]
impl Compression for DeflateCompression {
    fn id(&self) -> CompressionId {
        CompressionId::Deflate
    }

    fn name(&self) -> &'static str {
        "DEFLATE"
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        use std::io::Write;

        let mut encoder = flate2::write::ZlibEncoder::new(
            Vec::with_capacity(data.len() / 2 + 16),
            flate2::Compression::default(),
        );
        encoder.write_all(data).map_err(|_| CryptoError::CompressionFail)?;
        encoder.finish().map_err(|_| CryptoError::CompressionFail)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        use std::io::Read;

        let mut out = Vec::new();
        flate2::read::ZlibDecoder::new(data)
            .take(MAX_DECOMPRESSED_LEN as u64 + 1)
            .read_to_end(&mut out)
            .map_err(|_| CryptoError::CompressionFail)?;
        if out.len() > MAX_DECOMPRESSED_LEN {
            return Err(CryptoError::CompressionFail);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_compression_is_identity() {
        let data = b"compress me, or don't";
        assert_eq!(NullCompression.compress(data).unwrap(), data);
        assert_eq!(NullCompression.decompress(data).unwrap(), data);
        assert_eq!(NullCompression.id() as u8, 0);
    }

    #[cfg(feature = "deflate")]
    #[test]
    fn test_deflate_shrinks_repetitive_data() {
        let data = b"tinytls ".repeat(512);
        let compressed = DeflateCompression.compress(&data).unwrap();
        assert!(compressed.len() < data.len() / 4);
        assert_eq!(DeflateCompression.decompress(&compressed).unwrap(), data);
        assert_eq!(DeflateCompression.id() as u8, 1);
    }

    #[cfg(feature = "deflate")]
    #[test]
    fn test_deflate_is_deterministic() {
        let data: Vec<u8> = (0..4096u32).map(|i| (i * 7 % 251) as u8).collect();
        assert_eq!(
            DeflateCompression.compress(&data).unwrap(),
            DeflateCompression.compress(&data).unwrap()
        );
    }

    #[cfg(feature = "deflate")]
    #[test]
    fn test_deflate_rejects_corrupt_input() {
        assert_eq!(
            DeflateCompression.decompress(&[0xFF; 12]),
            Err(CryptoError::CompressionFail)
        );
    }

    #[cfg(feature = "deflate")]
    #[test]
    fn test_deflate_rejects_oversized_output() {
        let bomb = DeflateCompression.compress(&vec![0u8; MAX_DECOMPRESSED_LEN + 1]).unwrap();
        assert_eq!(DeflateCompression.decompress(&bomb), Err(CryptoError::CompressionFail));
        let fits = DeflateCompression.compress(&vec![0u8; MAX_DECOMPRESSED_LEN]).unwrap();
        assert_eq!(DeflateCompression.decompress(&fits).unwrap().len(), MAX_DECOMPRESSED_LEN);
    }
}
