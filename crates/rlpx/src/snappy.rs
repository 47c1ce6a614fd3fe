//! The snappy guard applied to every post-hello frame before decompression.

use crate::{errors::SnappyError, params::MAX_UNCOMPRESSED_SIZE};

/// The maximum length of the leading uncompressed-size varint.
const MAX_VARINT_LEN: usize = 5;

/// Validates a snappy payload before any decompression buffer is allocated.
#[derive(Debug, Clone, Copy)]
pub struct SnappyGuard;

impl SnappyGuard {
    /// Parses the leading uncompressed-length varint and checks both lengths
    /// against the 16 MiB cap. Returns the uncompressed length on success.
    pub fn check(compressed: &[u8]) -> Result<usize, SnappyError> {
        if compressed.len() > MAX_UNCOMPRESSED_SIZE {
            return Err(SnappyError::CompressedLengthTooLarge);
        }

        let uncompressed_len = Self::decode_length_varint(compressed)?;
        if uncompressed_len > MAX_UNCOMPRESSED_SIZE {
            return Err(SnappyError::UncompressedLengthTooLarge);
        }
        Ok(uncompressed_len)
    }

    /// Decodes the little-endian base-128 length varint, at most
    /// [MAX_VARINT_LEN] bytes.
    fn decode_length_varint(compressed: &[u8]) -> Result<usize, SnappyError> {
        let mut value = 0usize;
        for (index, byte) in compressed.iter().enumerate() {
            if index == MAX_VARINT_LEN {
                return Err(SnappyError::LengthVarintTooLong);
            }
            value |= ((byte & 0x7F) as usize) << (7 * index);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        // Empty input, or every byte carried a continuation bit.
        Err(SnappyError::MissingLengthHeader)
    }
}

/// Compresses a message with the snappy raw codec.
pub fn snappy_compress(data: &[u8]) -> Result<Vec<u8>, SnappyError> {
    snap::raw::Encoder::new().compress_vec(data).map_err(|_| SnappyError::Decompress)
}

/// Decompresses a snappy payload, running [SnappyGuard] first.
pub fn snappy_decompress(compressed: &[u8]) -> Result<Vec<u8>, SnappyError> {
    SnappyGuard::check(compressed)?;
    snap::raw::Decoder::new().decompress_vec(compressed).map_err(|_| SnappyError::Decompress)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let message = b"hello frame payload, repeated enough to compress well well well well";
        let compressed = snappy_compress(message).unwrap();
        let decompressed = snappy_decompress(&compressed).unwrap();
        assert_eq!(decompressed, message);
    }

    #[test]
    fn test_guard_reports_uncompressed_length() {
        let message = vec![0xAB; 1000];
        let compressed = snappy_compress(&message).unwrap();
        assert_eq!(SnappyGuard::check(&compressed).unwrap(), 1000);
    }

    #[test]
    fn test_guard_missing_header() {
        assert_eq!(SnappyGuard::check(&[]), Err(SnappyError::MissingLengthHeader));
        // Continuation bits with no terminator.
        assert_eq!(SnappyGuard::check(&[0x80, 0x80]), Err(SnappyError::MissingLengthHeader));
    }

    #[test]
    fn test_guard_overlong_varint() {
        // Six continuation bytes exceed the five-byte limit.
        assert_eq!(
            SnappyGuard::check(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x01]),
            Err(SnappyError::LengthVarintTooLong)
        );
    }

    #[test]
    fn test_guard_uncompressed_cap() {
        // Varint advertising 16 MiB + 1.
        let advertised = (MAX_UNCOMPRESSED_SIZE + 1) as u64;
        let mut varint = Vec::new();
        let mut value = advertised;
        loop {
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                varint.push(byte);
                break;
            }
            varint.push(byte | 0x80);
        }
        assert_eq!(
            SnappyGuard::check(&varint),
            Err(SnappyError::UncompressedLengthTooLarge)
        );

        // Exactly at the cap passes the guard.
        let mut varint = Vec::new();
        let mut value = MAX_UNCOMPRESSED_SIZE as u64;
        loop {
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                varint.push(byte);
                break;
            }
            varint.push(byte | 0x80);
        }
        assert_eq!(SnappyGuard::check(&varint).unwrap(), MAX_UNCOMPRESSED_SIZE);
    }

    #[test]
    fn test_guard_compressed_cap() {
        // The guard rejects oversized ciphertext before looking at the varint.
        let oversized = vec![0u8; MAX_UNCOMPRESSED_SIZE + 1];
        assert_eq!(
            SnappyGuard::check(&oversized),
            Err(SnappyError::CompressedLengthTooLarge)
        );
    }

    #[test]
    fn test_corrupt_payload_fails_after_guard() {
        // A valid varint followed by garbage passes the guard and fails the
        // decoder.
        let mut payload = vec![0x0A];
        payload.extend_from_slice(&[0xFF; 32]);
        assert!(SnappyGuard::check(&payload).is_ok());
        assert_eq!(snappy_decompress(&payload), Err(SnappyError::Decompress));
    }
}
