//! Compact-size and little-endian integer codec
//!
//! Every binary format in this crate (transactions, PSBT maps, sighash
//! preimages) is built on these primitives, so they are kept free of any
//! state or I/O.

use bitcoin_hashes::{sha256d, Hash as BitcoinHash};

use crate::error::{EngineError, Result};
use crate::types::Hash;

/// Encode a u64 as a Bitcoin compact-size integer.
///
/// 1 byte for values below 0xFD, otherwise a 0xFD/0xFE/0xFF marker followed
/// by the value as u16/u32/u64 little-endian.
pub fn encode_varint(n: u64) -> Vec<u8> {
    if n < 0xfd {
        vec![n as u8]
    } else if n <= 0xffff {
        let mut v = vec![0xfd];
        v.extend((n as u16).to_le_bytes());
        v
    } else if n <= 0xffff_ffff {
        let mut v = vec![0xfe];
        v.extend((n as u32).to_le_bytes());
        v
    } else {
        let mut v = vec![0xff];
        v.extend(n.to_le_bytes());
        v
    }
}

/// Decode a compact-size integer at `offset`.
///
/// Returns the value and the number of bytes consumed.
pub fn decode_varint(data: &[u8], offset: usize) -> Result<(u64, usize)> {
    let first = *data
        .get(offset)
        .ok_or_else(|| EngineError::MalformedEncoding("varint past end of input".to_string()))?;

    match first {
        0xfd => {
            let (value, _) = read_u16_le(data, offset + 1)?;
            Ok((u64::from(value), 3))
        }
        0xfe => {
            let (value, _) = read_u32_le(data, offset + 1)?;
            Ok((u64::from(value), 5))
        }
        0xff => {
            let (value, _) = read_u64_le(data, offset + 1)?;
            Ok((value, 9))
        }
        b => Ok((u64::from(b), 1)),
    }
}

/// Read a little-endian u16 at `offset`, returning (value, bytes consumed).
pub fn read_u16_le(data: &[u8], offset: usize) -> Result<(u16, usize)> {
    let bytes = take(data, offset, 2)?;
    Ok((u16::from_le_bytes([bytes[0], bytes[1]]), 2))
}

/// Read a little-endian u32 at `offset`, returning (value, bytes consumed).
pub fn read_u32_le(data: &[u8], offset: usize) -> Result<(u32, usize)> {
    let bytes = take(data, offset, 4)?;
    Ok((
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        4,
    ))
}

/// Read a little-endian u64 at `offset`, returning (value, bytes consumed).
pub fn read_u64_le(data: &[u8], offset: usize) -> Result<(u64, usize)> {
    let bytes = take(data, offset, 8)?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    Ok((u64::from_le_bytes(buf), 8))
}

/// Borrow `len` bytes at `offset`, failing on truncated input.
pub fn take(data: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    let end = offset
        .checked_add(len)
        .ok_or_else(|| EngineError::MalformedEncoding("length overflow".to_string()))?;
    if end > data.len() {
        return Err(EngineError::MalformedEncoding(format!(
            "expected {} bytes at offset {}, only {} available",
            len,
            offset,
            data.len().saturating_sub(offset)
        )));
    }
    Ok(&data[offset..end])
}

/// Double SHA-256
pub fn double_sha256(data: &[u8]) -> Hash {
    let digest = sha256d::Hash::hash(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_round_trip() {
        for n in [0u64, 1, 252, 253, 65535, 65536, u64::from(u32::MAX), 1 << 32] {
            let encoded = encode_varint(n);
            let (decoded, consumed) = decode_varint(&encoded, 0).unwrap();
            assert_eq!(decoded, n);
            assert_eq!(consumed, encoded.len());
        }
    }

    #[test]
    fn test_varint_boundary_widths() {
        assert_eq!(encode_varint(0), vec![0x00]);
        assert_eq!(encode_varint(252), vec![0xfc]);
        assert_eq!(encode_varint(253), vec![0xfd, 0xfd, 0x00]);
        assert_eq!(encode_varint(65535), vec![0xfd, 0xff, 0xff]);
        assert_eq!(encode_varint(65536), vec![0xfe, 0x00, 0x00, 0x01, 0x00]);
        assert_eq!(
            encode_varint(u64::from(u32::MAX)),
            vec![0xfe, 0xff, 0xff, 0xff, 0xff]
        );
        assert_eq!(
            encode_varint(1 << 32),
            vec![0xff, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_varint_with_offset() {
        let mut data = vec![0xaa, 0xbb];
        data.extend(encode_varint(65535));
        let (value, consumed) = decode_varint(&data, 2).unwrap();
        assert_eq!(value, 65535);
        assert_eq!(consumed, 3);
    }

    #[test]
    fn test_varint_truncated() {
        assert!(matches!(
            decode_varint(&[], 0),
            Err(EngineError::MalformedEncoding(_))
        ));
        assert!(matches!(
            decode_varint(&[0xfd, 0x01], 0),
            Err(EngineError::MalformedEncoding(_))
        ));
        assert!(matches!(
            decode_varint(&[0xfe, 0x01, 0x02, 0x03], 0),
            Err(EngineError::MalformedEncoding(_))
        ));
        assert!(matches!(
            decode_varint(&[0xff, 0, 0, 0, 0, 0, 0, 0], 0),
            Err(EngineError::MalformedEncoding(_))
        ));
    }

    #[test]
    fn test_fixed_width_round_trip() {
        let mut data = Vec::new();
        data.extend(0xbeefu16.to_le_bytes());
        data.extend(0xdead_beefu32.to_le_bytes());
        data.extend(0x0123_4567_89ab_cdefu64.to_le_bytes());

        let (v16, c16) = read_u16_le(&data, 0).unwrap();
        assert_eq!((v16, c16), (0xbeef, 2));
        let (v32, c32) = read_u32_le(&data, 2).unwrap();
        assert_eq!((v32, c32), (0xdead_beef, 4));
        let (v64, c64) = read_u64_le(&data, 6).unwrap();
        assert_eq!((v64, c64), (0x0123_4567_89ab_cdef, 8));
    }

    #[test]
    fn test_fixed_width_truncated() {
        assert!(read_u32_le(&[0x01, 0x02], 0).is_err());
        assert!(read_u64_le(&[0x01, 0x02, 0x03, 0x04], 1).is_err());
    }

    #[test]
    fn test_double_sha256_known_vector() {
        // sha256d("") is a standard test vector
        let digest = double_sha256(b"");
        assert_eq!(
            hex::encode(digest),
            "5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c9456"
        );
    }
}
