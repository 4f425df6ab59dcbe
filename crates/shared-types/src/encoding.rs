//! Variable-length integer encoding.
//!
//! The compact form used throughout the P2P wire format and the canonical
//! proof record serialization: one byte below 0xfd, then 0xfd/0xfe/0xff
//! prefixed little-endian 16/32/64-bit forms. Encoding is canonical: a
//! value must use the shortest form that holds it, and decoders reject
//! non-minimal encodings.

use thiserror::Error;

/// Varint decode failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VarintError {
    /// Input ended before the encoded value did.
    #[error("varint truncated: need {need} bytes, have {have}")]
    Truncated {
        /// Bytes the prefix promised.
        need: usize,
        /// Bytes actually available.
        have: usize,
    },

    /// A value was encoded in a longer form than required.
    #[error("non-minimal varint encoding for value {0}")]
    NonMinimal(u64),
}

/// Append the canonical varint encoding of `value` to `out`.
pub fn write_varint(out: &mut Vec<u8>, value: u64) {
    match value {
        0..=0xfc => out.push(value as u8),
        0xfd..=0xffff => {
            out.push(0xfd);
            out.extend_from_slice(&(value as u16).to_le_bytes());
        }
        0x10000..=0xffff_ffff => {
            out.push(0xfe);
            out.extend_from_slice(&(value as u32).to_le_bytes());
        }
        _ => {
            out.push(0xff);
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
}

/// Decode a varint from the front of `buf`, returning the value and the
/// number of bytes consumed.
pub fn read_varint(buf: &[u8]) -> Result<(u64, usize), VarintError> {
    let first = *buf.first().ok_or(VarintError::Truncated { need: 1, have: 0 })?;
    match first {
        0x00..=0xfc => Ok((first as u64, 1)),
        0xfd => {
            let bytes = take(buf, 1, 2)?;
            let v = u16::from_le_bytes([bytes[0], bytes[1]]) as u64;
            if v < 0xfd {
                return Err(VarintError::NonMinimal(v));
            }
            Ok((v, 3))
        }
        0xfe => {
            let bytes = take(buf, 1, 4)?;
            let v = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as u64;
            if v <= 0xffff {
                return Err(VarintError::NonMinimal(v));
            }
            Ok((v, 5))
        }
        0xff => {
            let bytes = take(buf, 1, 8)?;
            let mut raw = [0u8; 8];
            raw.copy_from_slice(bytes);
            let v = u64::from_le_bytes(raw);
            if v <= 0xffff_ffff {
                return Err(VarintError::NonMinimal(v));
            }
            Ok((v, 9))
        }
    }
}

fn take(buf: &[u8], offset: usize, len: usize) -> Result<&[u8], VarintError> {
    buf.get(offset..offset + len).ok_or(VarintError::Truncated {
        need: offset + len,
        have: buf.len(),
    })
}
