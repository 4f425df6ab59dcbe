//! Hash aliases shared across subsystems.

/// 32-byte hash.
pub type Hash = [u8; 32];

/// Hash of a block header (the chained proof-of-work hash).
pub type BlockHash = Hash;

/// SHA-256 of a lowercased domain name without its trailing dot, the key
/// into the Handshake name tree.
pub type NameHash = Hash;

/// Abbreviated hex form of a hash for log lines.
pub fn short_hash(hash: &Hash) -> String {
    hex::encode(&hash[..6])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_hash() {
        let mut h = [0u8; 32];
        h[0] = 0xab;
        assert_eq!(short_hash(&h), "ab0000000000");
    }
}
