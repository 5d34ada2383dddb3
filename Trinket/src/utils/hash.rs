//! Hashing utilities

const FNV1A64_OFFSET: u64 = 0xCBF2_9CE4_8422_2325;
const FNV1A64_PRIME: u64 = 0x0000_0100_0000_01B3;

/// FNV-1a 64-bit hash (used for archive path hashes)
pub fn hash_fnv1a64(s: &str) -> u64 {
    let mut hash = FNV1A64_OFFSET;
    for byte in s.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV1A64_PRIME);
    }
    hash
}

/// Hash an archive path. Paths are normalized and lowercased first so the
/// hash matches regardless of separator style or case.
pub fn hash_path(path: &str) -> u64 {
    hash_fnv1a64(&super::path::normalize_path(path).to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fnv1a64_hash() {
        // Reference values
        assert_eq!(hash_fnv1a64(""), 0xCBF2_9CE4_8422_2325);
        assert_eq!(hash_fnv1a64("a"), 0xAF63_DC4C_8601_EC8C);
    }

    #[test]
    fn test_hash_path_ignores_case_and_separators() {
        assert_eq!(
            hash_path("pokemon\\PM0001\\pm0001.TRMDL"),
            hash_path("pokemon/pm0001/pm0001.trmdl")
        );
    }
}
