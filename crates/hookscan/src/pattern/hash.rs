//! Stable 64-bit hashing for pattern text
//!
//! Hint caches key on the hash of the pattern source text and may be
//! persisted between runs, so the hash must not vary per process the way
//! keyed hashers do. FNV-1a is the fixed function used for this key.

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a 64-bit hash of a byte string.
pub fn fnv1a_64(data: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in data {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}
