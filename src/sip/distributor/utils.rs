/// Add `bytes` to a DJB2 hash.
///
/// Dan Bernstein's string hash, the multiply-and-xor variant, on 32-bit
/// wrapping arithmetic.
pub(super) fn hash_add(bytes: &[u8], mut hash: i32) -> i32 {
    for &byte in bytes {
        hash = hash.wrapping_mul(33) ^ i32::from(byte);
    }
    hash
}

/// DJB2 hash of a single byte string.
pub(super) fn hash(bytes: &[u8]) -> i32 {
    hash_add(bytes, 5381)
}

/// Fallback-pool bucket for a (Call-ID, remote tag) pair.
pub(super) fn pool_bucket(call_id: &str, remote_tag: &str, pool_size: usize) -> usize {
    let combined = hash_add(remote_tag.as_bytes(), hash(call_id.as_bytes()));
    combined.unsigned_abs() as usize % pool_size
}
