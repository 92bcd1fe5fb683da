//! Hashes a block-group key to a shard index.
//!
//! `shard_of(key) = (H1(relation_identity) combine H2(block_number /
//! stripe_size)) mod num_shards`, using MurmurHash3-32 as the stable 32-bit
//! mix and a deterministic hash-combine. No crate in this workspace's
//! dependency tree provides MurmurHash3, so it is implemented inline; the
//! algorithm itself is public domain (Austin Appleby).

use crate::cache::{BlockKey, ForkNumber};

/// `a combine (b + 0x9e3779b9 + (a<<6) + (a>>2))`, the golden-ratio based
/// mix used to fold two independent hashes into one.
pub fn hash_combine(a: u32, b: u32) -> u32 {
    a ^ (b
        .wrapping_add(0x9e3779b9)
        .wrapping_add(a << 6)
        .wrapping_add(a >> 2))
}

/// MurmurHash3 x86_32, seeded at 0, matching the canonical stable 32-bit
/// mix the shard router calls for.
pub fn murmur3_32(data: &[u8], seed: u32) -> u32 {
    const C1: u32 = 0xcc9e2d51;
    const C2: u32 = 0x1b873593;

    let mut h1 = seed;
    let chunks = data.chunks_exact(4);
    let tail = chunks.remainder();

    for chunk in chunks {
        let mut k1 = u32::from_le_bytes(chunk.try_into().unwrap());
        k1 = k1.wrapping_mul(C1);
        k1 = k1.rotate_left(15);
        k1 = k1.wrapping_mul(C2);

        h1 ^= k1;
        h1 = h1.rotate_left(13);
        h1 = h1.wrapping_mul(5).wrapping_add(0xe6546b64);
    }

    let mut k1 = 0u32;
    for (i, byte) in tail.iter().enumerate().rev() {
        k1 ^= (*byte as u32) << (8 * i);
    }
    if !tail.is_empty() {
        k1 = k1.wrapping_mul(C1);
        k1 = k1.rotate_left(15);
        k1 = k1.wrapping_mul(C2);
        h1 ^= k1;
    }

    h1 ^= data.len() as u32;
    h1 ^= h1 >> 16;
    h1 = h1.wrapping_mul(0x85ebca6b);
    h1 ^= h1 >> 13;
    h1 = h1.wrapping_mul(0xc2b2ae35);
    h1 ^= h1 >> 16;
    h1
}

/// Routes a block number to a shard index. `num_shards` must be nonzero
/// (callers hold it read from a just-observed [`crate::shard::map::ShardMap`]
/// snapshot with `num_shards > 0`).
///
/// H1 hashes `rel_node` alone, not the full relation identity: `spc_node`,
/// `db_node` and `fork` are accepted (every caller has a full [`BlockKey`]
/// on hand) but deliberately excluded from the mix, matching
/// `get_shard_number`'s `murmurhash32(tag->relNumber)` — every fork of a
/// relation, across tablespaces, must land on the same shard.
pub fn shard_of(
    _spc_node: u32,
    _db_node: u32,
    rel_node: u32,
    _fork: ForkNumber,
    block_number: u32,
    stripe_size: u32,
    num_shards: u32,
) -> u32 {
    debug_assert!(num_shards > 0);
    let h1 = murmur3_32(&rel_node.to_le_bytes(), 0);
    let stripe_no = block_number / stripe_size.max(1);
    let h2 = murmur3_32(&stripe_no.to_le_bytes(), 0);
    hash_combine(h1, h2) % num_shards
}

/// Convenience overload taking a chunk-aligned [`BlockKey`] plus the
/// in-chunk page offset, recovering the true block number before routing
/// (the chunk alignment used by the local cache is unrelated to the
/// shard-router stripe alignment).
pub fn shard_of_key(key: &BlockKey, page_in_chunk: u32, stripe_size: u32, num_shards: u32) -> u32 {
    shard_of(
        key.spc_node,
        key.db_node,
        key.rel_node,
        key.fork,
        key.chunk_no + page_in_chunk,
        stripe_size,
        num_shards,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn murmur3_is_deterministic() {
        assert_eq!(murmur3_32(b"hello", 0), murmur3_32(b"hello", 0));
        assert_ne!(murmur3_32(b"hello", 0), murmur3_32(b"world", 0));
    }

    #[test]
    fn shard_of_is_stable_across_calls() {
        // B3: shard_of is stable across runs for fixed inputs.
        let a = shard_of(1, 1, 100, ForkNumber::Main, 4096, 32768, 8);
        let b = shard_of(1, 1, 100, ForkNumber::Main, 4096, 32768, 8);
        assert_eq!(a, b);
        assert!(a < 8);
    }

    #[test]
    fn shard_of_varies_with_relation() {
        let a = shard_of(1, 1, 100, ForkNumber::Main, 0, 32768, 16);
        let b = shard_of(1, 1, 200, ForkNumber::Main, 0, 32768, 16);
        assert_ne!(a, b);
    }

    #[test]
    fn shard_of_colocates_all_forks_and_tablespaces_of_a_relation() {
        // get_shard_number hashes only relNode: every fork, in every
        // tablespace/database, of the same relation must land on one shard.
        let base = shard_of(1, 1, 100, ForkNumber::Main, 4096, 32768, 16);
        assert_eq!(shard_of(9, 1, 100, ForkNumber::Main, 4096, 32768, 16), base);
        assert_eq!(shard_of(1, 9, 100, ForkNumber::Main, 4096, 32768, 16), base);
        assert_eq!(shard_of(1, 1, 100, ForkNumber::VisibilityMap, 4096, 32768, 16), base);
    }

    #[test]
    fn hash_combine_is_not_commutative() {
        assert_ne!(hash_combine(1, 2), hash_combine(2, 1));
    }
}
