//! Block identity and chunk-alignment constants.

/// Pages per chunk. Fixed, power of two, canonically 128 — the unit of
/// slab allocation and LRU eviction.
pub const BLOCKS_PER_CHUNK: u32 = 128;

/// Fixed page size used throughout (8 KiB database pages).
pub const PAGE_SIZE: usize = 8192;

/// Bytes per chunk (`BLOCKS_PER_CHUNK * PAGE_SIZE`).
pub const CHUNK_SIZE: usize = BLOCKS_PER_CHUNK as usize * PAGE_SIZE;

/// `CacheEntry::bitmap` is a bit-set of `BLOCKS_PER_CHUNK` bits, stored as
/// 32-bit words so eviction can test "is the whole bitmap now zero" one
/// word at a time, matching the original's word-at-a-time bitmap scan.
pub const BITMAP_WORDS: usize = (BLOCKS_PER_CHUNK as usize) / 32;

/// Out-of-scope buffer-tag fork identifier, carried only to the extent
/// [`BlockKey`] needs it for hashing/equality and for the enumeration query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForkNumber {
    Main,
    FreeSpaceMap,
    VisibilityMap,
    Init,
}

/// Composite identity of a block group: relation identity, fork, and the
/// chunk-aligned starting block number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockKey {
    pub spc_node: u32,
    pub db_node: u32,
    pub rel_node: u32,
    pub fork: ForkNumber,
    /// Block number of the chunk's first page (`block_number & !(BLOCKS_PER_CHUNK-1)`).
    pub chunk_no: u32,
}

impl BlockKey {
    /// Builds the chunk-aligned key for an arbitrary block number, and
    /// returns the page's index within that chunk.
    pub fn from_block(
        spc_node: u32,
        db_node: u32,
        rel_node: u32,
        fork: ForkNumber,
        block_number: u32,
    ) -> (BlockKey, u32) {
        let chunk_no = block_number & !(BLOCKS_PER_CHUNK - 1);
        let page_in_chunk = block_number - chunk_no;
        (
            BlockKey {
                spc_node,
                db_node,
                rel_node,
                fork,
                chunk_no,
            },
            page_in_chunk,
        )
    }
}

/// One row of the read-only enumeration query: one entry per resident page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntryInfo {
    pub page_offset: u32,
    pub spc_node: u32,
    pub db_node: u32,
    pub rel_node: u32,
    pub fork: ForkNumber,
    pub block_number: u32,
    pub access_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_alignment_masks_low_bits() {
        let (key, page) = BlockKey::from_block(1, 1, 100, ForkNumber::Main, 257);
        assert_eq!(key.chunk_no, 128);
        assert_eq!(page, 1);
    }

    #[test]
    fn chunk_size_is_one_megabyte() {
        assert_eq!(CHUNK_SIZE, 1024 * 1024);
    }
}
