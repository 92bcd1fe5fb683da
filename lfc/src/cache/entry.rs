//! One entry per resident chunk: the tag, its slab slot, pin count, page
//! bitmap, and intrusive LRU hooks.

use super::key::{BlockKey, BITMAP_WORDS, BLOCKS_PER_CHUNK};

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: BlockKey,
    pub offset: u32,
    pub access_count: u32,
    bitmap: [u32; BITMAP_WORDS],
    /// Intrusive LRU hooks, valid only while `access_count == 0`.
    pub lru_prev: Option<u32>,
    pub lru_next: Option<u32>,
}

impl CacheEntry {
    pub fn new(key: BlockKey, offset: u32) -> Self {
        CacheEntry {
            key,
            offset,
            access_count: 1,
            bitmap: [0; BITMAP_WORDS],
            lru_prev: None,
            lru_next: None,
        }
    }

    pub fn is_set(&self, page_in_chunk: u32) -> bool {
        let (word, bit) = Self::word_bit(page_in_chunk);
        self.bitmap[word] & (1 << bit) != 0
    }

    pub fn set(&mut self, page_in_chunk: u32) {
        let (word, bit) = Self::word_bit(page_in_chunk);
        self.bitmap[word] |= 1 << bit;
    }

    /// Clears the page's bit and returns whether the whole bitmap is now
    /// zero, i.e. whether the chunk holds no resident pages at all. Unlike
    /// the original `lfc_evict`, the "no pages remain" result is always a
    /// definite boolean rather than read from an uninitialized variable
    /// when no word happened to zero out on this call (see spec's open
    /// question on `has_remaining_pages`).
    pub fn clear_and_check_empty(&mut self, page_in_chunk: u32) -> bool {
        let (word, bit) = Self::word_bit(page_in_chunk);
        self.bitmap[word] &= !(1 << bit);
        self.bitmap.iter().all(|w| *w == 0)
    }

    pub fn clear_bitmap(&mut self) {
        self.bitmap = [0; BITMAP_WORDS];
    }

    fn word_bit(page_in_chunk: u32) -> (usize, u32) {
        debug_assert!(page_in_chunk < BLOCKS_PER_CHUNK);
        ((page_in_chunk / 32) as usize, page_in_chunk % 32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::key::ForkNumber;

    fn key() -> BlockKey {
        BlockKey {
            spc_node: 1,
            db_node: 1,
            rel_node: 1,
            fork: ForkNumber::Main,
            chunk_no: 0,
        }
    }

    #[test]
    fn set_then_is_set() {
        let mut e = CacheEntry::new(key(), 0);
        assert!(!e.is_set(5));
        e.set(5);
        assert!(e.is_set(5));
        assert!(!e.is_set(6));
    }

    #[test]
    fn clearing_last_bit_reports_empty() {
        let mut e = CacheEntry::new(key(), 0);
        e.set(0);
        e.set(1);
        assert!(!e.clear_and_check_empty(0));
        assert!(e.clear_and_check_empty(1));
    }
}
