//! Intrusive doubly-linked LRU list threading entries with
//! `access_count == 0`. Head = least recently used = next eviction victim.
//!
//! The links live inside each [`CacheEntry`](super::entry::CacheEntry)
//! (`lru_prev`/`lru_next`); this type only tracks the head/tail pointers
//! and the O(1) splice operations, mirroring the "arena + intrusive hooks"
//! shape the design notes call for rather than shared ownership.

use super::entry::CacheEntry;

#[derive(Debug, Default)]
pub struct Lru {
    head: Option<u32>,
    tail: Option<u32>,
}

impl Lru {
    pub fn new() -> Self {
        Lru { head: None, tail: None }
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn head(&self) -> Option<u32> {
        self.head
    }

    /// Inserts `offset` at the tail (most recently used position).
    pub fn push_tail(&mut self, entries: &mut [Option<CacheEntry>], offset: u32) {
        let old_tail = self.tail;
        {
            let e = entries[offset as usize].as_mut().expect("entry must exist");
            e.lru_prev = old_tail;
            e.lru_next = None;
        }
        match old_tail {
            Some(t) => entries[t as usize].as_mut().unwrap().lru_next = Some(offset),
            None => self.head = Some(offset),
        }
        self.tail = Some(offset);
    }

    /// Inserts `offset` at the head (to be reclaimed first), used when a
    /// chunk's bitmap goes fully empty (spec §4.D `evict`).
    pub fn push_head(&mut self, entries: &mut [Option<CacheEntry>], offset: u32) {
        let old_head = self.head;
        {
            let e = entries[offset as usize].as_mut().expect("entry must exist");
            e.lru_prev = None;
            e.lru_next = old_head;
        }
        match old_head {
            Some(h) => entries[h as usize].as_mut().unwrap().lru_prev = Some(offset),
            None => self.tail = Some(offset),
        }
        self.head = Some(offset);
    }

    /// Removes `offset` from wherever it sits in the list.
    pub fn detach(&mut self, entries: &mut [Option<CacheEntry>], offset: u32) {
        let (prev, next) = {
            let e = entries[offset as usize].as_mut().expect("entry must exist");
            let p = e.lru_prev.take();
            let n = e.lru_next.take();
            (p, n)
        };
        match prev {
            Some(p) => entries[p as usize].as_mut().unwrap().lru_next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => entries[n as usize].as_mut().unwrap().lru_prev = prev,
            None => self.tail = prev,
        }
    }

    /// Pops the head (least recently used) entry's offset, detaching it.
    pub fn pop_head(&mut self, entries: &mut [Option<CacheEntry>]) -> Option<u32> {
        let head = self.head?;
        self.detach(entries, head);
        Some(head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::key::{BlockKey, ForkNumber};

    fn entry(offset: u32) -> Option<CacheEntry> {
        Some(CacheEntry::new(
            BlockKey {
                spc_node: 0,
                db_node: 0,
                rel_node: 0,
                fork: ForkNumber::Main,
                chunk_no: offset,
            },
            offset,
        ))
    }

    #[test]
    fn push_tail_order_is_fifo_for_pop_head() {
        let mut entries = vec![entry(0), entry(1), entry(2)];
        let mut lru = Lru::new();
        lru.push_tail(&mut entries, 0);
        lru.push_tail(&mut entries, 1);
        lru.push_tail(&mut entries, 2);

        assert_eq!(lru.pop_head(&mut entries), Some(0));
        assert_eq!(lru.pop_head(&mut entries), Some(1));
        assert_eq!(lru.pop_head(&mut entries), Some(2));
        assert_eq!(lru.pop_head(&mut entries), None);
    }

    #[test]
    fn push_head_jumps_the_queue() {
        let mut entries = vec![entry(0), entry(1)];
        let mut lru = Lru::new();
        lru.push_tail(&mut entries, 0);
        lru.push_head(&mut entries, 1);
        assert_eq!(lru.pop_head(&mut entries), Some(1));
        assert_eq!(lru.pop_head(&mut entries), Some(0));
    }

    #[test]
    fn detach_from_middle_relinks_neighbors() {
        let mut entries = vec![entry(0), entry(1), entry(2)];
        let mut lru = Lru::new();
        lru.push_tail(&mut entries, 0);
        lru.push_tail(&mut entries, 1);
        lru.push_tail(&mut entries, 2);
        lru.detach(&mut entries, 1);
        assert_eq!(lru.pop_head(&mut entries), Some(0));
        assert_eq!(lru.pop_head(&mut entries), Some(2));
    }
}
