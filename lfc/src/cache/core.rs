//! Cache core: read/write/evict/contains, resizing, and the pin discipline
//! that lets the slab be touched without holding the exclusive lock.
//!
//! A single `std::sync::Mutex` plays the role of spec's exclusive lock
//! `LFC`, guarding the index, the LRU list and the control block (`size`,
//! `used`). The slab bytes are touched only while a pin (`access_count >
//! 0`) is held, and the lock is always released before the page-sized
//! memory copy — see `read`/`write` below, which reacquire the lock
//! afterwards to unpin. Cache operations never hold the lock across I/O
//! and are not cancellable, matching §5's "not suspending, runs under a
//! lock for O(1) time" rule.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use crate::error::LfcError;

use super::entry::CacheEntry;
use super::index::TagIndex;
use super::key::{BlockKey, CacheEntryInfo, CHUNK_SIZE, PAGE_SIZE};
use super::lru::Lru;
use super::slab::ChunkSlab;

struct Inner {
    entries: Vec<Option<CacheEntry>>,
    index: TagIndex,
    lru: Lru,
    used: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub size_chunks: u32,
    pub used_chunks: u32,
    pub size_limit_chunks: u32,
}

/// The bounded, mmap-resident, chunked block cache.
///
/// Constructed once per process as a singleton (see [`crate::cache::global`]);
/// tests construct instance-scoped copies for isolation, per the design
/// notes' requirement that the global-state shape not preclude unit tests.
pub struct LocalFileCache {
    slab: ChunkSlab,
    inner: Mutex<Inner>,
    disabled: AtomicBool,
    size_limit_chunks: AtomicU32,
}

impl LocalFileCache {
    /// `capacity_mb` is `max_file_cache_size`, fixed for the process
    /// lifetime. `size_limit_mb` is the initial `file_cache_size_limit`
    /// soft target. `capacity_mb == 0` permanently disables the cache and
    /// consumes no mapped memory (spec B1).
    pub fn new(capacity_mb: u64, size_limit_mb: u64) -> anyhow::Result<Self> {
        let capacity_chunks = mb_to_chunks(capacity_mb);
        let size_limit_chunks = mb_to_chunks(size_limit_mb).min(capacity_chunks);
        let slab = ChunkSlab::new(capacity_chunks)?;
        Ok(LocalFileCache {
            slab,
            inner: Mutex::new(Inner {
                entries: Vec::with_capacity(capacity_chunks as usize),
                index: TagIndex::with_capacity(capacity_chunks as usize + 1),
                lru: Lru::new(),
                used: 0,
            }),
            disabled: AtomicBool::new(capacity_chunks == 0),
            size_limit_chunks: AtomicU32::new(size_limit_chunks),
        })
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }

    fn disable(&self, reason: &str) {
        tracing::error!(reason, "disabling local file cache after internal error");
        self.disabled.store(true, Ordering::Release);
        self.size_limit_chunks.store(0, Ordering::Release);
    }

    pub fn size_limit_mb(&self) -> u64 {
        chunks_to_mb(self.size_limit_chunks.load(Ordering::Acquire))
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().unwrap();
        CacheStats {
            size_chunks: inner.entries.len() as u32,
            used_chunks: inner.used,
            size_limit_chunks: self.size_limit_chunks.load(Ordering::Acquire),
        }
    }

    /// `contains(key, page_in_chunk)`.
    pub fn contains(&self, key: &BlockKey, page_in_chunk: u32) -> bool {
        if self.is_disabled() {
            return false;
        }
        let inner = self.inner.lock().unwrap();
        match inner.index.find(key) {
            Some(offset) => inner.entries[offset as usize]
                .as_ref()
                .map(|e| e.is_set(page_in_chunk))
                .unwrap_or(false),
            None => false,
        }
    }

    /// `read(key, page_in_chunk, dst)`.
    pub fn read(&self, key: &BlockKey, page_in_chunk: u32, dst: &mut [u8; PAGE_SIZE]) -> bool {
        if self.is_disabled() {
            return false;
        }
        let offset = {
            let mut guard = self.inner.lock().unwrap();
            let inner: &mut Inner = &mut guard;
            let offset = match inner.index.find(key) {
                Some(o) => o,
                None => {
                    crate::metrics::LFC_METRICS.misses_total.inc();
                    return false;
                }
            };
            let entry = inner.entries[offset as usize].as_mut().unwrap();
            if !entry.is_set(page_in_chunk) {
                crate::metrics::LFC_METRICS.misses_total.inc();
                return false;
            }
            if entry.access_count == 0 {
                inner.lru.detach(&mut inner.entries, offset);
            }
            inner.entries[offset as usize].as_mut().unwrap().access_count += 1;
            offset
        };

        self.slab.read_page(offset, page_in_chunk, dst);

        let mut guard = self.inner.lock().unwrap();
        let inner: &mut Inner = &mut guard;
        let entry = inner.entries[offset as usize].as_mut().unwrap();
        entry.access_count -= 1;
        if entry.access_count == 0 {
            inner.lru.push_tail(&mut inner.entries, offset);
        }
        crate::metrics::LFC_METRICS.hits_total.inc();
        true
    }

    /// `write(key, page_in_chunk, src)`.
    pub fn write(&self, key: BlockKey, page_in_chunk: u32, src: &[u8; PAGE_SIZE]) {
        if self.is_disabled() {
            return;
        }
        let offset = {
            let mut guard = self.inner.lock().unwrap();
            match self.admit(&mut guard, key) {
                Some(o) => o,
                None => return,
            }
        };

        self.slab.write_page(offset, page_in_chunk, src);

        let mut guard = self.inner.lock().unwrap();
        let inner: &mut Inner = &mut guard;
        let entry = inner.entries[offset as usize].as_mut().unwrap();
        entry.access_count -= 1;
        let still_pinned = entry.access_count != 0;
        if !still_pinned {
            inner.lru.push_tail(&mut inner.entries, offset);
        }
        if !self.is_disabled() {
            inner.entries[offset as usize].as_mut().unwrap().set(page_in_chunk);
        }
        crate::metrics::LFC_METRICS.writes_total.inc();
    }

    /// Finds or admits the entry for `key`, returning it pinned
    /// (`access_count += 1`) and ready for the caller's unlocked memory
    /// copy. Returns `None` only when admission failed and the cache has
    /// disabled itself.
    fn admit(&self, inner: &mut Inner, key: BlockKey) -> Option<u32> {
        if let Some(offset) = inner.index.find(&key) {
            let was_unpinned = inner.entries[offset as usize].as_ref().unwrap().access_count == 0;
            if was_unpinned {
                inner.lru.detach(&mut inner.entries, offset);
            }
            inner.entries[offset as usize].as_mut().unwrap().access_count += 1;
            return Some(offset);
        }

        let size_limit = self.size_limit_chunks.load(Ordering::Acquire);
        if inner.used >= size_limit && !inner.lru.is_empty() {
            let victim_offset = inner.lru.pop_head(&mut inner.entries).unwrap();
            let victim_key = inner.entries[victim_offset as usize].as_ref().unwrap().key;
            inner.index.remove(&victim_key);
            inner.entries[victim_offset as usize] = Some(CacheEntry::new(key, victim_offset));
            inner.index.insert(key, victim_offset);
            return Some(victim_offset);
        }

        // Soft limit overflow (spec §4.D "overflow policy"): keep growing
        // even past `size_limit_chunks` when there is nothing evictable.
        let offset = inner.entries.len() as u32;
        if offset >= self.slab.capacity_chunks() {
            self.disable("chunk slab exhausted");
            return None;
        }
        inner.entries.push(Some(CacheEntry::new(key, offset)));
        inner.index.insert(key, offset);
        inner.used += 1;
        Some(offset)
    }

    /// `evict(key, page_in_chunk)`.
    pub fn evict(&self, key: &BlockKey, page_in_chunk: u32) {
        if self.is_disabled() {
            return;
        }
        let mut guard = self.inner.lock().unwrap();
        let inner: &mut Inner = &mut guard;
        let offset = match inner.index.find(key) {
            Some(o) => o,
            None => return,
        };
        let now_empty = inner.entries[offset as usize]
            .as_mut()
            .unwrap()
            .clear_and_check_empty(page_in_chunk);
        crate::metrics::LFC_METRICS.evictions_total.inc();
        if now_empty {
            let pinned = inner.entries[offset as usize].as_ref().unwrap().access_count > 0;
            if !pinned {
                inner.lru.detach(&mut inner.entries, offset);
                inner.lru.push_head(&mut inner.entries, offset);
            }
        }
    }

    /// `set_size_limit(new_limit_mb)`: shrink-to-target.
    pub fn set_size_limit_mb(&self, new_limit_mb: u64) {
        let capacity_chunks = self.slab.capacity_chunks();
        let new_limit_chunks = mb_to_chunks(new_limit_mb).min(capacity_chunks);
        self.size_limit_chunks.store(new_limit_chunks, Ordering::Release);

        let mut guard = self.inner.lock().unwrap();
        let inner: &mut Inner = &mut guard;
        while inner.used > new_limit_chunks {
            let Some(offset) = inner.lru.pop_head(&mut inner.entries) else {
                break;
            };
            debug_assert_eq!(inner.entries[offset as usize].as_ref().unwrap().access_count, 0);
            if let Err(source) = self.slab.punch_hole(offset) {
                let err = LfcError::Internal {
                    offset,
                    source: std::io::Error::from(source),
                };
                tracing::warn!(%err, "hole-punch failed during shrink");
                self.disable("hole-punch failed during shrink");
            }
            let key = inner.entries[offset as usize].as_ref().unwrap().key;
            inner.index.remove(&key);
            inner.entries[offset as usize] = None;
            inner.used -= 1;
        }
        crate::metrics::LFC_METRICS
            .size_limit_chunks
            .set(new_limit_chunks as i64);
        crate::metrics::LFC_METRICS.used_chunks.set(inner.used as i64);
        crate::metrics::LFC_METRICS
            .size_chunks
            .set(inner.entries.len() as i64);
    }

    /// Read-only enumeration query: one row per resident page, produced by
    /// a full scan under shared access (spec §6 query surface).
    pub fn enumerate(&self) -> Vec<CacheEntryInfo> {
        let inner = self.inner.lock().unwrap();
        let mut rows = Vec::new();
        for slot in inner.entries.iter().flatten() {
            for page_in_chunk in 0..super::key::BLOCKS_PER_CHUNK {
                if slot.is_set(page_in_chunk) {
                    rows.push(CacheEntryInfo {
                        page_offset: slot.offset,
                        spc_node: slot.key.spc_node,
                        db_node: slot.key.db_node,
                        rel_node: slot.key.rel_node,
                        fork: slot.key.fork,
                        block_number: slot.key.chunk_no + page_in_chunk,
                        access_count: slot.access_count,
                    });
                }
            }
        }
        rows
    }
}

fn mb_to_chunks(mb: u64) -> u32 {
    let bytes = mb.saturating_mul(1024 * 1024);
    (bytes / CHUNK_SIZE as u64) as u32
}

fn chunks_to_mb(chunks: u32) -> u64 {
    (chunks as u64 * CHUNK_SIZE as u64) / (1024 * 1024)
}
