//! Local File Cache: a bounded, mmap-resident, chunked block cache with
//! LRU replacement, dynamic resize, hole-punching, and a memory-pressure
//! monitor.
//!
//! Module layout mirrors the component table: [`key`] (data model), [`slab`]
//! (A), [`index`] (B), [`lru`] (C), [`entry`] (CacheEntry, shared by B/C),
//! [`core`] (D), [`pressure`] (E).

pub mod core;
pub mod entry;
pub mod index;
pub mod key;
pub mod lru;
pub mod pressure;
pub mod slab;

pub use core::{CacheStats, LocalFileCache};
pub use key::{BlockKey, CacheEntryInfo, ForkNumber, BLOCKS_PER_CHUNK, CHUNK_SIZE, PAGE_SIZE};

use std::sync::Arc;

use once_cell::sync::OnceCell;

/// Process-wide singleton, initialized once during startup. Tests
/// construct their own [`LocalFileCache`] directly instead of going
/// through this global, for isolation (per the design notes).
static LOCAL_FILE_CACHE: OnceCell<Arc<LocalFileCache>> = OnceCell::new();

/// Initializes the process-wide cache singleton. Returns an error if
/// called twice.
pub fn init_global(capacity_mb: u64, size_limit_mb: u64) -> anyhow::Result<Arc<LocalFileCache>> {
    let cache = Arc::new(LocalFileCache::new(capacity_mb, size_limit_mb)?);
    LOCAL_FILE_CACHE
        .set(cache.clone())
        .map_err(|_| anyhow::anyhow!("local file cache already initialized"))?;
    Ok(cache)
}

/// Returns the process-wide cache singleton, if initialized.
pub fn global() -> Option<Arc<LocalFileCache>> {
    LOCAL_FILE_CACHE.get().cloned()
}
