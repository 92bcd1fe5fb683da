//! The contiguous mapped region backing every resident chunk, and
//! hole-punch on release.

use std::ffi::c_void;
use std::num::NonZeroUsize;
use std::ptr::NonNull;

use nix::sys::mman::{madvise, mmap_anonymous, munmap, MapFlags, MmapAdvise, ProtFlags};

use super::key::{CHUNK_SIZE, PAGE_SIZE};

/// Owns one anonymous `MAP_SHARED` mapping sized `capacity_chunks *
/// CHUNK_SIZE`. A production deployment would instead carve this out of a
/// single shared-memory arena alongside the control block and index; this
/// crate mmaps its own region so the cache can be constructed and torn down
/// independently of a particular shared-memory segment.
pub struct ChunkSlab {
    base: NonNull<c_void>,
    len: usize,
    capacity_chunks: u32,
}

// The mapping is only ever touched through `read_page`/`write_page`, which
// require the caller to already hold a pin on the chunk (spec §4.D, §5);
// `LocalFileCache` upholds that discipline.
unsafe impl Send for ChunkSlab {}
unsafe impl Sync for ChunkSlab {}

impl ChunkSlab {
    pub fn new(capacity_chunks: u32) -> nix::Result<Self> {
        let len = capacity_chunks as usize * CHUNK_SIZE;
        // mmap_anonymous requires a nonzero length even for an empty cache;
        // round up so `max_file_cache_size = 0` still constructs cleanly.
        let map_len = NonZeroUsize::new(len.max(PAGE_SIZE)).unwrap();
        let base = unsafe {
            mmap_anonymous(
                None,
                map_len,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
            )?
        };
        let slab = ChunkSlab {
            base,
            len,
            capacity_chunks,
        };
        // Hole-punch the whole region up front to guarantee zero initial
        // commit (spec §4.A "on first bring-up").
        for offset in 0..capacity_chunks {
            let _ = slab.punch_hole(offset);
        }
        Ok(slab)
    }

    pub fn capacity_chunks(&self) -> u32 {
        self.capacity_chunks
    }

    fn chunk_ptr(&self, offset: u32) -> *mut u8 {
        debug_assert!((offset as usize) < self.capacity_chunks as usize || self.len == 0);
        unsafe { (self.base.as_ptr() as *mut u8).add(offset as usize * CHUNK_SIZE) }
    }

    /// Copies exactly one page out of the slab. Caller must hold a pin on
    /// `offset`'s entry so the chunk cannot be evicted mid-copy.
    pub fn read_page(&self, offset: u32, page_in_chunk: u32, dst: &mut [u8; PAGE_SIZE]) {
        let src = unsafe { self.chunk_ptr(offset).add(page_in_chunk as usize * PAGE_SIZE) };
        unsafe {
            std::ptr::copy_nonoverlapping(src, dst.as_mut_ptr(), PAGE_SIZE);
        }
    }

    /// Copies exactly one page into the slab. Caller must hold a pin.
    pub fn write_page(&self, offset: u32, page_in_chunk: u32, src: &[u8; PAGE_SIZE]) {
        let dst = unsafe { self.chunk_ptr(offset).add(page_in_chunk as usize * PAGE_SIZE) };
        unsafe {
            std::ptr::copy_nonoverlapping(src.as_ptr(), dst, PAGE_SIZE);
        }
    }

    /// Drops physical backing for one chunk's range. Best-effort: absence
    /// of `MADV_REMOVE` support is not an error (spec §4.A, §9 hole-punch
    /// fallback), only a quality-of-accounting concern.
    pub fn punch_hole(&self, offset: u32) -> nix::Result<()> {
        if self.len == 0 {
            return Ok(());
        }
        let ptr = NonNull::new(self.chunk_ptr(offset) as *mut c_void).unwrap();
        let advise = unsafe { madvise(ptr, CHUNK_SIZE, MmapAdvise::MADV_REMOVE) };
        match advise {
            Ok(()) => Ok(()),
            Err(_) => {
                // MADV_REMOVE is not supported on every backing (e.g. a
                // plain anonymous mapping on some kernels); fall back to
                // MADV_FREE, matching the original's `#ifndef MADV_REMOVE`
                // shim. Both are advisory.
                tracing::debug!(offset, "MADV_REMOVE unavailable, falling back to MADV_FREE");
                unsafe { madvise(ptr, CHUNK_SIZE, MmapAdvise::MADV_FREE) }
            }
        }
    }
}

impl Drop for ChunkSlab {
    fn drop(&mut self) {
        if self.len == 0 {
            return;
        }
        let map_len = self.len.max(PAGE_SIZE);
        unsafe {
            let _ = munmap(self.base, map_len);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let slab = ChunkSlab::new(4).unwrap();
        let mut src = [0u8; PAGE_SIZE];
        src[0] = 0xAB;
        src[PAGE_SIZE - 1] = 0xCD;
        slab.write_page(2, 5, &src);

        let mut dst = [0u8; PAGE_SIZE];
        slab.read_page(2, 5, &mut dst);
        assert_eq!(src, dst);
    }

    #[test]
    fn empty_slab_constructs() {
        let slab = ChunkSlab::new(0).unwrap();
        assert_eq!(slab.capacity_chunks(), 0);
    }

    #[test]
    fn punch_hole_does_not_error_on_fresh_chunk() {
        let slab = ChunkSlab::new(1).unwrap();
        slab.punch_hole(0).unwrap();
    }
}
