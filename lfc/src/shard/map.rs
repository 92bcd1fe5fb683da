//! Shared seqlock-protected array of per-shard connection strings.
//!
//! Readers never block and the writer never blocks on a reader: two
//! monotonic counters (`begin`, `end`) bracket each update, and a reader
//! retries its copy until it observes `begin == end` unchanged across the
//! whole read. This is the same discipline a supervisor process uses to
//! publish configuration to readers that cannot take the database's
//! lightweight locks — see the design notes' "seqlock on a map" entry.
//!
//! There is exactly one writer (the supervisor); [`ShardMap::set`] is not
//! safe to call concurrently from multiple threads, matching that
//! single-writer contract.

use std::cell::UnsafeCell;
use std::sync::atomic::{fence, AtomicU64, Ordering};

use anyhow::{ensure, Result};

pub const MAX_SHARDS: usize = 128;
pub const MAX_CONNSTRING_LEN: usize = 256;

#[derive(Clone, Copy)]
struct ConnString {
    len: u16,
    bytes: [u8; MAX_CONNSTRING_LEN],
}

impl ConnString {
    const EMPTY: ConnString = ConnString {
        len: 0,
        bytes: [0; MAX_CONNSTRING_LEN],
    };

    fn new(s: &str) -> Result<Self> {
        ensure!(
            s.len() <= MAX_CONNSTRING_LEN,
            "connection string of {} bytes exceeds MAX_CONNSTRING_LEN ({})",
            s.len(),
            MAX_CONNSTRING_LEN
        );
        let mut bytes = [0u8; MAX_CONNSTRING_LEN];
        bytes[..s.len()].copy_from_slice(s.as_bytes());
        Ok(ConnString {
            len: s.len() as u16,
            bytes,
        })
    }

    fn as_str(&self) -> String {
        String::from_utf8_lossy(&self.bytes[..self.len as usize]).into_owned()
    }
}

#[derive(Clone, Copy)]
struct ShardMapData {
    num_shards: u32,
    connstrings: [ConnString; MAX_SHARDS],
}

impl ShardMapData {
    const EMPTY: ShardMapData = ShardMapData {
        num_shards: 0,
        connstrings: [ConnString::EMPTY; MAX_SHARDS],
    };
}

pub struct ShardMap {
    begin: AtomicU64,
    end: AtomicU64,
    data: UnsafeCell<ShardMapData>,
}

// Single-writer, many-reader seqlock: concurrent access is safe because
// every read is validated against the begin/end counters and retried on
// any observed write-in-progress.
unsafe impl Sync for ShardMap {}

impl Default for ShardMap {
    fn default() -> Self {
        ShardMap {
            begin: AtomicU64::new(0),
            end: AtomicU64::new(0),
            data: UnsafeCell::new(ShardMapData::EMPTY),
        }
    }
}

impl ShardMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writer side: install a new set of per-shard connection strings.
    /// Not safe to call from more than one thread concurrently.
    pub fn set(&self, connstrings: &[String]) -> Result<()> {
        ensure!(
            connstrings.len() <= MAX_SHARDS,
            "num_shards ({}) exceeds MAX_SHARDS ({})",
            connstrings.len(),
            MAX_SHARDS
        );
        let mut data = ShardMapData::EMPTY;
        data.num_shards = connstrings.len() as u32;
        for (i, s) in connstrings.iter().enumerate() {
            data.connstrings[i] = ConnString::new(s)?;
        }

        self.begin.fetch_add(1, Ordering::Release);
        fence(Ordering::SeqCst);
        unsafe {
            *self.data.get() = data;
        }
        fence(Ordering::SeqCst);
        self.end.fetch_add(1, Ordering::Release);
        Ok(())
    }

    /// Reader side. Returns the `end` counter observed at the moment the
    /// snapshot was taken (callers compare this against their own
    /// `last_end_counter` to detect a reconfiguration, §4.F) along with
    /// the shard connection strings.
    pub fn read(&self) -> (u64, Vec<String>) {
        loop {
            let b = self.begin.load(Ordering::Acquire);
            let e = self.end.load(Ordering::Acquire);
            let snapshot = unsafe { *self.data.get() };
            fence(Ordering::Acquire);
            let b2 = self.begin.load(Ordering::Acquire);
            let e2 = self.end.load(Ordering::Acquire);
            if b == e && b == b2 && e == e2 {
                let strings = snapshot.connstrings[..snapshot.num_shards as usize]
                    .iter()
                    .map(ConnString::as_str)
                    .collect();
                return (e, strings);
            }
        }
    }

    pub fn end_counter(&self) -> u64 {
        self.end.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_after_write_sees_new_shards() {
        let map = ShardMap::new();
        map.set(&["host1:1".to_string(), "host2:1".to_string()]).unwrap();
        let (end1, shards) = map.read();
        assert_eq!(shards, vec!["host1:1".to_string(), "host2:1".to_string()]);
        assert_eq!(end1, 1);

        map.set(&["host3:1".to_string()]).unwrap();
        let (end2, shards) = map.read();
        assert_eq!(shards, vec!["host3:1".to_string()]);
        assert!(end2 > end1);
    }

    #[test]
    fn empty_map_reads_zero_shards() {
        let map = ShardMap::new();
        let (end, shards) = map.read();
        assert_eq!(end, 0);
        assert!(shards.is_empty());
    }

    #[test]
    fn rejects_connstring_over_limit() {
        let map = ShardMap::new();
        let huge = "x".repeat(MAX_CONNSTRING_LEN + 1);
        assert!(map.set(&[huge]).is_err());
    }
}
