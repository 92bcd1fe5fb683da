//! Local File Cache and Page-Store Client: a bounded local block cache
//! backed by an external, multi-shard page store.
//!
//! The two subsystems are independent of one another in this crate — the
//! cache never calls into the shard client, and the shard client does not
//! know the cache exists — mirroring the "cache is advisory, store is
//! authoritative" relationship described in the design notes. A storage
//! manager built on top of both would check [`cache::LocalFileCache`]
//! first and fall back to [`shard::ShardClient`] on a miss.

pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod shard;

pub use cache::{BlockKey, CacheEntryInfo, ForkNumber, LocalFileCache};
pub use error::{LfcError, PscError};
pub use shard::ShardClient;
