//! Error taxonomy for the local file cache and the page-store client.
//!
//! The cache is advisory: its own failures are swallowed and turn into a
//! self-disable rather than propagating, because the page store is the
//! authoritative source of truth. The shard client is not advisory — its
//! errors propagate to the caller after the connection state has been
//! cleaned up.

use thiserror::Error;

/// Failure surfaced by the local file cache. Callers generally do not see
/// this directly: [`crate::cache::LocalFileCache`] catches it internally and
/// disables itself (`size_limit := 0`), per spec's "cache is advisory" rule.
#[derive(Debug, Error)]
pub enum LfcError {
    #[error("local file cache I/O error on chunk {offset}: {source}")]
    Internal {
        offset: u32,
        #[source]
        source: std::io::Error,
    },
}

/// Failure surfaced by the page-store client.
#[derive(Debug, Error)]
pub enum PscError {
    #[error("shard index {shard} out of range (num_shards = {num_shards})")]
    ShardOutOfRange { shard: u32, num_shards: u32 },

    #[error("transient connect error on shard {shard} (attempt {attempt}): {source}")]
    TransientConnect {
        shard: u32,
        attempt: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("shard {shard} exceeded max_reconnect_attempts ({attempts})")]
    ReconnectBudgetExhausted { shard: u32, attempts: u32 },

    #[error("stream protocol error on shard {shard}: {message}")]
    StreamProtocol { shard: u32, message: String },

    #[error("operation on shard {shard} cancelled")]
    Cancelled { shard: u32 },
}
