//! Page-Store Client: a multi-shard streaming client that reads a
//! consistent shard map from shared memory via a seqlock, and sends and
//! receives request/response messages with reconnect, backoff, and
//! prefetch-queue invalidation on connection loss.

pub mod client;
pub mod codec;
pub mod connection;
pub mod map;
pub mod router;

pub use client::ShardClient;
pub use codec::{IdentityCodec, NoopPrefetchSink, PrefetchSink, RecvOutcome, RequestCodec, ShardTransport};
pub use connection::{ConnState, ShardConnection};
pub use map::ShardMap;
