//! Trait seams standing in for the out-of-scope collaborators named in
//! §1: the wire-level message codec, the transport a real connection
//! would ride on, and the prefetch queue that must be invalidated on
//! disconnect.

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

/// Stands in for `nm_pack_request` / `nm_unpack_response`. Production
/// wiring would decode into real page-store request/response types; this
/// crate's own tests use [`IdentityCodec`], which treats the payload as
/// opaque bytes.
pub trait RequestCodec: Send + Sync {
    type Request: Send;
    type Response: Send;

    fn encode(&self, request: &Self::Request) -> Bytes;
    fn decode(&self, buf: &[u8]) -> anyhow::Result<Self::Response>;
}

/// Stands in for `prefetch_on_ps_disconnect()`: dropping all outstanding
/// requests across every shard once any one shard's stream is reset,
/// because response/request alignment cannot be trusted afterward.
pub trait PrefetchSink: Send + Sync {
    fn on_disconnect_all_shards(&self);
}

/// No-op sink for configurations that do not wire up a real prefetch
/// queue (e.g. the bench harness).
pub struct NoopPrefetchSink;

impl PrefetchSink for NoopPrefetchSink {
    fn on_disconnect_all_shards(&self) {}
}

/// Outcome of a non-blocking receive attempt, mirroring the three-way
/// result the original's `pageserver_receive` produces (`>=0` bytes,
/// `0` would-block, `-1` peer closed, `-2` protocol error).
pub enum RecvOutcome {
    Data(Bytes),
    WouldBlock,
    Closed,
    ProtocolError(String),
}

/// Stands in for the COPY-both duplex stream a production transport would
/// get from `tokio_postgres`. One instance per shard connection.
#[async_trait]
pub trait ShardTransport: Send {
    async fn connect(&mut self, connstring: &str, auth_token: Option<&str>) -> std::io::Result<()>;
    async fn send_frame(&mut self, frame: &[u8]) -> std::io::Result<()>;
    fn try_recv_frame(&mut self) -> RecvOutcome;
    /// Waits until the stream is readable, a local wakeup latch fires, or
    /// `cancel` is triggered. Returns `false` iff cancelled.
    async fn readable(&mut self, cancel: &CancellationToken) -> bool;
    async fn flush(&mut self) -> std::io::Result<()>;
    async fn shutdown(&mut self);
}

/// Treats the payload as opaque bytes: the simplest possible `RequestCodec`,
/// used by this crate's own tests in place of the real page-store framing.
pub struct IdentityCodec;

impl RequestCodec for IdentityCodec {
    type Request = Bytes;
    type Response = Bytes;

    fn encode(&self, request: &Bytes) -> Bytes {
        request.clone()
    }

    fn decode(&self, buf: &[u8]) -> anyhow::Result<Bytes> {
        Ok(Bytes::copy_from_slice(buf))
    }
}
