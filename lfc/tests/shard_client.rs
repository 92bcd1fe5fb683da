//! End-to-end scenarios for the page-store client: reconnect budget,
//! shard-map reload, and a full send/receive round trip over a fake
//! in-memory transport.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use lfc::cache::ForkNumber;
use lfc::config::ShardClientConfig;
use lfc::error::PscError;
use lfc::shard::{IdentityCodec, PrefetchSink, RecvOutcome, ShardClient, ShardMap, ShardTransport};

#[derive(Default)]
struct CountingPrefetchSink {
    invalidations: AtomicUsize,
}

impl PrefetchSink for CountingPrefetchSink {
    fn on_disconnect_all_shards(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }
}

/// An in-memory stand-in for the COPY-both stream: `connect` either
/// succeeds or fails per a shared flag, and frames pushed into `inbox` are
/// handed back from `try_recv_frame`.
struct FakeTransport {
    should_fail_connect: Arc<AtomicBool>,
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    inbox: mpsc::UnboundedReceiver<Vec<u8>>,
}

#[async_trait]
impl ShardTransport for FakeTransport {
    async fn connect(&mut self, _connstring: &str, _auth_token: Option<&str>) -> std::io::Result<()> {
        if self.should_fail_connect.load(Ordering::SeqCst) {
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"))
        } else {
            Ok(())
        }
    }

    async fn send_frame(&mut self, frame: &[u8]) -> std::io::Result<()> {
        self.sent.lock().unwrap().push(frame.to_vec());
        Ok(())
    }

    fn try_recv_frame(&mut self) -> RecvOutcome {
        match self.inbox.try_recv() {
            Ok(bytes) => RecvOutcome::Data(Bytes::from(bytes)),
            Err(mpsc::error::TryRecvError::Empty) => RecvOutcome::WouldBlock,
            Err(mpsc::error::TryRecvError::Disconnected) => RecvOutcome::Closed,
        }
    }

    async fn readable(&mut self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            maybe = self.inbox.recv() => {
                // Put it back by treating the peek as a readiness signal
                // only; a real transport would just report POLLIN here.
                // For the fake, if a message arrived we requeue it is not
                // possible with mpsc::Receiver, so tests that exercise
                // this path send exactly one frame and expect exactly one
                // wakeup before `try_recv_frame` observes it directly.
                maybe.is_some()
            }
        }
    }

    async fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }

    async fn shutdown(&mut self) {}
}

/// Hands out a fresh mpsc channel to every transport the factory below
/// constructs (one per connect attempt), while giving the test a single
/// stable handle to whichever transport is currently live.
#[derive(Clone, Default)]
struct LatestSender(Arc<Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>>);

impl LatestSender {
    fn send(&self, frame: Vec<u8>) {
        self.0
            .lock()
            .unwrap()
            .as_ref()
            .expect("no transport connected yet")
            .send(frame)
            .unwrap();
    }
}

fn make_client(
    config: ShardClientConfig,
    shard_map: Arc<ShardMap>,
    should_fail_connect: Arc<AtomicBool>,
) -> (
    ShardClient<FakeTransport, IdentityCodec, CountingPrefetchSink>,
    Arc<Mutex<Vec<Vec<u8>>>>,
    LatestSender,
) {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let latest_sender = LatestSender::default();

    let sent_for_factory = sent.clone();
    let fail_for_factory = should_fail_connect.clone();
    let sender_for_factory = latest_sender.clone();
    let client = ShardClient::new(config, shard_map, IdentityCodec, CountingPrefetchSink::default(), {
        move || {
            let (tx, rx) = mpsc::unbounded_channel();
            *sender_for_factory.0.lock().unwrap() = Some(tx);
            FakeTransport {
                should_fail_connect: fail_for_factory.clone(),
                sent: sent_for_factory.clone(),
                inbox: rx,
            }
        }
    });
    (client, sent, latest_sender)
}

fn config() -> ShardClientConfig {
    ShardClientConfig {
        max_reconnect_attempts: 3,
        flush_output_after: 1,
        ..ShardClientConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn reconnect_budget_exhausted_raises_fatal() {
    let shard_map = Arc::new(ShardMap::new());
    shard_map.set(&["shard0".to_string()]).unwrap();
    let should_fail = Arc::new(AtomicBool::new(true));
    let (mut client, _sent, _tx) = make_client(config(), shard_map, should_fail);

    let mut last_err = None;
    for _ in 0..4 {
        last_err = client.send(0, &Bytes::from_static(b"req")).await.err();
    }
    assert!(matches!(last_err, Some(PscError::ReconnectBudgetExhausted { .. })));
}

#[tokio::test(start_paused = true)]
async fn send_establishes_connection_and_records_frame() {
    let shard_map = Arc::new(ShardMap::new());
    shard_map.set(&["shard0".to_string()]).unwrap();
    let should_fail = Arc::new(AtomicBool::new(false));
    let (mut client, sent, _tx) = make_client(config(), shard_map, should_fail);

    client.send(0, &Bytes::from_static(b"hello")).await.unwrap();
    assert_eq!(sent.lock().unwrap().as_slice(), &[b"hello".to_vec()]);
}

#[tokio::test(start_paused = true)]
async fn out_of_range_shard_is_rejected() {
    let shard_map = Arc::new(ShardMap::new());
    shard_map.set(&["shard0".to_string()]).unwrap();
    let should_fail = Arc::new(AtomicBool::new(false));
    let (mut client, _sent, _tx) = make_client(config(), shard_map, should_fail);

    let err = client.send(5, &Bytes::from_static(b"x")).await.unwrap_err();
    assert!(matches!(err, PscError::ShardOutOfRange { shard: 5, num_shards: 1 }));
}

#[tokio::test(start_paused = true)]
async fn shard_map_reload_disconnects_and_invalidates_prefetch() {
    let shard_map = Arc::new(ShardMap::new());
    shard_map.set(&["shard0".to_string()]).unwrap();
    let should_fail = Arc::new(AtomicBool::new(false));
    let (mut client, _sent, _tx) = make_client(config(), shard_map.clone(), should_fail);

    client.send(0, &Bytes::from_static(b"first")).await.unwrap();
    assert!(client.shard_for(1, 1, 1, ForkNumber::Main, 0).is_ok());

    // Supervisor reconfigures the shard map (scenario 5): the next call
    // must observe the change and tear down the old connection.
    shard_map.set(&["shard0".to_string(), "shard1".to_string()]).unwrap();
    client.send(0, &Bytes::from_static(b"second")).await.unwrap();
    assert_eq!(client.num_shards(), 2);
}

#[tokio::test(start_paused = true)]
async fn receive_decodes_available_frame() {
    let shard_map = Arc::new(ShardMap::new());
    shard_map.set(&["shard0".to_string()]).unwrap();
    let should_fail = Arc::new(AtomicBool::new(false));
    let (mut client, _sent, tx) = make_client(config(), shard_map, should_fail);

    client.send(0, &Bytes::from_static(b"req")).await.unwrap();
    tx.send(b"response-bytes".to_vec()).unwrap();

    let cancel = CancellationToken::new();
    let response = client.receive(0, &cancel).await.unwrap();
    assert_eq!(response, Some(Bytes::from_static(b"response-bytes")));
}
