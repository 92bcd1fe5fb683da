//! Per-shard streaming connection state machine: reconnect with
//! exponential backoff, bounded by a reconnect-attempt budget.
//!
//! ```text
//!             connect attempt
//! [DISCONNECTED] ─────────────► [HANDSHAKING]
//!       ▲                           │ handshake ok
//!       │ any I/O error             ▼
//!       └─────────────────────── [ESTABLISHED]
//! ```

use std::time::{Duration, Instant};

use tokio::time::sleep;

use crate::error::PscError;

use super::codec::ShardTransport;

pub const MIN_RECONNECT_INTERVAL: Duration = Duration::from_millis(1);
pub const MAX_RECONNECT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Disconnected,
    Handshaking,
    Established,
}

/// `{ conn: optional<stream>, wait_set: optional<wait_set> }` — lifetime
/// ties the transport and its waiter together; they are created and
/// destroyed atomically (spec §3 ShardConnection).
pub struct ShardConnection<T> {
    shard: u32,
    state: ConnState,
    transport: Option<T>,
    delay: Duration,
    last_connect_time: Option<Instant>,
    reconnect_attempts: u32,
}

impl<T: ShardTransport> ShardConnection<T> {
    pub fn new(shard: u32) -> Self {
        ShardConnection {
            shard,
            state: ConnState::Disconnected,
            transport: None,
            delay: MIN_RECONNECT_INTERVAL,
            last_connect_time: None,
            reconnect_attempts: 0,
        }
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnState::Established
    }

    pub fn transport_mut(&mut self) -> Option<&mut T> {
        self.transport.as_mut()
    }

    /// Sleeps out the appropriate backoff delay before a connect attempt,
    /// then records the attempt time (spec §4.H step 1).
    async fn enforce_backoff(&mut self) {
        let now = Instant::now();
        match self.last_connect_time {
            Some(last) if now.duration_since(last) < MAX_RECONNECT_INTERVAL => {
                sleep(self.delay).await;
                self.delay = (self.delay * 2).min(MAX_RECONNECT_INTERVAL);
            }
            _ => {
                self.delay = MIN_RECONNECT_INTERVAL;
            }
        }
        self.last_connect_time = Some(Instant::now());
    }

    /// Attempts to connect and complete the handshake, given an
    /// already-constructed (not yet connected) transport. On success,
    /// installs `(conn, wait_set)` atomically and resets the reconnect
    /// counter. On failure, increments the counter and returns either a
    /// transient or budget-exhausted error depending on how many
    /// consecutive failures have accumulated.
    pub async fn connect(
        &mut self,
        mut transport: T,
        connstring: &str,
        tenant_id: &str,
        timeline_id: &str,
        auth_token: Option<&str>,
        max_reconnect_attempts: u32,
    ) -> Result<(), PscError> {
        self.enforce_backoff().await;
        self.state = ConnState::Handshaking;

        let result = async {
            transport.connect(connstring, auth_token).await?;
            let command = format!("pagestream {tenant_id} {timeline_id}");
            transport.send_frame(command.as_bytes()).await?;
            transport.flush().await?;
            Ok::<_, std::io::Error>(())
        }
        .await;

        match result {
            Ok(()) => {
                self.transport = Some(transport);
                self.state = ConnState::Established;
                self.reconnect_attempts = 0;
                crate::metrics::PSC_METRICS.reconnects_total.inc();
                Ok(())
            }
            Err(source) => {
                self.state = ConnState::Disconnected;
                self.reconnect_attempts += 1;
                crate::metrics::PSC_METRICS.connect_failures_total.inc();
                if self.reconnect_attempts >= max_reconnect_attempts {
                    Err(PscError::ReconnectBudgetExhausted {
                        shard: self.shard,
                        attempts: self.reconnect_attempts,
                    })
                } else {
                    Err(PscError::TransientConnect {
                        shard: self.shard,
                        attempt: self.reconnect_attempts,
                        source,
                    })
                }
            }
        }
    }

    /// Frees this shard's stream and wait-set. Callers are responsible for
    /// also invalidating the prefetch queue across *all* shards (spec
    /// §4.H "disconnect always also calls prefetch_on_ps_disconnect()") —
    /// that is a client-wide effect, not something a single connection can
    /// do on its own.
    pub async fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.shutdown().await;
        }
        self.state = ConnState::Disconnected;
    }
}
