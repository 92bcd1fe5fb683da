//! Ties the shard map, router, and per-shard connections together:
//! `send`/`receive`/`flush`, reconnect-on-demand, and shard-map-change
//! driven invalidation.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::ShardClientConfig;
use crate::error::PscError;

use super::codec::{PrefetchSink, RecvOutcome, RequestCodec, ShardTransport};
use super::connection::ShardConnection;
use super::map::ShardMap;
use super::router;

const NEON_AUTH_TOKEN_ENV: &str = "NEON_AUTH_TOKEN";

pub struct ShardClient<T, C, P> {
    config: ShardClientConfig,
    shard_map: Arc<ShardMap>,
    last_end_counter: u64,
    connstrings: Vec<String>,
    connections: Vec<ShardConnection<T>>,
    unflushed: Vec<u32>,
    codec: C,
    prefetch_sink: P,
    new_transport: Box<dyn Fn() -> T + Send + Sync>,
}

impl<T, C, P> ShardClient<T, C, P>
where
    T: ShardTransport,
    C: RequestCodec,
    P: PrefetchSink,
{
    pub fn new(
        config: ShardClientConfig,
        shard_map: Arc<ShardMap>,
        codec: C,
        prefetch_sink: P,
        new_transport: impl Fn() -> T + Send + Sync + 'static,
    ) -> Self {
        ShardClient {
            config,
            shard_map,
            last_end_counter: 0,
            connstrings: Vec::new(),
            connections: Vec::new(),
            unflushed: Vec::new(),
            codec,
            prefetch_sink,
            new_transport: Box::new(new_transport),
        }
    }

    pub fn num_shards(&self) -> u32 {
        self.connections.len() as u32
    }

    /// Routes `(relation, block_number)` to a shard index using the
    /// current shard map (spec §4.G).
    pub fn shard_for(
        &self,
        spc_node: u32,
        db_node: u32,
        rel_node: u32,
        fork: crate::cache::ForkNumber,
        block_number: u32,
    ) -> Result<u32, PscError> {
        let num_shards = self.num_shards();
        if num_shards == 0 {
            return Err(PscError::ShardOutOfRange { shard: 0, num_shards: 0 });
        }
        Ok(router::shard_of(
            spc_node,
            db_node,
            rel_node,
            fork,
            block_number,
            self.config.stripe_size,
            num_shards,
        ))
    }

    /// Observes the shard map; if `end` has moved since last observed,
    /// closes every open connection and notifies the prefetch sink once
    /// (spec §4.F, B4, scenario 5).
    async fn reload_shard_map_if_changed(&mut self) {
        let end = self.shard_map.end_counter();
        if end == self.last_end_counter {
            return;
        }
        let (end, connstrings) = self.shard_map.read();
        let had_connections = !self.connections.is_empty();
        for conn in &mut self.connections {
            conn.close().await;
        }
        if had_connections {
            self.prefetch_sink.on_disconnect_all_shards();
            crate::metrics::PSC_METRICS.shard_map_reloads_total.inc();
        }
        self.last_end_counter = end;
        self.connections = (0..connstrings.len() as u32).map(ShardConnection::new).collect();
        self.unflushed = vec![0; connstrings.len()];
        self.connstrings = connstrings;
    }

    async fn connect_shard(&mut self, shard: u32) -> Result<(), PscError> {
        let auth_token = std::env::var(NEON_AUTH_TOKEN_ENV).ok();
        let connstring = self.connstrings[shard as usize].clone();
        let transport = (self.new_transport)();
        self.connections[shard as usize]
            .connect(
                transport,
                &connstring,
                &self.config.tenant_id,
                &self.config.timeline_id,
                auth_token.as_deref(),
                self.config.max_reconnect_attempts,
            )
            .await
    }

    async fn disconnect_shard(&mut self, shard: u32) {
        self.connections[shard as usize].close().await;
        self.unflushed[shard as usize] = 0;
        // Disconnecting any one shard always invalidates outstanding
        // prefetches across all shards: response/request alignment is
        // lost once any stream is reset (spec §4.H).
        self.prefetch_sink.on_disconnect_all_shards();
    }

    fn check_shard_range(&self, shard: u32) -> Result<(), PscError> {
        if shard as usize >= self.connections.len() {
            return Err(PscError::ShardOutOfRange {
                shard,
                num_shards: self.connections.len() as u32,
            });
        }
        Ok(())
    }

    /// `send(shard, request)`.
    pub async fn send(&mut self, shard: u32, request: &C::Request) -> Result<(), PscError> {
        self.reload_shard_map_if_changed().await;
        self.check_shard_range(shard)?;

        if !self.connections[shard as usize].is_connected() {
            self.connect_shard(shard).await?;
        }

        let frame = self.codec.encode(request);
        let send_result = {
            let transport = self.connections[shard as usize].transport_mut().unwrap();
            transport.send_frame(&frame).await
        };
        match send_result {
            Ok(()) => {
                self.unflushed[shard as usize] += 1;
                if self.unflushed[shard as usize] >= self.config.flush_output_after {
                    self.flush(shard).await?;
                }
                Ok(())
            }
            Err(source) => {
                crate::metrics::PSC_METRICS.send_errors_total.inc();
                self.disconnect_shard(shard).await;
                Err(PscError::TransientConnect {
                    shard,
                    attempt: 0,
                    source,
                })
            }
        }
    }

    /// `receive(shard) -> response?`.
    pub async fn receive(
        &mut self,
        shard: u32,
        cancel: &CancellationToken,
    ) -> Result<Option<C::Response>, PscError> {
        self.check_shard_range(shard)?;
        if !self.connections[shard as usize].is_connected() {
            return Ok(None);
        }

        loop {
            let outcome = {
                let transport = self.connections[shard as usize].transport_mut().unwrap();
                transport.try_recv_frame()
            };
            match outcome {
                RecvOutcome::Data(buf) => {
                    let response = self
                        .codec
                        .decode(&buf)
                        .map_err(|_| PscError::StreamProtocol {
                            shard,
                            message: "malformed response frame".to_string(),
                        })?;
                    return Ok(Some(response));
                }
                RecvOutcome::WouldBlock => {
                    let stayed = {
                        let transport = self.connections[shard as usize].transport_mut().unwrap();
                        transport.readable(cancel).await
                    };
                    if !stayed {
                        self.disconnect_shard(shard).await;
                        return Err(PscError::Cancelled { shard });
                    }
                }
                RecvOutcome::Closed => {
                    crate::metrics::PSC_METRICS.recv_errors_total.inc();
                    self.disconnect_shard(shard).await;
                    return Ok(None);
                }
                RecvOutcome::ProtocolError(message) => {
                    crate::metrics::PSC_METRICS.recv_errors_total.inc();
                    self.disconnect_shard(shard).await;
                    return Err(PscError::StreamProtocol { shard, message });
                }
            }
        }
    }

    /// `flush(shard)`.
    pub async fn flush(&mut self, shard: u32) -> Result<(), PscError> {
        self.check_shard_range(shard)?;
        if !self.connections[shard as usize].is_connected() {
            return Ok(());
        }
        let result = {
            let transport = self.connections[shard as usize].transport_mut().unwrap();
            transport.flush().await
        };
        match result {
            Ok(()) => {
                self.unflushed[shard as usize] = 0;
                Ok(())
            }
            Err(source) => {
                self.disconnect_shard(shard).await;
                Err(PscError::TransientConnect {
                    shard,
                    attempt: 0,
                    source,
                })
            }
        }
    }
}
