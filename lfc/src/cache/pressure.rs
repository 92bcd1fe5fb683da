//! Background worker that shrinks the cache under low free memory.
//!
//! Runs as a Tokio task carrying a [`CancellationToken`] rather than a
//! separate OS process — see §5 of the design notes for why that
//! substitution changes nothing observable at the cache's API boundary.
//! The host is expected to restart this task with the same fixed 5s
//! backoff the original gives its monitor process if it panics; this crate
//! does not supervise itself, matching its "library, not a supervisor"
//! scope.

use std::sync::Arc;
use std::time::Duration;

use sysinfo::{System, SystemExt};
use tokio_util::sync::CancellationToken;

use super::core::LocalFileCache;

pub const MAX_MONITOR_INTERVAL: Duration = Duration::from_secs(1);
pub const MAX_MEM_WRITE_RATE_MBPS: u64 = 10_000;
pub const MONITOR_CRASH_BACKOFF: Duration = Duration::from_secs(5);

/// Spawns the pressure-monitor loop. Returns the join handle so the caller
/// can await shutdown; cancel via `cancel.cancel()`.
pub fn spawn(
    cache: Arc<LocalFileCache>,
    free_memory_watermark_mb: u64,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut shrinking_factor: u32 = 0;
        let mut sys = System::new();

        loop {
            let interval = tick_interval(free_memory_watermark_mb);
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("pressure monitor shutting down");
                    return;
                }
                _ = tokio::time::sleep(interval) => {}
            }

            let size_limit_mb = cache.size_limit_mb();
            if free_memory_watermark_mb > 0 && size_limit_mb > 0 {
                sys.refresh_memory();
                let available_mb = sys.available_memory() / (1024 * 1024);
                if available_mb < free_memory_watermark_mb {
                    shrinking_factor = shrinking_factor.saturating_add(1).min(31);
                    let new_limit_mb = size_limit_mb >> shrinking_factor;
                    tracing::info!(
                        available_mb,
                        free_memory_watermark_mb,
                        shrinking_factor,
                        new_limit_mb,
                        "shrinking local file cache under memory pressure"
                    );
                    cache.set_size_limit_mb(new_limit_mb);
                    crate::metrics::LFC_METRICS.shrink_ticks_total.inc();
                    continue;
                }
            }
            shrinking_factor = 0;
        }
    })
}

fn tick_interval(free_memory_watermark_mb: u64) -> Duration {
    if free_memory_watermark_mb == 0 {
        return MAX_MONITOR_INTERVAL;
    }
    let by_rate = Duration::from_millis(free_memory_watermark_mb * 1000 / MAX_MEM_WRITE_RATE_MBPS.max(1));
    by_rate.min(MAX_MONITOR_INTERVAL)
}
