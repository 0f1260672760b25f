//! Background maintenance loop
//!
//! A single task ticks at a fixed period and, in order: counts the tick
//! against the keepalive deadline, emits a best-effort heartbeat record,
//! flushes every destination, performs requested or size-due rotations, and
//! finally pulls the deadman's switch if the upstream feed has been silent
//! for too long. Termination by the watchdog is deliberate and immediate;
//! it does not attempt an orderly shutdown.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use bytes::Bytes;
use tracefan_sink::TraceRecord;

use crate::error::{Error, Result};
use crate::formatter;
use crate::registry::Registry;

/// Reserved routing key for the maintenance heartbeat.
const HEARTBEAT_KEY: &str = "keepalive";

pub(crate) struct MaintenanceService {
    registry: Arc<Registry>,
    tick_interval: Duration,
    keepalive_deadline: u64,
    ticks: Arc<AtomicU64>,
    rotation_requested: Arc<AtomicBool>,
    shutdown_token: CancellationToken,
    task_tracker: TaskTracker,
}

impl MaintenanceService {
    pub(crate) fn new(
        registry: Arc<Registry>,
        tick_interval: Duration,
        keepalive_deadline: u64,
        ticks: Arc<AtomicU64>,
        rotation_requested: Arc<AtomicBool>,
    ) -> Self {
        Self {
            registry,
            tick_interval,
            keepalive_deadline,
            ticks,
            rotation_requested,
            shutdown_token: CancellationToken::new(),
            task_tracker: TaskTracker::new(),
        }
    }

    /// Start the tick loop.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyStarted`] if the service was started before.
    pub(crate) fn start(&self) -> Result<()> {
        if self.task_tracker.is_closed() {
            return Err(Error::AlreadyStarted);
        }

        let registry = self.registry.clone();
        let ticks = self.ticks.clone();
        let rotation_requested = self.rotation_requested.clone();
        let keepalive_deadline = self.keepalive_deadline;
        let tick_interval = self.tick_interval;
        let shutdown_token = self.shutdown_token.clone();

        self.task_tracker.spawn(async move {
            let mut interval = tokio::time::interval(tick_interval);
            let mut tick: u64 = 0;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        tick += 1;
                        run_tick(&registry, tick, &ticks, &rotation_requested, keepalive_deadline)
                            .await;
                    }
                    () = shutdown_token.cancelled() => break,
                }
            }
        });
        self.task_tracker.close();

        debug!("maintenance service started");
        Ok(())
    }

    /// Stop the loop and wait for the in-flight tick to finish.
    pub(crate) async fn shutdown(&self) {
        self.shutdown_token.cancel();
        self.task_tracker.wait().await;
        info!("maintenance service shut down");
    }
}

async fn run_tick(
    registry: &Registry,
    tick: u64,
    silent_ticks: &AtomicU64,
    rotation_requested: &AtomicBool,
    keepalive_deadline: u64,
) {
    let silent_ticks = silent_ticks.fetch_add(1, Ordering::Relaxed) + 1;

    emit_heartbeat(registry, tick).await;
    registry.flush_all().await;

    let force = rotation_requested.swap(false, Ordering::AcqRel);
    registry.rotate_sweep(force).await;

    if deadline_exceeded(silent_ticks, keepalive_deadline) {
        eprintln!(
            "no keepalive for {silent_ticks} ticks (deadline {keepalive_deadline}); terminating"
        );
        std::process::exit(1);
    }
}

/// Best-effort liveness marker, written through the normal record path
/// under the reserved `keepalive` key.
async fn emit_heartbeat(registry: &Registry, tick: u64) {
    let mut record = TraceRecord::new()
        .with_str_field("procname", HEARTBEAT_KEY)
        .with_int_field("loglevel", 6)
        .with_byte_seq_field("msg", Bytes::from(format!("maintenance tick {tick}")));
    if let Ok(elapsed) = SystemTime::now().duration_since(UNIX_EPOCH) {
        if let Ok(ns) = i64::try_from(elapsed.as_nanos()) {
            record = record.with_timestamp_ns(ns);
        }
    }
    let line = formatter::render_line(HEARTBEAT_KEY, &record);
    if let Err(e) = registry.append(HEARTBEAT_KEY, &line).await {
        debug!("heartbeat write failed: {e}");
    }
}

/// The deadman's switch decision: `deadline` ticks of silence are allowed,
/// one more is fatal. A zero deadline disables the watchdog.
fn deadline_exceeded(silent_ticks: u64, deadline: u64) -> bool {
    deadline != 0 && silent_ticks > deadline
}
