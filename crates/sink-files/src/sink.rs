//! Sink driver wired to the host framework

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use tracefan_sink::{ConsumeStatus, Pull, RecordSource, Sink};

use crate::config::FileSinkConfig;
use crate::error::{Error, Result};
use crate::formatter;
use crate::maintenance::MaintenanceService;
use crate::metrics::{MetricsSnapshot, SinkMetrics};
use crate::registry::Registry;

/// File-backed sink: one rotating log destination per routing key.
pub struct FileSink {
    config: FileSinkConfig,
    registry: Arc<Registry>,
    maintenance: MaintenanceService,
    ticks: Arc<AtomicU64>,
    rotation_requested: Arc<AtomicBool>,
    metrics: Arc<SinkMetrics>,
    source: Mutex<Option<Box<dyn RecordSource>>>,
}

impl FileSink {
    /// Create the sink: validate the configuration and create the log
    /// directory (`<log_root>/<host_id>`, mode 0700 on unix).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for an invalid configuration and
    /// [`Error::CreateDirectory`] when the log directory cannot be created.
    /// These are the only startup-fatal conditions.
    pub fn new(config: FileSinkConfig) -> Result<Self> {
        config.validate()?;

        let dir = config.log_root.join(&config.host_id);
        create_log_dir(&dir).map_err(|source| Error::CreateDirectory {
            path: dir.clone(),
            source,
        })?;

        let metrics = Arc::new(SinkMetrics::default());
        let registry = Arc::new(Registry::new(dir, config.rotation, metrics.clone()));
        let ticks = Arc::new(AtomicU64::new(0));
        let rotation_requested = Arc::new(AtomicBool::new(false));
        let maintenance = MaintenanceService::new(
            registry.clone(),
            config.tick_interval,
            config.keepalive_deadline,
            ticks.clone(),
            rotation_requested.clone(),
        );

        Ok(Self {
            config,
            registry,
            maintenance,
            ticks,
            rotation_requested,
            metrics,
            source: Mutex::new(None),
        })
    }

    /// Start the background maintenance service.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyStarted`] on a second start.
    pub fn start(&self) -> Result<()> {
        self.maintenance.start()
    }

    /// Request an unconditional rotation of every destination on the next
    /// maintenance tick, regardless of size.
    pub fn request_rotation(&self) {
        self.rotation_requested.store(true, Ordering::Release);
    }

    /// Reset the keepalive watchdog. Also happens implicitly whenever a
    /// record is consumed.
    pub fn keepalive(&self) {
        self.ticks.store(0, Ordering::Relaxed);
    }

    /// Snapshot of the sink counters.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    async fn handle_record(&self, record: &tracefan_sink::TraceRecord) -> Result<()> {
        let Some(key) = record.str_field(formatter::PROCNAME_FIELD) else {
            self.metrics.record_dropped();
            return Ok(());
        };
        if !valid_key(key, self.config.max_key_len) {
            debug!("dropping record with invalid routing key ({} bytes)", key.len());
            self.metrics.record_dropped();
            return Ok(());
        }

        let line = formatter::render_line(key, record);
        match self.registry.append(key, &line).await {
            Ok(()) => {
                self.metrics.record_written();
                Ok(())
            }
            Err(Error::Closed) => Err(Error::Closed),
            Err(e @ Error::Unusable(_)) => {
                debug!("{e}");
                self.metrics.record_dropped();
                Ok(())
            }
            Err(e) => {
                warn!("write failed for key `{key}`: {e}");
                self.metrics.write_error();
                Ok(())
            }
        }
    }
}

#[async_trait]
impl Sink for FileSink {
    async fn attach_source(
        &self,
        source: Box<dyn RecordSource>,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut slot = self.source.lock().await;
        if slot.is_some() {
            return Err(Box::new(Error::SourceAlreadyAttached));
        }
        *slot = Some(source);
        Ok(())
    }

    async fn consume_one(&self) -> ConsumeStatus {
        let mut source = self.source.lock().await;
        let Some(active) = source.as_mut() else {
            return ConsumeStatus::Error;
        };
        match active.pull() {
            Ok(Pull::Record(record)) => match self.handle_record(&record).await {
                Ok(()) => {
                    self.ticks.store(0, Ordering::Relaxed);
                    ConsumeStatus::Ok
                }
                Err(_) => ConsumeStatus::Error,
            },
            Ok(Pull::Again) => ConsumeStatus::Again,
            Ok(Pull::End) => {
                *source = None;
                ConsumeStatus::End
            }
            Err(e) => {
                warn!("upstream pull failed: {e}");
                ConsumeStatus::Error
            }
        }
    }

    async fn shutdown(&self) {
        self.maintenance.shutdown().await;
        self.registry.close_all().await;
    }
}

/// A routing key must be a non-empty single path component within the
/// length bound.
fn valid_key(key: &str, max_len: usize) -> bool {
    !key.is_empty()
        && key.len() <= max_len
        && key != "."
        && key != ".."
        && !key.contains(['/', '\\'])
}

fn create_log_dir(path: &Path) -> std::io::Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(path)
}
