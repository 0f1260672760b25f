//! Thread-safe key-to-destination registry
//!
//! The registry is the sole owner of the key map. Sweeps snapshot the
//! entries under the registry lock, then operate on each destination under
//! its own lock, so slow disk I/O on one key never serializes writers on
//! unrelated keys.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::RotationPolicy;
use crate::error::{Error, Result};
use crate::metrics::SinkMetrics;
use crate::writer::LogWriter;

pub(crate) struct Registry {
    dir: PathBuf,
    policy: RotationPolicy,
    metrics: Arc<SinkMetrics>,
    inner: Mutex<Inner>,
}

struct Inner {
    map: HashMap<String, Arc<Mutex<LogWriter>>>,
    closed: bool,
}

impl Registry {
    pub(crate) fn new(dir: PathBuf, policy: RotationPolicy, metrics: Arc<SinkMetrics>) -> Self {
        Self {
            dir,
            policy,
            metrics,
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                closed: false,
            }),
        }
    }

    /// Return the destination for `key`, creating and inserting it on first
    /// use. A destination whose file cannot be opened is still inserted,
    /// unusable, so the open is not retried on every record.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] once [`close_all`](Self::close_all) has run.
    pub(crate) async fn resolve(&self, key: &str) -> Result<Arc<Mutex<LogWriter>>> {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return Err(Error::Closed);
        }
        if let Some(writer) = inner.map.get(key) {
            return Ok(writer.clone());
        }
        let writer = Arc::new(Mutex::new(
            LogWriter::open(key.to_string(), &self.dir, self.policy).await,
        ));
        inner.map.insert(key.to_string(), writer.clone());
        Ok(writer)
    }

    /// Append one formatted line to the destination for `key`, rotating
    /// immediately when the write pushes the file past the policy bound.
    pub(crate) async fn append(&self, key: &str, line: &str) -> Result<()> {
        let writer = self.resolve(key).await?;
        let mut writer = writer.lock().await;
        writer.write_line(line).await?;
        if writer.rotation_due() {
            writer.rotate().await?;
            self.metrics.rotation();
        }
        Ok(())
    }

    /// Flush every usable destination.
    pub(crate) async fn flush_all(&self) {
        for writer in self.entries().await {
            let mut writer = writer.lock().await;
            if let Err(e) = writer.flush().await {
                warn!("flush failed: {e}");
            }
        }
    }

    /// Rotation sweep: complete pending handle swaps, then rotate every
    /// entry (`force`) or only those past their size bound.
    pub(crate) async fn rotate_sweep(&self, force: bool) {
        for writer in self.entries().await {
            let mut writer = writer.lock().await;
            if !writer.is_usable() {
                continue;
            }
            if writer.rotation_pending() {
                if let Err(e) = writer.complete_rotation().await {
                    warn!("rotation swap failed: {e}");
                }
                continue;
            }
            if force || writer.rotation_due() {
                match writer.rotate().await {
                    Ok(()) => self.metrics.rotation(),
                    Err(e) => warn!("rotation failed: {e}"),
                }
            }
        }
    }

    /// Flush and close every destination and empty the map. Idempotent;
    /// any later [`resolve`](Self::resolve) fails fast.
    pub(crate) async fn close_all(&self) {
        let writers: Vec<_> = {
            let mut inner = self.inner.lock().await;
            if inner.closed {
                return;
            }
            inner.closed = true;
            inner.map.drain().map(|(_, writer)| writer).collect()
        };
        debug!("closing {} log destinations", writers.len());
        for writer in writers {
            let mut writer = writer.lock().await;
            if let Err(e) = writer.close().await {
                warn!("close failed: {e}");
            }
        }
    }

    async fn entries(&self) -> Vec<Arc<Mutex<LogWriter>>> {
        let inner = self.inner.lock().await;
        inner.map.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::tempdir;

    fn registry(dir: &std::path::Path, max_size: u64, max_files: u32) -> Registry {
        Registry::new(
            dir.to_path_buf(),
            RotationPolicy {
                max_file_size_bytes: max_size,
                max_retained_files: max_files,
            },
            Arc::new(SinkMetrics::default()),
        )
    }

    #[tokio::test]
    async fn resolve_returns_the_same_destination() {
        let dir = tempdir().unwrap();
        let registry = registry(dir.path(), 1024, 3);

        let first = registry.resolve("app").await.unwrap();
        let second = registry.resolve("app").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let other = registry.resolve("other").await.unwrap();
        assert!(!Arc::ptr_eq(&first, &other));
    }

    #[tokio::test]
    async fn close_all_fails_later_resolves_fast() {
        let dir = tempdir().unwrap();
        let registry = registry(dir.path(), 1024, 3);

        registry.append("app", "line\n").await.unwrap();
        registry.close_all().await;
        registry.close_all().await; // idempotent

        assert!(matches!(registry.resolve("app").await, Err(Error::Closed)));
        assert!(matches!(
            registry.append("app", "more\n").await,
            Err(Error::Closed)
        ));
        // the close flushed the buffered line
        assert_eq!(
            tokio::fs::read_to_string(dir.path().join("app")).await.unwrap(),
            "line\n"
        );
    }

    #[tokio::test]
    async fn append_rotates_once_past_the_bound() {
        let dir = tempdir().unwrap();
        let registry = registry(dir.path(), 10, 3);

        registry.append("app", "0123456789\n").await.unwrap();
        // the next sweep completes the swap instead of rotating again
        registry.rotate_sweep(false).await;
        registry.flush_all().await;

        assert_eq!(
            tokio::fs::read_to_string(dir.path().join("app.1")).await.unwrap(),
            "0123456789\n"
        );
        assert_eq!(
            tokio::fs::read_to_string(dir.path().join("app")).await.unwrap(),
            ""
        );
    }

    #[tokio::test]
    async fn forced_sweep_rotates_small_files() {
        let dir = tempdir().unwrap();
        let registry = registry(dir.path(), 1024, 3);

        registry.append("app", "tiny\n").await.unwrap();
        registry.rotate_sweep(true).await;

        assert_eq!(
            tokio::fs::read_to_string(dir.path().join("app.1")).await.unwrap(),
            "tiny\n"
        );
    }
}
