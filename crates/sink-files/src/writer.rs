//! One per-key log destination
//!
//! A [`LogWriter`] owns the append handle for a single routing key, tracks
//! the active file's size, and executes the rename-chain rotation:
//! `<key>.N` is shifted to `<key>.N+1` (deleting the overflow), the active
//! file becomes `<key>.1`, and the handle swap is deferred to the next
//! touch. A destination whose file cannot be opened stays registered but
//! unusable; writes to it are dropped by the caller instead of retried.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::warn;

use crate::config::RotationPolicy;
use crate::error::{Error, Result};

pub(crate) struct LogWriter {
    key: String,
    path: PathBuf,
    file: Option<BufWriter<File>>,
    policy: RotationPolicy,
    retained: u32,
    rotation_pending: bool,
    bytes_written: u64,
}

impl LogWriter {
    /// Open the destination for `key` under `dir`, probing pre-existing
    /// rotated files to recover the retained count. Open failure yields an
    /// unusable writer rather than an error.
    pub(crate) async fn open(key: String, dir: &Path, policy: RotationPolicy) -> Self {
        let path = dir.join(&key);
        let retained = probe_retained(&path, policy.max_retained_files).await;
        let (file, bytes_written) = match open_append(&path).await {
            Ok((file, len)) => (Some(file), len),
            Err(e) => {
                warn!("failed to open log file {}: {e}", path.display());
                (None, 0)
            }
        };
        Self {
            key,
            path,
            file,
            policy,
            retained,
            rotation_pending: false,
            bytes_written,
        }
    }

    /// Whether this destination can accept writes (possibly after
    /// completing a pending handle swap).
    pub(crate) fn is_usable(&self) -> bool {
        self.file.is_some()
    }

    /// Append one formatted line, completing a pending rotation first.
    ///
    /// # Errors
    ///
    /// [`Error::Unusable`] when the destination has no handle (the record
    /// is dropped by the caller); [`Error::Io`] on a write failure.
    pub(crate) async fn write_line(&mut self, line: &str) -> Result<()> {
        if self.rotation_pending {
            self.complete_rotation().await?;
        }
        let Some(file) = self.file.as_mut() else {
            return Err(Error::Unusable(self.key.clone()));
        };
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| Error::Io("failed to append to log file", e))?;
        self.bytes_written += line.len() as u64;
        Ok(())
    }

    /// Flush buffered output to the operating system.
    pub(crate) async fn flush(&mut self) -> Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.flush()
                .await
                .map_err(|e| Error::Io("failed to flush log file", e))?;
        }
        Ok(())
    }

    /// Whether the active file has grown past the policy bound. A pending
    /// rotation masks the check so a file is never rotated twice.
    pub(crate) fn rotation_due(&self) -> bool {
        !self.rotation_pending && self.bytes_written > self.policy.max_file_size_bytes
    }

    pub(crate) fn rotation_pending(&self) -> bool {
        self.rotation_pending
    }

    /// Execute the rename chain and mark the handle swap pending. The old
    /// handle keeps pointing at the rotated file until the next touch
    /// completes the swap.
    pub(crate) async fn rotate(&mut self) -> Result<()> {
        if self.rotation_pending || !self.is_usable() {
            return Ok(());
        }
        // The rotated file must carry everything written so far.
        self.flush().await?;

        let max = self.policy.max_retained_files;
        let mut suffix = self.retained.min(max);
        while suffix >= 1 {
            let src = rotated_path(&self.path, suffix);
            if suffix >= max {
                match fs::remove_file(&src).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => {
                        return Err(Error::Rotation(format!(
                            "failed to remove {}: {e}",
                            src.display()
                        )));
                    }
                }
            } else {
                let dst = rotated_path(&self.path, suffix + 1);
                match fs::rename(&src, &dst).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => {
                        return Err(Error::Rotation(format!(
                            "failed to rename {}: {e}",
                            src.display()
                        )));
                    }
                }
            }
            suffix -= 1;
        }

        let first = rotated_path(&self.path, 1);
        fs::rename(&self.path, &first).await.map_err(|e| {
            Error::Rotation(format!("failed to rename {}: {e}", self.path.display()))
        })?;

        self.retained = (self.retained + 1).min(max);
        self.rotation_pending = true;
        Ok(())
    }

    /// Close the stale handle and open a fresh active file. On failure the
    /// destination becomes unusable and the pending flag is cleared so the
    /// open is not retried on every record.
    pub(crate) async fn complete_rotation(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            // Handle still points at the rotated file; nothing unflushed
            // can remain, flush defensively and let drop close it.
            let _ = file.flush().await;
        }
        self.rotation_pending = false;
        match open_append(&self.path).await {
            Ok((file, len)) => {
                self.file = Some(file);
                self.bytes_written = len;
                Ok(())
            }
            Err(e) => {
                warn!(
                    "failed to reopen log file {} after rotation: {e}",
                    self.path.display()
                );
                Err(Error::Io("failed to reopen log file after rotation", e))
            }
        }
    }

    /// Flush and drop the handle. The writer is unusable afterwards.
    pub(crate) async fn close(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()
                .await
                .map_err(|e| Error::Io("failed to flush log file on close", e))?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn retained(&self) -> u32 {
        self.retained
    }

    #[cfg(test)]
    pub(crate) fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

async fn open_append(path: &Path) -> std::io::Result<(BufWriter<File>, u64)> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    let len = file.metadata().await?.len();
    Ok((BufWriter::new(file), len))
}

fn rotated_path(active: &Path, suffix: u32) -> PathBuf {
    let mut path = OsString::from(active.as_os_str());
    path.push(format!(".{suffix}"));
    PathBuf::from(path)
}

/// Count contiguous `<key>.1 .. <key>.N` rotation files already on disk.
async fn probe_retained(active: &Path, max_retained: u32) -> u32 {
    let mut retained = 0;
    for suffix in 1..=max_retained {
        match fs::try_exists(rotated_path(active, suffix)).await {
            Ok(true) => retained = suffix,
            _ => break,
        }
    }
    retained
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::tempdir;

    fn policy(max_size: u64, max_files: u32) -> RotationPolicy {
        RotationPolicy {
            max_file_size_bytes: max_size,
            max_retained_files: max_files,
        }
    }

    async fn read(path: &Path) -> String {
        fs::read_to_string(path).await.unwrap()
    }

    #[tokio::test]
    async fn writes_are_buffered_until_flush() {
        let dir = tempdir().unwrap();
        let mut writer = LogWriter::open("app".to_string(), dir.path(), policy(1024, 3)).await;

        writer.write_line("one\n").await.unwrap();
        assert_eq!(writer.bytes_written(), 4);

        writer.flush().await.unwrap();
        assert_eq!(read(&dir.path().join("app")).await, "one\n");
    }

    #[tokio::test]
    async fn open_recovers_size_and_retained_count() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("app"), "existing\n").await.unwrap();
        fs::write(dir.path().join("app.1"), "old1\n").await.unwrap();
        fs::write(dir.path().join("app.2"), "old2\n").await.unwrap();

        let writer = LogWriter::open("app".to_string(), dir.path(), policy(1024, 5)).await;
        assert_eq!(writer.bytes_written(), 9);
        assert_eq!(writer.retained(), 2);
    }

    #[tokio::test]
    async fn probe_ignores_gaps_and_respects_bound() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("app.1"), "a").await.unwrap();
        fs::write(dir.path().join("app.3"), "c").await.unwrap();

        let writer = LogWriter::open("app".to_string(), dir.path(), policy(1024, 5)).await;
        assert_eq!(writer.retained(), 1);

        let writer = LogWriter::open("gone".to_string(), dir.path(), policy(1024, 5)).await;
        assert_eq!(writer.retained(), 0);
    }

    #[tokio::test]
    async fn rotation_defers_reopen_to_next_write() {
        let dir = tempdir().unwrap();
        let mut writer = LogWriter::open("app".to_string(), dir.path(), policy(8, 3)).await;

        writer.write_line("0123456789\n").await.unwrap();
        assert!(writer.rotation_due());

        writer.rotate().await.unwrap();
        assert!(writer.rotation_pending());
        assert!(!writer.rotation_due());
        assert_eq!(read(&dir.path().join("app.1")).await, "0123456789\n");
        assert!(!fs::try_exists(dir.path().join("app")).await.unwrap());

        // next write completes the swap and lands in a fresh active file
        writer.write_line("after\n").await.unwrap();
        assert!(!writer.rotation_pending());
        assert_eq!(writer.bytes_written(), 6);
        writer.flush().await.unwrap();
        assert_eq!(read(&dir.path().join("app")).await, "after\n");
        assert_eq!(read(&dir.path().join("app.1")).await, "0123456789\n");
    }

    #[tokio::test]
    async fn rename_chain_evicts_oldest_at_bound() {
        let dir = tempdir().unwrap();
        let mut writer = LogWriter::open("app".to_string(), dir.path(), policy(1, 2)).await;

        for generation in 0..4 {
            writer.write_line(&format!("gen {generation}\n")).await.unwrap();
            writer.rotate().await.unwrap();
        }

        // bounded: exactly max_retained_files rotated files remain
        assert_eq!(writer.retained(), 2);
        assert_eq!(read(&dir.path().join("app.1")).await, "gen 3\n");
        assert_eq!(read(&dir.path().join("app.2")).await, "gen 2\n");
        assert!(!fs::try_exists(dir.path().join("app.3")).await.unwrap());
        // oldest generations were deleted by the chain overflow
        assert!(!fs::try_exists(dir.path().join("app")).await.unwrap());
    }

    #[tokio::test]
    async fn rotate_is_skipped_while_pending() {
        let dir = tempdir().unwrap();
        let mut writer = LogWriter::open("app".to_string(), dir.path(), policy(1, 3)).await;

        writer.write_line("first\n").await.unwrap();
        writer.rotate().await.unwrap();
        assert_eq!(writer.retained(), 1);

        // a second rotate before the swap must not shift the chain again
        writer.rotate().await.unwrap();
        assert_eq!(writer.retained(), 1);
        assert_eq!(read(&dir.path().join("app.1")).await, "first\n");
        assert!(!fs::try_exists(dir.path().join("app.2")).await.unwrap());
    }

    #[tokio::test]
    async fn unusable_writer_drops_without_io() {
        let dir = tempdir().unwrap();
        // a directory in place of the log file makes the open fail
        fs::create_dir(dir.path().join("app")).await.unwrap();

        let mut writer = LogWriter::open("app".to_string(), dir.path(), policy(1024, 3)).await;
        assert!(!writer.is_usable());
        assert!(matches!(
            writer.write_line("x\n").await,
            Err(Error::Unusable(_))
        ));
        // flush and rotate are no-ops, not errors
        writer.flush().await.unwrap();
        writer.rotate().await.unwrap();
    }

    #[tokio::test]
    async fn close_flushes_and_disables() {
        let dir = tempdir().unwrap();
        let mut writer = LogWriter::open("app".to_string(), dir.path(), policy(1024, 3)).await;

        writer.write_line("line\n").await.unwrap();
        writer.close().await.unwrap();
        assert!(!writer.is_usable());
        assert_eq!(read(&dir.path().join("app")).await, "line\n");
        assert!(matches!(
            writer.write_line("more\n").await,
            Err(Error::Unusable(_))
        ));
    }
}
