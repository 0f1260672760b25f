//! File sink configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default maximum size of the active file before rotation (10 MiB).
pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;

/// Default number of rotated files kept per key.
pub const DEFAULT_MAX_RETAINED_FILES: u32 = 10;

/// Default upper bound on routing key length; longer keys drop the record.
pub const DEFAULT_MAX_KEY_LEN: usize = 128;

/// Size-based rotation policy, immutable per destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationPolicy {
    /// Rotation is due once the active file grows past this many bytes.
    pub max_file_size_bytes: u64,

    /// How many rotated files (`<key>.1` .. `<key>.N`) to keep; the oldest
    /// is deleted when the chain overflows.
    pub max_retained_files: u32,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            max_retained_files: DEFAULT_MAX_RETAINED_FILES,
        }
    }
}

/// Configuration for [`FileSink`](crate::FileSink).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSinkConfig {
    /// Root directory for all log output.
    pub log_root: PathBuf,

    /// Host identifier; log files live under `<log_root>/<host_id>/`.
    pub host_id: String,

    /// Rotation policy applied to every destination.
    pub rotation: RotationPolicy,

    /// Maximum maintenance ticks without a keepalive before the process is
    /// terminated. `0` disables the watchdog.
    pub keepalive_deadline: u64,

    /// Period of the background maintenance tick.
    pub tick_interval: Duration,

    /// Maximum routing key length; records with longer keys are dropped.
    pub max_key_len: usize,
}

impl Default for FileSinkConfig {
    fn default() -> Self {
        Self {
            log_root: PathBuf::from("/var/log/traces"),
            host_id: "localhost".to_string(),
            rotation: RotationPolicy::default(),
            keepalive_deadline: 0,
            tick_interval: Duration::from_secs(1),
            max_key_len: DEFAULT_MAX_KEY_LEN,
        }
    }
}

impl FileSinkConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for a zero rotation bound, a zero
    /// tick interval, or an empty/path-like host identifier.
    pub fn validate(&self) -> Result<()> {
        if self.rotation.max_file_size_bytes == 0 {
            return Err(Error::Configuration(
                "max_file_size_bytes must be non-zero".to_string(),
            ));
        }
        if self.rotation.max_retained_files == 0 {
            return Err(Error::Configuration(
                "max_retained_files must be non-zero".to_string(),
            ));
        }
        if self.tick_interval.is_zero() {
            return Err(Error::Configuration(
                "tick_interval must be non-zero".to_string(),
            ));
        }
        if self.host_id.is_empty() || self.host_id.contains('/') {
            return Err(Error::Configuration(
                "host_id must be a non-empty single path component".to_string(),
            ));
        }
        if self.max_key_len == 0 {
            return Err(Error::Configuration(
                "max_key_len must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`FileSinkConfig`].
#[derive(Debug, Clone, Default)]
pub struct FileSinkConfigBuilder {
    config: FileSinkConfig,
}

impl FileSinkConfigBuilder {
    /// Create a builder seeded with the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the log root directory.
    #[must_use]
    pub fn with_log_root(mut self, log_root: impl Into<PathBuf>) -> Self {
        self.config.log_root = log_root.into();
        self
    }

    /// Set the host identifier.
    #[must_use]
    pub fn with_host_id(mut self, host_id: impl Into<String>) -> Self {
        self.config.host_id = host_id.into();
        self
    }

    /// Set the rotation policy.
    #[must_use]
    pub fn with_rotation(mut self, rotation: RotationPolicy) -> Self {
        self.config.rotation = rotation;
        self
    }

    /// Set the keepalive deadline in ticks (`0` disables the watchdog).
    #[must_use]
    pub fn with_keepalive_deadline(mut self, ticks: u64) -> Self {
        self.config.keepalive_deadline = ticks;
        self
    }

    /// Set the maintenance tick period.
    #[must_use]
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.config.tick_interval = tick_interval;
        self
    }

    /// Set the maximum routing key length.
    #[must_use]
    pub fn with_max_key_len(mut self, max_key_len: usize) -> Self {
        self.config.max_key_len = max_key_len;
        self
    }

    /// Finish the builder.
    #[must_use]
    pub fn build(self) -> FileSinkConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_policy() {
        let config = FileSinkConfig::default();
        assert_eq!(config.rotation.max_file_size_bytes, 10 * 1024 * 1024);
        assert_eq!(config.rotation.max_retained_files, 10);
        assert_eq!(config.keepalive_deadline, 0);
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_eq!(config.max_key_len, 128);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_overrides_fields() {
        let config = FileSinkConfigBuilder::new()
            .with_log_root("/tmp/logs")
            .with_host_id("node-7")
            .with_rotation(RotationPolicy {
                max_file_size_bytes: 512,
                max_retained_files: 3,
            })
            .with_keepalive_deadline(5)
            .with_tick_interval(Duration::from_millis(100))
            .with_max_key_len(32)
            .build();

        assert_eq!(config.log_root, PathBuf::from("/tmp/logs"));
        assert_eq!(config.host_id, "node-7");
        assert_eq!(config.rotation.max_file_size_bytes, 512);
        assert_eq!(config.rotation.max_retained_files, 3);
        assert_eq!(config.keepalive_deadline, 5);
        assert_eq!(config.tick_interval, Duration::from_millis(100));
        assert_eq!(config.max_key_len, 32);
    }

    #[test]
    fn validation_rejects_zero_bounds() {
        let mut config = FileSinkConfig::default();
        config.rotation.max_file_size_bytes = 0;
        assert!(config.validate().is_err());

        let mut config = FileSinkConfig::default();
        config.rotation.max_retained_files = 0;
        assert!(config.validate().is_err());

        let mut config = FileSinkConfig::default();
        config.tick_interval = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = FileSinkConfig::default();
        config.max_key_len = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_bad_host_id() {
        let mut config = FileSinkConfig::default();
        config.host_id = String::new();
        assert!(config.validate().is_err());

        let mut config = FileSinkConfig::default();
        config.host_id = "a/b".to_string();
        assert!(config.validate().is_err());
    }
}
