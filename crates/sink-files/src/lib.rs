//! Per-source rotating file sink for decoded trace records
//!
//! This crate is the persistence half of a trace-processing pipeline. It
//! consumes already-decoded structured records and fans them out to one
//! rotating log file per routing key:
//! - Lazily-created destinations under `<log_root>/<host_id>/<key>`
//! - Size-triggered rename-chain rotation with bounded retention
//! - A background maintenance task for flushing, forced rotation, and a
//!   keepalive deadman's switch
//! - Fixed-column line rendering with documented fallback tokens

#![warn(missing_docs, unreachable_pub)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod formatter;
mod maintenance;
mod metrics;
mod registry;
mod sink;
mod writer;

pub use config::{
    DEFAULT_MAX_FILE_SIZE_BYTES, DEFAULT_MAX_KEY_LEN, DEFAULT_MAX_RETAINED_FILES, FileSinkConfig,
    FileSinkConfigBuilder, RotationPolicy,
};
pub use error::{Error, Result};
pub use formatter::{
    LOCATION_UNAVAILABLE, MSG_UNAVAILABLE, TIMESTAMP_INVALID, TIMESTAMP_UNAVAILABLE,
    format_timestamp, render_line,
};
pub use metrics::MetricsSnapshot;
pub use sink::FileSink;
