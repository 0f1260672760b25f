//! Record model and sink abstraction for decoded trace feeds
//!
//! This crate defines the boundary between an upstream trace decoder and a
//! downstream sink:
//! - [`TraceRecord`] - an owned structured record with typed, failure-safe
//!   field access
//! - [`Severity`] - the fixed severity vocabulary and its label table
//! - [`RecordSource`] - the pull handle a sink drains one record at a time
//! - [`Sink`] - the minimal lifecycle a host framework drives

#![warn(missing_docs, unreachable_pub)]
#![forbid(unsafe_code)]

mod record;
mod sink;
mod source;

pub use record::{FieldValue, Severity, TraceRecord};
pub use sink::{ConsumeStatus, Sink};
pub use source::{Pull, RecordSource};
