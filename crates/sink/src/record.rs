//! Structured record type and typed field access

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A decoded trace record: an optional clock value plus named fields.
///
/// Records arrive already parsed from the upstream decoder. Field access is
/// failure-safe: a missing field or a field of the wrong type yields `None`,
/// never an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Signed nanoseconds from the Unix epoch, `None` when the upstream
    /// clock could not be resolved.
    timestamp_ns: Option<i64>,
    /// Named payload and context fields.
    fields: HashMap<String, FieldValue>,
}

/// A single record field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// UTF-8 string field
    Str(String),
    /// Signed integer field
    Int(i64),
    /// Sequence of byte-sized code units (UTF-8/ASCII text carried as bytes)
    ByteSeq(Bytes),
}

impl TraceRecord {
    /// Create an empty record with no clock value and no fields.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style method for setting the clock value.
    #[must_use]
    pub fn with_timestamp_ns(mut self, timestamp_ns: i64) -> Self {
        self.timestamp_ns = Some(timestamp_ns);
        self
    }

    /// Builder-style method for adding a field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Builder-style method for adding a string field.
    #[must_use]
    pub fn with_str_field(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_field(name, FieldValue::Str(value.into()))
    }

    /// Builder-style method for adding an integer field.
    #[must_use]
    pub fn with_int_field(self, name: impl Into<String>, value: i64) -> Self {
        self.with_field(name, FieldValue::Int(value))
    }

    /// Builder-style method for adding a byte-sequence field.
    #[must_use]
    pub fn with_byte_seq_field(self, name: impl Into<String>, value: impl Into<Bytes>) -> Self {
        self.with_field(name, FieldValue::ByteSeq(value.into()))
    }

    /// The record's clock value in signed nanoseconds from the Unix epoch.
    #[must_use]
    pub fn timestamp_ns(&self) -> Option<i64> {
        self.timestamp_ns
    }

    /// The named string field, or `None` if absent or not a string.
    #[must_use]
    pub fn str_field(&self, name: &str) -> Option<&str> {
        match self.fields.get(name) {
            Some(FieldValue::Str(value)) => Some(value),
            _ => None,
        }
    }

    /// The named integer field, or `None` if absent or not an integer.
    #[must_use]
    pub fn int_field(&self, name: &str) -> Option<i64> {
        match self.fields.get(name) {
            Some(FieldValue::Int(value)) => Some(*value),
            _ => None,
        }
    }

    /// The named byte-sequence field, or `None` if absent or not a sequence.
    #[must_use]
    pub fn byte_seq_field(&self, name: &str) -> Option<&[u8]> {
        match self.fields.get(name) {
            Some(FieldValue::ByteSeq(value)) => Some(value),
            _ => None,
        }
    }
}

/// Record severity, following the LTTng loglevel numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// System is unusable
    Emerg,
    /// Action must be taken immediately
    Alert,
    /// Critical conditions
    Crit,
    /// Error conditions
    Err,
    /// Warning conditions
    Warning,
    /// Normal but significant condition
    Notice,
    /// Informational message
    Info,
    /// Debug information with system-level scope
    DebugSystem,
    /// Debug information with program-level scope
    DebugProgram,
    /// Debug information with process-level scope
    DebugProcess,
    /// Debug information with module-level scope
    DebugModule,
    /// Debug information with unit-level scope
    DebugUnit,
    /// Debug information with function-level scope
    DebugFunction,
    /// Debug information with line-level scope
    DebugLine,
    /// Debug-level message
    Debug,
    /// Absent or unrecognized severity code
    Unknown,
}

impl Severity {
    /// Width of the longest label, for padded column output.
    pub const LABEL_WIDTH: usize = 14;

    /// Map a raw severity code to its severity, [`Severity::Unknown`] for
    /// anything outside the table.
    #[must_use]
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Emerg,
            1 => Self::Alert,
            2 => Self::Crit,
            3 => Self::Err,
            4 => Self::Warning,
            5 => Self::Notice,
            6 => Self::Info,
            7 => Self::DebugSystem,
            8 => Self::DebugProgram,
            9 => Self::DebugProcess,
            10 => Self::DebugModule,
            11 => Self::DebugUnit,
            12 => Self::DebugFunction,
            13 => Self::DebugLine,
            14 => Self::Debug,
            _ => Self::Unknown,
        }
    }

    /// The fixed human-readable label for this severity.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Emerg => "EMERG",
            Self::Alert => "ALERT",
            Self::Crit => "CRIT",
            Self::Err => "ERR",
            Self::Warning => "WARNING",
            Self::Notice => "NOTICE",
            Self::Info => "INFO",
            Self::DebugSystem => "DEBUG_SYSTEM",
            Self::DebugProgram => "DEBUG_PROGRAM",
            Self::DebugProcess => "DEBUG_PROCESS",
            Self::DebugModule => "DEBUG_MODULE",
            Self::DebugUnit => "DEBUG_UNIT",
            Self::DebugFunction => "DEBUG_FUNCTION",
            Self::DebugLine => "DEBUG_LINE",
            Self::Debug => "DEBUG",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.label())
    }
}
