//! Record-to-line rendering with fixed column layout
//!
//! One record becomes exactly one line:
//!
//! ```text
//! YYYY-MM-DD HH:MM:SS.NNNNNNNNN [LABEL         ] [file:line func()] [key:pid/tid]: <message>\n
//! ```
//!
//! Every unavailable field degrades to a documented fallback token instead
//! of dropping the line, so downstream scrapers keep their column alignment.

use chrono::DateTime;
use tracefan_sink::{Severity, TraceRecord};

/// Routing key field name.
pub(crate) const PROCNAME_FIELD: &str = "procname";

const LOGLEVEL_FIELD: &str = "loglevel";
const FILE_FIELD: &str = "file";
const LINE_FIELD: &str = "line";
const FUNC_FIELD: &str = "func";
const VPID_FIELD: &str = "vpid";
const VTID_FIELD: &str = "vtid";
const MSG_FIELD: &str = "msg";

/// Printed when the record carries no resolvable clock value. Same width as
/// a rendered timestamp.
pub const TIMESTAMP_UNAVAILABLE: &str = "?????????? ??:??:??.?????????";

/// Printed when the clock value normalizes to a pre-epoch instant or does
/// not convert to calendar time. Same width as a rendered timestamp.
pub const TIMESTAMP_INVALID: &str = "---------- --:--:--.---------";

/// Printed in place of `file:line func()` when any of the three is missing.
pub const LOCATION_UNAVAILABLE: &str = "Invalid entry";

/// Printed when the message byte sequence is missing or mistyped.
pub const MSG_UNAVAILABLE: &str = "Failed to retrieve msg";

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Decompose a signed nanosecond offset into whole seconds and a
/// non-negative nanosecond remainder. `None` means the instant lies before
/// the epoch and must render as [`TIMESTAMP_INVALID`].
fn split_timestamp(ts_ns: i64) -> Option<(u64, u32)> {
    let sec = ts_ns / NANOS_PER_SEC;
    let nsec = ts_ns % NANOS_PER_SEC;

    // All six sign/zero combinations of (sec, nsec), normalized so the
    // remainder is a non-negative magnitude and the sign is carried apart.
    let (is_negative, sec_abs, nsec_abs) = if sec >= 0 && nsec >= 0 {
        (false, sec, nsec)
    } else if sec > 0 && nsec < 0 {
        (false, sec - 1, NANOS_PER_SEC + nsec)
    } else if sec == 0 && nsec < 0 {
        (true, 0, -nsec)
    } else if sec < 0 && nsec > 0 {
        (true, -(sec + 1), NANOS_PER_SEC - nsec)
    } else if sec < 0 && nsec == 0 {
        (true, -sec, 0)
    } else {
        (true, -sec, -nsec)
    };

    if is_negative {
        return None;
    }
    Some((sec_abs as u64, nsec_abs as u32))
}

/// Render the record's clock value in the fixed 29-column layout.
#[must_use]
pub fn format_timestamp(timestamp_ns: Option<i64>) -> String {
    let Some(ts_ns) = timestamp_ns else {
        return TIMESTAMP_UNAVAILABLE.to_string();
    };
    let Some((sec, nsec)) = split_timestamp(ts_ns) else {
        return TIMESTAMP_INVALID.to_string();
    };
    let Ok(sec) = i64::try_from(sec) else {
        return TIMESTAMP_INVALID.to_string();
    };
    match DateTime::from_timestamp(sec, 0) {
        Some(datetime) => format!("{}.{nsec:09}", datetime.format("%Y-%m-%d %H:%M:%S")),
        None => TIMESTAMP_INVALID.to_string(),
    }
}

/// Render one record as its output line, `\n` included.
///
/// `key` is the already-validated routing key; it always prints in the
/// identifier block even when the process/thread ids are absent.
#[must_use]
pub fn render_line(key: &str, record: &TraceRecord) -> String {
    let timestamp = format_timestamp(record.timestamp_ns());

    let label = record
        .int_field(LOGLEVEL_FIELD)
        .map_or(Severity::Unknown, Severity::from_code)
        .label();

    let location = match (
        record.str_field(FILE_FIELD),
        record.int_field(LINE_FIELD),
        record.str_field(FUNC_FIELD),
    ) {
        (Some(file), Some(line), Some(func)) => format!("{file}:{line} {func}()"),
        _ => LOCATION_UNAVAILABLE.to_string(),
    };

    let identifiers = match (record.int_field(VPID_FIELD), record.int_field(VTID_FIELD)) {
        (Some(pid), Some(tid)) => format!("{key}:{pid}/{tid}"),
        _ => key.to_string(),
    };

    let message = record.byte_seq_field(MSG_FIELD).map_or_else(
        || MSG_UNAVAILABLE.to_string(),
        |bytes| String::from_utf8_lossy(bytes).into_owned(),
    );

    format!(
        "{timestamp} [{label:<width$}] [{location}] [{identifiers}]: {message}\n",
        width = Severity::LABEL_WIDTH
    )
}
