//! Pull handle over the upstream decoder

use crate::record::TraceRecord;

/// Outcome of pulling one record from a [`RecordSource`].
#[derive(Debug, Clone, PartialEq)]
pub enum Pull {
    /// One decoded record
    Record(TraceRecord),
    /// Nothing available right now, try again later
    Again,
    /// The feed is exhausted, no further records will arrive
    End,
}

/// A pull-based handle over the upstream record feed.
///
/// A sink drains the source one record at a time. `pull` may block waiting
/// for the next record; it is driven from the host framework's scheduling
/// loop, never from the sink's own background tasks.
pub trait RecordSource: Send + 'static {
    /// Pull the next record.
    ///
    /// # Errors
    ///
    /// Returns an error when the upstream feed failed in a way that is not
    /// [`Pull::Again`] or [`Pull::End`].
    fn pull(&mut self) -> Result<Pull, Box<dyn std::error::Error + Send + Sync>>;
}
