//! Sink lifecycle driven by the host framework

use async_trait::async_trait;

use crate::source::RecordSource;

/// Status reported back to the host after one unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeStatus {
    /// One record was pulled and processed
    Ok,
    /// The upstream has nothing right now; reschedule later
    Again,
    /// The upstream is exhausted; the host should stop driving this sink
    End,
    /// The sink cannot make progress (no source, failed upstream, or shut
    /// down)
    Error,
}

/// Trait for sinks driven one record at a time by a host framework.
///
/// Construction with a configuration is left to the implementor; the host
/// then attaches the upstream feed once, calls [`consume_one`](Sink::consume_one)
/// repeatedly, and shuts the sink down when done.
#[async_trait]
pub trait Sink: Send + Sync + 'static {
    /// Attach the upstream feed. Called once when the source is connected.
    ///
    /// # Errors
    ///
    /// Returns an error if a source is already attached.
    async fn attach_source(
        &self,
        source: Box<dyn RecordSource>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Pull and process one record, reporting how the host should proceed.
    async fn consume_one(&self) -> ConsumeStatus;

    /// Shut the sink down: stop background work, then flush and close every
    /// destination exactly once. Further consumption fails fast.
    async fn shutdown(&self);
}
