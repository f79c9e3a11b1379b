//! Windowed traffic statistics for a CAN bus.
//!
//! This crate turns a stream of `(identifier, dlc, timestamp)` observations
//! into per-identifier statistics over fixed-duration reporting windows:
//! frame rate, average inter-arrival gap ("jitter"), average payload size,
//! and an estimated bus load. It never touches a socket — frame input and
//! report output are trait seams ([`session::FrameSource`],
//! [`session::ReportSink`]) so the same aggregator runs against a live bus
//! adapter, a capture replay, or a test fixture.
//!
//! # Structure
//!
//! - [`load`] — pure bus-load arithmetic (per-frame bit cost, saturated
//!   load percentage)
//! - [`window`] — the [`StatsWindow`] accumulator and its immutable
//!   [`WindowReport`] snapshots
//! - [`session`] — the polling loop that drives a window from a source to
//!   a sink, with bounded waits and cooperative shutdown

pub mod load;
pub mod session;
pub mod window;

pub use load::{frame_bits, load_pct, FRAME_OVERHEAD_BITS};
pub use session::{run_session, FrameSource, ReportSink, SessionConfig, SessionStats, SourceEvent};
pub use window::{IdReport, StatsWindow, WindowReport};

/// Statistics-level failures. All of them are non-fatal by contract: the
/// offending observation is excluded and the session continues.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatsError {
    /// Observation claimed a payload longer than a classic CAN frame can
    /// carry. The observation is refused outright — recording a truncated
    /// version would corrupt the byte and load accumulators.
    #[error("invalid DLC {dlc} for ID {}", canwarden_types::format_id(*.id))]
    InvalidDlc { id: u32, dlc: u8 },
}
