//! The analysis session: a single-threaded polling loop that drives a
//! [`StatsWindow`] from a frame source to a report sink.
//!
//! The loop alternates between a short, bounded wait for the next
//! observation and a cheap window-boundary check, so reporting cadence is
//! independent of traffic volume and shutdown is observed between
//! iterations. The window state is owned exclusively by the loop — no
//! locking anywhere in the aggregator.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use log::{debug, info, warn};

use canwarden_types::Observation;

use crate::window::{StatsWindow, WindowReport};

/// Default bounded-receive timeout, matching a 20ms live-bus poll.
pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_millis(20);

/// One poll result from a [`FrameSource`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SourceEvent {
    /// A frame arrived within the timeout.
    Frame(Observation),
    /// The timeout elapsed with no frame. The session still runs its
    /// window-boundary check.
    Idle,
    /// The source has no more frames (end of capture, closed handle).
    Closed,
}

/// Where observations come from. Implemented by capture replays and test
/// fixtures here; a live-bus adapter is a collaborator concern.
pub trait FrameSource {
    /// Wait at most `timeout` for the next observation.
    fn recv(&mut self, timeout: Duration) -> Result<SourceEvent>;

    /// The session clock, in seconds. Defaults to wall-clock time; replay
    /// sources override this with their capture cursor so windows follow
    /// capture time instead of replay speed.
    fn now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

/// Where window reports go: console, CSV, a test buffer.
pub trait ReportSink {
    fn emit(&mut self, report: &WindowReport) -> Result<()>;
}

/// Parameters for one analysis session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Reporting window duration in seconds. Must be positive.
    pub window_s: f64,
    /// Nominal bus bitrate in bits per second, for load estimation.
    pub bitrate_bps: u32,
    /// Bounded wait per polling iteration.
    pub recv_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            window_s: 1.0,
            bitrate_bps: 500_000,
            recv_timeout: DEFAULT_RECV_TIMEOUT,
        }
    }
}

/// Counters accumulated over a whole session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Frames recorded into windows.
    pub frames: u64,
    /// Frames refused for an oversized DLC (warned and skipped).
    pub invalid_dlc: u64,
    /// Window reports emitted, including a final partial flush.
    pub windows: u64,
}

/// Run the polling loop until the source closes or `stop` is raised.
///
/// The first window opens at the first observation's timestamp, not at
/// session start: a replay clock sits at zero until a frame has been
/// read, and anchoring the window there would report one giant bogus
/// window covering the whole gap up to the capture's epoch-scale
/// timestamps.
///
/// A malformed observation (oversized DLC) is logged and skipped — it
/// never terminates the session. On exit the in-progress window is flushed
/// as a final report if it saw any frames, and explicitly discarded (with
/// a log line) if it did not; either way it is not silently lost.
pub fn run_session<S, K>(
    source: &mut S,
    sink: &mut K,
    cfg: &SessionConfig,
    stop: &AtomicBool,
) -> Result<SessionStats>
where
    S: FrameSource,
    K: ReportSink,
{
    anyhow::ensure!(cfg.window_s > 0.0, "window duration must be positive");

    let mut stats = SessionStats::default();
    let mut window: Option<StatsWindow> = None;

    loop {
        if stop.load(Ordering::Relaxed) {
            info!("stop requested; ending session");
            break;
        }

        let closed = match source.recv(cfg.recv_timeout)? {
            SourceEvent::Frame(obs) => {
                let now = source.now();
                let window = window.get_or_insert_with(|| StatsWindow::new(now));
                match window.ingest(&obs, now) {
                    Ok(()) => stats.frames += 1,
                    Err(e) => {
                        warn!("{e}; frame skipped");
                        stats.invalid_dlc += 1;
                    }
                }
                false
            }
            SourceEvent::Idle => false,
            SourceEvent::Closed => true,
        };

        // Boundary check runs every cycle, frame or not, so windows close
        // even while the bus is silent.
        if let Some(window) = window.as_mut() {
            if let Some(report) = window.maybe_roll(source.now(), cfg.window_s, cfg.bitrate_bps) {
                sink.emit(&report).context("failed to emit window report")?;
                stats.windows += 1;
            }
        }

        if closed {
            debug!("frame source closed");
            break;
        }
    }

    match window {
        Some(mut window) if window.pending_frames() > 0 => {
            let report = window.force_roll(source.now(), cfg.bitrate_bps);
            sink.emit(&report)
                .context("failed to emit final window report")?;
            stats.windows += 1;
        }
        _ => debug!("no partial window to flush"),
    }

    Ok(stats)
}
