//! Frame sources for capture replay.
//!
//! The only source shipped here reads `candump -L` logs, one frame per
//! line:
//!
//! ```text
//! (1699999999.123456) vcan0 123#DEADBEEF
//! (1699999999.133456) vcan0 18FF50E5#0102030405060708
//! ```
//!
//! An 8-hex-digit identifier field marks an extended (29-bit) frame.
//! Remote frames (`#R`) and CAN FD frames (`##`) carry no classic payload
//! and are skipped. A live SocketCAN source is a collaborator concern and
//! deliberately absent.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, warn};

use canwarden_stats::session::{FrameSource, SourceEvent};
use canwarden_types::{Observation, MAX_CAN_ID};

/// Replays a candump log. The session clock follows the capture
/// timestamps, so window boundaries land where they did on the live bus
/// regardless of replay speed.
pub struct CandumpSource<R> {
    reader: R,
    /// Timestamp of the last emitted frame; what [`FrameSource::now`]
    /// reports.
    cursor: f64,
    line_no: u64,
    /// Bus name seen on the first parsed line, if any.
    bus: Option<String>,
}

impl CandumpSource<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open capture {}", path.display()))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl CandumpSource<io::StdinLock<'static>> {
    pub fn stdin() -> Self {
        Self::new(io::stdin().lock())
    }
}

impl<R: BufRead> CandumpSource<R> {
    pub fn new(reader: R) -> Self {
        CandumpSource {
            reader,
            cursor: 0.0,
            line_no: 0,
            bus: None,
        }
    }

    /// Bus name from the capture, once at least one frame has parsed.
    pub fn bus(&self) -> Option<&str> {
        self.bus.as_deref()
    }
}

impl<R: BufRead> FrameSource for CandumpSource<R> {
    fn recv(&mut self, _timeout: Duration) -> Result<SourceEvent> {
        // A capture never makes the session wait: the next line is either
        // there or the stream is done. (Reading piped stdin may block past
        // the timeout; acceptable for an offline tool.)
        loop {
            let mut line = String::new();
            let n = self
                .reader
                .read_line(&mut line)
                .context("failed to read capture line")?;
            if n == 0 {
                return Ok(SourceEvent::Closed);
            }
            self.line_no += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match parse_candump_line(trimmed) {
                Some((obs, bus)) => {
                    if self.bus.is_none() {
                        self.bus = Some(bus.to_string());
                    }
                    self.cursor = obs.timestamp;
                    return Ok(SourceEvent::Frame(obs));
                }
                None => {
                    if is_skippable_frame(trimmed) {
                        debug!("line {}: skipping non-classic frame", self.line_no);
                    } else {
                        warn!("line {}: unparseable capture line: {trimmed}", self.line_no);
                    }
                }
            }
        }
    }

    fn now(&self) -> f64 {
        self.cursor
    }
}

/// Parse one `candump -L` line into an observation plus the bus name.
///
/// Returns `None` for anything that is not a classic data frame. Note that
/// a crafted log can claim more than 8 payload bytes; the DLC is carried
/// as written and the aggregator refuses it downstream.
pub fn parse_candump_line(line: &str) -> Option<(Observation, &str)> {
    let mut parts = line.split_whitespace();

    let ts = parts
        .next()?
        .strip_prefix('(')?
        .strip_suffix(')')?
        .parse::<f64>()
        .ok()?;
    let bus = parts.next()?;
    let frame = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let (id_field, data) = frame.split_once('#')?;
    // "##" marks CAN FD, "R" a remote frame: neither is classic payload.
    if data.starts_with('#') || data.starts_with('R') {
        return None;
    }

    let id = u32::from_str_radix(id_field, 16).ok()?;
    if id > MAX_CAN_ID {
        return None;
    }
    let extended = id_field.len() == 8;

    if data.len() % 2 != 0 || !data.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let dlc = (data.len() / 2) as u8;

    Some((Observation::new(id, dlc, ts, extended), bus))
}

fn is_skippable_frame(line: &str) -> bool {
    line.contains("##") || line.contains("#R")
}
