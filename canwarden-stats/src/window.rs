//! The per-window statistics accumulator.

use std::collections::BTreeMap;
use std::mem;

use canwarden_types::{Observation, CAN_MAX_DLC};

use crate::load::{frame_bits, load_pct};
use crate::StatsError;

/// Floor for window duration when computing rates, so a degenerate
/// (near-instant) rollover never divides by zero.
const MIN_ELAPSED_S: f64 = 1e-9;

/// Mutable per-identifier record, scoped to a single window.
///
/// Invariant: `gap_count == count.saturating_sub(1)` — every frame after
/// the first contributes exactly one inter-arrival gap.
#[derive(Debug, Default)]
struct IdRecord {
    count: u64,
    total_bytes: u64,
    last_ts: Option<f64>,
    gap_sum_ms: f64,
    gap_count: u64,
}

/// Statistics for one identifier over one closed window.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct IdReport {
    pub id: u32,
    /// Frames per second over the actual window duration.
    pub fps: f64,
    /// Average inter-arrival gap in milliseconds; 0.0 when fewer than two
    /// frames were seen.
    pub avg_jitter_ms: f64,
    /// Average payload length in bytes.
    pub avg_len_bytes: f64,
    pub count: u64,
}

/// Immutable snapshot produced at window rollover. Consumed once by a
/// sink, never mutated.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct WindowReport {
    /// When the window opened, in the observation clock.
    pub window_start: f64,
    /// Actual elapsed duration — may exceed the nominal window length when
    /// polling was slow.
    pub elapsed_s: f64,
    /// Estimated bus load over the window, saturated at 100.
    pub bus_load_pct: f64,
    /// Per-identifier statistics, ascending by identifier.
    pub ids: Vec<IdReport>,
}

impl WindowReport {
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Total frames across all identifiers in this window.
    pub fn total_frames(&self) -> u64 {
        self.ids.iter().map(|r| r.count).sum()
    }
}

/// Accumulates observations into per-identifier records and rolls them up
/// into a [`WindowReport`] when the window expires.
///
/// Owned by exactly one polling loop; no interior synchronization. Each
/// window is a clean slate — records are taken out wholesale at rollover,
/// never cleared in place, so load, fps, and jitter reflect only that
/// window.
#[derive(Debug)]
pub struct StatsWindow {
    window_start: f64,
    bits_in_window: u64,
    by_id: BTreeMap<u32, IdRecord>,
}

impl StatsWindow {
    pub fn new(start: f64) -> Self {
        StatsWindow {
            window_start: start,
            bits_in_window: 0,
            by_id: BTreeMap::new(),
        }
    }

    /// Record one observation.
    ///
    /// An observation with a DLC above the classic-frame maximum is refused
    /// with [`StatsError::InvalidDlc`] and leaves every accumulator
    /// untouched; the caller decides whether to warn. Everything else
    /// updates the identifier's counters, its inter-arrival gap sum, and
    /// the window-wide bit accumulator.
    pub fn ingest(&mut self, obs: &Observation, now: f64) -> Result<(), StatsError> {
        if obs.dlc > CAN_MAX_DLC {
            return Err(StatsError::InvalidDlc {
                id: obs.id,
                dlc: obs.dlc,
            });
        }

        let rec = self.by_id.entry(obs.id).or_default();
        rec.count += 1;
        rec.total_bytes += u64::from(obs.dlc);
        if let Some(last) = rec.last_ts {
            rec.gap_sum_ms += (now - last) * 1000.0;
            rec.gap_count += 1;
        }
        rec.last_ts = Some(now);

        self.bits_in_window += u64::from(frame_bits(obs.dlc));
        Ok(())
    }

    /// Close the window if it has expired, returning its report.
    ///
    /// Cheap: called on every polling cycle whether or not a frame
    /// arrived, so windows close even during bus silence. An empty window
    /// still produces a report (zero identifiers, zero load).
    pub fn maybe_roll(&mut self, now: f64, window_s: f64, bitrate_bps: u32) -> Option<WindowReport> {
        if now - self.window_start >= window_s {
            Some(self.roll(now, bitrate_bps))
        } else {
            None
        }
    }

    /// Close the window unconditionally. Used at shutdown so an in-progress
    /// window is flushed rather than silently lost.
    pub fn force_roll(&mut self, now: f64, bitrate_bps: u32) -> WindowReport {
        self.roll(now, bitrate_bps)
    }

    /// Frames accumulated in the current (open) window.
    pub fn pending_frames(&self) -> u64 {
        self.by_id.values().map(|r| r.count).sum()
    }

    fn roll(&mut self, now: f64, bitrate_bps: u32) -> WindowReport {
        let elapsed = (now - self.window_start).max(MIN_ELAPSED_S);
        let by_id = mem::take(&mut self.by_id);
        let bits = mem::take(&mut self.bits_in_window);
        let start = mem::replace(&mut self.window_start, now);

        // BTreeMap iteration is already ascending by identifier, which is
        // what makes report output deterministic.
        let ids = by_id
            .into_iter()
            .map(|(id, rec)| IdReport {
                id,
                fps: rec.count as f64 / elapsed,
                avg_jitter_ms: if rec.gap_count > 0 {
                    rec.gap_sum_ms / rec.gap_count as f64
                } else {
                    0.0
                },
                avg_len_bytes: rec.total_bytes as f64 / rec.count.max(1) as f64,
                count: rec.count,
            })
            .collect();

        WindowReport {
            window_start: start,
            elapsed_s: elapsed,
            bus_load_pct: load_pct(bits, elapsed, bitrate_bps),
            ids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BITRATE: u32 = 500_000;

    #[test]
    fn empty_window_reports_zero_ids_and_zero_load() {
        let mut w = StatsWindow::new(0.0);
        let report = w.maybe_roll(1.0, 1.0, BITRATE).expect("window expired");
        assert!(report.is_empty());
        assert_eq!(report.bus_load_pct, 0.0);
        assert_eq!(report.total_frames(), 0);
    }

    #[test]
    fn window_does_not_roll_early() {
        let mut w = StatsWindow::new(0.0);
        assert!(w.maybe_roll(0.5, 1.0, BITRATE).is_none());
        assert!(w.maybe_roll(0.999, 1.0, BITRATE).is_none());
        assert!(w.maybe_roll(1.0, 1.0, BITRATE).is_some());
    }

    #[test]
    fn oversized_dlc_is_refused_and_leaves_state_untouched() {
        let mut w = StatsWindow::new(0.0);
        let bad = Observation::standard(0x123, 9, 0.1);
        assert_eq!(
            w.ingest(&bad, 0.1),
            Err(StatsError::InvalidDlc { id: 0x123, dlc: 9 })
        );

        let report = w.force_roll(1.0, BITRATE);
        assert!(report.is_empty());
        assert_eq!(report.bus_load_pct, 0.0);
    }

    #[test]
    fn single_frame_has_zero_jitter() {
        let mut w = StatsWindow::new(0.0);
        w.ingest(&Observation::standard(0x100, 8, 0.2), 0.2).unwrap();
        let report = w.force_roll(1.0, BITRATE);
        assert_eq!(report.ids.len(), 1);
        assert_eq!(report.ids[0].avg_jitter_ms, 0.0);
        assert_eq!(report.ids[0].count, 1);
        assert_eq!(report.ids[0].avg_len_bytes, 8.0);
    }

    #[test]
    fn jitter_is_mean_inter_arrival_gap_in_ms() {
        let mut w = StatsWindow::new(0.0);
        // Gaps of 100ms and 300ms: mean 200ms.
        for ts in [0.1, 0.2, 0.5] {
            w.ingest(&Observation::standard(0x42, 0, ts), ts).unwrap();
        }
        let report = w.force_roll(1.0, BITRATE);
        assert!((report.ids[0].avg_jitter_ms - 200.0).abs() < 1e-9);
    }

    #[test]
    fn ids_reported_in_ascending_order() {
        let mut w = StatsWindow::new(0.0);
        for id in [0x7DF, 0x100, 0x18FF50E5, 0x1] {
            w.ingest(&Observation::new(id, 1, 0.1, id > 0x7FF), 0.1)
                .unwrap();
        }
        let report = w.force_roll(1.0, BITRATE);
        let ids: Vec<u32> = report.ids.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![0x1, 0x100, 0x7DF, 0x18FF50E5]);
    }

    #[test]
    fn rollover_resets_to_a_clean_slate() {
        let mut w = StatsWindow::new(0.0);
        w.ingest(&Observation::standard(0x123, 4, 0.5), 0.5).unwrap();
        let first = w.force_roll(1.0, BITRATE);
        assert_eq!(first.total_frames(), 1);

        // Nothing carries over: jitter, counts, and load start fresh.
        let second = w.force_roll(2.0, BITRATE);
        assert!(second.is_empty());
        assert_eq!(second.bus_load_pct, 0.0);
        assert_eq!(second.window_start, 1.0);
    }

    #[test]
    fn gap_count_invariant_holds() {
        let mut w = StatsWindow::new(0.0);
        for i in 0..5 {
            let ts = 0.1 * f64::from(i);
            w.ingest(&Observation::standard(0x10, 2, ts), ts).unwrap();
        }
        let rec = &w.by_id[&0x10];
        assert_eq!(rec.gap_count, rec.count - 1);
    }
}
