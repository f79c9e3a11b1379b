//! Report sinks: console summary and the canonical CSV export.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};

use canwarden_stats::{ReportSink, WindowReport};
use canwarden_types::format_id;

/// Report time as a local wall-clock `HH:MM:SS`, falling back to the raw
/// seconds for timestamps outside the representable range.
pub fn clock_hms(ts: f64) -> String {
    DateTime::from_timestamp(ts as i64, 0)
        .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| format!("{ts:.3}"))
}

/// Human-readable per-window summary, one block per report.
pub struct ConsoleSink {
    bus: String,
}

impl ConsoleSink {
    pub fn new(bus: &str) -> Self {
        ConsoleSink {
            bus: bus.to_string(),
        }
    }
}

impl ReportSink for ConsoleSink {
    fn emit(&mut self, report: &WindowReport) -> Result<()> {
        println!(
            "[{}] window={:.2}s bus={} load={:.2}%",
            clock_hms(report.window_start + report.elapsed_s),
            report.elapsed_s,
            self.bus,
            report.bus_load_pct
        );
        if report.is_empty() {
            println!("  (no frames in this window)");
        }
        for row in &report.ids {
            println!(
                "  ID={}  fps={:.2}  avg_jitter={:.2}ms  avg_len={:.1}B  n={}",
                format_id(row.id),
                row.fps,
                row.avg_jitter_ms,
                row.avg_len_bytes,
                row.count
            );
        }
        println!();
        Ok(())
    }
}

/// Canonical CSV export: one row per (window, identifier).
///
/// Schema, field for field: unix timestamp of report time (integer
/// seconds), bus name, bus-load percent (2 decimals), identifier as
/// `0x` + uppercase hex, frames per second (3 decimals), average jitter in
/// ms (3 decimals), average payload length in bytes (2 decimals), frame
/// count. Empty windows contribute no rows.
pub struct CsvSink {
    writer: csv::Writer<File>,
    bus: String,
}

impl CsvSink {
    pub fn create(path: &Path, bus: &str) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("failed to create CSV file {}", path.display()))?;
        let mut writer = csv::WriterBuilder::new().from_writer(file);
        writer
            .write_record([
                "ts_unix",
                "iface",
                "bus_load_pct",
                "id_hex",
                "fps",
                "avg_jitter_ms",
                "avg_len_bytes",
                "count",
            ])
            .context("failed to write CSV header")?;
        Ok(CsvSink {
            writer,
            bus: bus.to_string(),
        })
    }
}

impl ReportSink for CsvSink {
    fn emit(&mut self, report: &WindowReport) -> Result<()> {
        let ts_unix = (report.window_start + report.elapsed_s) as i64;
        for row in &report.ids {
            self.writer
                .write_record([
                    ts_unix.to_string(),
                    self.bus.clone(),
                    format!("{:.2}", report.bus_load_pct),
                    format_id(row.id),
                    format!("{:.3}", row.fps),
                    format!("{:.3}", row.avg_jitter_ms),
                    format!("{:.2}", row.avg_len_bytes),
                    row.count.to_string(),
                ])
                .context("failed to write CSV row")?;
        }
        self.writer.flush().context("failed to flush CSV")?;
        Ok(())
    }
}

/// Console plus optional CSV, driven as one sink by the session.
pub struct TeeSink {
    pub console: ConsoleSink,
    pub csv: Option<CsvSink>,
}

impl ReportSink for TeeSink {
    fn emit(&mut self, report: &WindowReport) -> Result<()> {
        self.console.emit(report)?;
        if let Some(csv) = self.csv.as_mut() {
            csv.emit(report)?;
        }
        Ok(())
    }
}
