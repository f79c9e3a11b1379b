use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Result;
use log::info;

use canwarden_stats::{run_session, SessionConfig};

use crate::cli::AnalyzeArgs;
use crate::signal;
use crate::sink::{ConsoleSink, CsvSink, TeeSink};
use crate::source::CandumpSource;

pub fn run(args: AnalyzeArgs) -> Result<()> {
    anyhow::ensure!(args.interval > 0.0, "interval must be positive");

    let cfg = SessionConfig {
        window_s: args.interval,
        bitrate_bps: args.bitrate,
        ..SessionConfig::default()
    };

    let mut sink = TeeSink {
        console: ConsoleSink::new(&args.bus),
        csv: match &args.csv {
            Some(path) => Some(CsvSink::create(path, &args.bus)?),
            None => None,
        },
    };

    let stop = Arc::new(AtomicBool::new(false));
    signal::watch_ctrl_c(stop.clone())?;

    info!(
        "analyzing {} (interval={:.2}s, bitrate={} bps)",
        args.log.display(),
        args.interval,
        args.bitrate
    );

    let stats = if args.log.as_os_str() == "-" {
        let mut source = CandumpSource::stdin();
        run_session(&mut source, &mut sink, &cfg, &stop)?
    } else {
        let mut source = CandumpSource::open(&args.log)?;
        run_session(&mut source, &mut sink, &cfg, &stop)?
    };

    info!(
        "done: {} frame(s) in {} window(s), {} invalid DLC",
        stats.frames, stats.windows, stats.invalid_dlc
    );
    Ok(())
}
