//! Replay a capture through a compiled policy and report verdicts.
//!
//! No frame is transmitted anywhere: admitted frames are counted, not
//! sent. This is the offline companion to a live shaping bridge, useful
//! for answering "what would this rules file have done to yesterday's
//! traffic" before deploying it.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::info;

use canwarden_policy::load_rules;
use canwarden_shaper::{DropCause, Shaper, Verdict};
use canwarden_stats::{FrameSource, SourceEvent};

use crate::cli::ShapeArgs;
use crate::signal;
use crate::sink::clock_hms;
use crate::source::CandumpSource;

pub fn run(args: ShapeArgs) -> Result<()> {
    anyhow::ensure!(args.stats_interval > 0.0, "stats interval must be positive");

    let policy = load_rules(&args.rules)
        .with_context(|| format!("failed to compile rules {}", args.rules.display()))?;
    info!(
        "policy: {} limit(s), {} drop(s), {} remap(s)",
        policy.limits.len(),
        policy.drop.len(),
        policy.remap.len()
    );

    let stop = Arc::new(AtomicBool::new(false));
    signal::watch_ctrl_c(stop.clone())?;

    if args.log.as_os_str() == "-" {
        let source = CandumpSource::stdin();
        replay(source, Arc::new(policy), args.stats_interval, &stop)
    } else {
        let source = CandumpSource::open(&args.log)?;
        replay(source, Arc::new(policy), args.stats_interval, &stop)
    }
}

fn replay<R: BufRead>(
    mut source: CandumpSource<R>,
    policy: Arc<canwarden_policy::Policy>,
    stats_interval: f64,
    stop: &AtomicBool,
) -> Result<()> {
    let timeout = Duration::from_millis(20);
    let mut shaper: Option<Shaper> = None;
    let mut last_report = 0.0f64;
    let mut rx = 0u64;

    loop {
        if stop.load(Ordering::Relaxed) {
            info!("stop requested; ending replay");
            break;
        }

        let obs = match source.recv(timeout)? {
            SourceEvent::Frame(obs) => obs,
            SourceEvent::Idle => continue,
            SourceEvent::Closed => break,
        };
        rx += 1;
        let now = obs.timestamp;

        // Buckets start full at the capture's first timestamp, not at 0,
        // so old captures don't begin with an artificial refill.
        let shaper = shaper.get_or_insert_with(|| {
            last_report = now;
            Shaper::new(policy.clone(), now)
        });

        match shaper.decide(obs.id, now) {
            Verdict::Admit { id } if id != obs.id => {
                info!("remap {} -> {}", obs.id_hex(), canwarden_types::format_id(id));
            }
            Verdict::Admit { .. } => {}
            Verdict::Drop(DropCause::Blocked) => {
                info!("drop (blocked) {}", obs.id_hex());
            }
            Verdict::Drop(DropCause::RateLimited) => {}
        }

        if now - last_report >= stats_interval {
            let s = shaper.stats();
            println!(
                "[{}] rx={rx} admitted={} remapped={} dropped_blocked={} dropped_rate={}",
                clock_hms(now),
                s.admitted,
                s.remapped,
                s.dropped_blocked,
                s.dropped_rate
            );
            last_report = now;
        }
    }

    match shaper {
        Some(shaper) => {
            let s = shaper.stats();
            println!(
                "total: rx={rx} admitted={} remapped={} dropped_blocked={} dropped_rate={}",
                s.admitted, s.remapped, s.dropped_blocked, s.dropped_rate
            );
        }
        None => println!("no frames replayed"),
    }
    Ok(())
}
