use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "canwarden")]
#[command(about = "CAN bus traffic analysis and shaping-policy governance")]
#[command(version)]
pub struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Aggregate a frame capture into per-identifier window statistics
    Analyze(AnalyzeArgs),

    /// Replay a capture through a compiled shaping policy
    Shape(ShapeArgs),

    /// Shaping-rules management
    Rules(RulesArgs),
}

#[derive(Debug, Parser)]
pub struct AnalyzeArgs {
    /// candump -L capture file, or '-' for stdin
    #[arg(long, default_value = "-")]
    pub log: PathBuf,

    /// Bus name used in report rows
    #[arg(long, default_value = "can0")]
    pub bus: String,

    /// Report interval in seconds
    #[arg(long, default_value_t = 1.0)]
    pub interval: f64,

    /// Bus bitrate in bps, for load estimation
    #[arg(long, default_value_t = 500_000)]
    pub bitrate: u32,

    /// Write metrics to CSV at this path
    #[arg(long)]
    pub csv: Option<PathBuf>,
}

#[derive(Debug, Parser)]
pub struct ShapeArgs {
    /// candump -L capture file, or '-' for stdin
    #[arg(long, default_value = "-")]
    pub log: PathBuf,

    /// YAML rules file to compile and enforce
    #[arg(long)]
    pub rules: PathBuf,

    /// Seconds of capture time between counter reports
    #[arg(long, default_value_t = 1.0)]
    pub stats_interval: f64,
}

#[derive(Debug, Parser)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub command: RulesCommand,
}

#[derive(Debug, Subcommand)]
pub enum RulesCommand {
    /// Validate a rules file and report section counts
    Check {
        /// YAML rules file
        file: PathBuf,
    },

    /// Compile a rules file and print the normalized policy
    Show {
        /// YAML rules file
        file: PathBuf,
    },
}
