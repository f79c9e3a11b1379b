mod analyze;
mod cli;
mod rules;
mod shape;
mod signal;
mod sink;
mod source;

use clap::Parser;

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(
        if args.verbose { "debug" } else { "info" },
    ))
    .init();

    match args.command {
        cli::Command::Analyze(analyze_args) => analyze::run(analyze_args),
        cli::Command::Shape(shape_args) => shape::run(shape_args),
        cli::Command::Rules(rules_args) => rules::run(rules_args.command),
    }
}
