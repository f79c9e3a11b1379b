use std::path::Path;

use anyhow::{Context, Result};

use canwarden_policy::load_rules;
use canwarden_types::format_id;

use crate::cli::RulesCommand;

pub fn run(command: RulesCommand) -> Result<()> {
    match command {
        RulesCommand::Check { file } => check(&file),
        RulesCommand::Show { file } => show(&file),
    }
}

fn check(file: &Path) -> Result<()> {
    // Compilation *is* the validation; an error here carries the exact
    // field path and exits non-zero.
    let policy = load_rules(file)?;
    println!(
        "OK: {}: {} limit(s), {} drop(s), {} remap(s)",
        file.display(),
        policy.limits.len(),
        policy.drop.len(),
        policy.remap.len()
    );
    Ok(())
}

fn show(file: &Path) -> Result<()> {
    let policy = load_rules(file)?;
    if policy.is_empty() {
        println!("(empty policy)");
        return Ok(());
    }

    // Human-oriented dump: canonical hex identifiers, one rule per line.
    for (id, limit) in &policy.limits {
        println!(
            "limit {}: rate={} fps, burst={}",
            format_id(*id),
            limit.rate,
            limit.burst
        );
    }
    for id in &policy.drop {
        println!("drop {}", format_id(*id));
    }
    for (from, to) in &policy.remap {
        println!("remap {} -> {}", format_id(*from), format_id(*to));
    }

    println!();
    let yaml = serde_yaml::to_string(&policy).context("failed to render policy")?;
    print!("{yaml}");
    Ok(())
}
