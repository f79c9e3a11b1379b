//! Ctrl-C handling for the replay loops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;

/// Raise `stop` when the user interrupts. The loops poll the flag between
/// iterations, so shutdown always lands on an iteration boundary and the
/// in-progress window gets flushed.
pub fn watch_ctrl_c(stop: Arc<AtomicBool>) -> Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build signal runtime")?;

    std::thread::Builder::new()
        .name("ctrl-c".into())
        .spawn(move || {
            rt.block_on(async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("interrupt received; stopping");
                    stop.store(true, Ordering::Relaxed);
                }
            });
        })
        .context("failed to spawn signal thread")?;
    Ok(())
}
