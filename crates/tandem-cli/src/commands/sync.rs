//! Sync command handler

use anyhow::{bail, Context, Result};
use tracing::warn;

use tandem_core::SyncEngine;

use crate::output::Output;

/// Push pending local changes, then pull the remote list
pub async fn sync(engine: &SyncEngine, output: &Output) -> Result<()> {
    if !engine.connectivity().is_online() {
        bail!(
            "Cannot sync while offline. Configure an endpoint with:\n  \
             tandem config set endpoint https://your-api/graphql\n\
             and drop --offline / TANDEM_OFFLINE"
        );
    }

    output.message("Syncing...");
    let report = engine.sync_once().await.context("Sync failed")?;
    output.print_report(&report);
    Ok(())
}

/// Sync quietly before reads - failures are logged, never fatal
pub async fn sync_quiet(engine: &SyncEngine) {
    if !engine.connectivity().is_online() {
        return;
    }
    if let Err(e) = engine.sync_once().await {
        warn!("Auto-sync failed: {}", e);
    }
}
