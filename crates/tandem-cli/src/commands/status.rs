//! Status command handler

use anyhow::{Context, Result};

use tandem_core::Session;

use crate::output::{Output, OutputFormat};

/// Show status information
pub async fn show(session: &Session, output: &Output) -> Result<()> {
    let config = session.config();
    let engine = session.engine();
    let store = engine.store();

    let todos = store.count().await.context("Failed to count todos")?;
    let pending = store
        .pending()
        .await
        .context("Failed to read pending todos")?
        .len();
    let tombstones = store
        .tombstones()
        .await
        .context("Failed to read tombstones")?;
    let unpushed = tombstones.iter().filter(|t| !t.pushed).count();
    let online = engine.connectivity().is_online();

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "online": online,
                    "endpoint": config.endpoint,
                    "polling": config.poll_interval().map(|d| d.as_millis() as u64),
                    "tombstones_enabled": config.tombstones_enabled,
                    "database": config.database_path(),
                    "counts": {
                        "todos": todos,
                        "pending": pending,
                        "tombstones": tombstones.len(),
                        "unpushed_deletes": unpushed
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", if online { "online" } else { "offline" });
        }
        OutputFormat::Human => {
            println!("Tandem Status");
            println!("=============");
            println!();
            println!("Remote:");
            println!(
                "  Endpoint:     {}",
                config.endpoint.as_deref().unwrap_or("(not set)")
            );
            println!("  Connectivity: {}", if online { "online" } else { "offline" });
            match config.poll_interval() {
                Some(interval) => println!("  Polling:      every {} ms", interval.as_millis()),
                None => println!("  Polling:      disabled"),
            }
            println!();
            println!("Storage:");
            println!("  Database: {}", config.database_path().display());
            println!();
            println!("Contents:");
            println!("  Todos:            {}", todos);
            println!("  Not yet pushed:   {}", pending);
            println!(
                "  Deleted locally:  {} ({} not yet pushed)",
                tombstones.len(),
                unpushed
            );
        }
    }

    Ok(())
}
