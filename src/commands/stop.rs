//! Stop Command
//!
//! Loads the running bots for the configured account, then runs the
//! challenge/sign/submit flow for one session.

use anyhow::{bail, Context, Result};
use tracing::info;

use grid_sync::StopOutcome;

pub fn run(config_path: String, session_id: String) -> Result<()> {
    dotenv::dotenv().ok();

    let runtime = super::runtime()?;
    runtime.block_on(run_async(config_path, session_id))
}

async fn run_async(config_path: String, session_id: String) -> Result<()> {
    let (_config, sync, _provider) = super::connect(&config_path, None)?;

    // The flow only stops bots present in the current view
    if let Some(ticket) = sync.start().ticket() {
        sync.settled(ticket).await;
    }
    if let Some(error) = sync.status().error {
        bail!("Failed to load running grid bots: {}", error);
    }
    info!(running = sync.strategies().len(), "Loaded running grid bots");

    let outcome = sync.stop_strategy(&session_id).await;
    sync.shutdown();

    match outcome {
        StopOutcome::Stopped => {
            println!("  ✓ Grid bot {} stopped", session_id);
            println!("  Remaining running bots: {}", sync.strategies().len());
            Ok(())
        }
        StopOutcome::Busy => bail!("A stop for {} is already in progress", session_id),
        StopOutcome::Failed(err) => {
            Err(err).with_context(|| format!("Failed to stop grid bot {}", session_id))
        }
    }
}
