//! Command implementations for the CLI

pub mod check_bounds;
pub mod report;
pub mod stop;
pub mod watch;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use grid_sync::{Config, GridBotClient, GridSync, HmacSigner, SessionProvider};

/// Load config and wire a client, signer and session for the configured account.
pub(crate) fn connect(
    config_path: &str,
    poll_override: Option<u64>,
) -> Result<(Config, GridSync, SessionProvider)> {
    let mut config = Config::load_or_default(config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;
    if let Some(secs) = poll_override {
        config.sync.poll_interval_secs = Some(secs);
    }

    let account = config.account.account().context(
        "No account configured: set account.account_id and account.address \
         or GRID_BOT_ACCOUNT_ID and GRID_BOT_WALLET_ADDRESS",
    )?;
    info!(account = %account.account_id, url = %config.backend.base_url, "Connecting");

    let client = GridBotClient::with_config(&config.backend.base_url, (&config.backend).into())
        .context("Failed to build grid bot client")?;
    let signer = HmacSigner::from_env().context("GRID_BOT_SIGNING_KEY not set")?;

    let provider = SessionProvider::new(Some(account));
    let sync = GridSync::new(
        Arc::new(client),
        Arc::new(signer),
        provider.handle(),
        &config.sync,
    );
    Ok((config, sync, provider))
}

pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")
}
