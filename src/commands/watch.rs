//! Watch Command
//!
//! Keeps the strategy view in sync and prints the aggregated snapshot every
//! time the cache changes, until Ctrl+C.

use anyhow::Result;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use grid_sync::{AggregatedSnapshot, NoticeLevel};

pub fn run(config_path: String, poll: Option<u64>) -> Result<()> {
    dotenv::dotenv().ok();

    let runtime = super::runtime()?;
    runtime.block_on(run_async(config_path, poll))
}

async fn run_async(config_path: String, poll: Option<u64>) -> Result<()> {
    let (_config, sync, _provider) = super::connect(&config_path, poll)?;

    let mut versions = sync.subscribe();
    let mut notices = sync.notices();
    let outcome = sync.start();
    info!(?outcome, "Watching grid bots, press Ctrl+C to stop");

    loop {
        tokio::select! {
            changed = versions.changed() => {
                if changed.is_err() {
                    break;
                }
                print_snapshot(&sync.snapshot());
                if let Some(error) = sync.status().error {
                    warn!("Last fetch failed: {}", error);
                }
            }
            notice = notices.recv() => match notice {
                Ok(notice) => {
                    let marker = match notice.level {
                        NoticeLevel::Success => "✓",
                        NoticeLevel::Error => "⚠",
                    };
                    println!("  {} {}: {}", marker, notice.title, notice.detail);
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Dropped notices"),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    sync.shutdown();
    info!("Watch stopped");
    Ok(())
}

fn print_snapshot(snapshot: &AggregatedSnapshot) {
    println!("\n{}", "=".repeat(60));
    println!("RUNNING GRID BOTS");
    println!("{}", "=".repeat(60));
    println!("Running bots:        {}", snapshot.strategy_count());
    println!("Total grid profit:   {:.2}", snapshot.total_grid_profit);
    println!("Total margin used:   {:.2}", snapshot.total_margin_used);
    println!("Capital utilization: {:.2}", snapshot.total_capital_utilization);
    println!("{}", "-".repeat(60));

    if snapshot.is_empty() {
        println!("  No running grid bots");
    }
    for (symbol, summary) in &snapshot.symbol_summaries {
        println!(
            "  {:<8} bots={:<3} profit={:>12.2} margin={:>12.2} orders={:<4} util={:.2}",
            symbol,
            summary.count,
            summary.total_profit,
            summary.total_margin,
            summary.active_orders,
            summary.avg_capital_utilization
        );
        if let Some(strategies) = snapshot.strategies_by_symbol.get(symbol) {
            for strategy in strategies {
                println!("      - {}", strategy.session_id);
            }
        }
    }
    println!("{}\n", "=".repeat(60));
}
