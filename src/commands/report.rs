//! Report Command

use anyhow::{Context, Result};

use grid_sync::aggregate::parse_decimal_or_zero;
use grid_sync::ProfitReport;

pub fn run(config_path: String, session_id: String) -> Result<()> {
    dotenv::dotenv().ok();

    let runtime = super::runtime()?;
    runtime.block_on(async {
        let (_config, sync, _provider) = super::connect(&config_path, None)?;
        let report = sync
            .profit_report(&session_id)
            .await
            .with_context(|| format!("Failed to load profit report for {}", session_id))?;
        print_report(&report);
        Ok::<(), anyhow::Error>(())
    })
}

fn print_report(report: &ProfitReport) {
    let value = |raw: &Option<String>| parse_decimal_or_zero(raw.as_deref());

    println!("\n{}", "=".repeat(60));
    println!("PROFIT REPORT {}", report.session_id);
    println!("{}", "=".repeat(60));
    println!("Ticker:             {}", report.ticker);
    println!("Grid Profit:        {:.2}", value(&report.grid_profit));
    println!("Unrealized PnL:     {:.2}", value(&report.unrealized_pnl));
    println!("Total Fees:         {:.2}", value(&report.total_fees));
    println!("Net Profit:         {:.2}", report.net_profit());
    println!("Margin Used:        {:.2}", value(&report.total_margin_used));
    println!("Filled Orders:      {}", report.filled_orders_count);
    println!(
        "Runtime:            {}h {}m",
        report.runtime_secs / 3600,
        (report.runtime_secs % 3600) / 60
    );
    println!("{}\n", "=".repeat(60));
}
