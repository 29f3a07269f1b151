//! Grid bot sync - main entry point
//!
//! This binary provides four subcommands:
//! - watch: Keep a live view of running grid bots
//! - stop: Stop one grid bot (challenge, sign, submit)
//! - report: Print the profit report of one grid bot
//! - check-bounds: Validate a grid configuration before creating it

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "grid-sync")]
#[command(about = "Sync, stop and validate grid trading bots", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watch running grid bots until Ctrl+C
    Watch {
        /// Path to configuration file
        #[arg(short, long, default_value = "configs/default.json")]
        config: String,

        /// Poll interval in seconds (overrides config file)
        #[arg(long)]
        poll: Option<u64>,
    },

    /// Stop a running grid bot
    Stop {
        /// Path to configuration file
        #[arg(short, long, default_value = "configs/default.json")]
        config: String,

        /// Session id of the bot to stop
        #[arg(short, long)]
        session_id: String,
    },

    /// Show the profit report of a grid bot
    Report {
        /// Path to configuration file
        #[arg(short, long, default_value = "configs/default.json")]
        config: String,

        /// Session id of the bot
        #[arg(short, long)]
        session_id: String,
    },

    /// Derive bounds and validate a grid configuration
    CheckBounds {
        /// Current market price
        #[arg(long)]
        price: String,

        /// LONG or SHORT
        #[arg(long, default_value = "LONG")]
        direction: String,

        /// ARITHMETIC or GEOMETRIC
        #[arg(long, default_value = "ARITHMETIC")]
        grid_type: String,

        /// Upper bound; the lower bound is derived from it
        #[arg(long, conflicts_with = "lower")]
        upper: Option<String>,

        /// Lower bound; the upper bound is derived from it
        #[arg(long)]
        lower: Option<String>,

        #[arg(long)]
        levels: Option<String>,

        /// Grid ratio, between 0 and 1 (geometric grids)
        #[arg(long)]
        ratio: Option<String>,

        #[arg(long)]
        margin: Option<String>,

        /// Stop-loss price
        #[arg(long)]
        stop_loss: Option<String>,

        /// Take-profit price
        #[arg(long)]
        take_profit: Option<String>,
    },
}

fn setup_logging(verbose: bool, command_name: &str, file_only: bool) -> Result<()> {
    std::fs::create_dir_all("logs")?;

    // {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    // Filter out noisy external crates
    let level = if verbose { "debug" } else { "info" };
    let filter_str = format!(
        "{},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,h2=warn",
        level
    );
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false);

    // Omitted when stdout is reserved for the command's own output
    let console_layer = (!file_only).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(true)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    info!("Logging initialized");
    info!("Log file: {}", log_path.display());

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (command_name, file_only) = match &cli.command {
        Commands::Watch { .. } => ("watch", false),
        Commands::Stop { .. } => ("stop", false),
        Commands::Report { .. } => ("report", true),
        Commands::CheckBounds { .. } => ("check_bounds", true),
    };

    setup_logging(cli.verbose, command_name, file_only)?;

    match cli.command {
        Commands::Watch { config, poll } => commands::watch::run(config, poll),
        Commands::Stop { config, session_id } => commands::stop::run(config, session_id),
        Commands::Report { config, session_id } => commands::report::run(config, session_id),
        Commands::CheckBounds {
            price,
            direction,
            grid_type,
            upper,
            lower,
            levels,
            ratio,
            margin,
            stop_loss,
            take_profit,
        } => commands::check_bounds::run(commands::check_bounds::BoundsArgs {
            price,
            direction,
            grid_type,
            upper,
            lower,
            levels,
            ratio,
            margin,
            stop_loss,
            take_profit,
        }),
    }
}
