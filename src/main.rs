use std::process::ExitCode;

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use tracing::{error, info, warn};

mod args;
mod auth;
mod cfg;
mod csv_sink;
mod error;
mod job;
mod prompt;
mod roster;
mod sheets;
mod transform;

use args::Args;
use cfg::Cfg;
use error::SyncError;
use job::SyncSettings;
use roster::VictorOpsClient;
use sheets::GoogleSheetGateway;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    if let Err(e) = init_logging(&args.log_level) {
        eprintln!("error: {}", e);
        return ExitCode::from(1);
    }

    info!("Starting roster_sync");

    match run(args).await {
        Ok(()) => {
            info!("roster_sync completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(args: Args) -> std::result::Result<(), SyncError> {
    let cfg = Cfg::load(&args)?;

    let sheet_id = match args.sheet_id.as_deref() {
        Some(raw) => prompt::resolve_sheet_id(raw)?,
        None => prompt::prompt_sheet_id(std::io::stdin().lock(), std::io::stdout())?,
    };

    let roster = VictorOpsClient::new(&cfg.roster)?;
    let hub = auth::create_sheets_hub(&cfg.sheets.service_account_key).await?;
    let sheets = GoogleSheetGateway::new(hub);
    let settings = SyncSettings::from_cfg(&cfg, args.dry_run);

    let report = job::run_with_error_handling(&sheet_id, &roster, &sheets, &settings, &Local)
        .await
        .map_err(|failure| failure.error)?;

    for skipped in &report.skipped_teams {
        warn!("Team {} was skipped: {}", skipped.slug, skipped.reason);
    }

    if let Some(path) = args.csv_out.as_deref() {
        csv_sink::export(path, &report.rows)?;
    }

    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = match level {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialise logging: {}", e))?;

    Ok(())
}
