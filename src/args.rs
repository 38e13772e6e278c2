use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "roster_sync")]
#[command(about = "A CLI tool to copy on-call rosters from VictorOps into a Google Sheet")]
#[command(version)]
pub struct Args {
    /// Google Sheets ID or URL (prompted for on stdin when omitted)
    #[arg(long, value_name = "SHEET_ID")]
    pub sheet_id: Option<String>,

    /// Path to config file
    #[arg(long, default_value = "config/config.toml")]
    pub config: String,

    /// Log level
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Read everything but leave the sheet untouched
    #[arg(long)]
    pub dry_run: bool,

    /// Also write the produced table to this CSV file
    #[arg(long, value_name = "PATH")]
    pub csv_out: Option<String>,
}
