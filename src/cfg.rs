use std::fmt;
use std::path::Path;
use std::time::Duration;

use chrono::format::{Item, StrftimeItems};
use config::{Config, Environment, File};
use serde::Deserialize;
use tracing::{debug, info};

use crate::args::Args;
use crate::error::{Result, SyncError};

pub const ENV_PREFIX: &str = "ROSTER_SYNC";
pub const DEFAULT_API_BASE: &str = "https://api.victorops.com/api-public";
pub const DEFAULT_READ_RANGE: &str = "Sheet1!A1:D";
pub const DEFAULT_WRITE_RANGE: &str = "Sheet1!A1";
pub const DEFAULT_DATE_FORMAT: &str = "%-m/%-d/%Y";
pub const DEFAULT_TIME_FORMAT: &str = "%-I:%M:%S %p";

#[derive(Debug, Deserialize, Clone)]
pub struct Cfg {
    pub roster: RosterConfig,
    pub sheets: SheetsConfig,
    pub output: OutputConfig,
}

#[derive(Deserialize, Clone)]
pub struct RosterConfig {
    pub api_base: String,
    #[serde(default)]
    pub org_id: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl RosterConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

// Keeps the API key out of debug logs.
impl fmt::Debug for RosterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RosterConfig")
            .field("api_base", &self.api_base)
            .field("org_id", &self.org_id)
            .field("api_key", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SheetsConfig {
    pub service_account_key: String,
    pub read_range: String,
    pub write_range: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    pub date_format: String,
    pub time_format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            time_format: DEFAULT_TIME_FORMAT.to_string(),
        }
    }
}

impl Cfg {
    pub fn load(args: &Args) -> Result<Self> {
        Self::load_from(&args.config, Environment::with_prefix(ENV_PREFIX))
    }

    /// Layers the config file (if present) under the given environment source.
    pub fn load_from(path: &str, env: Environment) -> Result<Self> {
        info!("Loading configuration from: {}", path);

        if !Path::new(path).exists() {
            debug!("Config file not found, relying on defaults and environment");
        }

        let cfg: Cfg = Config::builder()
            .set_default("roster.api_base", DEFAULT_API_BASE)?
            .set_default("sheets.service_account_key", "service-account.json")?
            .set_default("sheets.read_range", DEFAULT_READ_RANGE)?
            .set_default("sheets.write_range", DEFAULT_WRITE_RANGE)?
            .set_default("output.date_format", DEFAULT_DATE_FORMAT)?
            .set_default("output.time_format", DEFAULT_TIME_FORMAT)?
            .add_source(File::with_name(path).required(false))
            .add_source(env.prefix_separator("_").separator("__"))
            .build()?
            .try_deserialize()?;

        debug!("Final configuration: {:?}", cfg);
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.roster.org_id.trim().is_empty() {
            return Err(SyncError::Config("roster.org_id must be set".to_string()));
        }
        if self.roster.api_key.trim().is_empty() {
            return Err(SyncError::Config("roster.api_key must be set".to_string()));
        }
        if !self.roster.api_base.starts_with("http://") && !self.roster.api_base.starts_with("https://") {
            return Err(SyncError::Config(format!(
                "roster.api_base must be an http(s) URL, got '{}'",
                self.roster.api_base
            )));
        }
        if self.roster.timeout_secs == Some(0) {
            return Err(SyncError::Config("roster.timeout_secs must be greater than zero".to_string()));
        }
        for (key, range) in [
            ("sheets.read_range", &self.sheets.read_range),
            ("sheets.write_range", &self.sheets.write_range),
        ] {
            if !range.contains('!') {
                return Err(SyncError::Config(format!(
                    "{} must be an A1 range with a sheet name (e.g. Sheet1!A1), got '{}'",
                    key, range
                )));
            }
        }
        if self.sheets.service_account_key.trim().is_empty() {
            return Err(SyncError::Config("sheets.service_account_key cannot be empty".to_string()));
        }
        for (key, pattern) in [
            ("output.date_format", &self.output.date_format),
            ("output.time_format", &self.output.time_format),
        ] {
            if pattern.is_empty() || StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
                return Err(SyncError::Config(format!("{} is not a valid strftime pattern: '{}'", key, pattern)));
            }
        }

        info!("Configuration validation passed");
        Ok(())
    }
}
