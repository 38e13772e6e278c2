use std::io::{BufRead, Write};

use regex::Regex;
use tracing::debug;

use crate::error::{Result, SyncError};

pub const PROMPT: &str = "Please provide the google sheet ID ";

const SHEET_URL_PATTERN: &str = r"/spreadsheets/d/([A-Za-z0-9_-]+)";
const SHEET_ID_PATTERN: &str = r"^[A-Za-z0-9_-]+$";

/// Asks for the spreadsheet on `output` and reads one line from `input`.
pub fn prompt_sheet_id<R: BufRead, W: Write>(mut input: R, mut output: W) -> Result<String> {
    write!(output, "{}", PROMPT).map_err(|e| SyncError::Config(format!("failed to write prompt: {}", e)))?;
    output
        .flush()
        .map_err(|e| SyncError::Config(format!("failed to write prompt: {}", e)))?;

    let mut line = String::new();
    input
        .read_line(&mut line)
        .map_err(|e| SyncError::Config(format!("failed to read sheet ID: {}", e)))?;

    resolve_sheet_id(&line)
}

/// Accepts either a bare spreadsheet ID or a full Google Sheets URL.
pub fn resolve_sheet_id(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SyncError::Config("sheet ID cannot be empty".to_string()));
    }

    let url_re = Regex::new(SHEET_URL_PATTERN).map_err(|e| SyncError::Config(e.to_string()))?;
    if let Some(caps) = url_re.captures(trimmed) {
        debug!("Extracted sheet ID from URL");
        return Ok(caps[1].to_string());
    }

    let id_re = Regex::new(SHEET_ID_PATTERN).map_err(|e| SyncError::Config(e.to_string()))?;
    if id_re.is_match(trimmed) {
        Ok(trimmed.to_string())
    } else {
        Err(SyncError::Config(format!("'{}' is not a valid Google Sheets ID", trimmed)))
    }
}
