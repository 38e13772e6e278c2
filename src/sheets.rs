use async_trait::async_trait;
use google_sheets4::api::{Scope, ValueRange};
use tracing::{debug, info};

use crate::auth::SheetsHub;
use crate::error::{Result, SyncError};
use crate::transform::{OutputRow, HEADER_DATE, HEADER_TEAM, HEADER_TIME, HEADER_USERNAME};

pub const REQUIRED_COLUMNS: [&str; 3] = [HEADER_DATE, HEADER_TIME, HEADER_TEAM];

/// Current contents of the synced range: header row plus data rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SheetTable {
    pub fn from_values(values: Vec<Vec<serde_json::Value>>) -> Self {
        let mut rows = values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect::<Vec<String>>());
        let header = rows.next().unwrap_or_default();
        Self {
            header,
            rows: rows.collect(),
        }
    }

    /// Rows occupied in the sheet, header included.
    pub fn height(&self) -> usize {
        if self.header.is_empty() && self.rows.is_empty() {
            0
        } else {
            self.rows.len() + 1
        }
    }
}

fn cell_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderCheck {
    pub has_username: bool,
    /// The existing header already matches `Date, Time, Team, Username`.
    pub canonical: bool,
}

/// Checks that the sheet carries every required column.
pub fn validate_header(header: &[String]) -> Result<HeaderCheck> {
    if header.is_empty() {
        return Err(SyncError::Validation(
            "sheet is empty; row 1 must contain \"Date\", \"Time\" and \"Team\" headers".to_string(),
        ));
    }

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|col| !header.iter().any(|h| h.trim() == *col))
        .collect();
    if !missing.is_empty() {
        return Err(SyncError::Validation(format!(
            "sheet must include \"Date\", \"Time\", and \"Team\" columns; missing {}",
            missing.join(", ")
        )));
    }

    let has_username = header.iter().any(|h| h.trim() == HEADER_USERNAME);
    let canonical = header.iter().map(|h| h.trim()).eq(OutputRow::headers().iter().map(String::as_str));

    Ok(HeaderCheck { has_username, canonical })
}

/// Header plus one line per row, padded with blank lines so that a table
/// `previous_height` rows tall is fully replaced by a single write.
pub fn build_table(rows: &[OutputRow], previous_height: usize) -> Vec<Vec<String>> {
    let mut values = Vec::with_capacity(previous_height.max(rows.len() + 1));
    values.push(OutputRow::headers());
    values.extend(rows.iter().map(OutputRow::to_cells));

    let width = OutputRow::headers().len();
    while values.len() < previous_height {
        values.push(vec![String::new(); width]);
    }
    values
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    pub updated_range: Option<String>,
    pub updated_rows: usize,
}

#[async_trait(?Send)]
pub trait SheetGateway {
    async fn read_table(&self, sheet_id: &str, range: &str) -> Result<SheetTable>;

    async fn overwrite(&self, sheet_id: &str, range: &str, values: Vec<Vec<String>>) -> Result<WriteSummary>;
}

pub struct GoogleSheetGateway {
    hub: SheetsHub,
}

impl GoogleSheetGateway {
    pub fn new(hub: SheetsHub) -> Self {
        Self { hub }
    }
}

#[async_trait(?Send)]
impl SheetGateway for GoogleSheetGateway {
    async fn read_table(&self, sheet_id: &str, range: &str) -> Result<SheetTable> {
        info!("Reading sheet {} range {}", sheet_id, range);

        let (_, value_range) = self
            .hub
            .spreadsheets()
            .values_get(sheet_id, range)
            .add_scope(Scope::Spreadsheet)
            .doit()
            .await
            .map_err(|e| SyncError::SheetRead(e.to_string()))?;

        let table = SheetTable::from_values(value_range.values.unwrap_or_default());
        debug!("Read header {:?} and {} data rows", table.header, table.rows.len());
        Ok(table)
    }

    async fn overwrite(&self, sheet_id: &str, range: &str, values: Vec<Vec<String>>) -> Result<WriteSummary> {
        info!("Writing {} rows to sheet {} range {}", values.len(), sheet_id, range);

        let request = ValueRange {
            range: Some(range.to_string()),
            major_dimension: Some("ROWS".to_string()),
            values: Some(
                values
                    .into_iter()
                    .map(|row| row.into_iter().map(serde_json::Value::String).collect())
                    .collect(),
            ),
            ..Default::default()
        };

        let (_, response) = self
            .hub
            .spreadsheets()
            .values_update(request, sheet_id, range)
            .value_input_option("RAW")
            .add_scope(Scope::Spreadsheet)
            .doit()
            .await
            .map_err(|e| SyncError::Write(e.to_string()))?;

        Ok(WriteSummary {
            updated_range: response.updated_range,
            updated_rows: response.updated_rows.map_or(0, |n| n.max(0) as usize),
        })
    }
}
