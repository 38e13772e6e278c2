use std::fmt;

use thiserror::Error;

/// Roster API call that produced a [`SyncError::Remote`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOperation {
    ListTeams,
    GetSchedule,
}

impl fmt::Display for RemoteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteOperation::ListTeams => write!(f, "list teams"),
            RemoteOperation::GetSchedule => write!(f, "get on-call schedule"),
        }
    }
}

/// Every failure a sync run can hit, grouped the way the run reacts to them.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Configuration file, secrets or prompt input missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Service-account key could not be loaded or the authenticator failed.
    #[error("sheets authentication error: {0}")]
    Auth(String),

    /// Transport failure, non-2xx status or undecodable body from the roster API.
    #[error("roster API error during {operation}{}: {message}", status_suffix(.status))]
    Remote {
        operation: RemoteOperation,
        status: Option<u16>,
        message: String,
    },

    /// The spreadsheet does not carry the columns the sync needs.
    #[error("sheet validation error: {0}")]
    Validation(String),

    /// Reading the current table from the spreadsheet failed.
    #[error("failed to read sheet: {0}")]
    SheetRead(String),

    /// The bulk update of the spreadsheet failed.
    #[error("failed to write sheet: {0}")]
    Write(String),

    /// Writing the local CSV copy failed.
    #[error("failed to export CSV: {0}")]
    Export(String),
}

impl SyncError {
    pub fn remote(operation: RemoteOperation, status: Option<u16>, message: impl Into<String>) -> Self {
        SyncError::Remote {
            operation,
            status,
            message: message.into(),
        }
    }

    /// Process exit code reported for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            SyncError::Config(_) | SyncError::Auth(_) => 2,
            SyncError::Validation(_) | SyncError::SheetRead(_) => 3,
            SyncError::Remote { .. } => 4,
            SyncError::Write(_) | SyncError::Export(_) => 5,
        }
    }
}

impl From<config::ConfigError> for SyncError {
    fn from(err: config::ConfigError) -> Self {
        SyncError::Config(err.to_string())
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_error_mentions_status_when_present() {
        let err = SyncError::remote(RemoteOperation::ListTeams, Some(503), "unavailable");
        assert_eq!(
            err.to_string(),
            "roster API error during list teams (HTTP 503): unavailable"
        );

        let err = SyncError::remote(RemoteOperation::GetSchedule, None, "connection refused");
        assert_eq!(
            err.to_string(),
            "roster API error during get on-call schedule: connection refused"
        );
    }

    #[test]
    fn exit_codes_distinguish_failure_kinds() {
        assert_eq!(SyncError::Config("x".into()).exit_code(), 2);
        assert_eq!(SyncError::Validation("x".into()).exit_code(), 3);
        assert_eq!(SyncError::remote(RemoteOperation::ListTeams, None, "x").exit_code(), 4);
        assert_eq!(SyncError::Write("x".into()).exit_code(), 5);
    }
}
