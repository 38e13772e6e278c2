use std::fmt;

use chrono::TimeZone;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::cfg::{Cfg, OutputConfig};
use crate::error::SyncError;
use crate::roster::{RosterSource, ScheduleFetch};
use crate::sheets::{build_table, validate_header, SheetGateway, WriteSummary};
use crate::transform::{flatten, OutputRow, RollIssue};

/// Progress of a run. Each stage needs the output of the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    Start,
    HeaderValidated,
    TeamsFetched,
    AllSchedulesFetched,
    RowsFlattened,
    SheetWritten,
    Done,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncStage::Start => "start",
            SyncStage::HeaderValidated => "header validated",
            SyncStage::TeamsFetched => "teams fetched",
            SyncStage::AllSchedulesFetched => "schedules fetched",
            SyncStage::RowsFlattened => "rows flattened",
            SyncStage::SheetWritten => "sheet written",
            SyncStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// A run that ended in the failed state, with the last stage it completed.
#[derive(Debug, Error)]
#[error("sync failed after stage '{stage}': {error}")]
pub struct SyncFailure {
    pub stage: SyncStage,
    #[source]
    pub error: SyncError,
}

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub read_range: String,
    pub write_range: String,
    pub output: OutputConfig,
    pub dry_run: bool,
}

impl SyncSettings {
    pub fn from_cfg(cfg: &Cfg, dry_run: bool) -> Self {
        Self {
            read_range: cfg.sheets.read_range.clone(),
            write_range: cfg.sheets.write_range.clone(),
            output: cfg.output.clone(),
            dry_run,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedTeam {
    pub slug: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub teams: usize,
    pub rows: Vec<OutputRow>,
    pub skipped_teams: Vec<SkippedTeam>,
    pub teams_without_data: Vec<String>,
    pub issues: Vec<RollIssue>,
    /// `None` for dry runs.
    pub written: Option<WriteSummary>,
}

/// Runs one full overwrite pass: validate header, fetch teams, fetch each
/// schedule in turn, flatten, write.
pub async fn run_sync<R, S, Tz>(
    sheet_id: &str,
    roster: &R,
    sheets: &S,
    settings: &SyncSettings,
    tz: &Tz,
) -> Result<SyncReport, SyncFailure>
where
    R: RosterSource + ?Sized,
    S: SheetGateway + ?Sized,
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let mut stage = SyncStage::Start;
    let fail = |stage: SyncStage| move |error: SyncError| SyncFailure { stage, error };

    info!("Starting sync for sheet {}", sheet_id);

    let existing = sheets
        .read_table(sheet_id, &settings.read_range)
        .await
        .map_err(fail(stage))?;
    let header = validate_header(&existing.header).map_err(fail(stage))?;
    if !header.has_username {
        debug!("Username column absent, it will be added");
    }
    if !header.canonical {
        warn!(
            "Existing header {:?} differs from the written layout {:?}; it will be replaced",
            existing.header,
            OutputRow::headers()
        );
    }
    stage = SyncStage::HeaderValidated;

    let teams = roster.list_teams().await.map_err(fail(stage))?;
    stage = SyncStage::TeamsFetched;
    info!("Syncing {} teams", teams.len());

    let mut report = SyncReport {
        teams: teams.len(),
        ..Default::default()
    };

    for team in &teams {
        let entries = match roster.get_schedule(&team.slug).await {
            Ok(ScheduleFetch::Entries(entries)) => entries,
            Ok(ScheduleFetch::NoData) => {
                info!("No on-call schedules found for team {}", team.slug);
                report.teams_without_data.push(team.slug.clone());
                continue;
            }
            Err(e) => {
                warn!("Skipping team {}: {}", team.slug, e);
                report.skipped_teams.push(SkippedTeam {
                    slug: team.slug.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let flattened = flatten(team, &entries, tz, &settings.output);
        debug!("Team {} produced {} rows", team.slug, flattened.rows.len());
        for issue in &flattened.issues {
            warn!(
                "Team {} entry {} roll {} is missing {:?}; those cells are left blank",
                issue.team, issue.entry, issue.roll, issue.missing
            );
        }
        report.rows.extend(flattened.rows);
        report.issues.extend(flattened.issues);
    }
    stage = SyncStage::AllSchedulesFetched;
    debug!("Reached stage '{}'", stage);
    stage = SyncStage::RowsFlattened;

    if settings.dry_run {
        info!("Dry run: skipping write of {} rows", report.rows.len());
    } else {
        let values = build_table(&report.rows, existing.height());
        let summary = sheets
            .overwrite(sheet_id, &settings.write_range, values)
            .await
            .map_err(fail(stage))?;
        stage = SyncStage::SheetWritten;
        info!(
            "Stage '{}': {} rows updated in {}",
            stage,
            summary.updated_rows,
            summary.updated_range.as_deref().unwrap_or(&settings.write_range)
        );
        report.written = Some(summary);
    }

    stage = SyncStage::Done;
    info!(
        "Sync {}: {} rows from {} teams ({} skipped, {} without schedules, {} incomplete rolls)",
        stage,
        report.rows.len(),
        report.teams,
        report.skipped_teams.len(),
        report.teams_without_data.len(),
        report.issues.len()
    );
    Ok(report)
}

pub async fn run_with_error_handling<R, S, Tz>(
    sheet_id: &str,
    roster: &R,
    sheets: &S,
    settings: &SyncSettings,
    tz: &Tz,
) -> Result<SyncReport, SyncFailure>
where
    R: RosterSource + ?Sized,
    S: SheetGateway + ?Sized,
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    match run_sync(sheet_id, roster, sheets, settings, tz).await {
        Ok(report) => {
            info!("Google Sheet updated successfully.");
            Ok(report)
        }
        Err(failure) => {
            error!("Sync failed after stage '{}': {}", failure.stage, failure.error);
            Err(failure)
        }
    }
}
