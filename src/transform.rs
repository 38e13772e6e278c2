use chrono::{DateTime, TimeZone, Utc};
use tracing::debug;

use crate::cfg::OutputConfig;
use crate::roster::{Roll, ScheduleEntry, Team};

pub const HEADER_DATE: &str = "Date";
pub const HEADER_TIME: &str = "Time";
pub const HEADER_TEAM: &str = "Team";
pub const HEADER_USERNAME: &str = "Username";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRow {
    pub date: String,
    pub time: String,
    pub team: String,
    pub username: String,
}

impl OutputRow {
    pub fn headers() -> Vec<String> {
        vec![
            HEADER_DATE.to_string(),
            HEADER_TIME.to_string(),
            HEADER_TEAM.to_string(),
            HEADER_USERNAME.to_string(),
        ]
    }

    pub fn to_cells(&self) -> Vec<String> {
        vec![
            self.date.clone(),
            self.time.clone(),
            self.team.clone(),
            self.username.clone(),
        ]
    }
}

/// Roll field that was absent or unparseable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollField {
    Start,
    End,
    Username,
}

/// A roll that produced a row with blank cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollIssue {
    pub team: String,
    pub entry: usize,
    pub roll: usize,
    pub missing: Vec<RollField>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Flattened {
    pub rows: Vec<OutputRow>,
    pub issues: Vec<RollIssue>,
}

/// Turns one team's schedule entries into rows, one per roll.
///
/// The date comes from the roll's start and the time from its end, both
/// rendered in `tz`.
pub fn flatten<Tz: TimeZone>(team: &Team, entries: &[ScheduleEntry], tz: &Tz, format: &OutputConfig) -> Flattened
where
    Tz::Offset: std::fmt::Display,
{
    let mut out = Flattened::default();

    for (entry_idx, entry) in entries.iter().enumerate() {
        if entry.rolls.is_empty() {
            debug!(
                "Team {} entry {} ({}) has no rolls",
                team.slug,
                entry_idx,
                entry.rotation_name.as_deref().unwrap_or("unnamed rotation")
            );
            continue;
        }

        for (roll_idx, roll) in entry.rolls.iter().enumerate() {
            let missing = missing_fields(roll);
            if !missing.is_empty() {
                out.issues.push(RollIssue {
                    team: team.slug.clone(),
                    entry: entry_idx,
                    roll: roll_idx,
                    missing,
                });
            }

            out.rows.push(OutputRow {
                date: render(roll.start.as_ref(), tz, &format.date_format),
                time: render(roll.end.as_ref(), tz, &format.time_format),
                team: team.display_name().to_string(),
                username: roll.username.clone().unwrap_or_default(),
            });
        }
    }

    out
}

fn missing_fields(roll: &Roll) -> Vec<RollField> {
    let mut missing = Vec::new();
    if roll.start.is_none() {
        missing.push(RollField::Start);
    }
    if roll.end.is_none() {
        missing.push(RollField::End);
    }
    if roll.username.is_none() {
        missing.push(RollField::Username);
    }
    missing
}

fn render<Tz: TimeZone>(ts: Option<&DateTime<Utc>>, tz: &Tz, pattern: &str) -> String
where
    Tz::Offset: std::fmt::Display,
{
    ts.map(|ts| ts.with_timezone(tz).format(pattern).to_string())
        .unwrap_or_default()
}
