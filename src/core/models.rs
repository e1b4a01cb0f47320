use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Duration, NaiveDateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How far back the failure and daily-session queries look.
pub const LOOKBACK_HOURS: i64 = 24;

/// Format a timestamp for the query filter grammar: ISO-8601 UTC with a
/// literal `Z` (`2019-07-01T04:00:16Z`). Sub-second digits only appear when
/// the value carries them.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// `now - 24h`, truncated to whole seconds.
pub fn reference_time(now: DateTime<Utc>) -> DateTime<Utc> {
    (now - Duration::hours(LOOKBACK_HOURS)).trunc_subsecs(0)
}

/// Outcome of a job run. Values the backend adds later are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobResult {
    Success,
    Warning,
    Failed,
    Other(String),
}

impl JobResult {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Success => "Success",
            Self::Warning => "Warning",
            Self::Failed => "Failed",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for JobResult {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Success" => Self::Success,
            "Warning" => Self::Warning,
            "Failed" => Self::Failed,
            _ => Self::Other(s),
        }
    }
}

impl From<JobResult> for String {
    fn from(r: JobResult) -> Self {
        match r {
            JobResult::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

/// A backend timestamp: the instant it names plus the exact text it came
/// in as. Serializing writes the original text back, so records pass
/// through untouched whatever form the backend used.
///
/// Values without an offset are read as UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp {
    raw: String,
    utc: DateTime<Utc>,
}

impl Timestamp {
    pub fn parse(raw: &str) -> Result<Self, chrono::ParseError> {
        let utc = match DateTime::parse_from_rfc3339(raw) {
            Ok(dt) => dt.with_timezone(&Utc),
            Err(e) => NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|naive| naive.and_utc())
                .map_err(|_| e)?,
        };
        Ok(Self {
            raw: raw.to_string(),
            utc,
        })
    }

    pub fn utc(&self) -> DateTime<Utc> {
        self.utc
    }

    /// The text as received.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(utc: DateTime<Utc>) -> Self {
        Self {
            raw: format_timestamp(&utc),
            utc,
        }
    }
}

impl TryFrom<String> for Timestamp {
    type Error = chrono::ParseError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<Timestamp> for String {
    fn from(ts: Timestamp) -> Self {
        ts.raw
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.utc.cmp(&other.utc).then_with(|| self.raw.cmp(&other.raw))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Discriminator appended to records handed to downstream consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Job,
    JobFailed,
    Repo,
}

/// One execution of a backup job (`BackupJobSession` on the wire).
///
/// Only the fields the client reasons about are typed; everything else
/// (links, ids, progress, ...) rides along in `extra` and is written back
/// out unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRun {
    #[serde(rename = "JobUid", default, skip_serializing_if = "Option::is_none")]
    pub job_uid: Option<String>,
    #[serde(rename = "JobName")]
    pub job_name: String,
    #[serde(rename = "CreationTimeUTC")]
    pub creation_time: Timestamp,
    #[serde(rename = "EndTimeUTC", default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<Timestamp>,
    #[serde(rename = "Result")]
    pub result: JobResult,
    #[serde(rename = "State", default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<MessageType>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JobRun {
    pub fn created_at(&self) -> DateTime<Utc> {
        self.creation_time.utc()
    }

    pub fn tagged(mut self, message_type: MessageType) -> Self {
        self.message_type = Some(message_type);
        self
    }
}

/// `/jobs/{id}/backupSessions` body. Serializes back to the same
/// `{"BackupJobSessions": [...]}` shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSessionList {
    #[serde(rename = "BackupJobSessions")]
    pub sessions: Vec<JobRun>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One row of `/reports/summary/repository` (`Periods[]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryPeriod {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Capacity")]
    pub capacity: u64,
    #[serde(rename = "FreeSpace")]
    pub free_space: u64,
    #[serde(rename = "BackupSize")]
    pub backup_size: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Repository period annotated for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepositoryReport {
    #[serde(flatten)]
    pub period: RepositoryPeriod,
    /// `None` when the repository reports zero capacity.
    pub percentage_free: Option<f64>,
    pub message_type: MessageType,
    pub date: String,
}

impl RepositoryReport {
    pub fn new(period: RepositoryPeriod, generated_at: NaiveDateTime) -> Self {
        let percentage_free = percentage_free(period.free_space, period.capacity);
        Self {
            period,
            percentage_free,
            message_type: MessageType::Repo,
            date: generated_at.format("%c").to_string(),
        }
    }
}

/// `round(free / capacity * 100, 2)`, exact ties going to the even digit
/// (`3.125` gives `3.12`).
pub fn percentage_free(free_space: u64, capacity: u64) -> Option<f64> {
    if capacity == 0 {
        return None;
    }
    let pct = free_space as f64 / capacity as f64 * 100.0;
    let scaled = pct * 100.0;
    // A value sits exactly halfway at two places only when it is an odd
    // number of eighths.
    let eighths = pct * 8.0;
    let rounded = if eighths.fract() == 0.0 && eighths % 2.0 == 1.0 {
        scaled.round_ties_even()
    } else {
        scaled.round()
    };
    Some(rounded / 100.0)
}
