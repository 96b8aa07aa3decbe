use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Format of the per-run directory name and job id suffix.
pub const TS_FORMAT: &str = "%Y%m%dT%H%M%SZ";
/// Format of `started_at` / `finished_at`.
pub const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Success,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Error => "error",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, JobStatus::Running)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a host's `index.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub host: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub root_url: String,
    pub depth: usize,
    pub count_fetched: usize,
    pub bytes_stored: u64,
    pub status: JobStatus,
    pub error: Option<String>,
    pub ts: String,
}

/// Job identifier, rendered as `<host>:<ts>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId {
    pub host: String,
    pub ts: String,
}

impl JobId {
    pub fn new(host: impl Into<String>, ts: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ts: ts.into(),
        }
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.ts)
    }
}

impl FromStr for JobId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.rsplit_once(':') {
            Some((host, ts)) if !host.is_empty() && !ts.is_empty() => Ok(JobId::new(host, ts)),
            _ => Err(CoreError::InvalidRequest(format!("malformed job id '{}'", s))),
        }
    }
}

/// Listing entry for one archived host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteSummary {
    pub host: String,
    pub snapshots: usize,
    pub last_ts: Option<String>,
    pub last_started: Option<String>,
}

/// Directory timestamp and human-readable start time for `now`.
pub fn job_timestamps(now: DateTime<Utc>) -> (String, String) {
    (
        now.format(TS_FORMAT).to_string(),
        now.format(TIME_FORMAT).to_string(),
    )
}

pub fn format_time(time: DateTime<Utc>) -> String {
    time.format(TIME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_job_id_round_trips_through_display() {
        let id = JobId::new("example.com_8080", "20250102T030405Z");
        assert_eq!(id.to_string(), "example.com_8080:20250102T030405Z");
        assert_eq!(id.to_string().parse::<JobId>().unwrap(), id);
    }

    #[test]
    fn test_malformed_job_id() {
        assert!("no-separator".parse::<JobId>().is_err());
        assert!(":20250101T000000Z".parse::<JobId>().is_err());
        assert!("example.com:".parse::<JobId>().is_err());
    }

    #[test]
    fn test_timestamps() {
        let now = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let (ts, started) = job_timestamps(now);
        assert_eq!(ts, "20250102T030405Z");
        assert_eq!(started, "2025-01-02T03:04:05Z");
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&JobStatus::Running).unwrap(), "\"running\"");
        assert_eq!(
            serde_json::from_str::<JobStatus>("\"error\"").unwrap(),
            JobStatus::Error
        );
    }
}
