use chrono::{Local, NaiveDateTime};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use super::VeeamClient;
use crate::core::models::{JobSessionList, RepositoryPeriod, RepositoryReport};
use crate::error::{Error, Result};
use crate::transport::{HttpRequest, HttpSession};

const URN_PREFIX: &str = "urn:veeam:";

/// Summary reports under `/reports/summary/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryReport {
    ProcessedVms,
    JobStatistics,
    VmsOverview,
    Overview,
    Repository,
}

impl SummaryReport {
    pub fn path(self) -> &'static str {
        match self {
            Self::ProcessedVms => "/reports/summary/processed_vms",
            Self::JobStatistics => "/reports/summary/job_statistics",
            Self::VmsOverview => "/reports/summary/vms_overview",
            Self::Overview => "/reports/summary/overview",
            Self::Repository => "/reports/summary/repository",
        }
    }
}

/// Validate an identifier before it is spliced into a path.
///
/// Veeam URNs (`urn:veeam:Job:<uuid>`) are reduced to the bare UUID. Other
/// values go through as given, so the backend can reject malformed ids
/// with its own message.
pub(crate) fn resource_id(kind: &str, raw: &str) -> Result<String> {
    let id = raw.trim();
    if id.is_empty() {
        return Err(Error::InvalidInput(format!("{kind} id is required")));
    }
    if let Some(rest) = id.strip_prefix(URN_PREFIX) {
        let tail = rest.rsplit(':').next().unwrap_or(rest);
        return Uuid::parse_str(tail)
            .map(|u| u.hyphenated().to_string())
            .map_err(|e| Error::InvalidInput(format!("{kind} id {id:?}: {e}")));
    }
    if id
        .chars()
        .any(|c| matches!(c, '/' | '?' | '#') || c.is_whitespace())
    {
        return Err(Error::InvalidInput(format!(
            "{kind} id {id:?} contains characters not allowed in a path"
        )));
    }
    Ok(id.to_string())
}

#[derive(Deserialize)]
struct RepositorySummary {
    #[serde(rename = "Periods")]
    periods: Vec<RepositoryPeriod>,
}


impl<S: HttpSession> VeeamClient<S> {
    /// All job definitions.
    pub async fn get_jobs(&self) -> Result<Value> {
        self.get_json(HttpRequest::get("/jobs")).await
    }

    pub async fn get_job(&self, job_id: &str) -> Result<Value> {
        let id = resource_id("job", job_id)?;
        self.get_json(HttpRequest::get(format!("/jobs/{id}")).query("format", "Entity"))
            .await
    }

    /// Runs of one job, newest first, still under their
    /// `BackupJobSessions` key.
    pub async fn get_backup_sessions(&self, job_id: &str) -> Result<JobSessionList> {
        let id = resource_id("job", job_id)?;
        let path = format!("/jobs/{id}/backupSessions");
        let body = self
            .get_json(HttpRequest::get(path.as_str()).query("format", "Entity"))
            .await?;

        if body.get("BackupJobSessions").is_none() {
            return Err(Error::shape(&path, "BackupJobSessions"));
        }
        let mut list: JobSessionList = serde_json::from_value(body)?;
        list.sessions
            .sort_by(|a, b| b.creation_time.cmp(&a.creation_time));
        Ok(list)
    }

    /// Backups created on or imported to the backup servers.
    pub async fn get_backups(&self) -> Result<Value> {
        self.get_json(HttpRequest::get("/backups")).await
    }

    pub async fn get_backup(&self, backup_id: &str) -> Result<Value> {
        let id = resource_id("backup", backup_id)?;
        self.get_json(HttpRequest::get(format!("/backups/{id}")).query("format", "Entity"))
            .await
    }

    pub async fn get_restore_points(&self, backup_id: &str) -> Result<Value> {
        let id = resource_id("backup", backup_id)?;
        self.get_json(HttpRequest::get(format!("/backups/{id}/restorePoints")))
            .await
    }

    pub async fn get_vm_restore_points(&self, restore_point_id: &str) -> Result<Value> {
        let id = resource_id("restore point", restore_point_id)?;
        self.get_json(HttpRequest::get(format!("/restorePoints/{id}/vmRestorePoints")))
            .await
    }

    pub async fn get_summary(&self, report: SummaryReport) -> Result<Value> {
        self.get_json(HttpRequest::get(report.path())).await
    }

    /// VMs processed per day.
    pub async fn get_vms_processed_day(&self) -> Result<Value> {
        self.get_summary(SummaryReport::ProcessedVms).await
    }

    pub async fn get_summary_job_stats(&self) -> Result<Value> {
        self.get_summary(SummaryReport::JobStatistics).await
    }

    pub async fn get_summary_vms(&self) -> Result<Value> {
        self.get_summary(SummaryReport::VmsOverview).await
    }

    pub async fn get_summary_overview(&self) -> Result<Value> {
        self.get_summary(SummaryReport::Overview).await
    }

    pub async fn get_repo_summary(&self) -> Result<Value> {
        self.get_summary(SummaryReport::Repository).await
    }

    /// Repository periods with free-space percentage, `message_type = "repo"`
    /// and the local generation time.
    pub async fn get_repos(&self) -> Result<Vec<RepositoryReport>> {
        self.get_repos_at(Local::now().naive_local()).await
    }

    pub async fn get_repos_at(&self, generated_at: NaiveDateTime) -> Result<Vec<RepositoryReport>> {
        let path = SummaryReport::Repository.path();
        let body = self.get_repo_summary().await?;
        if body.get("Periods").is_none() {
            return Err(Error::shape(path, "Periods"));
        }
        let summary: RepositorySummary = serde_json::from_value(body)?;
        Ok(summary
            .periods
            .into_iter()
            .map(|period| RepositoryReport::new(period, generated_at))
            .collect())
    }
}
