use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use super::VeeamClient;
use crate::core::evaluator::JobRunQueries;
use crate::core::filter::Filter;
use crate::core::models::{JobRun, MessageType, reference_time};
use crate::error::{Error, Result};
use crate::transport::{HttpRequest, HttpSession};

const QUERY_PATH: &str = "/query";
const SESSION_ENTITY: &str = "BackupJobSession";
const ENVELOPE: [&str; 3] = ["Entities", "BackupJobSessions", "BackupJobSessions"];

/// Pull the run list out of
/// `{"Entities": {"BackupJobSessions": {"BackupJobSessions": [...]}}}`.
///
/// A missing level is an error, never an empty list: "no data" must stay
/// distinguishable from "no failures".
pub(crate) fn unwrap_sessions(path: &str, mut body: Value) -> Result<Vec<JobRun>> {
    for key in ENVELOPE {
        body = match body {
            Value::Object(mut map) => map.remove(key).ok_or_else(|| Error::shape(path, key))?,
            _ => return Err(Error::shape(path, key)),
        };
    }
    if !body.is_array() {
        return Err(Error::shape(path, ENVELOPE[2]));
    }
    Ok(serde_json::from_value(body)?)
}

impl<S: HttpSession> VeeamClient<S> {
    /// Run a `BackupJobSession` entity query. Only the first page the
    /// backend returns is read; `PagingInfo` is not followed.
    async fn query_sessions(&self, filter: &Filter) -> Result<Vec<JobRun>> {
        let expr = filter.to_string();
        debug!(filter = %expr, "Querying job sessions");

        let request = HttpRequest::get(QUERY_PATH)
            .query("type", SESSION_ENTITY)
            .query("format", "entities")
            .query("filter", expr);

        let body = self.get_json(request).await?;
        let runs = unwrap_sessions(QUERY_PATH, body)?;
        debug!(count = runs.len(), "Job sessions returned");
        Ok(runs)
    }

    /// Runs created after `reference_time`, whatever their result.
    pub async fn query_sessions_since(&self, reference_time: DateTime<Utc>) -> Result<Vec<JobRun>> {
        self.query_sessions(&Filter::created_after(&reference_time))
            .await
    }

    /// Every run created in the last 24 hours, tagged `message_type = "job"`.
    pub async fn get_jobs_last_day(&self) -> Result<Vec<JobRun>> {
        self.get_jobs_last_day_at(Utc::now()).await
    }

    pub async fn get_jobs_last_day_at(&self, now: DateTime<Utc>) -> Result<Vec<JobRun>> {
        let runs = self.query_sessions_since(reference_time(now)).await?;
        Ok(runs
            .into_iter()
            .map(|run| run.tagged(MessageType::Job))
            .collect())
    }
}

#[async_trait]
impl<S: HttpSession> JobRunQueries for VeeamClient<S> {
    async fn query_failed_since(&self, reference_time: DateTime<Utc>) -> Result<Vec<JobRun>> {
        self.query_sessions(&Filter::failed_since(&reference_time)?)
            .await
    }

    async fn query_successful_since(
        &self,
        job_name: &str,
        reference_time: DateTime<Utc>,
    ) -> Result<Vec<JobRun>> {
        self.query_sessions(&Filter::succeeded_since(job_name, &reference_time)?)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run_json(name: &str) -> Value {
        json!({
            "JobUid": "urn:veeam:Job:1",
            "JobName": name,
            "CreationTimeUTC": "2019-07-01T04:00:16Z",
            "Result": "Failed"
        })
    }

    #[test]
    fn envelope_is_unwrapped() {
        let body = json!({
            "Entities": {"BackupJobSessions": {"BackupJobSessions": [run_json("a"), run_json("b")]}},
            "PagingInfo": {"PageNum": 1, "PagesCount": 1}
        });
        let runs = unwrap_sessions("/query", body).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[1].job_name, "b");
    }

    #[test]
    fn empty_list_is_fine() {
        let body = json!({"Entities": {"BackupJobSessions": {"BackupJobSessions": []}}});
        assert!(unwrap_sessions("/query", body).unwrap().is_empty());
    }

    #[test]
    fn missing_levels_are_shape_errors() {
        let cases = [
            (json!({}), "Entities"),
            (json!({"Entities": {}}), "BackupJobSessions"),
            (json!({"Entities": {"BackupJobSessions": {}}}), "BackupJobSessions"),
            (json!({"Entities": {"BackupJobSessions": {"BackupJobSessions": null}}}), "BackupJobSessions"),
            (json!({"Entities": []}), "BackupJobSessions"),
            (Value::Null, "Entities"),
        ];
        for (body, missing) in cases {
            match unwrap_sessions("/query", body.clone()) {
                Err(Error::ResponseShape { key, path }) => {
                    assert_eq!(key, missing, "body {body}");
                    assert_eq!(path, "/query");
                }
                other => panic!("expected shape error for {body}, got {other:?}"),
            }
        }
    }

    #[test]
    fn malformed_run_is_a_decode_error() {
        let body = json!({"Entities": {"BackupJobSessions": {"BackupJobSessions": [{"JobName": "x"}]}}});
        assert!(matches!(
            unwrap_sessions("/query", body),
            Err(Error::Decode(_))
        ));
    }
}
