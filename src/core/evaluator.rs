//! Persistent-failure detection.
//!
//! A failed run is persistent when no run of the same job name created
//! after it finished with `Success` or `Warning`. Each failure is checked
//! against its own creation time, so a job that failed twice and then
//! succeeded once clears both failures, while a job that succeeded and
//! then failed stays reported.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt, stream};
use tracing::{debug, info};

use super::models::{JobRun, MessageType, format_timestamp, reference_time};
use crate::error::Result;

/// The two queries the evaluator needs from the gateway.
#[async_trait]
pub trait JobRunQueries: Send + Sync {
    /// Runs with result `Failed` created after `reference_time`.
    async fn query_failed_since(&self, reference_time: DateTime<Utc>) -> Result<Vec<JobRun>>;

    /// Runs of `job_name` with result `Success` or `Warning` created after
    /// `reference_time`.
    async fn query_successful_since(
        &self,
        job_name: &str,
        reference_time: DateTime<Utc>,
    ) -> Result<Vec<JobRun>>;
}

pub struct FailureEvaluator<'a, Q: ?Sized> {
    queries: &'a Q,
    concurrency: usize,
}

impl<'a, Q: JobRunQueries + ?Sized> FailureEvaluator<'a, Q> {
    /// Sequential evaluator: one lookup at a time.
    pub fn new(queries: &'a Q) -> Self {
        Self {
            queries,
            concurrency: 1,
        }
    }

    /// Allow up to `concurrency` success lookups in flight. Output order
    /// still follows the failed-run list. Zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn find_persistent_failures(&self) -> Result<Vec<JobRun>> {
        self.find_persistent_failures_at(Utc::now()).await
    }

    /// Same as [`find_persistent_failures`](Self::find_persistent_failures)
    /// with an explicit "now".
    pub async fn find_persistent_failures_at(&self, now: DateTime<Utc>) -> Result<Vec<JobRun>> {
        let since = reference_time(now);
        let failed = self.queries.query_failed_since(since).await?;

        info!(
            since = %format_timestamp(&since),
            failed = failed.len(),
            "Checking failed runs for later successes"
        );

        let queries = self.queries;
        let recovered: Vec<bool> = stream::iter(failed.iter())
            .map(move |run| async move {
                let successes = queries
                    .query_successful_since(&run.job_name, run.created_at())
                    .await?;
                debug!(
                    job_name = %run.job_name,
                    created = %run.creation_time,
                    successes = successes.len(),
                    "Looked up later runs"
                );
                Ok::<_, crate::error::Error>(!successes.is_empty())
            })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let persistent: Vec<JobRun> = failed
            .into_iter()
            .zip(recovered)
            .filter(|(_, recovered)| !recovered)
            .map(|(run, _)| run.tagged(MessageType::JobFailed))
            .collect();

        info!(persistent = persistent.len(), "Persistent failure check complete");

        Ok(persistent)
    }
}
