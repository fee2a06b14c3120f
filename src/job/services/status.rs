//! Read path over the job store.

use crate::job::{
    domain::{Job, JobCommand, JobId, JobProgress, JobStatus, TraceId},
    ports::{JobStore, JobStoreResult},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Client-facing projection of a job.
///
/// Carries no credential material, encrypted or otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStatusView {
    /// Job identifier.
    pub job_id: JobId,
    /// Trace identifier for log correlation.
    pub trace_id: TraceId,
    /// Lifecycle status.
    pub status: JobStatus,
    /// Engine command.
    pub command: JobCommand,
    /// Latest progress snapshot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<JobProgress>,
    /// Failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Claim timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub running_at: Option<DateTime<Utc>>,
    /// Completion timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Failure timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,
}

impl From<&Job> for JobStatusView {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id(),
            trace_id: job.trace_id(),
            status: job.status(),
            command: job.command(),
            progress: job.progress().cloned(),
            error: job.error().map(str::to_owned),
            created_at: job.created_at(),
            running_at: job.running_at(),
            completed_at: job.completed_at(),
            failed_at: job.failed_at(),
        }
    }
}

/// Serves status reads. Never writes.
#[derive(Clone)]
pub struct StatusReporter<S>
where
    S: JobStore,
{
    store: Arc<S>,
}

impl<S> StatusReporter<S>
where
    S: JobStore,
{
    /// Creates a reporter over `store`.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Returns the current view of a job, or `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns the store error when the read fails.
    pub async fn get(&self, job_id: JobId) -> JobStoreResult<Option<JobStatusView>> {
        let job = self.store.read(job_id).await?;
        Ok(job.as_ref().map(JobStatusView::from))
    }

    /// Lists jobs in `status`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns the store error when the query fails.
    pub async fn list_by_status(
        &self,
        status: JobStatus,
        created_before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> JobStoreResult<Vec<JobStatusView>> {
        let jobs = self
            .store
            .list_by_status(status, created_before, limit)
            .await?;
        Ok(jobs.iter().map(JobStatusView::from).collect())
    }
}
