//! Job store port.
//!
//! The store is the single source of mutual exclusion: every status change
//! goes through [`JobStore::conditional_transition`], which must be an
//! atomic compare-and-set on `status`.

use crate::job::domain::{
    Job, JobDomainError, JobId, JobProgress, JobStatus, ProgressUpdate, StatusTransition,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for job store operations.
pub type JobStoreResult<T> = Result<T, JobStoreError>;

/// Job persistence contract.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Inserts a new job record.
    ///
    /// # Errors
    ///
    /// Returns [`JobStoreError::DuplicateJob`] when the identifier is taken.
    async fn create(&self, job: &Job) -> JobStoreResult<()>;

    /// Reads a job by identifier.
    ///
    /// Returns `None` when the job does not exist.
    async fn read(&self, id: JobId) -> JobStoreResult<Option<Job>>;

    /// Atomically moves a job from `transition.expected()` to
    /// `transition.next()`, stamping the matching timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`JobStoreError::NotFound`] when the job does not exist and
    /// [`JobStoreError::Conflict`] when its status is not the expected one.
    /// A conflict leaves the record untouched.
    async fn conditional_transition(
        &self,
        id: JobId,
        transition: &StatusTransition,
    ) -> JobStoreResult<Job>;

    /// Stores a progress snapshot when the job is `running` and the snapshot
    /// does not move `databases_completed` backwards.
    ///
    /// # Errors
    ///
    /// Returns [`JobStoreError::NotFound`] when the job does not exist.
    async fn update_progress(&self, id: JobId, progress: JobProgress)
    -> JobStoreResult<ProgressUpdate>;

    /// Lists jobs in `status`, oldest first, optionally restricted to those
    /// created strictly before `created_before`.
    async fn list_by_status(
        &self,
        status: JobStatus,
        created_before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> JobStoreResult<Vec<Job>>;

    /// Counts jobs whose status is any of `statuses`.
    async fn count_by_statuses(&self, statuses: &[JobStatus]) -> JobStoreResult<u64>;

    /// Deletes every job whose `expires_at` is at or before `now`, whatever
    /// its status. Jobs left active past their retention window are expired
    /// too, so they stop counting towards the active-job limit.
    ///
    /// Returns the number of deleted records.
    async fn purge_expired(&self, now: DateTime<Utc>) -> JobStoreResult<u64>;
}

/// Errors returned by job store implementations.
#[derive(Debug, Clone, Error)]
pub enum JobStoreError {
    /// A job with the same identifier already exists.
    #[error("duplicate job identifier: {0}")]
    DuplicateJob(JobId),

    /// The job was not found.
    #[error("job not found: {0}")]
    NotFound(JobId),

    /// The job's status did not match the transition's expected status.
    #[error("job {job_id} is {actual}, expected {expected}")]
    Conflict {
        /// Job identifier.
        job_id: JobId,
        /// Status the caller expected.
        expected: JobStatus,
        /// Status found in the store.
        actual: JobStatus,
    },

    /// A persisted record could not be converted back into a job.
    #[error(transparent)]
    Domain(#[from] JobDomainError),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl JobStoreError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }

    /// Returns whether the error is a lost compare-and-set race.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
