//! In-memory job store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::job::{
    domain::{Job, JobId, JobProgress, JobStatus, ProgressUpdate, StatusTransition},
    ports::{JobStore, JobStoreError, JobStoreResult},
};

/// Thread-safe in-memory job store.
///
/// Compare-and-set transitions hold the write lock for the whole
/// check-and-write, which gives the same atomicity as a conditional update.
#[derive(Debug, Clone, Default)]
pub struct InMemoryJobStore {
    state: Arc<RwLock<InMemoryJobState>>,
}

#[derive(Debug, Default)]
struct InMemoryJobState {
    jobs: HashMap<JobId, Job>,
    status_index: BTreeSet<StatusKey>,
}

type StatusKey = (JobStatus, DateTime<Utc>, JobId);

const fn status_key(job: &Job) -> StatusKey {
    (job.status(), job.created_at(), job.id())
}

impl InMemoryJobStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored jobs.
    ///
    /// # Errors
    ///
    /// Returns [`JobStoreError::Persistence`] when the lock is poisoned.
    pub fn len(&self) -> JobStoreResult<usize> {
        Ok(self.read_state()?.jobs.len())
    }

    /// Returns whether the store holds no jobs.
    ///
    /// # Errors
    ///
    /// Returns [`JobStoreError::Persistence`] when the lock is poisoned.
    pub fn is_empty(&self) -> JobStoreResult<bool> {
        Ok(self.len()? == 0)
    }

    fn read_state(&self) -> JobStoreResult<RwLockReadGuard<'_, InMemoryJobState>> {
        self.state
            .read()
            .map_err(|err| JobStoreError::persistence(std::io::Error::other(err.to_string())))
    }

    fn write_state(&self) -> JobStoreResult<RwLockWriteGuard<'_, InMemoryJobState>> {
        self.state
            .write()
            .map_err(|err| JobStoreError::persistence(std::io::Error::other(err.to_string())))
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, job: &Job) -> JobStoreResult<()> {
        let mut state = self.write_state()?;
        if state.jobs.contains_key(&job.id()) {
            return Err(JobStoreError::DuplicateJob(job.id()));
        }
        state.status_index.insert(status_key(job));
        state.jobs.insert(job.id(), job.clone());
        Ok(())
    }

    async fn read(&self, id: JobId) -> JobStoreResult<Option<Job>> {
        Ok(self.read_state()?.jobs.get(&id).cloned())
    }

    async fn conditional_transition(
        &self,
        id: JobId,
        transition: &StatusTransition,
    ) -> JobStoreResult<Job> {
        let mut guard = self.write_state()?;
        let state = &mut *guard;
        let job = state.jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
        if job.status() != transition.expected() {
            return Err(JobStoreError::Conflict {
                job_id: id,
                expected: transition.expected(),
                actual: job.status(),
            });
        }

        let previous_key = status_key(job);
        job.apply_transition(transition)?;
        state.status_index.remove(&previous_key);
        state.status_index.insert(status_key(job));
        Ok(job.clone())
    }

    async fn update_progress(
        &self,
        id: JobId,
        progress: JobProgress,
    ) -> JobStoreResult<ProgressUpdate> {
        let mut state = self.write_state()?;
        let job = state.jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
        Ok(job.apply_progress(progress))
    }

    async fn list_by_status(
        &self,
        status: JobStatus,
        created_before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> JobStoreResult<Vec<Job>> {
        let state = self.read_state()?;
        let jobs = state
            .status_index
            .iter()
            .filter(|(indexed_status, _, _)| *indexed_status == status)
            .take_while(|(_, created_at, _)| created_before.is_none_or(|bound| *created_at < bound))
            .take(limit)
            .filter_map(|(_, _, id)| state.jobs.get(id).cloned())
            .collect();
        Ok(jobs)
    }

    async fn count_by_statuses(&self, statuses: &[JobStatus]) -> JobStoreResult<u64> {
        let state = self.read_state()?;
        let count = state
            .status_index
            .iter()
            .filter(|(status, _, _)| statuses.contains(status))
            .count();
        u64::try_from(count).map_err(JobStoreError::persistence)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> JobStoreResult<u64> {
        let mut state = self.write_state()?;
        let expired: Vec<Job> = state
            .jobs
            .values()
            .filter(|job| job.is_expired(now))
            .cloned()
            .collect();
        for job in &expired {
            state.status_index.remove(&status_key(job));
            state.jobs.remove(&job.id());
        }
        u64::try_from(expired.len()).map_err(JobStoreError::persistence)
    }
}
