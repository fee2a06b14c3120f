//! Job aggregate root and its lifecycle transitions.

use super::{
    EncryptedCredential, JobCommand, JobDomainError, JobFilter, JobId, JobOptions, JobStatus,
    SchemaVersion, TraceId,
};
use chrono::{DateTime, Duration, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// Progress reported by a worker while the engine runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    /// Database currently being processed, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_database: Option<String>,
    /// Number of databases finished so far.
    pub databases_completed: u32,
    /// Number of databases selected for this job.
    pub databases_total: u32,
}

impl JobProgress {
    /// Creates a progress snapshot.
    #[must_use]
    pub fn new(
        current_database: Option<String>,
        databases_completed: u32,
        databases_total: u32,
    ) -> Self {
        Self {
            current_database,
            databases_completed,
            databases_total,
        }
    }

    /// Returns whether `self` would move `databases_completed` backwards
    /// relative to `previous`.
    #[must_use]
    pub const fn regresses_from(&self, previous: &Self) -> bool {
        self.databases_completed < previous.databases_completed
    }
}

/// Outcome of a progress write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressUpdate {
    /// The snapshot was stored.
    Applied,
    /// The job is not running or the snapshot would regress; nothing changed.
    Ignored,
}

/// Compare-and-set request for a job status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTransition {
    expected: JobStatus,
    next: JobStatus,
    at: DateTime<Utc>,
    error: Option<String>,
}

impl StatusTransition {
    /// Creates a validated transition.
    ///
    /// # Errors
    ///
    /// Returns [`JobDomainError::InvalidStatusTransition`] for edges outside
    /// the lifecycle and [`JobDomainError::MissingFailureReason`] when moving
    /// to `failed` without an error message.
    pub fn new(
        expected: JobStatus,
        next: JobStatus,
        at: DateTime<Utc>,
        error: Option<String>,
    ) -> Result<Self, JobDomainError> {
        if !expected.can_transition_to(next) {
            return Err(JobDomainError::InvalidStatusTransition {
                from: expected,
                to: next,
            });
        }
        let failure_reason = match next {
            JobStatus::Failed => Some(
                error
                    .filter(|message| !message.trim().is_empty())
                    .ok_or(JobDomainError::MissingFailureReason)?,
            ),
            _ => None,
        };
        Ok(Self {
            expected,
            next,
            at,
            error: failure_reason,
        })
    }

    /// `provisioning -> running`, taken by the worker that wins the claim.
    #[must_use]
    pub const fn claim(at: DateTime<Utc>) -> Self {
        Self {
            expected: JobStatus::Provisioning,
            next: JobStatus::Running,
            at,
            error: None,
        }
    }

    /// `running -> completed`.
    #[must_use]
    pub const fn complete(at: DateTime<Utc>) -> Self {
        Self {
            expected: JobStatus::Running,
            next: JobStatus::Completed,
            at,
            error: None,
        }
    }

    /// `running -> failed` or `provisioning -> failed`.
    ///
    /// # Errors
    ///
    /// Returns [`JobDomainError`] when `from` cannot move to `failed` or the
    /// message is blank.
    pub fn fail(
        from: JobStatus,
        at: DateTime<Utc>,
        error: impl Into<String>,
    ) -> Result<Self, JobDomainError> {
        Self::new(from, JobStatus::Failed, at, Some(error.into()))
    }

    /// Returns the status the store must currently hold.
    #[must_use]
    pub const fn expected(&self) -> JobStatus {
        self.expected
    }

    /// Returns the status written on success.
    #[must_use]
    pub const fn next(&self) -> JobStatus {
        self.next
    }

    /// Returns the transition timestamp.
    #[must_use]
    pub const fn at(&self) -> DateTime<Utc> {
        self.at
    }

    /// Returns the failure message, present only for transitions to `failed`.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Parameter object for creating a new job record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJob {
    /// Accepted schema version.
    pub schema_version: SchemaVersion,
    /// Engine command.
    pub command: JobCommand,
    /// Encrypted source connection URL.
    pub source_url_encrypted: EncryptedCredential,
    /// Encrypted target connection URL.
    pub target_url_encrypted: EncryptedCredential,
    /// Database and table selection.
    pub filter: JobFilter,
    /// Engine options.
    pub options: JobOptions,
}

/// Replication job aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    id: JobId,
    trace_id: TraceId,
    schema_version: SchemaVersion,
    command: JobCommand,
    source_url_encrypted: EncryptedCredential,
    target_url_encrypted: EncryptedCredential,
    filter: JobFilter,
    options: JobOptions,
    status: JobStatus,
    progress: Option<JobProgress>,
    error: Option<String>,
    created_at: DateTime<Utc>,
    running_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    failed_at: Option<DateTime<Utc>>,
    expires_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedJobData {
    /// Persisted job identifier.
    pub id: JobId,
    /// Persisted trace identifier.
    pub trace_id: TraceId,
    /// Persisted schema version.
    pub schema_version: SchemaVersion,
    /// Persisted command.
    pub command: JobCommand,
    /// Persisted source ciphertext.
    pub source_url_encrypted: EncryptedCredential,
    /// Persisted target ciphertext.
    pub target_url_encrypted: EncryptedCredential,
    /// Persisted filter.
    pub filter: JobFilter,
    /// Persisted options.
    pub options: JobOptions,
    /// Persisted status.
    pub status: JobStatus,
    /// Persisted progress snapshot.
    pub progress: Option<JobProgress>,
    /// Persisted failure message.
    pub error: Option<String>,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted claim timestamp.
    pub running_at: Option<DateTime<Utc>>,
    /// Persisted completion timestamp.
    pub completed_at: Option<DateTime<Utc>>,
    /// Persisted failure timestamp.
    pub failed_at: Option<DateTime<Utc>>,
    /// Persisted expiry timestamp.
    pub expires_at: DateTime<Utc>,
}

impl Job {
    /// Creates a job in `provisioning` with fresh identifiers.
    #[must_use]
    pub fn new_provisioning(new_job: NewJob, retention: Duration, clock: &impl Clock) -> Self {
        let created_at = clock.utc();
        Self {
            id: JobId::new(),
            trace_id: TraceId::new(),
            schema_version: new_job.schema_version,
            command: new_job.command,
            source_url_encrypted: new_job.source_url_encrypted,
            target_url_encrypted: new_job.target_url_encrypted,
            filter: new_job.filter,
            options: new_job.options,
            status: JobStatus::Provisioning,
            progress: None,
            error: None,
            created_at,
            running_at: None,
            completed_at: None,
            failed_at: None,
            expires_at: created_at + retention,
        }
    }

    /// Reconstructs a job from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedJobData) -> Self {
        Self {
            id: data.id,
            trace_id: data.trace_id,
            schema_version: data.schema_version,
            command: data.command,
            source_url_encrypted: data.source_url_encrypted,
            target_url_encrypted: data.target_url_encrypted,
            filter: data.filter,
            options: data.options,
            status: data.status,
            progress: data.progress,
            error: data.error,
            created_at: data.created_at,
            running_at: data.running_at,
            completed_at: data.completed_at,
            failed_at: data.failed_at,
            expires_at: data.expires_at,
        }
    }

    /// Returns the job identifier.
    #[must_use]
    pub const fn id(&self) -> JobId {
        self.id
    }

    /// Returns the trace identifier.
    #[must_use]
    pub const fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    /// Returns the schema version.
    #[must_use]
    pub const fn schema_version(&self) -> &SchemaVersion {
        &self.schema_version
    }

    /// Returns the engine command.
    #[must_use]
    pub const fn command(&self) -> JobCommand {
        self.command
    }

    /// Returns the encrypted source URL.
    #[must_use]
    pub const fn source_url_encrypted(&self) -> &EncryptedCredential {
        &self.source_url_encrypted
    }

    /// Returns the encrypted target URL.
    #[must_use]
    pub const fn target_url_encrypted(&self) -> &EncryptedCredential {
        &self.target_url_encrypted
    }

    /// Returns the filter.
    #[must_use]
    pub const fn filter(&self) -> &JobFilter {
        &self.filter
    }

    /// Returns the options.
    #[must_use]
    pub const fn options(&self) -> &JobOptions {
        &self.options
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> JobStatus {
        self.status
    }

    /// Returns the latest progress snapshot.
    #[must_use]
    pub const fn progress(&self) -> Option<&JobProgress> {
        self.progress.as_ref()
    }

    /// Returns the failure message.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the job was claimed.
    #[must_use]
    pub const fn running_at(&self) -> Option<DateTime<Utc>> {
        self.running_at
    }

    /// Returns when the job completed.
    #[must_use]
    pub const fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Returns when the job failed.
    #[must_use]
    pub const fn failed_at(&self) -> Option<DateTime<Utc>> {
        self.failed_at
    }

    /// Returns when the record becomes eligible for cleanup.
    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns whether the record has outlived its retention window.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Applies a compare-and-set status transition.
    ///
    /// # Errors
    ///
    /// Returns [`JobDomainError::StatusMismatch`] when the current status is
    /// not the one the transition expects.
    pub fn apply_transition(&mut self, transition: &StatusTransition) -> Result<(), JobDomainError> {
        if self.status != transition.expected() {
            return Err(JobDomainError::StatusMismatch {
                expected: transition.expected(),
                actual: self.status,
            });
        }
        self.status = transition.next();
        match transition.next() {
            JobStatus::Running => self.running_at = Some(transition.at()),
            JobStatus::Completed => self.completed_at = Some(transition.at()),
            JobStatus::Failed => {
                self.failed_at = Some(transition.at());
                self.error = transition.error().map(str::to_owned);
            }
            JobStatus::Provisioning => {}
        }
        Ok(())
    }

    /// Merges a progress snapshot while the job is running.
    ///
    /// Snapshots arriving in any other status, or that would move
    /// `databases_completed` backwards, are ignored.
    pub fn apply_progress(&mut self, progress: JobProgress) -> ProgressUpdate {
        if self.status != JobStatus::Running {
            return ProgressUpdate::Ignored;
        }
        if let Some(previous) = self.progress.as_ref()
            && progress.regresses_from(previous)
        {
            return ProgressUpdate::Ignored;
        }
        self.progress = Some(progress);
        ProgressUpdate::Applied
    }
}
