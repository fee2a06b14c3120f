//! Submission and status coordination.

use super::status::{JobStatusView, StatusReporter};
use crate::job::{
    domain::{ComputeClass, Job, JobId, JobStatus, NewJob, StatusTransition, TraceId},
    ports::{
        CipherError, CredentialCipher, JobStore, JobStoreError, ProvisionError, ProvisionRequest,
        ProvisionedWorker, WorkerProvisioner,
    },
    validation::{JobSpecValidator, ValidationError},
};
use mockable::Clock;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Error stored on jobs whose worker could not be started.
pub const PROVISION_FAILURE_MESSAGE: &str = "failed to provision worker";

/// Tunables for the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorSettings {
    /// Submissions are rejected once this many jobs are active.
    pub max_active_jobs: u64,
    /// How long records are kept after creation.
    pub retention: chrono::Duration,
    /// Compute class used when no size estimate is supplied.
    pub default_compute_class: ComputeClass,
    /// Total provisioning attempts for transient failures.
    pub provision_attempts: u32,
    /// Delay before the first provisioning retry; doubled on each retry.
    pub provision_backoff: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            max_active_jobs: 10,
            retention: chrono::Duration::days(30),
            default_compute_class: ComputeClass::default(),
            provision_attempts: 3,
            provision_backoff: Duration::from_secs(1),
        }
    }
}

/// Response returned for an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionReceipt {
    /// Identifier to poll.
    pub job_id: JobId,
    /// Correlation identifier.
    pub trace_id: TraceId,
    /// Always `provisioning` on acceptance.
    pub status: JobStatus,
}

/// Coordinator failures, each mapped to an HTTP-equivalent status code.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// The body was not valid JSON.
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    /// The submission failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Too many jobs are active.
    #[error("Maximum concurrent jobs limit reached ({limit}). Please try again later.")]
    CapacityExceeded {
        /// Active jobs counted at submission time.
        active: u64,
        /// Configured limit.
        limit: u64,
    },

    /// Credential encryption failed.
    #[error(transparent)]
    Encryption(#[from] CipherError),

    /// The job record could not be created.
    #[error("failed to create job record: {0}")]
    RecordCreation(#[source] JobStoreError),

    /// No worker could be started for the job.
    #[error("failed to provision worker for job {job_id}: {source}")]
    Provisioning {
        /// Job that was marked failed.
        job_id: JobId,
        /// Last provisioning error.
        #[source]
        source: ProvisionError,
    },

    /// The job does not exist.
    #[error("job not found: {0}")]
    NotFound(String),

    /// A store operation failed.
    #[error(transparent)]
    Store(#[from] JobStoreError),
}

impl CoordinatorError {
    /// Returns the HTTP-equivalent status code.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::InvalidJson(_) | Self::Validation(_) => 400,
            Self::NotFound(_) => 404,
            Self::CapacityExceeded { .. } => 429,
            Self::Encryption(_)
            | Self::RecordCreation(_)
            | Self::Provisioning { .. }
            | Self::Store(_) => 500,
        }
    }

    /// Returns the message safe to show clients.
    ///
    /// Client errors carry their full description; server errors are reduced
    /// to a fixed sentence so infrastructure detail stays in the logs.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::InvalidJson(_) | Self::Validation(_) | Self::CapacityExceeded { .. } => {
                self.to_string()
            }
            Self::NotFound(_) => "Job not found".to_owned(),
            Self::Encryption(_) => "Failed to encrypt credentials".to_owned(),
            Self::RecordCreation(_) => "Failed to create job record".to_owned(),
            Self::Provisioning { .. } => "Failed to provision worker".to_owned(),
            Self::Store(_) => "Database error".to_owned(),
        }
    }
}

/// Result type for coordinator operations.
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

/// Accepts submissions and serves status reads.
///
/// The coordinator holds no per-job state; concurrent calls are safe and
/// all coordination with workers goes through the store.
#[derive(Clone)]
pub struct JobCoordinator<S, C, P, K>
where
    S: JobStore,
    C: CredentialCipher,
    P: WorkerProvisioner,
    K: Clock + Send + Sync,
{
    store: Arc<S>,
    cipher: Arc<C>,
    provisioner: Arc<P>,
    clock: Arc<K>,
    validator: JobSpecValidator,
    reporter: StatusReporter<S>,
    settings: CoordinatorSettings,
}

impl<S, C, P, K> JobCoordinator<S, C, P, K>
where
    S: JobStore,
    C: CredentialCipher,
    P: WorkerProvisioner,
    K: Clock + Send + Sync,
{
    /// Creates a coordinator with default validation limits.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        cipher: Arc<C>,
        provisioner: Arc<P>,
        clock: Arc<K>,
        settings: CoordinatorSettings,
    ) -> Self {
        let reporter = StatusReporter::new(Arc::clone(&store));
        Self {
            store,
            cipher,
            provisioner,
            clock,
            validator: JobSpecValidator::default(),
            reporter,
            settings,
        }
    }

    /// Replaces the submission validator.
    #[must_use]
    pub fn with_validator(mut self, validator: JobSpecValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Parses and submits a raw JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::InvalidJson`] for malformed bodies and
    /// otherwise the errors of [`Self::submit`].
    pub async fn submit_json(&self, body: &str) -> CoordinatorResult<SubmissionReceipt> {
        let value = serde_json::from_str::<serde_json::Value>(body)
            .map_err(|err| CoordinatorError::InvalidJson(err.to_string()))?;
        self.submit(&value).await
    }

    /// Validates, encrypts, persists and provisions a job.
    ///
    /// Returns as soon as a worker has been requested; the worker's progress
    /// is observed through [`Self::get_status`].
    ///
    /// # Errors
    ///
    /// Validation and capacity failures have no side effects. Encryption and
    /// record creation failures leave the store untouched. A provisioning
    /// failure marks the new job `failed` before being returned.
    pub async fn submit(&self, body: &serde_json::Value) -> CoordinatorResult<SubmissionReceipt> {
        let spec = self.validator.validate(body)?;
        self.ensure_capacity().await?;

        let source_url_encrypted = self.cipher.encrypt(&spec.source_url).await?;
        let target_url_encrypted = self.cipher.encrypt(&spec.target_url).await?;
        let compute_class = ComputeClass::for_estimated_size(spec.options.estimated_size_bytes)
            .unwrap_or(self.settings.default_compute_class);

        let job = Job::new_provisioning(
            NewJob {
                schema_version: spec.schema_version,
                command: spec.command,
                source_url_encrypted,
                target_url_encrypted,
                filter: spec.filter,
                options: spec.options,
            },
            self.settings.retention,
            &*self.clock,
        );
        self.store
            .create(&job)
            .await
            .map_err(CoordinatorError::RecordCreation)?;
        tracing::info!(
            job_id = %job.id(),
            trace_id = %job.trace_id(),
            command = %job.command(),
            source = %spec.source_url.redacted(),
            target = %spec.target_url.redacted(),
            "job created"
        );

        let request = ProvisionRequest {
            job_id: job.id(),
            compute_class,
        };
        match self.provision_with_retry(&request).await {
            Ok(worker) => {
                tracing::info!(
                    job_id = %job.id(),
                    trace_id = %job.trace_id(),
                    instance_id = %worker.instance_id,
                    compute_class = %compute_class,
                    "worker provisioned"
                );
            }
            Err(source) => {
                self.abandon(&job).await;
                return Err(CoordinatorError::Provisioning {
                    job_id: job.id(),
                    source,
                });
            }
        }

        Ok(SubmissionReceipt {
            job_id: job.id(),
            trace_id: job.trace_id(),
            status: job.status(),
        })
    }

    /// Returns the client view of a job.
    ///
    /// Identifiers that are not valid UUIDs are reported as not found.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::NotFound`] for unknown jobs and
    /// [`CoordinatorError::Store`] when the read fails.
    pub async fn get_status(&self, job_id: &str) -> CoordinatorResult<JobStatusView> {
        let id =
            JobId::parse(job_id).map_err(|_| CoordinatorError::NotFound(job_id.to_owned()))?;
        self.reporter
            .get(id)
            .await?
            .ok_or_else(|| CoordinatorError::NotFound(job_id.to_owned()))
    }

    /// Deletes terminal jobs past their retention window.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::Store`] when the purge fails.
    pub async fn purge_expired(&self) -> CoordinatorResult<u64> {
        let purged = self.store.purge_expired(self.clock.utc()).await?;
        if purged > 0 {
            tracing::info!(purged, "expired jobs purged");
        }
        Ok(purged)
    }

    /// Returns the read-only status reporter.
    #[must_use]
    pub const fn reporter(&self) -> &StatusReporter<S> {
        &self.reporter
    }

    async fn ensure_capacity(&self) -> CoordinatorResult<()> {
        let active = self.store.count_by_statuses(&JobStatus::ACTIVE).await?;
        if active >= self.settings.max_active_jobs {
            tracing::warn!(
                active,
                limit = self.settings.max_active_jobs,
                "job submission rejected at capacity"
            );
            return Err(CoordinatorError::CapacityExceeded {
                active,
                limit: self.settings.max_active_jobs,
            });
        }
        Ok(())
    }

    async fn provision_with_retry(
        &self,
        request: &ProvisionRequest,
    ) -> Result<ProvisionedWorker, ProvisionError> {
        let attempts = self.settings.provision_attempts.max(1);
        let mut delay = self.settings.provision_backoff;
        let mut attempt = 1;
        loop {
            match self.provisioner.provision(request).await {
                Ok(worker) => return Ok(worker),
                Err(err) if err.is_transient() && attempt < attempts => {
                    tracing::warn!(
                        job_id = %request.job_id,
                        attempt,
                        attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "transient provisioning failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Marks a job that never got a worker as failed.
    async fn abandon(&self, job: &Job) {
        let transition = match StatusTransition::fail(
            JobStatus::Provisioning,
            self.clock.utc(),
            PROVISION_FAILURE_MESSAGE,
        ) {
            Ok(transition) => transition,
            Err(err) => {
                tracing::error!(job_id = %job.id(), error = %err, "invalid abandon transition");
                return;
            }
        };
        match self.store.conditional_transition(job.id(), &transition).await {
            Ok(_) => tracing::error!(
                job_id = %job.id(),
                trace_id = %job.trace_id(),
                "worker provisioning failed, job marked failed"
            ),
            Err(err) => tracing::error!(
                job_id = %job.id(),
                trace_id = %job.trace_id(),
                error = %err,
                "worker provisioning failed and job could not be marked failed"
            ),
        }
    }
}
