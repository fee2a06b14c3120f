//! Worker runtime: claim, run, report, terminate.

use crate::job::{
    domain::{
        ConnectionSecret, CredentialScrubber, Job, JobId, JobProgress, JobStatus, ProgressUpdate,
        StatusTransition, strip_embedded_userinfo, truncate_tail,
    },
    ports::{
        ComputeTerminator, CredentialCipher, EngineInvocation, JobStore, ProgressSink,
        ReplicationEngine,
    },
};
use async_trait::async_trait;
use futures::FutureExt;
use mockable::Clock;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Maximum length of a stored failure message.
pub const MAX_ERROR_CHARS: usize = 2000;

/// Error recorded when the job could not be read before claiming.
pub const STORE_READ_FAILURE_MESSAGE: &str = "worker could not read the job record";

/// Error recorded when the claim write failed for a reason other than a lost race.
pub const CLAIM_FAILURE_MESSAGE: &str = "worker could not claim the job";

/// How a worker run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// The engine succeeded and the job was marked `completed`.
    Completed,
    /// The job was marked `failed`, or could not be driven to a terminal
    /// state because of an infrastructure failure.
    Failed,
    /// The job was missing, already claimed or already terminal; the engine
    /// was not run.
    Aborted,
    /// The runtime panicked.
    Crashed,
}

impl WorkerExit {
    /// Returns the process exit code for this outcome.
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Completed | Self::Aborted => 0,
            Self::Failed | Self::Crashed => 1,
        }
    }
}

/// Summary of a worker run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerReport {
    /// Job the worker was started for.
    pub job_id: JobId,
    /// Outcome.
    pub exit: WorkerExit,
    /// Whether the compute release request succeeded.
    pub compute_released: bool,
}

/// Executes one job on its own compute unit.
///
/// [`WorkerRuntime::run`] always releases the compute unit exactly once,
/// whatever happens in between: aborts, engine failures, store outages and
/// panics all end in the same terminating step.
pub struct WorkerRuntime<S, C, E, T, K>
where
    S: JobStore,
    C: CredentialCipher,
    E: ReplicationEngine,
    T: ComputeTerminator + 'static,
    K: Clock + Send + Sync,
{
    store: Arc<S>,
    cipher: Arc<C>,
    engine: Arc<E>,
    terminator: Arc<T>,
    clock: Arc<K>,
}

impl<S, C, E, T, K> WorkerRuntime<S, C, E, T, K>
where
    S: JobStore,
    C: CredentialCipher,
    E: ReplicationEngine,
    T: ComputeTerminator + 'static,
    K: Clock + Send + Sync,
{
    /// Creates a worker runtime.
    #[must_use]
    pub const fn new(
        store: Arc<S>,
        cipher: Arc<C>,
        engine: Arc<E>,
        terminator: Arc<T>,
        clock: Arc<K>,
    ) -> Self {
        Self {
            store,
            cipher,
            engine,
            terminator,
            clock,
        }
    }

    /// Runs the job and then releases compute.
    pub async fn run(&self, job_id: JobId) -> WorkerReport {
        let lease = ComputeLease::new(Arc::clone(&self.terminator), job_id);
        let claimed = AtomicBool::new(false);

        let exit = match AssertUnwindSafe(self.execute(job_id, &claimed))
            .catch_unwind()
            .await
        {
            Ok(exit) => exit,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(%job_id, panic = %message, "worker runtime panicked");
                let from = if claimed.load(Ordering::SeqCst) {
                    JobStatus::Running
                } else {
                    JobStatus::Provisioning
                };
                self.record_failure(job_id, from, &format!("worker runtime fault: {message}"))
                    .await;
                WorkerExit::Crashed
            }
        };

        let compute_released = lease.release().await;
        tracing::info!(%job_id, exit = ?exit, compute_released, "worker finished");
        WorkerReport {
            job_id,
            exit,
            compute_released,
        }
    }

    async fn execute(&self, job_id: JobId, claimed: &AtomicBool) -> WorkerExit {
        let job = match self.store.read(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                tracing::warn!(%job_id, "job not found, aborting");
                return WorkerExit::Aborted;
            }
            Err(err) => {
                tracing::error!(%job_id, error = %err, "failed to read job");
                self.record_failure(job_id, JobStatus::Provisioning, STORE_READ_FAILURE_MESSAGE)
                    .await;
                return WorkerExit::Failed;
            }
        };
        let trace_id = job.trace_id();
        if job.status() != JobStatus::Provisioning {
            tracing::warn!(
                %job_id,
                %trace_id,
                status = %job.status(),
                "job is not awaiting a worker, aborting"
            );
            return WorkerExit::Aborted;
        }

        let Some((source_url, target_url)) = self.decrypt_credentials(&job).await else {
            self.record_failure(job_id, JobStatus::Provisioning, "failed to decrypt credentials")
                .await;
            return WorkerExit::Failed;
        };

        match self
            .store
            .conditional_transition(job_id, &StatusTransition::claim(self.clock.utc()))
            .await
        {
            Ok(_) => claimed.store(true, Ordering::SeqCst),
            Err(err) if err.is_conflict() => {
                tracing::info!(%job_id, %trace_id, error = %err, "claim lost, aborting");
                return WorkerExit::Aborted;
            }
            Err(err) => {
                tracing::error!(%job_id, %trace_id, error = %err, "failed to claim job");
                self.record_failure(job_id, JobStatus::Provisioning, CLAIM_FAILURE_MESSAGE)
                    .await;
                return WorkerExit::Failed;
            }
        }
        tracing::info!(
            %job_id,
            %trace_id,
            command = %job.command(),
            source = %source_url.redacted(),
            target = %target_url.redacted(),
            "job claimed, starting engine"
        );

        let scrubber = CredentialScrubber::new(&[&source_url, &target_url]);
        let invocation = EngineInvocation {
            command: job.command(),
            source_url,
            target_url,
            filter: job.filter().clone(),
            options: *job.options(),
        };
        let sink = StoreProgressSink::new(&*self.store, job_id);

        match self.engine.run(&invocation, &sink).await {
            Ok(()) => self.complete(&job).await,
            Err(err) => {
                let message = truncate_tail(&scrubber.scrub(&err.to_string()), MAX_ERROR_CHARS);
                tracing::warn!(%job_id, %trace_id, error = %message, "engine failed");
                self.record_failure(job_id, JobStatus::Running, &message).await;
                WorkerExit::Failed
            }
        }
    }

    async fn decrypt_credentials(&self, job: &Job) -> Option<(ConnectionSecret, ConnectionSecret)> {
        let decrypted_source = self.cipher.decrypt(job.source_url_encrypted()).await;
        let decrypted_target = self.cipher.decrypt(job.target_url_encrypted()).await;
        match (decrypted_source, decrypted_target) {
            (Ok(source), Ok(target)) => Some((source, target)),
            (Err(err), _) | (_, Err(err)) => {
                tracing::error!(job_id = %job.id(), error = %err, "credential decryption failed");
                None
            }
        }
    }

    async fn complete(&self, job: &Job) -> WorkerExit {
        let transition = StatusTransition::complete(self.clock.utc());
        match self.store.conditional_transition(job.id(), &transition).await {
            Ok(_) => {
                tracing::info!(job_id = %job.id(), trace_id = %job.trace_id(), "job completed");
                WorkerExit::Completed
            }
            Err(err) => {
                tracing::error!(
                    job_id = %job.id(),
                    trace_id = %job.trace_id(),
                    error = %err,
                    "engine succeeded but completion could not be recorded"
                );
                WorkerExit::Failed
            }
        }
    }

    /// Best-effort move to `failed`. Store errors are logged, never returned.
    async fn record_failure(&self, job_id: JobId, from: JobStatus, message: &str) {
        let transition = match StatusTransition::fail(from, self.clock.utc(), message) {
            Ok(transition) => transition,
            Err(err) => {
                tracing::error!(%job_id, error = %err, "cannot build failure transition");
                return;
            }
        };
        if let Err(err) = self.store.conditional_transition(job_id, &transition).await {
            tracing::warn!(%job_id, from = %from, error = %err, "failed to record job failure");
        }
    }
}

/// Forwards engine progress to the store, dropping regressions locally.
struct StoreProgressSink<'a, S: JobStore> {
    store: &'a S,
    job_id: JobId,
    high_water: Mutex<Option<u32>>,
}

impl<'a, S: JobStore> StoreProgressSink<'a, S> {
    const fn new(store: &'a S, job_id: JobId) -> Self {
        Self {
            store,
            job_id,
            high_water: Mutex::new(None),
        }
    }

    fn advance(&self, completed: u32) -> bool {
        let Ok(mut high_water) = self.high_water.lock() else {
            return false;
        };
        if high_water.is_some_and(|previous| completed < previous) {
            return false;
        }
        *high_water = Some(completed);
        true
    }
}

#[async_trait]
impl<S: JobStore> ProgressSink for StoreProgressSink<'_, S> {
    async fn report(&self, progress: JobProgress) {
        if !self.advance(progress.databases_completed) {
            tracing::debug!(job_id = %self.job_id, "dropping regressing progress");
            return;
        }
        match self.store.update_progress(self.job_id, progress).await {
            Ok(ProgressUpdate::Applied) => {}
            Ok(ProgressUpdate::Ignored) => {
                tracing::debug!(job_id = %self.job_id, "store ignored progress update");
            }
            Err(err) => {
                tracing::warn!(job_id = %self.job_id, error = %err, "failed to record progress");
            }
        }
    }
}

/// Obligation to release a worker's compute unit.
///
/// [`ComputeLease::release`] consumes the lease. A lease dropped without
/// being released, for example because the worker future was cancelled,
/// releases compute from a spawned task instead.
struct ComputeLease<T: ComputeTerminator + 'static> {
    terminator: Option<Arc<T>>,
    job_id: JobId,
}

impl<T: ComputeTerminator + 'static> ComputeLease<T> {
    const fn new(terminator: Arc<T>, job_id: JobId) -> Self {
        Self {
            terminator: Some(terminator),
            job_id,
        }
    }

    async fn release(mut self) -> bool {
        let Some(terminator) = self.terminator.take() else {
            return false;
        };
        terminate(terminator.as_ref(), self.job_id).await
    }
}

impl<T: ComputeTerminator + 'static> Drop for ComputeLease<T> {
    fn drop(&mut self) {
        let Some(terminator) = self.terminator.take() else {
            return;
        };
        let job_id = self.job_id;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    terminate(terminator.as_ref(), job_id).await;
                });
            }
            Err(_) => {
                tracing::error!(%job_id, "no runtime available to release compute");
            }
        }
    }
}

async fn terminate<T: ComputeTerminator + ?Sized>(terminator: &T, job_id: JobId) -> bool {
    match terminator.terminate(job_id).await {
        Ok(()) => {
            tracing::info!(%job_id, "compute released");
            true
        }
        Err(err) => {
            tracing::error!(%job_id, error = %err, "failed to release compute");
            false
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    let raw = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    truncate_tail(&strip_embedded_userinfo(raw), MAX_ERROR_CHARS)
}
