//! Shared world state for job submission BDD scenarios.

use async_trait::async_trait;
use conductor::job::{
    adapters::{
        cipher::LocalKeyCipher,
        memory::{InMemoryJobStore, RecordingProvisioner, RecordingTerminator},
    },
    domain::JobId,
    ports::{EngineInvocation, EngineResult, ProgressSink, ReplicationEngine},
    services::{
        CoordinatorError, CoordinatorSettings, JobCoordinator, SubmissionReceipt, WorkerReport,
        WorkerRuntime,
    },
};
use mockable::DefaultClock;
use rstest::fixture;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Coordinator type used by the BDD world.
pub type TestCoordinator =
    JobCoordinator<InMemoryJobStore, LocalKeyCipher, RecordingProvisioner, DefaultClock>;

/// Worker runtime type used by the BDD world.
pub type TestWorker = WorkerRuntime<
    InMemoryJobStore,
    LocalKeyCipher,
    CountingEngine,
    RecordingTerminator,
    DefaultClock,
>;

/// Engine that counts runs and always succeeds.
#[derive(Default)]
pub struct CountingEngine {
    calls: AtomicUsize,
}

impl CountingEngine {
    /// Returns how many runs were started.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReplicationEngine for CountingEngine {
    async fn run(&self, _: &EngineInvocation, _: &dyn ProgressSink) -> EngineResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Scenario world for job submission behaviour tests.
pub struct JobSubmissionWorld {
    pub store: InMemoryJobStore,
    pub cipher: LocalKeyCipher,
    pub provisioner: RecordingProvisioner,
    pub terminator: RecordingTerminator,
    pub engine: Arc<CountingEngine>,
    pub coordinator: TestCoordinator,
    pub pending_body: Option<serde_json::Value>,
    pub last_submission: Option<Result<SubmissionReceipt, CoordinatorError>>,
    pub last_report: Option<WorkerReport>,
}

impl JobSubmissionWorld {
    /// Creates a world with empty in-memory adapters.
    #[must_use]
    pub fn new() -> Self {
        let store = InMemoryJobStore::new();
        let (cipher, _key) = LocalKeyCipher::generate();
        let provisioner = RecordingProvisioner::new();
        let coordinator = JobCoordinator::new(
            Arc::new(store.clone()),
            Arc::new(cipher.clone()),
            Arc::new(provisioner.clone()),
            Arc::new(DefaultClock),
            CoordinatorSettings::default(),
        );

        Self {
            store,
            cipher,
            provisioner,
            terminator: RecordingTerminator::new(),
            engine: Arc::new(CountingEngine::default()),
            coordinator,
            pending_body: None,
            last_submission: None,
            last_report: None,
        }
    }

    /// Returns the identifier of the last accepted submission.
    ///
    /// # Errors
    ///
    /// Returns an error when no submission was accepted.
    pub fn accepted_job_id(&self) -> Result<JobId, eyre::Report> {
        match self.last_submission.as_ref() {
            Some(Ok(receipt)) => Ok(receipt.job_id),
            Some(Err(err)) => Err(eyre::eyre!("submission was rejected: {err}")),
            None => Err(eyre::eyre!("no submission in scenario world")),
        }
    }

    /// Builds a worker over the world's adapters.
    #[must_use]
    pub fn worker(&self) -> TestWorker {
        WorkerRuntime::new(
            Arc::new(self.store.clone()),
            Arc::new(self.cipher.clone()),
            Arc::clone(&self.engine),
            Arc::new(self.terminator.clone()),
            Arc::new(DefaultClock),
        )
    }
}

impl Default for JobSubmissionWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> JobSubmissionWorld {
    JobSubmissionWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
