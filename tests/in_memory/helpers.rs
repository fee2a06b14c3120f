//! Shared test helpers for in-memory orchestration tests.

use async_trait::async_trait;
use conductor::job::{
    adapters::{
        cipher::LocalKeyCipher,
        memory::{InMemoryJobStore, RecordingTerminator},
    },
    domain::JobProgress,
    ports::{
        EngineError, EngineInvocation, EngineResult, ProgressSink, ProvisionRequest,
        ProvisionResult, ProvisionedWorker, ReplicationEngine, WorkerProvisioner,
    },
    services::{CoordinatorSettings, JobCoordinator, WorkerReport, WorkerRuntime},
};
use mockable::DefaultClock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

/// Worker runtime wired to in-memory adapters.
pub type TestWorker = WorkerRuntime<
    InMemoryJobStore,
    LocalKeyCipher,
    FakeEngine,
    RecordingTerminator,
    DefaultClock,
>;

/// Coordinator that launches in-process workers.
pub type TestCoordinator =
    JobCoordinator<InMemoryJobStore, LocalKeyCipher, LaunchingProvisioner, DefaultClock>;

/// Engine double reporting fixed progress and then succeeding or failing.
#[derive(Default)]
pub struct FakeEngine {
    failure: Option<EngineError>,
    calls: AtomicUsize,
}

impl FakeEngine {
    /// Creates an engine that fails every run with `error`.
    #[must_use]
    pub const fn failing(error: EngineError) -> Self {
        Self {
            failure: Some(error),
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns how many runs were started.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReplicationEngine for FakeEngine {
    async fn run(
        &self,
        invocation: &EngineInvocation,
        progress: &dyn ProgressSink,
    ) -> EngineResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let total = u32::try_from(invocation.filter.include_databases.len())
            .unwrap_or(u32::MAX)
            .max(1);
        progress.report(JobProgress::new(None, total, total)).await;
        self.failure.clone().map_or(Ok(()), Err)
    }
}

/// Provisioner that starts each worker as a Tokio task.
pub struct LaunchingProvisioner {
    worker: Arc<TestWorker>,
    launched: Mutex<Vec<JoinHandle<WorkerReport>>>,
}

impl LaunchingProvisioner {
    /// Creates a provisioner running `worker` for each request.
    #[must_use]
    pub fn new(worker: Arc<TestWorker>) -> Self {
        Self {
            worker,
            launched: Mutex::new(Vec::new()),
        }
    }

    /// Returns the worker runtime used for launches.
    #[must_use]
    pub fn worker(&self) -> Arc<TestWorker> {
        Arc::clone(&self.worker)
    }

    /// Waits for every launched worker and returns their reports.
    pub async fn join_all(&self) -> Vec<WorkerReport> {
        let handles: Vec<_> = self
            .launched
            .lock()
            .map(|mut launched| launched.drain(..).collect())
            .unwrap_or_default();
        let mut reports = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Ok(report) = handle.await {
                reports.push(report);
            }
        }
        reports
    }
}

#[async_trait]
impl WorkerProvisioner for LaunchingProvisioner {
    async fn provision(&self, request: &ProvisionRequest) -> ProvisionResult<ProvisionedWorker> {
        let worker = Arc::clone(&self.worker);
        let job_id = request.job_id;
        let handle = tokio::spawn(async move { worker.run(job_id).await });
        if let Ok(mut launched) = self.launched.lock() {
            launched.push(handle);
        }
        Ok(ProvisionedWorker {
            instance_id: format!("task-{job_id}"),
        })
    }
}

/// Fully wired in-memory deployment.
pub struct Deployment {
    /// Shared job store.
    pub store: InMemoryJobStore,
    /// Engine shared by every worker.
    pub engine: Arc<FakeEngine>,
    /// Terminator shared by every worker.
    pub terminator: RecordingTerminator,
    /// Provisioner that launched the workers.
    pub provisioner: Arc<LaunchingProvisioner>,
    /// Coordinator under test.
    pub coordinator: TestCoordinator,
}

impl Deployment {
    /// Wires a coordinator and worker over shared in-memory adapters.
    #[must_use]
    pub fn new(engine: FakeEngine) -> Self {
        let store = InMemoryJobStore::new();
        let (local_cipher, _key) = LocalKeyCipher::generate();
        let cipher = Arc::new(local_cipher);
        let shared_engine = Arc::new(engine);
        let terminator = RecordingTerminator::new();
        let worker = Arc::new(WorkerRuntime::new(
            Arc::new(store.clone()),
            Arc::clone(&cipher),
            Arc::clone(&shared_engine),
            Arc::new(terminator.clone()),
            Arc::new(DefaultClock),
        ));
        let provisioner = Arc::new(LaunchingProvisioner::new(worker));
        let coordinator = JobCoordinator::new(
            Arc::new(store.clone()),
            cipher,
            Arc::clone(&provisioner),
            Arc::new(DefaultClock),
            CoordinatorSettings::default(),
        );
        Self {
            store,
            engine: shared_engine,
            terminator,
            provisioner,
            coordinator,
        }
    }
}
