//! Scriptable in-memory provisioner.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::job::ports::{
    ProvisionError, ProvisionRequest, ProvisionResult, ProvisionedWorker, WorkerProvisioner,
};

/// Provisioner that records every request and replays scripted failures.
///
/// Requests succeed unless a failure was queued with
/// [`RecordingProvisioner::fail_next`].
#[derive(Debug, Clone, Default)]
pub struct RecordingProvisioner {
    state: Arc<Mutex<ProvisionerState>>,
}

#[derive(Debug, Default)]
struct ProvisionerState {
    requests: Vec<ProvisionRequest>,
    scripted_failures: VecDeque<ProvisionError>,
}

impl RecordingProvisioner {
    /// Creates a provisioner that always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a failure for the next unscripted request.
    pub fn fail_next(&self, error: ProvisionError) {
        if let Ok(mut state) = self.state.lock() {
            state.scripted_failures.push_back(error);
        }
    }

    /// Returns every request received so far, including failed attempts.
    #[must_use]
    pub fn requests(&self) -> Vec<ProvisionRequest> {
        self.state
            .lock()
            .map(|state| state.requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl WorkerProvisioner for RecordingProvisioner {
    async fn provision(&self, request: &ProvisionRequest) -> ProvisionResult<ProvisionedWorker> {
        let mut state = self
            .state
            .lock()
            .map_err(|err| ProvisionError::Rejected(err.to_string()))?;
        state.requests.push(*request);
        if let Some(failure) = state.scripted_failures.pop_front() {
            return Err(failure);
        }
        Ok(ProvisionedWorker {
            instance_id: format!("local-{}", request.job_id),
        })
    }
}
