//! Recording compute terminator.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::job::domain::JobId;
use crate::job::ports::{ComputeResult, ComputeTerminator};

/// Terminator that counts release requests instead of releasing anything.
#[derive(Debug, Clone, Default)]
pub struct RecordingTerminator {
    calls: Arc<AtomicUsize>,
}

impl RecordingTerminator {
    /// Creates a terminator with a zero call count.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many times termination was requested.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ComputeTerminator for RecordingTerminator {
    async fn terminate(&self, job_id: JobId) -> ComputeResult<()> {
        tracing::debug!(%job_id, "recording compute release");
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
