//! Application services for job orchestration.

mod coordinator;
mod status;
mod worker;

pub use coordinator::{
    CoordinatorError, CoordinatorResult, CoordinatorSettings, JobCoordinator,
    PROVISION_FAILURE_MESSAGE, SubmissionReceipt,
};
pub use status::{JobStatusView, StatusReporter};
pub use worker::{
    CLAIM_FAILURE_MESSAGE, MAX_ERROR_CHARS, STORE_READ_FAILURE_MESSAGE, WorkerExit, WorkerReport,
    WorkerRuntime,
};
