//! In-memory integration tests for job orchestration.
//!
//! Tests are organized into modules by functionality:
//! - `submission_flow_tests`: Coordinator submissions through to worker launch
//! - `worker_flow_tests`: Worker execution against coordinator-created jobs

mod in_memory {
    pub mod helpers;

    mod submission_flow_tests;
    mod worker_flow_tests;
}
