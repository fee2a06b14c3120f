//! Port contracts for job orchestration.
//!
//! Ports define infrastructure-agnostic interfaces used by the coordinator
//! and worker services.

pub mod cipher;
pub mod compute;
pub mod engine;
pub mod provisioner;
pub mod store;

pub use cipher::{CipherError, CipherResult, CredentialCipher};
pub use compute::{ComputeError, ComputeResult, ComputeTerminator};
pub use engine::{EngineError, EngineInvocation, EngineResult, ProgressSink, ReplicationEngine};
pub use provisioner::{
    ProvisionError, ProvisionRequest, ProvisionResult, ProvisionedWorker, WorkerProvisioner,
};
pub use store::{JobStore, JobStoreError, JobStoreResult};
