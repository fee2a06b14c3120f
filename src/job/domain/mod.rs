//! Domain model for replication jobs.
//!
//! The job domain covers the validated submission, the persisted job record
//! and its status state machine, and the credential value types. It holds no
//! infrastructure concerns: encryption, persistence, provisioning and engine
//! execution live behind ports.

mod compute;
mod error;
mod ids;
mod job;
mod redaction;
mod secret;
mod spec;
mod status;

pub use compute::ComputeClass;
pub use error::{JobDomainError, ParseComputeClassError, ParseJobCommandError, ParseJobStatusError};
pub use ids::{JobId, TraceId};
pub use job::{Job, JobProgress, NewJob, PersistedJobData, ProgressUpdate, StatusTransition};
pub use redaction::{
    CredentialScrubber, REDACTED_USERINFO, redact_connection_url, strip_embedded_userinfo,
    truncate_tail,
};
pub use secret::{ConnectionSecret, EncryptedCredential};
pub use spec::{JobCommand, JobFilter, JobOptions, SchemaVersion, ValidJobSpec};
pub use status::JobStatus;
