//! In-memory adapters used by tests and local runs.

mod compute;
mod provisioner;
mod store;

pub use compute::RecordingTerminator;
pub use provisioner::RecordingProvisioner;
pub use store::InMemoryJobStore;
