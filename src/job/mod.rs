//! Replication job orchestration.
//!
//! A submission is validated, its connection URLs are encrypted, and a job
//! record is created in `provisioning` before one worker is requested. The
//! worker claims the job through a compare-and-set transition, runs the
//! replication engine, records the terminal status and releases its own
//! compute. The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Submission rules in [`validation`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
pub mod validation;

#[cfg(test)]
mod tests;
