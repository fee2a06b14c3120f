//! Conductor: remote PostgreSQL replication job orchestration.
//!
//! A coordinator accepts replication job submissions, validates them,
//! encrypts the connection URLs and provisions a dedicated worker per job.
//! Each worker claims its job through a compare-and-set on the shared job
//! store, runs the external replication engine, records the terminal status
//! and then releases its own compute unit.
//!
//! # Architecture
//!
//! The [`job`] module follows hexagonal architecture:
//!
//! - **Domain**: job records, status machine and credential handling
//! - **Ports**: store, cipher, provisioner, engine and compute traits
//! - **Adapters**: in-memory, `PostgreSQL` and external-process implementations
//! - **Services**: the coordinator, status reporter and worker runtime
//!
//! # Modules
//!
//! - [`job`]: job lifecycle orchestration
//! - [`config`]: layered configuration
//! - [`logging`]: tracing subscriber setup

pub mod config;
pub mod job;
pub mod logging;
