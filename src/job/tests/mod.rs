//! Unit tests for the job module.
//!
//! Tests are organised by concern: domain rules, submission validation,
//! adapters, and the coordinator and worker services.

mod domain_tests;
mod status_tests;
