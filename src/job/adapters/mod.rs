//! Adapter implementations for job orchestration ports.

pub mod cipher;
pub mod memory;
pub mod postgres;
pub mod process;
