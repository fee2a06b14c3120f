//! Step definitions for job submission scenarios.

pub mod given;
pub mod then;
pub mod when;
pub mod world;
