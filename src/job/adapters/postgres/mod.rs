//! `PostgreSQL` adapters for job persistence.

mod models;
mod repository;
mod schema;

pub use repository::{JobPgPool, PostgresJobStore, SCHEMA_SQL, build_pool};
