//! Diesel row models for job persistence.

use super::schema::replication_jobs;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Query result row for job records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = replication_jobs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct JobRow {
    /// Job identifier.
    pub id: uuid::Uuid,
    /// Trace identifier.
    pub trace_id: uuid::Uuid,
    /// Schema version.
    pub schema_version: String,
    /// Engine command.
    pub command: String,
    /// Encrypted source URL.
    pub source_url_encrypted: String,
    /// Encrypted target URL.
    pub target_url_encrypted: String,
    /// Filter JSON.
    pub filter: Value,
    /// Options JSON.
    pub options: Value,
    /// Lifecycle status.
    pub status: String,
    /// Progress JSON.
    pub progress: Option<Value>,
    /// Failure message.
    pub error: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Claim timestamp.
    pub running_at: Option<DateTime<Utc>>,
    /// Completion timestamp.
    pub completed_at: Option<DateTime<Utc>>,
    /// Failure timestamp.
    pub failed_at: Option<DateTime<Utc>>,
    /// Retention deadline.
    pub expires_at: DateTime<Utc>,
}

/// Insert model for job records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = replication_jobs)]
pub struct NewJobRow {
    /// Job identifier.
    pub id: uuid::Uuid,
    /// Trace identifier.
    pub trace_id: uuid::Uuid,
    /// Schema version.
    pub schema_version: String,
    /// Engine command.
    pub command: String,
    /// Encrypted source URL.
    pub source_url_encrypted: String,
    /// Encrypted target URL.
    pub target_url_encrypted: String,
    /// Filter JSON.
    pub filter: Value,
    /// Options JSON.
    pub options: Value,
    /// Lifecycle status.
    pub status: String,
    /// Progress JSON.
    pub progress: Option<Value>,
    /// Failure message.
    pub error: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Claim timestamp.
    pub running_at: Option<DateTime<Utc>>,
    /// Completion timestamp.
    pub completed_at: Option<DateTime<Utc>>,
    /// Failure timestamp.
    pub failed_at: Option<DateTime<Utc>>,
    /// Retention deadline.
    pub expires_at: DateTime<Utc>,
}

/// Columns written by a status transition. `None` fields are left as is.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = replication_jobs)]
pub struct TransitionChangeset {
    /// New status.
    pub status: String,
    /// Claim timestamp, set by `provisioning -> running`.
    pub running_at: Option<DateTime<Utc>>,
    /// Completion timestamp.
    pub completed_at: Option<DateTime<Utc>>,
    /// Failure timestamp.
    pub failed_at: Option<DateTime<Utc>>,
    /// Failure message.
    pub error: Option<String>,
}
