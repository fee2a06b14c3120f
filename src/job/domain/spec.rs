//! Validated job specification types.

use super::{ConnectionSecret, ParseJobCommandError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Replication engine command a job executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobCommand {
    /// Check connectivity and prerequisites without copying data.
    Validate,
    /// Perform the initial snapshot copy.
    Init,
    /// Set up continuous logical replication.
    Sync,
    /// Report replication status.
    Status,
    /// Verify source and target consistency.
    Verify,
}

impl JobCommand {
    /// Every accepted command, in the order reported to clients.
    pub const ALL: [Self; 5] = [
        Self::Init,
        Self::Validate,
        Self::Sync,
        Self::Status,
        Self::Verify,
    ];

    /// Returns the canonical command name passed to the engine.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Init => "init",
            Self::Sync => "sync",
            Self::Status => "status",
            Self::Verify => "verify",
        }
    }

    /// Returns the accepted command names joined for error messages.
    #[must_use]
    pub fn allowed_list() -> String {
        Self::ALL
            .iter()
            .map(|command| command.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for JobCommand {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for JobCommand {
    type Error = ParseJobCommandError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "validate" => Ok(Self::Validate),
            "init" => Ok(Self::Init),
            "sync" => Ok(Self::Sync),
            "status" => Ok(Self::Status),
            "verify" => Ok(Self::Verify),
            _ => Err(ParseJobCommandError(value.to_owned())),
        }
    }
}

/// Job specification schema version accepted at submission time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaVersion(String);

impl SchemaVersion {
    /// Wraps an already-validated schema version.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the version as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Database and table selection passed through to the engine.
///
/// `include_databases` and `exclude_databases` are never both non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFilter {
    /// Databases to replicate; empty means all.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub include_databases: BTreeSet<String>,
    /// Databases to skip.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub exclude_databases: BTreeSet<String>,
    /// Tables to skip, as `database.table`.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub exclude_tables: BTreeSet<String>,
}

impl JobFilter {
    /// Returns whether the filter selects everything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.include_databases.is_empty()
            && self.exclude_databases.is_empty()
            && self.exclude_tables.is_empty()
    }
}

/// Closed set of job options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOptions {
    /// Drop existing target databases before copying.
    #[serde(default)]
    pub drop_existing: bool,
    /// Enable continuous sync after the initial copy.
    #[serde(default)]
    pub enable_sync: bool,
    /// Client estimate of the total data size, used for compute sizing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_size_bytes: Option<u64>,
}

/// Job specification that passed every validation rule.
///
/// Connection URLs are still plaintext here and are wrapped so they never
/// appear in `Debug` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidJobSpec {
    /// Accepted schema version.
    pub schema_version: SchemaVersion,
    /// Normalized engine command.
    pub command: JobCommand,
    /// Source connection URL.
    pub source_url: ConnectionSecret,
    /// Target connection URL.
    pub target_url: ConnectionSecret,
    /// Database and table selection.
    pub filter: JobFilter,
    /// Engine options.
    pub options: JobOptions,
}
