//! Job lifecycle status and its legal edges.

use super::ParseJobStatusError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a replication job.
///
/// Status only ever advances. `completed` and `failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job record exists and a worker has been requested.
    Provisioning,
    /// A worker has claimed the job and the engine is executing.
    Running,
    /// The engine exited successfully.
    Completed,
    /// The job failed; the record carries an error message.
    Failed,
}

impl JobStatus {
    /// Statuses that still hold (or are about to hold) compute.
    pub const ACTIVE: [Self; 2] = [Self::Provisioning, Self::Running];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Provisioning => "provisioning",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Returns whether no further transitions are permitted.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns whether transition to `target` is allowed.
    ///
    /// `provisioning -> failed` is the abort edge used when a worker cannot
    /// claim the job at all or provisioning itself fails.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Provisioning, Self::Running | Self::Failed)
                | (Self::Running, Self::Completed | Self::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for JobStatus {
    type Error = ParseJobStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "provisioning" => Ok(Self::Provisioning),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(ParseJobStatusError(value.to_owned())),
        }
    }
}
