//! Compute sizing for worker provisioning.

use super::ParseComputeClassError;
use serde::{Deserialize, Serialize};
use std::fmt;

const GIB: u64 = 1024 * 1024 * 1024;

/// Size tier of the compute unit requested for a worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputeClass {
    /// Under 10 GiB of data.
    Small,
    /// 10 GiB up to 100 GiB.
    Medium,
    /// 100 GiB up to 1 TiB.
    #[default]
    Large,
    /// 1 TiB and above.
    Xlarge,
}

impl ComputeClass {
    /// Picks a class from the client's size estimate.
    ///
    /// Returns `None` when no usable estimate was supplied so the caller can
    /// fall back to its configured default.
    #[must_use]
    pub const fn for_estimated_size(estimated_size_bytes: Option<u64>) -> Option<Self> {
        match estimated_size_bytes {
            None | Some(0) => None,
            Some(bytes) if bytes < 10 * GIB => Some(Self::Small),
            Some(bytes) if bytes < 100 * GIB => Some(Self::Medium),
            Some(bytes) if bytes < 1024 * GIB => Some(Self::Large),
            Some(_) => Some(Self::Xlarge),
        }
    }

    /// Returns the canonical class name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
            Self::Xlarge => "xlarge",
        }
    }
}

impl fmt::Display for ComputeClass {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ComputeClass {
    type Error = ParseComputeClassError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "small" => Ok(Self::Small),
            "medium" => Ok(Self::Medium),
            "large" => Ok(Self::Large),
            "xlarge" => Ok(Self::Xlarge),
            _ => Err(ParseComputeClassError(value.to_owned())),
        }
    }
}
