//! Submission validator.

use super::error::{ValidationError, ValidationResult};
use super::rules;
use crate::job::domain::{ConnectionSecret, ValidJobSpec};
use serde::Deserialize;
use serde_json::Value;

/// Limits applied while validating submissions.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ValidationLimits {
    /// Maximum serialized submission size in bytes.
    pub max_spec_bytes: usize,
    /// Maximum connection URL length in characters.
    pub max_url_chars: usize,
    /// Maximum command length in characters, after trimming.
    pub max_command_chars: usize,
    /// Accepted `schema_version` values.
    pub supported_schema_versions: Vec<String>,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_spec_bytes: 15 * 1024,
            max_url_chars: 2048,
            max_command_chars: 50,
            supported_schema_versions: vec!["1.0".to_owned()],
        }
    }
}

/// Validates raw job submissions into [`ValidJobSpec`] values.
///
/// Checks run in a fixed order and stop at the first violation: size,
/// schema version, required fields, command, connection URLs, filter and
/// finally options.
///
/// # Examples
///
/// ```
/// use conductor::job::validation::JobSpecValidator;
/// use serde_json::json;
///
/// let validator = JobSpecValidator::default();
/// let spec = validator
///     .validate(&json!({
///         "schema_version": "1.0",
///         "command": " INIT ",
///         "source_url": "postgresql://u:p@source.internal:5432/app",
///         "target_url": "postgresql://u:p@target.internal:5432/app",
///     }))
///     .expect("submission should validate");
/// assert_eq!(spec.command.as_str(), "init");
/// ```
#[derive(Debug, Clone, Default)]
pub struct JobSpecValidator {
    limits: ValidationLimits,
}

impl JobSpecValidator {
    /// Creates a validator with the given limits.
    #[must_use]
    pub const fn new(limits: ValidationLimits) -> Self {
        Self { limits }
    }

    /// Returns the configured limits.
    #[must_use]
    pub const fn limits(&self) -> &ValidationLimits {
        &self.limits
    }

    /// Validates a submission body.
    ///
    /// # Errors
    ///
    /// Returns the [`ValidationError`] for the first rule the body violates.
    pub fn validate(&self, body: &Value) -> ValidationResult<ValidJobSpec> {
        rules::check_size(body, &self.limits)?;
        let object = body.as_object().ok_or(ValidationError::NotAnObject)?;

        let schema_version = rules::check_schema_version(object, &self.limits)?;

        let raw_command = rules::required_string(object, "command")?;
        let source_url = rules::required_string(object, "source_url")?;
        let target_url = rules::required_string(object, "target_url")?;

        let command = rules::check_command(raw_command, &self.limits)?;
        rules::check_url("source_url", source_url, &self.limits)?;
        rules::check_url("target_url", target_url, &self.limits)?;
        let filter = rules::check_filter(object)?;
        let options = rules::check_options(object)?;

        Ok(ValidJobSpec {
            schema_version,
            command,
            source_url: ConnectionSecret::new(source_url),
            target_url: ConnectionSecret::new(target_url),
            filter,
            options,
        })
    }
}

/// Validates `body` with the default limits.
///
/// # Errors
///
/// Returns the [`ValidationError`] for the first rule the body violates.
pub fn validate_job_spec(body: &Value) -> ValidationResult<ValidJobSpec> {
    JobSpecValidator::default().validate(body)
}
