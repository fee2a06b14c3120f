//! Validation errors for job submissions.

use thiserror::Error;

/// Reason a connection URL was rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UrlRejection {
    /// The URL contains shell command chaining or substitution sequences.
    #[error("URL contains potentially dangerous characters")]
    DangerousCharacters,

    /// More than one `@` appears in the authority.
    #[error("Invalid URL format: multiple @ signs")]
    MultipleAtSigns,

    /// The URL could not be parsed.
    #[error("Failed to parse URL: {0}")]
    Unparseable(String),

    /// The scheme is not `postgresql` or `postgres`.
    #[error("Invalid scheme: {0} (must be 'postgresql' or 'postgres')")]
    InvalidScheme(String),

    /// No hostname is present.
    #[error("URL must include a hostname")]
    MissingHostname,

    /// The hostname contains characters outside the conservative grammar.
    #[error("Invalid hostname format")]
    InvalidHostname,

    /// The port is outside `1..=65535`.
    #[error("Invalid port (must be 1-65535)")]
    InvalidPort,

    /// The database path segment contains disallowed characters.
    #[error("Invalid database name format")]
    InvalidDatabaseName,
}

/// Errors returned while validating a job submission.
///
/// Validation is fail-fast: exactly one error is reported, naming the first
/// rule the submission violates.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The submission could not be serialized to measure its size.
    #[error("Job spec could not be serialized: {0}")]
    Unserializable(String),

    /// The serialized submission exceeds the size limit.
    #[error("Job spec too large: {actual_bytes} bytes (max: {limit_bytes})")]
    SpecTooLarge {
        /// Serialized size of the submission.
        actual_bytes: usize,
        /// Configured maximum.
        limit_bytes: usize,
    },

    /// The submission is not a JSON object.
    #[error("Job spec must be a JSON object")]
    NotAnObject,

    /// A required field is absent.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A field that must be a string has another JSON type.
    #[error("Field '{0}' must be a string")]
    FieldNotString(&'static str),

    /// A required string field is blank.
    #[error("Field '{0}' cannot be empty")]
    EmptyField(&'static str),

    /// The schema version is not supported.
    #[error("Unsupported schema version: {attempted} (supported: {supported})")]
    UnsupportedSchemaVersion {
        /// Version supplied by the client.
        attempted: String,
        /// Comma-separated supported versions.
        supported: String,
    },

    /// The command exceeds the length limit.
    #[error("Command too long: {actual} chars (max: {limit})")]
    CommandTooLong {
        /// Command length in characters.
        actual: usize,
        /// Configured maximum.
        limit: usize,
    },

    /// The command is not in the allowed set.
    #[error("Invalid command: {command} (allowed: {allowed})")]
    InvalidCommand {
        /// Normalized command supplied by the client.
        command: String,
        /// Comma-separated allowed commands.
        allowed: String,
    },

    /// A connection URL exceeds the length limit.
    #[error("{field} too long: {actual} chars (max: {limit})")]
    UrlTooLong {
        /// Offending field name.
        field: &'static str,
        /// URL length in characters.
        actual: usize,
        /// Configured maximum.
        limit: usize,
    },

    /// A connection URL failed a format or safety rule.
    #[error("Invalid {field}: {reason}")]
    InvalidUrl {
        /// Offending field name.
        field: &'static str,
        /// Rule the URL violated.
        reason: UrlRejection,
    },

    /// `filter` is not an object.
    #[error("Field 'filter' must be an object")]
    FilterNotObject,

    /// `filter` contains an unrecognized key.
    #[error("Unknown filter: {0}")]
    UnknownFilter(String),

    /// Both database inclusion and exclusion lists were supplied.
    #[error("filter.include_databases and filter.exclude_databases are mutually exclusive")]
    ConflictingDatabaseFilters,

    /// A filter list is not an array of strings.
    #[error("Filter '{0}' must be an array of strings")]
    FilterNotStringList(String),

    /// A filter database name is malformed.
    #[error("Invalid database name in filter '{key}': {value}")]
    InvalidFilterDatabase {
        /// Filter key.
        key: String,
        /// Offending entry.
        value: String,
    },

    /// An excluded table is not in `database.table` form.
    #[error("Invalid table in filter 'exclude_tables': {0} (expected database.table)")]
    InvalidExcludedTable(String),

    /// `options` is not an object.
    #[error("Field 'options' must be an object")]
    OptionsNotObject,

    /// `options` contains an unrecognized key.
    #[error("Unknown option: {0}")]
    UnknownOption(String),

    /// A boolean option has another JSON type.
    #[error("Option '{0}' must be a boolean")]
    OptionNotBoolean(&'static str),

    /// A numeric option has another JSON type.
    #[error("Option '{0}' must be a number")]
    OptionNotNumber(&'static str),

    /// A numeric option is negative.
    #[error("Option '{0}' must be non-negative")]
    OptionNegative(&'static str),

    /// A numeric option is not a whole number.
    #[error("Option '{0}' must be an integer")]
    OptionNotInteger(&'static str),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;
