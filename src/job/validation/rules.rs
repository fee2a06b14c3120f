//! Individual submission rules, applied in order by the validator.

use super::ValidationLimits;
use super::error::{ValidationError, ValidationResult};
use super::url::{check_postgres_url, is_valid_identifier};
use crate::job::domain::{JobCommand, JobFilter, JobOptions, SchemaVersion};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

const INCLUDE_DATABASES: &str = "include_databases";
const EXCLUDE_DATABASES: &str = "exclude_databases";
const EXCLUDE_TABLES: &str = "exclude_tables";

const DROP_EXISTING: &str = "drop_existing";
const ENABLE_SYNC: &str = "enable_sync";
const ESTIMATED_SIZE_BYTES: &str = "estimated_size_bytes";

pub(super) fn check_size(body: &Value, limits: &ValidationLimits) -> ValidationResult<()> {
    let encoded =
        serde_json::to_vec(body).map_err(|err| ValidationError::Unserializable(err.to_string()))?;
    if encoded.len() > limits.max_spec_bytes {
        return Err(ValidationError::SpecTooLarge {
            actual_bytes: encoded.len(),
            limit_bytes: limits.max_spec_bytes,
        });
    }
    Ok(())
}

pub(super) fn check_schema_version(
    body: &Map<String, Value>,
    limits: &ValidationLimits,
) -> ValidationResult<SchemaVersion> {
    let version = match body.get("schema_version") {
        None | Some(Value::Null) => return Err(ValidationError::MissingField("schema_version")),
        Some(Value::String(version)) if version.is_empty() => {
            return Err(ValidationError::MissingField("schema_version"));
        }
        Some(Value::String(version)) => version,
        Some(_) => return Err(ValidationError::FieldNotString("schema_version")),
    };
    if !limits
        .supported_schema_versions
        .iter()
        .any(|supported| supported == version)
    {
        return Err(ValidationError::UnsupportedSchemaVersion {
            attempted: version.clone(),
            supported: limits.supported_schema_versions.join(", "),
        });
    }
    Ok(SchemaVersion::new(version.clone()))
}

/// Returns the named field as a non-blank string.
pub(super) fn required_string<'a>(
    body: &'a Map<String, Value>,
    field: &'static str,
) -> ValidationResult<&'a str> {
    let value = body.get(field).ok_or(ValidationError::MissingField(field))?;
    let text = value
        .as_str()
        .ok_or(ValidationError::FieldNotString(field))?;
    if text.trim().is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    Ok(text)
}

pub(super) fn check_command(raw: &str, limits: &ValidationLimits) -> ValidationResult<JobCommand> {
    let normalized = raw.trim().to_lowercase();
    let length = normalized.chars().count();
    if length > limits.max_command_chars {
        return Err(ValidationError::CommandTooLong {
            actual: length,
            limit: limits.max_command_chars,
        });
    }
    JobCommand::try_from(normalized.as_str()).map_err(|_| ValidationError::InvalidCommand {
        command: normalized,
        allowed: JobCommand::allowed_list(),
    })
}

pub(super) fn check_url(
    field: &'static str,
    url: &str,
    limits: &ValidationLimits,
) -> ValidationResult<()> {
    let length = url.chars().count();
    if length > limits.max_url_chars {
        return Err(ValidationError::UrlTooLong {
            field,
            actual: length,
            limit: limits.max_url_chars,
        });
    }
    check_postgres_url(url).map_err(|reason| ValidationError::InvalidUrl { field, reason })
}

pub(super) fn check_filter(body: &Map<String, Value>) -> ValidationResult<JobFilter> {
    let Some(raw) = body.get("filter") else {
        return Ok(JobFilter::default());
    };
    let entries = raw.as_object().ok_or(ValidationError::FilterNotObject)?;

    let mut filter = JobFilter::default();
    for (key, value) in entries {
        match key.as_str() {
            INCLUDE_DATABASES | EXCLUDE_DATABASES => {
                let names = string_list(key, value)?;
                if let Some(invalid) = names.iter().find(|name| !is_valid_identifier(name)) {
                    return Err(ValidationError::InvalidFilterDatabase {
                        key: key.clone(),
                        value: invalid.clone(),
                    });
                }
                if key == INCLUDE_DATABASES {
                    filter.include_databases = names;
                } else {
                    filter.exclude_databases = names;
                }
            }
            EXCLUDE_TABLES => {
                let tables = string_list(key, value)?;
                if let Some(invalid) = tables.iter().find(|table| !is_qualified_table(table)) {
                    return Err(ValidationError::InvalidExcludedTable(invalid.clone()));
                }
                filter.exclude_tables = tables;
            }
            _ => return Err(ValidationError::UnknownFilter(key.clone())),
        }
    }

    if !filter.include_databases.is_empty() && !filter.exclude_databases.is_empty() {
        return Err(ValidationError::ConflictingDatabaseFilters);
    }
    Ok(filter)
}

pub(super) fn check_options(body: &Map<String, Value>) -> ValidationResult<JobOptions> {
    let Some(raw) = body.get("options") else {
        return Ok(JobOptions::default());
    };
    let entries = raw.as_object().ok_or(ValidationError::OptionsNotObject)?;

    let mut options = JobOptions::default();
    for (key, value) in entries {
        match key.as_str() {
            DROP_EXISTING => options.drop_existing = boolean_option(DROP_EXISTING, value)?,
            ENABLE_SYNC => options.enable_sync = boolean_option(ENABLE_SYNC, value)?,
            ESTIMATED_SIZE_BYTES => {
                options.estimated_size_bytes = Some(size_option(ESTIMATED_SIZE_BYTES, value)?);
            }
            _ => return Err(ValidationError::UnknownOption(key.clone())),
        }
    }
    Ok(options)
}

fn string_list(key: &str, value: &Value) -> ValidationResult<BTreeSet<String>> {
    let not_a_list = || ValidationError::FilterNotStringList(key.to_owned());
    value
        .as_array()
        .ok_or_else(not_a_list)?
        .iter()
        .map(|entry| entry.as_str().map(str::to_owned).ok_or_else(not_a_list))
        .collect()
}

fn is_qualified_table(table: &str) -> bool {
    table
        .split_once('.')
        .is_some_and(|(database, name)| is_valid_identifier(database) && is_valid_identifier(name))
}

fn boolean_option(key: &'static str, value: &Value) -> ValidationResult<bool> {
    value.as_bool().ok_or(ValidationError::OptionNotBoolean(key))
}

fn size_option(key: &'static str, value: &Value) -> ValidationResult<u64> {
    let Value::Number(number) = value else {
        return Err(ValidationError::OptionNotNumber(key));
    };
    if let Some(bytes) = number.as_u64() {
        return Ok(bytes);
    }
    if number.as_i64().is_some_and(|signed| signed < 0)
        || number.as_f64().is_some_and(|float| float < 0.0)
    {
        return Err(ValidationError::OptionNegative(key));
    }
    Err(ValidationError::OptionNotInteger(key))
}
