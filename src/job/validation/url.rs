//! Connection URL rules.
//!
//! Validated URLs end up as arguments of an executed engine command, so the
//! metacharacter check is a security boundary.

use super::error::UrlRejection;
use url::Url;

/// Schemes accepted for `PostgreSQL` connection URLs.
pub const ALLOWED_SCHEMES: [&str; 2] = ["postgresql", "postgres"];

/// Sequences used for shell command chaining or substitution.
pub const DANGEROUS_SEQUENCES: [&str; 5] = [";", "$(", "`", "||", "&&"];

/// Returns whether `url` contains any shell chaining or substitution sequence.
#[must_use]
pub fn contains_dangerous_sequence(url: &str) -> bool {
    DANGEROUS_SEQUENCES
        .iter()
        .any(|sequence| url.contains(sequence))
}

/// Checks a `PostgreSQL` connection URL against every format and safety rule.
///
/// # Errors
///
/// Returns the first [`UrlRejection`] the URL triggers.
pub fn check_postgres_url(url: &str) -> Result<(), UrlRejection> {
    if contains_dangerous_sequence(url) {
        return Err(UrlRejection::DangerousCharacters);
    }
    if authority(url).matches('@').count() > 1 {
        return Err(UrlRejection::MultipleAtSigns);
    }

    let parsed = Url::parse(url).map_err(|err| match err {
        url::ParseError::InvalidPort => UrlRejection::InvalidPort,
        url::ParseError::EmptyHost => UrlRejection::MissingHostname,
        other => UrlRejection::Unparseable(other.to_string()),
    })?;

    if !ALLOWED_SCHEMES.contains(&parsed.scheme()) {
        return Err(UrlRejection::InvalidScheme(parsed.scheme().to_owned()));
    }

    let hostname = parsed.host_str().unwrap_or_default();
    if hostname.is_empty() {
        return Err(UrlRejection::MissingHostname);
    }
    if !is_valid_hostname(hostname) {
        return Err(UrlRejection::InvalidHostname);
    }

    if parsed.port() == Some(0) {
        return Err(UrlRejection::InvalidPort);
    }

    let database = parsed.path().trim_start_matches('/');
    if !database.is_empty() && !is_valid_identifier(database) {
        return Err(UrlRejection::InvalidDatabaseName);
    }

    Ok(())
}

/// Returns whether `name` is a non-empty run of ASCII alphanumerics,
/// underscores and hyphens.
#[must_use]
pub fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
}

fn is_valid_hostname(hostname: &str) -> bool {
    let starts_alphanumeric = hostname
        .chars()
        .next()
        .is_some_and(|ch| ch.is_ascii_alphanumeric());
    let ends_alphanumeric = hostname
        .chars()
        .last()
        .is_some_and(|ch| ch.is_ascii_alphanumeric());
    starts_alphanumeric
        && ends_alphanumeric
        && hostname
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '.')
}

/// Returns the raw authority (`user:pass@host:port`) of `url`.
fn authority(url: &str) -> &str {
    let after_scheme = url
        .split_once("://")
        .map_or(url, |(_, remainder)| remainder);
    let end = after_scheme
        .find(['/', '?', '#'])
        .unwrap_or(after_scheme.len());
    after_scheme.split_at(end).0
}
