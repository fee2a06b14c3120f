//! Submission validation.
//!
//! Turns an untrusted JSON submission into a [`ValidJobSpec`] or a single
//! [`ValidationError`] naming the first violated rule. Validation is pure:
//! no store, cipher or network access happens here.
//!
//! [`ValidJobSpec`]: crate::job::domain::ValidJobSpec

mod error;
mod rules;
mod service;
mod url;

pub use error::{UrlRejection, ValidationError, ValidationResult};
pub use service::{JobSpecValidator, ValidationLimits, validate_job_spec};
pub use url::{ALLOWED_SCHEMES, DANGEROUS_SEQUENCES, check_postgres_url, contains_dangerous_sequence, is_valid_identifier};
