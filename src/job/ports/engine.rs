//! Replication engine port.

use crate::job::domain::{ConnectionSecret, JobCommand, JobFilter, JobOptions, JobProgress};
use async_trait::async_trait;
use thiserror::Error;

/// Result type for engine runs.
pub type EngineResult<T> = Result<T, EngineError>;

/// Everything the engine needs for one run, mapped one-to-one from the
/// validated job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInvocation {
    /// Engine command.
    pub command: JobCommand,
    /// Decrypted source URL.
    pub source_url: ConnectionSecret,
    /// Decrypted target URL.
    pub target_url: ConnectionSecret,
    /// Database and table selection.
    pub filter: JobFilter,
    /// Engine options.
    pub options: JobOptions,
}

impl EngineInvocation {
    /// Builds the engine argument list.
    ///
    /// The positional command comes first, then `--source` and `--target`,
    /// one repeated flag per filter entry, and finally the boolean option
    /// flags. The result contains plaintext credentials and must never be
    /// logged.
    #[must_use]
    pub fn arguments(&self) -> Vec<String> {
        let mut args = vec![
            self.command.as_str().to_owned(),
            "--source".to_owned(),
            self.source_url.expose().to_owned(),
            "--target".to_owned(),
            self.target_url.expose().to_owned(),
        ];
        push_repeated(&mut args, "--include-databases", &self.filter.include_databases);
        push_repeated(&mut args, "--exclude-databases", &self.filter.exclude_databases);
        push_repeated(&mut args, "--exclude-tables", &self.filter.exclude_tables);
        if self.options.drop_existing {
            args.push("--drop-existing".to_owned());
        }
        if self.options.enable_sync {
            args.push("--enable-sync".to_owned());
        }
        args
    }
}

fn push_repeated<'a>(
    args: &mut Vec<String>,
    flag: &str,
    values: impl IntoIterator<Item = &'a String>,
) {
    for value in values {
        args.push(flag.to_owned());
        args.push(value.clone());
    }
}

/// Receives progress reported by a running engine.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Records a progress snapshot. Failures are the sink's concern.
    async fn report(&self, progress: JobProgress);
}

/// External replication engine.
#[async_trait]
pub trait ReplicationEngine: Send + Sync {
    /// Runs the engine to completion.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NonZeroExit`] when the engine reports failure
    /// and [`EngineError::Spawn`] or [`EngineError::Io`] when it could not
    /// be run at all. Error text may echo credentials; callers scrub it
    /// before storing or logging.
    async fn run(&self, invocation: &EngineInvocation, progress: &dyn ProgressSink)
    -> EngineResult<()>;
}

/// Errors returned by engine implementations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// The engine process could not be started.
    #[error("failed to start replication engine: {0}")]
    Spawn(String),

    /// Reading engine output or waiting for exit failed.
    #[error("replication engine I/O failure: {0}")]
    Io(String),

    /// The engine exited unsuccessfully.
    #[error("replication engine exited with {}: {output}", describe_exit(*.code))]
    NonZeroExit {
        /// Exit code, absent when the process was killed by a signal.
        code: Option<i32>,
        /// Tail of the captured output.
        output: String,
    },
}

fn describe_exit(code: Option<i32>) -> String {
    code.map_or_else(|| "signal".to_owned(), |value| format!("code {value}"))
}
