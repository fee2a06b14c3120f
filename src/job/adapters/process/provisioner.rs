//! Worker provisioning through a launcher executable.

use super::CommandSpec;
use crate::job::ports::{
    ProvisionError, ProvisionRequest, ProvisionResult, ProvisionedWorker, WorkerProvisioner,
};
use async_trait::async_trait;
use std::process::Stdio;

/// Launcher exit code signalling a retryable failure (`EX_TEMPFAIL`).
pub const TEMPFAIL_EXIT_CODE: i32 = 75;

/// Starts workers by running a launcher.
///
/// The launcher receives `--job-id <id> --compute-class <class>` after the
/// configured arguments and prints the instance identifier on stdout.
/// Exiting with [`TEMPFAIL_EXIT_CODE`] marks the failure as transient.
#[derive(Debug, Clone)]
pub struct CommandProvisioner {
    command: CommandSpec,
}

impl CommandProvisioner {
    /// Creates a provisioner for the given launcher.
    #[must_use]
    pub const fn new(command: CommandSpec) -> Self {
        Self { command }
    }
}

#[async_trait]
impl WorkerProvisioner for CommandProvisioner {
    async fn provision(&self, request: &ProvisionRequest) -> ProvisionResult<ProvisionedWorker> {
        let output = self
            .command
            .command()
            .arg("--job-id")
            .arg(request.job_id.to_string())
            .arg("--compute-class")
            .arg(request.compute_class.as_str())
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|err| ProvisionError::Transient(format!("{}: {err}", self.command.program)))?;

        if output.status.success() {
            let instance_id = String::from_utf8_lossy(&output.stdout).trim().to_owned();
            return Ok(ProvisionedWorker { instance_id });
        }

        let detail = String::from_utf8_lossy(&output.stderr).trim().to_owned();
        match output.status.code() {
            Some(TEMPFAIL_EXIT_CODE) => Err(ProvisionError::Transient(detail)),
            _ => Err(ProvisionError::Rejected(detail)),
        }
    }
}
