//! Adapters that delegate to external programs.
//!
//! The replication engine, the provisioning launcher and the compute
//! release hook are all operator-supplied executables. Each adapter builds
//! an argument list and interprets the exit status; none of them goes
//! through a shell.

mod engine;
mod provisioner;
mod terminator;

pub use engine::{PROGRESS_PREFIX, ProcessReplicationEngine};
pub use provisioner::{CommandProvisioner, TEMPFAIL_EXIT_CODE};
pub use terminator::CommandTerminator;

use serde::Deserialize;

/// Program and leading arguments for an external command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CommandSpec {
    /// Executable name or path.
    pub program: String,
    /// Arguments placed before the adapter's own arguments.
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Creates a command with no leading arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Appends a leading argument.
    #[must_use]
    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.args.push(value.into());
        self
    }

    fn command(&self) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(&self.program);
        command.args(&self.args).kill_on_drop(true);
        command
    }
}
