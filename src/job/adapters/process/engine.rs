//! Replication engine run as a child process.

use super::CommandSpec;
use crate::job::{
    domain::JobProgress,
    ports::{EngineError, EngineInvocation, EngineResult, ProgressSink, ReplicationEngine},
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::process::Stdio;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};

/// Stdout prefix marking a JSON progress line.
pub const PROGRESS_PREFIX: &str = "progress: ";

const OUTPUT_TAIL_LINES: usize = 40;

/// Runs the replication engine executable for each job.
///
/// Stdout lines starting with [`PROGRESS_PREFIX`] are parsed as
/// [`JobProgress`] JSON and forwarded to the sink. All other output is kept
/// as a bounded tail for the failure message.
#[derive(Debug, Clone)]
pub struct ProcessReplicationEngine {
    command: CommandSpec,
}

impl ProcessReplicationEngine {
    /// Creates an engine adapter for the given executable.
    #[must_use]
    pub const fn new(command: CommandSpec) -> Self {
        Self { command }
    }
}

#[async_trait]
impl ReplicationEngine for ProcessReplicationEngine {
    async fn run(
        &self,
        invocation: &EngineInvocation,
        progress: &dyn ProgressSink,
    ) -> EngineResult<()> {
        let mut child = self
            .command
            .command()
            .args(invocation.arguments())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| EngineError::Spawn(format!("{}: {err}", self.command.program)))?;

        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(collect_tail(stderr)));

        let mut stdout_tail = VecDeque::with_capacity(OUTPUT_TAIL_LINES);
        if let Some(stdout) = child.stdout.take() {
            let mut reader = BufReader::new(stdout);
            let mut buffer = Vec::new();
            while let Some(line) = next_lossy_line(&mut reader, &mut buffer)
                .await
                .map_err(|err| EngineError::Io(err.to_string()))?
            {
                match parse_progress_line(&line) {
                    Some(update) => progress.report(update).await,
                    None => push_bounded(&mut stdout_tail, line),
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|err| EngineError::Io(err.to_string()))?;
        let stderr_tail = match stderr_task {
            Some(handle) => handle.await.unwrap_or_default(),
            None => VecDeque::new(),
        };

        if status.success() {
            return Ok(());
        }
        let output = stdout_tail
            .into_iter()
            .chain(stderr_tail)
            .collect::<Vec<_>>()
            .join("\n");
        Err(EngineError::NonZeroExit {
            code: status.code(),
            output,
        })
    }
}

/// Parses a `progress: {...}` line. Malformed progress lines are treated as
/// ordinary output.
fn parse_progress_line(line: &str) -> Option<JobProgress> {
    let payload = line.strip_prefix(PROGRESS_PREFIX)?;
    match serde_json::from_str::<JobProgress>(payload) {
        Ok(progress) => Some(progress),
        Err(err) => {
            tracing::debug!(error = %err, "ignoring malformed progress line");
            None
        }
    }
}

/// Reads one line, replacing invalid UTF-8 rather than failing on it.
///
/// Returns `None` at end of stream. The trailing newline is removed.
async fn next_lossy_line(
    reader: &mut (impl AsyncBufRead + Unpin),
    buffer: &mut Vec<u8>,
) -> std::io::Result<Option<String>> {
    buffer.clear();
    if reader.read_until(b'\n', buffer).await? == 0 {
        return Ok(None);
    }
    let line = String::from_utf8_lossy(buffer);
    Ok(Some(line.trim_end_matches(['\n', '\r']).to_owned()))
}

/// Drains `stream` to end of file, keeping the last lines. The pipe must stay
/// open until the child closes it.
async fn collect_tail(stream: impl AsyncRead + Unpin) -> VecDeque<String> {
    let mut tail = VecDeque::with_capacity(OUTPUT_TAIL_LINES);
    let mut reader = BufReader::new(stream);
    let mut buffer = Vec::new();
    loop {
        match next_lossy_line(&mut reader, &mut buffer).await {
            Ok(Some(line)) => push_bounded(&mut tail, line),
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(error = %err, "stopped reading engine stderr");
                break;
            }
        }
    }
    tail
}

fn push_bounded(tail: &mut VecDeque<String>, line: String) {
    if tail.len() == OUTPUT_TAIL_LINES {
        tail.pop_front();
    }
    tail.push_back(line);
}
