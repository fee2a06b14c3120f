//! Runs one replication job on the compute unit provisioned for it.
//!
//! Usage:
//!
//! ```text
//! conductor-worker <job-id>
//! ```
//!
//! Configuration is read from the TOML file named by `CONDUCTOR_CONFIG`, if
//! set, and from `CONDUCTOR_*` environment variables. The worker claims the
//! job, runs the replication engine, records the outcome and releases its
//! compute unit before exiting. Exit status is 0 when the job completed or
//! there was nothing to do, 1 when the job failed, and 2 for usage errors.
//!
//! Once the store is reachable, a bootstrap failure marks the job `failed`.
//! Compute is released for any failure after the `compute.terminate` hook
//! has been read; a missing or unreadable configuration leaves no hook to
//! call, so the unit is left to the provisioner's own reaping.

use conductor::config::{ConductorConfig, ConfigError};
use conductor::job::adapters::postgres::{PostgresJobStore, build_pool};
use conductor::job::adapters::{
    cipher::LocalKeyCipher,
    process::{CommandTerminator, ProcessReplicationEngine},
};
use conductor::job::domain::{JobId, JobStatus, StatusTransition};
use conductor::job::ports::{ComputeTerminator, JobStore, JobStoreError};
use conductor::job::services::WorkerRuntime;
use conductor::logging;
use mockable::{Clock, DefaultClock};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use thiserror::Error;

/// Environment variable naming an optional configuration file.
const CONFIG_PATH_ENV_VAR: &str = "CONDUCTOR_CONFIG";

const USAGE_EXIT_CODE: u8 = 2;

/// Error recorded on a job whose worker failed before running it.
const BOOTSTRAP_FAILURE_MESSAGE: &str = "worker bootstrap failed";

/// Errors that stop the worker before the runtime starts.
#[derive(Debug, Error)]
enum BootstrapError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("job store unavailable: {0}")]
    Store(#[from] JobStoreError),
    #[error("runtime init failed: {0}")]
    RuntimeInit(#[source] std::io::Error),
}

impl BootstrapError {
    const fn exit_code(&self) -> u8 {
        match self {
            Self::InvalidArgs(_) => USAGE_EXIT_CODE,
            Self::Config(_) | Self::Store(_) | Self::RuntimeInit(_) => 1,
        }
    }
}

fn main() -> ExitCode {
    logging::init();
    match run(std::env::args()) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %err, "worker bootstrap failed");
            ExitCode::from(err.exit_code())
        }
    }
}

fn run(args: impl Iterator<Item = String>) -> Result<ExitCode, BootstrapError> {
    let job_id = parse_args(args)?;
    let config_path = std::env::var_os(CONFIG_PATH_ENV_VAR).map(PathBuf::from);
    let config = ConductorConfig::load(config_path.as_deref())?;
    let terminator = Arc::new(CommandTerminator::new(
        config.terminate_command()?.clone(),
    ));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(BootstrapError::RuntimeInit)?;

    runtime.block_on(async {
        match execute(&config, job_id, Arc::clone(&terminator)).await {
            Ok(code) => Ok(code),
            Err(err) => {
                // The runtime never started, so the lease was never taken.
                release_after_bootstrap_failure(terminator.as_ref(), job_id).await;
                Err(err)
            }
        }
    })
}

async fn execute(
    config: &ConductorConfig,
    job_id: JobId,
    terminator: Arc<CommandTerminator>,
) -> Result<ExitCode, BootstrapError> {
    let pool = build_pool(config.store_url()?, config.store.pool_size)?;
    let store = Arc::new(PostgresJobStore::new(pool));
    match run_worker(config, job_id, Arc::clone(&store), terminator).await {
        Ok(code) => Ok(code),
        Err(err) => {
            record_bootstrap_failure(store.as_ref(), job_id).await;
            Err(err)
        }
    }
}

async fn run_worker(
    config: &ConductorConfig,
    job_id: JobId,
    store: Arc<PostgresJobStore>,
    terminator: Arc<CommandTerminator>,
) -> Result<ExitCode, BootstrapError> {
    if config.store.auto_migrate {
        store.ensure_schema().await?;
    }
    let cipher = LocalKeyCipher::from_base64_key(config.cipher_key()?).map_err(|err| {
        ConfigError::InvalidSetting {
            key: "cipher.key",
            reason: err.to_string(),
        }
    })?;
    let engine = ProcessReplicationEngine::new(config.engine_command()?.clone());

    let worker = WorkerRuntime::new(
        store,
        Arc::new(cipher),
        Arc::new(engine),
        terminator,
        Arc::new(DefaultClock),
    );
    let report = worker.run(job_id).await;
    let code = u8::try_from(report.exit.exit_code()).unwrap_or(1);
    Ok(ExitCode::from(code))
}

/// Best-effort `provisioning -> failed` for a job whose worker never started.
async fn record_bootstrap_failure<S: JobStore>(store: &S, job_id: JobId) {
    let transition = match StatusTransition::fail(
        JobStatus::Provisioning,
        DefaultClock.utc(),
        BOOTSTRAP_FAILURE_MESSAGE,
    ) {
        Ok(transition) => transition,
        Err(err) => {
            tracing::error!(%job_id, error = %err, "cannot build failure transition");
            return;
        }
    };
    match store.conditional_transition(job_id, &transition).await {
        Ok(_) => tracing::info!(%job_id, "job marked failed after bootstrap failure"),
        Err(err) => tracing::warn!(%job_id, error = %err, "failed to record bootstrap failure"),
    }
}

async fn release_after_bootstrap_failure<T: ComputeTerminator>(terminator: &T, job_id: JobId) {
    match terminator.terminate(job_id).await {
        Ok(()) => tracing::info!(%job_id, "compute released after bootstrap failure"),
        Err(err) => tracing::error!(%job_id, error = %err, "failed to release compute"),
    }
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<JobId, BootstrapError> {
    let _program = args.next();
    let raw = args
        .next()
        .ok_or_else(|| BootstrapError::InvalidArgs("missing job id argument".into()))?;
    if let Some(extra) = args.next() {
        return Err(BootstrapError::InvalidArgs(format!(
            "unexpected extra argument: {extra}"
        )));
    }
    JobId::parse(&raw).map_err(|err| BootstrapError::InvalidArgs(err.to_string()))
}
