//! Submissions that run through provisioning to a finished worker.

use super::helpers::{Deployment, FakeEngine};
use conductor::job::{
    domain::JobStatus,
    ports::{EngineError, JobStore},
    services::WorkerExit,
};
use eyre::{Result, ensure, eyre};
use rstest::rstest;
use serde_json::json;

fn submission(command: &str) -> serde_json::Value {
    json!({
        "schema_version": "1.0",
        "command": command,
        "source_url": "postgresql://u:p@h1/db",
        "target_url": "postgresql://u:p@h2/db",
    })
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn accepted_job_runs_to_completion() -> Result<()> {
    let deployment = Deployment::new(FakeEngine::default());

    let receipt = deployment.coordinator.submit(&submission("init")).await?;
    ensure!(receipt.status == JobStatus::Provisioning, "expected provisioning");

    let reports = deployment.provisioner.join_all().await;
    ensure!(reports.len() == 1, "expected one worker, got {}", reports.len());
    let report = reports.first().ok_or_else(|| eyre!("missing report"))?;
    ensure!(report.exit == WorkerExit::Completed, "worker did not complete");
    ensure!(report.job_id == receipt.job_id, "worker ran another job");

    let view = deployment
        .coordinator
        .get_status(&receipt.job_id.to_string())
        .await?;
    ensure!(view.status == JobStatus::Completed, "status is {}", view.status);
    ensure!(view.progress.is_some(), "progress should be recorded");
    ensure!(deployment.terminator.calls() == 1, "compute not released once");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn engine_failure_is_visible_to_clients() -> Result<()> {
    let deployment = Deployment::new(FakeEngine::failing(EngineError::NonZeroExit {
        code: Some(4),
        output: "FATAL: role \"u\" does not exist at postgresql://u:p@h1/db".to_owned(),
    }));

    let receipt = deployment.coordinator.submit(&submission("verify")).await?;
    deployment.provisioner.join_all().await;

    let view = deployment
        .coordinator
        .get_status(&receipt.job_id.to_string())
        .await?;
    ensure!(view.status == JobStatus::Failed, "status is {}", view.status);
    let error = view.error.ok_or_else(|| eyre!("missing error"))?;
    ensure!(error.contains("code 4"), "unexpected error: {error}");
    ensure!(!error.contains("u:p@"), "credentials leaked: {error}");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn rejected_submission_launches_nothing() -> Result<()> {
    let deployment = Deployment::new(FakeEngine::default());

    let result = deployment.coordinator.submit(&submission("drop")).await;

    let err = result.err().ok_or_else(|| eyre!("drop should be rejected"))?;
    ensure!(err.status_code() == 400, "expected a client error");
    ensure!(
        deployment.provisioner.join_all().await.is_empty(),
        "no worker should start"
    );
    ensure!(deployment.store.is_empty()?, "no record should be created");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn finished_jobs_free_capacity() -> Result<()> {
    let deployment = Deployment::new(FakeEngine::default());

    for _ in 0..12 {
        deployment.coordinator.submit(&submission("sync")).await?;
        deployment.provisioner.join_all().await;
    }

    let active = deployment
        .store
        .count_by_statuses(&JobStatus::ACTIVE)
        .await?;
    ensure!(active == 0, "expected no active jobs, found {active}");
    ensure!(deployment.engine.calls() == 12, "every job should run once");
    Ok(())
}
