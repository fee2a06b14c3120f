//! Workers started against records the coordinator created.

use super::helpers::{Deployment, FakeEngine};
use chrono::Utc;
use conductor::job::{
    domain::{JobStatus, StatusTransition},
    ports::JobStore,
    services::WorkerExit,
};
use eyre::{Result, ensure, eyre};
use rstest::rstest;
use serde_json::json;

fn submission() -> serde_json::Value {
    json!({
        "schema_version": "1.0",
        "command": "init",
        "source_url": "postgresql://u:p@h1/db",
        "target_url": "postgresql://u:p@h2/db",
        "filter": { "include_databases": ["orders", "billing", "audit"] },
    })
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn relaunched_worker_does_not_rerun_completed_job() -> Result<()> {
    let deployment = Deployment::new(FakeEngine::default());
    let receipt = deployment.coordinator.submit(&submission()).await?;
    deployment.provisioner.join_all().await;

    let worker = deployment.provisioner.worker();
    let report = worker.run(receipt.job_id).await;

    ensure!(report.exit == WorkerExit::Aborted, "expected abort, got {:?}", report.exit);
    ensure!(deployment.engine.calls() == 1, "engine reran");
    ensure!(deployment.terminator.calls() == 2, "each worker releases compute");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn progress_reflects_engine_report() -> Result<()> {
    let deployment = Deployment::new(FakeEngine::default());
    let receipt = deployment.coordinator.submit(&submission()).await?;
    deployment.provisioner.join_all().await;

    let job = deployment
        .store
        .read(receipt.job_id)
        .await?
        .ok_or_else(|| eyre!("job missing"))?;
    let progress = job.progress().ok_or_else(|| eyre!("progress missing"))?;
    ensure!(progress.databases_total == 3, "expected three databases");
    ensure!(progress.databases_completed == 3, "expected all databases done");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn late_abort_does_not_overwrite_completed_job() -> Result<()> {
    let deployment = Deployment::new(FakeEngine::default());
    let receipt = deployment.coordinator.submit(&submission()).await?;
    deployment.provisioner.join_all().await;
    let before = deployment
        .store
        .read(receipt.job_id)
        .await?
        .ok_or_else(|| eyre!("job missing"))?;

    let late = StatusTransition::fail(JobStatus::Provisioning, Utc::now(), "late abort")?;
    let result = deployment
        .store
        .conditional_transition(receipt.job_id, &late)
        .await;

    ensure!(
        result.as_ref().is_err_and(conductor::job::ports::JobStoreError::is_conflict),
        "late transition should conflict"
    );
    let after = deployment
        .store
        .read(receipt.job_id)
        .await?
        .ok_or_else(|| eyre!("job missing"))?;
    ensure!(before == after, "conflicting write changed the record");
    Ok(())
}
