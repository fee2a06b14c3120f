//! Status projection and reporter tests.

use super::fixtures::{provisioning_job, running_job};
use crate::job::adapters::memory::InMemoryJobStore;
use crate::job::domain::{JobId, JobProgress, JobStatus, StatusTransition};
use crate::job::ports::JobStore;
use crate::job::services::{JobStatusView, StatusReporter};
use chrono::{Duration, Utc};
use rstest::rstest;
use std::sync::Arc;

#[rstest]
fn view_of_new_job_omits_unset_fields() {
    let job = provisioning_job(Duration::days(30));
    let value = serde_json::to_value(JobStatusView::from(&job)).expect("serialize");
    let object = value.as_object().expect("object");

    assert_eq!(object.get("status"), Some(&serde_json::json!("provisioning")));
    assert_eq!(object.get("command"), Some(&serde_json::json!("init")));
    for absent in ["progress", "error", "running_at", "completed_at", "failed_at"] {
        assert!(!object.contains_key(absent), "{absent} should be omitted");
    }
}

#[rstest]
fn view_never_carries_credentials() {
    let job = provisioning_job(Duration::days(30));
    let rendered = serde_json::to_string(&JobStatusView::from(&job)).expect("serialize");

    assert!(!rendered.contains(job.source_url_encrypted().as_str()));
    assert!(!rendered.contains(job.target_url_encrypted().as_str()));
    assert!(!rendered.contains("url"));
}

#[rstest]
fn failed_view_carries_error_and_timestamp() {
    let mut job = running_job();
    job.apply_progress(JobProgress::new(Some("orders".to_owned()), 1, 2));
    let transition = StatusTransition::fail(JobStatus::Running, Utc::now(), "engine exited")
        .expect("valid failure");
    job.apply_transition(&transition).expect("fail");

    let view = JobStatusView::from(&job);
    assert_eq!(view.status, JobStatus::Failed);
    assert_eq!(view.error.as_deref(), Some("engine exited"));
    assert!(view.failed_at.is_some());
    assert_eq!(view.progress.map(|p| p.databases_completed), Some(1));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn reporter_reads_and_lists() {
    let store = Arc::new(InMemoryJobStore::new());
    let job = provisioning_job(Duration::days(30));
    store.create(&job).await.expect("create");
    let reporter = StatusReporter::new(Arc::clone(&store));

    let view = reporter.get(job.id()).await.expect("read").expect("job");
    assert_eq!(view.job_id, job.id());
    assert_eq!(view.trace_id, job.trace_id());
    assert!(reporter.get(JobId::new()).await.expect("read").is_none());

    let listed = reporter
        .list_by_status(JobStatus::Provisioning, None, 10)
        .await
        .expect("list");
    assert_eq!(listed, vec![view]);
}
