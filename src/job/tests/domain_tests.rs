//! Domain rule tests: status machine, transitions, progress, sizing.

use super::fixtures::{provisioning_job, running_job};
use crate::job::domain::{
    ComputeClass, JobCommand, JobDomainError, JobId, JobProgress, JobStatus, ProgressUpdate,
    StatusTransition,
};
use chrono::{Duration, Utc};
use rstest::rstest;

const GIB: u64 = 1024 * 1024 * 1024;

#[rstest]
#[case(JobStatus::Provisioning, JobStatus::Running, true)]
#[case(JobStatus::Provisioning, JobStatus::Failed, true)]
#[case(JobStatus::Provisioning, JobStatus::Completed, false)]
#[case(JobStatus::Running, JobStatus::Completed, true)]
#[case(JobStatus::Running, JobStatus::Failed, true)]
#[case(JobStatus::Running, JobStatus::Provisioning, false)]
#[case(JobStatus::Completed, JobStatus::Failed, false)]
#[case(JobStatus::Completed, JobStatus::Running, false)]
#[case(JobStatus::Failed, JobStatus::Running, false)]
#[case(JobStatus::Failed, JobStatus::Completed, false)]
fn status_edges_only_advance(
    #[case] from: JobStatus,
    #[case] to: JobStatus,
    #[case] allowed: bool,
) {
    assert_eq!(from.can_transition_to(to), allowed);
}

#[rstest]
fn terminal_statuses_are_completed_and_failed() {
    let terminal: Vec<_> = [
        JobStatus::Provisioning,
        JobStatus::Running,
        JobStatus::Completed,
        JobStatus::Failed,
    ]
    .into_iter()
    .filter(|status| status.is_terminal())
    .collect();
    assert_eq!(terminal, vec![JobStatus::Completed, JobStatus::Failed]);
}

#[rstest]
#[case("running", JobStatus::Running)]
#[case(" Failed ", JobStatus::Failed)]
fn status_parses_case_insensitively(#[case] raw: &str, #[case] expected: JobStatus) {
    assert_eq!(JobStatus::try_from(raw), Ok(expected));
}

#[rstest]
fn invalid_transition_is_rejected_at_construction() {
    let result = StatusTransition::new(JobStatus::Completed, JobStatus::Running, Utc::now(), None);
    assert_eq!(
        result,
        Err(JobDomainError::InvalidStatusTransition {
            from: JobStatus::Completed,
            to: JobStatus::Running,
        })
    );
}

#[rstest]
#[case("")]
#[case("   ")]
fn failure_requires_a_message(#[case] message: &str) {
    let result = StatusTransition::fail(JobStatus::Running, Utc::now(), message);
    assert_eq!(result, Err(JobDomainError::MissingFailureReason));
}

#[rstest]
fn claim_stamps_running_at() {
    let mut job = provisioning_job(Duration::days(30));
    let at = Utc::now();
    job.apply_transition(&StatusTransition::claim(at))
        .expect("claim should apply");

    assert_eq!(job.status(), JobStatus::Running);
    assert_eq!(job.running_at(), Some(at));
    assert_eq!(job.completed_at(), None);
}

#[rstest]
fn failure_stamps_failed_at_and_error() {
    let mut job = running_job();
    let at = Utc::now();
    let transition =
        StatusTransition::fail(JobStatus::Running, at, "engine exited with code 2")
            .expect("valid failure transition");
    job.apply_transition(&transition)
        .expect("failure should apply");

    assert_eq!(job.status(), JobStatus::Failed);
    assert_eq!(job.failed_at(), Some(at));
    assert_eq!(job.error(), Some("engine exited with code 2"));
}

#[rstest]
fn transition_from_wrong_status_leaves_job_untouched() {
    let mut job = provisioning_job(Duration::days(30));
    let before = job.clone();
    let result = job.apply_transition(&StatusTransition::complete(Utc::now()));

    assert_eq!(
        result,
        Err(JobDomainError::StatusMismatch {
            expected: JobStatus::Running,
            actual: JobStatus::Provisioning,
        })
    );
    assert_eq!(job, before);
}

#[rstest]
fn new_job_starts_provisioning_with_retention_window() {
    let job = provisioning_job(Duration::days(30));

    assert_eq!(job.status(), JobStatus::Provisioning);
    assert!(job.progress().is_none());
    assert!(job.error().is_none());
    assert_eq!(job.expires_at() - job.created_at(), Duration::days(30));
    assert!(!job.is_expired(job.created_at()));
    assert!(job.is_expired(job.expires_at()));
}

#[rstest]
fn progress_is_ignored_before_claim() {
    let mut job = provisioning_job(Duration::days(30));
    let update = job.apply_progress(JobProgress::new(None, 1, 3));

    assert_eq!(update, ProgressUpdate::Ignored);
    assert!(job.progress().is_none());
}

#[rstest]
fn progress_never_moves_backwards() {
    let mut job = running_job();
    let ahead = JobProgress::new(Some("orders".to_owned()), 2, 3);

    assert_eq!(job.apply_progress(ahead.clone()), ProgressUpdate::Applied);
    assert_eq!(
        job.apply_progress(JobProgress::new(Some("billing".to_owned()), 1, 3)),
        ProgressUpdate::Ignored
    );
    assert_eq!(job.progress(), Some(&ahead));

    let same_count = JobProgress::new(Some("audit".to_owned()), 2, 3);
    assert_eq!(job.apply_progress(same_count.clone()), ProgressUpdate::Applied);
    assert_eq!(job.progress(), Some(&same_count));
}

#[rstest]
#[case(None, None)]
#[case(Some(0), None)]
#[case(Some(GIB), Some(ComputeClass::Small))]
#[case(Some(10 * GIB), Some(ComputeClass::Medium))]
#[case(Some(100 * GIB - 1), Some(ComputeClass::Medium))]
#[case(Some(100 * GIB), Some(ComputeClass::Large))]
#[case(Some(1024 * GIB), Some(ComputeClass::Xlarge))]
fn compute_class_follows_size_estimate(
    #[case] estimate: Option<u64>,
    #[case] expected: Option<ComputeClass>,
) {
    assert_eq!(ComputeClass::for_estimated_size(estimate), expected);
}

#[rstest]
fn command_list_is_stable() {
    assert_eq!(
        JobCommand::allowed_list(),
        "init, validate, sync, status, verify"
    );
}

#[rstest]
#[case("not-a-uuid")]
#[case("")]
fn job_id_rejects_non_uuid(#[case] raw: &str) {
    assert!(matches!(
        JobId::parse(raw),
        Err(JobDomainError::InvalidJobId(_))
    ));
}
