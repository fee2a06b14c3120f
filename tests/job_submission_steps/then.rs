//! Then steps for job submission BDD scenarios.

use super::world::{JobSubmissionWorld, run_async};
use conductor::job::{
    domain::JobStatus,
    services::{CoordinatorError, WorkerExit},
};
use eyre::WrapErr;
use rstest_bdd_macros::then;

fn rejection(world: &JobSubmissionWorld) -> Result<&CoordinatorError, eyre::Report> {
    match world.last_submission.as_ref() {
        Some(Err(err)) => Ok(err),
        Some(Ok(receipt)) => Err(eyre::eyre!("expected rejection, job {} accepted", receipt.job_id)),
        None => Err(eyre::eyre!("missing submission result")),
    }
}

fn parse_status(status: &str) -> Result<JobStatus, eyre::Report> {
    JobStatus::try_from(status)
        .map_err(|err| eyre::eyre!("invalid expected status in scenario: {err}"))
}

#[then(r#"the submission is accepted with status "{status}""#)]
fn submission_accepted(world: &JobSubmissionWorld, status: String) -> Result<(), eyre::Report> {
    let expected = parse_status(&status)?;
    let receipt = match world.last_submission.as_ref() {
        Some(Ok(receipt)) => receipt,
        Some(Err(err)) => return Err(eyre::eyre!("submission rejected: {err}")),
        None => return Err(eyre::eyre!("missing submission result")),
    };
    if receipt.status != expected {
        return Err(eyre::eyre!("expected status {expected}, found {}", receipt.status));
    }
    Ok(())
}

#[then("one worker is requested for the job")]
fn one_worker_requested(world: &JobSubmissionWorld) -> Result<(), eyre::Report> {
    let job_id = world.accepted_job_id()?;
    let requests = world.provisioner.requests();
    match requests.as_slice() {
        [request] if request.job_id == job_id => Ok(()),
        other => Err(eyre::eyre!("expected one request for {job_id}, found {other:?}")),
    }
}

#[then("the submission is rejected with status code {code:u16}")]
fn submission_rejected(world: &JobSubmissionWorld, code: u16) -> Result<(), eyre::Report> {
    let err = rejection(world)?;
    if err.status_code() != code {
        return Err(eyre::eyre!(
            "expected status code {code}, found {} ({err})",
            err.status_code()
        ));
    }
    if !world.provisioner.requests().is_empty() {
        return Err(eyre::eyre!("rejected submission requested a worker"));
    }
    Ok(())
}

#[then(r#"the rejection message mentions "{fragment}""#)]
fn rejection_mentions(world: &JobSubmissionWorld, fragment: String) -> Result<(), eyre::Report> {
    let message = rejection(world)?.client_message();
    if !message.contains(&fragment) {
        return Err(eyre::eyre!("expected {fragment:?} in {message:?}"));
    }
    Ok(())
}

#[then(r#"the job status is "{status}""#)]
fn job_status_is(world: &JobSubmissionWorld, status: String) -> Result<(), eyre::Report> {
    let expected = parse_status(&status)?;
    let job_id = world.accepted_job_id()?;
    let view = run_async(world.coordinator.get_status(&job_id.to_string()))
        .wrap_err("read job status")?;
    if view.status != expected {
        return Err(eyre::eyre!("expected status {expected}, found {}", view.status));
    }
    Ok(())
}

#[then("the worker aborts without running the engine")]
fn worker_aborts(world: &JobSubmissionWorld) -> Result<(), eyre::Report> {
    let report = world
        .last_report
        .ok_or_else(|| eyre::eyre!("missing worker report"))?;
    if report.exit != WorkerExit::Aborted {
        return Err(eyre::eyre!("expected aborted worker, found {:?}", report.exit));
    }
    if world.engine.calls() != 0 {
        return Err(eyre::eyre!("engine ran {} times", world.engine.calls()));
    }
    Ok(())
}

#[then("the worker released its compute once")]
fn compute_released_once(world: &JobSubmissionWorld) -> Result<(), eyre::Report> {
    let report = world
        .last_report
        .ok_or_else(|| eyre::eyre!("missing worker report"))?;
    if !report.compute_released || world.terminator.calls() != 1 {
        return Err(eyre::eyre!(
            "expected one successful release, found {} calls",
            world.terminator.calls()
        ));
    }
    Ok(())
}
