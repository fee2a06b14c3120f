//! When steps for job submission BDD scenarios.

use super::world::{JobSubmissionWorld, run_async};
use rstest_bdd_macros::when;

#[when("the job is submitted")]
fn job_is_submitted(world: &mut JobSubmissionWorld) -> Result<(), eyre::Report> {
    let body = world
        .pending_body
        .clone()
        .ok_or_else(|| eyre::eyre!("missing pending submission in scenario world"))?;
    world.last_submission = Some(run_async(world.coordinator.submit(&body)));
    Ok(())
}

#[when("a worker runs the job")]
fn worker_runs_job(world: &mut JobSubmissionWorld) -> Result<(), eyre::Report> {
    let job_id = world.accepted_job_id()?;
    let worker = world.worker();
    world.last_report = Some(run_async(worker.run(job_id)));
    Ok(())
}
