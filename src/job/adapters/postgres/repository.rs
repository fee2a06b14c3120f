//! `PostgreSQL` job store.

use super::{
    models::{JobRow, NewJobRow, TransitionChangeset},
    schema::replication_jobs,
};
use crate::job::{
    domain::{
        EncryptedCredential, Job, JobCommand, JobFilter, JobId, JobOptions, JobProgress,
        JobStatus, PersistedJobData, ProgressUpdate, SchemaVersion, StatusTransition, TraceId,
    },
    ports::{JobStore, JobStoreError, JobStoreResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// `PostgreSQL` connection pool type used by the job store.
pub type JobPgPool = Pool<ConnectionManager<PgConnection>>;

/// DDL for the job table and its status index.
pub const SCHEMA_SQL: &str = include_str!(
    "../../../../migrations/2026-10-01-000000_create_replication_jobs/up.sql"
);

/// Builds a connection pool.
///
/// # Errors
///
/// Returns [`JobStoreError::Persistence`] when the pool cannot be created.
pub fn build_pool(database_url: &str, max_size: u32) -> JobStoreResult<JobPgPool> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Pool::builder()
        .max_size(max_size)
        .build(manager)
        .map_err(JobStoreError::persistence)
}

/// `PostgreSQL`-backed job store.
#[derive(Debug, Clone)]
pub struct PostgresJobStore {
    pool: JobPgPool,
}

impl PostgresJobStore {
    /// Creates a store from a connection pool.
    #[must_use]
    pub const fn new(pool: JobPgPool) -> Self {
        Self { pool }
    }

    /// Creates the job table and indexes when they do not exist.
    ///
    /// # Errors
    ///
    /// Returns [`JobStoreError::Persistence`] when the DDL fails.
    pub async fn ensure_schema(&self) -> JobStoreResult<()> {
        self.run_blocking(|connection| {
            connection
                .batch_execute(SCHEMA_SQL)
                .map_err(JobStoreError::persistence)
        })
        .await
    }

    async fn run_blocking<F, T>(&self, f: F) -> JobStoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> JobStoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(JobStoreError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(JobStoreError::persistence)?
    }
}

#[async_trait]
impl JobStore for PostgresJobStore {
    async fn create(&self, job: &Job) -> JobStoreResult<()> {
        let job_id = job.id();
        let new_row = to_new_row(job)?;
        self.run_blocking(move |connection| {
            diesel::insert_into(replication_jobs::table)
                .values(&new_row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        JobStoreError::DuplicateJob(job_id)
                    }
                    _ => JobStoreError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn read(&self, id: JobId) -> JobStoreResult<Option<Job>> {
        self.run_blocking(move |connection| {
            find_row(connection, id)?.map(row_to_job).transpose()
        })
        .await
    }

    async fn conditional_transition(
        &self,
        id: JobId,
        transition: &StatusTransition,
    ) -> JobStoreResult<Job> {
        let expected = transition.expected();
        let changeset = to_changeset(transition);
        self.run_blocking(move |connection| {
            let updated = diesel::update(
                replication_jobs::table
                    .filter(replication_jobs::id.eq(id.into_inner()))
                    .filter(replication_jobs::status.eq(expected.as_str())),
            )
            .set(&changeset)
            .returning(JobRow::as_returning())
            .get_result::<JobRow>(connection)
            .optional()
            .map_err(JobStoreError::persistence)?;

            if let Some(row) = updated {
                return row_to_job(row);
            }

            // Zero rows matched: distinguish a missing job from a lost race.
            let current = find_row(connection, id)?.ok_or(JobStoreError::NotFound(id))?;
            let actual = parse_status(&current.status)?;
            Err(JobStoreError::Conflict {
                job_id: id,
                expected,
                actual,
            })
        })
        .await
    }

    async fn update_progress(
        &self,
        id: JobId,
        progress: JobProgress,
    ) -> JobStoreResult<ProgressUpdate> {
        let completed = i32::try_from(progress.databases_completed)
            .map_err(JobStoreError::persistence)?;
        let payload = serde_json::to_value(&progress).map_err(JobStoreError::persistence)?;
        self.run_blocking(move |connection| {
            let affected = diesel::sql_query(concat!(
                "UPDATE replication_jobs SET progress = $1 ",
                "WHERE id = $2 AND status = 'running' ",
                "AND (progress IS NULL ",
                "OR COALESCE((progress->>'databases_completed')::INTEGER, 0) <= $3)",
            ))
            .bind::<diesel::sql_types::Jsonb, _>(payload)
            .bind::<diesel::sql_types::Uuid, _>(id.into_inner())
            .bind::<diesel::sql_types::Integer, _>(completed)
            .execute(connection)
            .map_err(JobStoreError::persistence)?;

            if affected > 0 {
                return Ok(ProgressUpdate::Applied);
            }
            find_row(connection, id)?.ok_or(JobStoreError::NotFound(id))?;
            Ok(ProgressUpdate::Ignored)
        })
        .await
    }

    async fn list_by_status(
        &self,
        status: JobStatus,
        created_before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> JobStoreResult<Vec<Job>> {
        let row_limit = i64::try_from(limit).map_err(JobStoreError::persistence)?;
        self.run_blocking(move |connection| {
            let mut query = replication_jobs::table
                .filter(replication_jobs::status.eq(status.as_str()))
                .select(JobRow::as_select())
                .order((replication_jobs::created_at.asc(), replication_jobs::id.asc()))
                .limit(row_limit)
                .into_boxed();
            if let Some(bound) = created_before {
                query = query.filter(replication_jobs::created_at.lt(bound));
            }
            let rows = query
                .load::<JobRow>(connection)
                .map_err(JobStoreError::persistence)?;
            rows.into_iter().map(row_to_job).collect()
        })
        .await
    }

    async fn count_by_statuses(&self, statuses: &[JobStatus]) -> JobStoreResult<u64> {
        let names: Vec<&'static str> = statuses.iter().map(|status| status.as_str()).collect();
        self.run_blocking(move |connection| {
            let count = replication_jobs::table
                .filter(replication_jobs::status.eq_any(names))
                .count()
                .get_result::<i64>(connection)
                .map_err(JobStoreError::persistence)?;
            u64::try_from(count).map_err(JobStoreError::persistence)
        })
        .await
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> JobStoreResult<u64> {
        self.run_blocking(move |connection| {
            let deleted = diesel::delete(
                replication_jobs::table.filter(replication_jobs::expires_at.le(now)),
            )
            .execute(connection)
            .map_err(JobStoreError::persistence)?;
            u64::try_from(deleted).map_err(JobStoreError::persistence)
        })
        .await
    }
}

fn find_row(connection: &mut PgConnection, id: JobId) -> JobStoreResult<Option<JobRow>> {
    replication_jobs::table
        .filter(replication_jobs::id.eq(id.into_inner()))
        .select(JobRow::as_select())
        .first::<JobRow>(connection)
        .optional()
        .map_err(JobStoreError::persistence)
}

fn to_changeset(transition: &StatusTransition) -> TransitionChangeset {
    let at = Some(transition.at());
    let next = transition.next();
    TransitionChangeset {
        status: next.as_str().to_owned(),
        running_at: at.filter(|_| next == JobStatus::Running),
        completed_at: at.filter(|_| next == JobStatus::Completed),
        failed_at: at.filter(|_| next == JobStatus::Failed),
        error: transition.error().map(str::to_owned),
    }
}

fn to_new_row(job: &Job) -> JobStoreResult<NewJobRow> {
    let filter = serde_json::to_value(job.filter()).map_err(JobStoreError::persistence)?;
    let options = serde_json::to_value(job.options()).map_err(JobStoreError::persistence)?;
    let progress = job
        .progress()
        .map(serde_json::to_value)
        .transpose()
        .map_err(JobStoreError::persistence)?;

    Ok(NewJobRow {
        id: job.id().into_inner(),
        trace_id: job.trace_id().into_inner(),
        schema_version: job.schema_version().as_str().to_owned(),
        command: job.command().as_str().to_owned(),
        source_url_encrypted: job.source_url_encrypted().as_str().to_owned(),
        target_url_encrypted: job.target_url_encrypted().as_str().to_owned(),
        filter,
        options,
        status: job.status().as_str().to_owned(),
        progress,
        error: job.error().map(str::to_owned),
        created_at: job.created_at(),
        running_at: job.running_at(),
        completed_at: job.completed_at(),
        failed_at: job.failed_at(),
        expires_at: job.expires_at(),
    })
}

fn row_to_job(row: JobRow) -> JobStoreResult<Job> {
    let JobRow {
        id,
        trace_id,
        schema_version,
        command,
        source_url_encrypted,
        target_url_encrypted,
        filter,
        options,
        status,
        progress,
        error,
        created_at,
        running_at,
        completed_at,
        failed_at,
        expires_at,
    } = row;

    let data = PersistedJobData {
        id: JobId::from_uuid(id),
        trace_id: TraceId::from_uuid(trace_id),
        schema_version: SchemaVersion::new(schema_version),
        command: JobCommand::try_from(command.as_str()).map_err(JobStoreError::persistence)?,
        source_url_encrypted: EncryptedCredential::new(source_url_encrypted),
        target_url_encrypted: EncryptedCredential::new(target_url_encrypted),
        filter: serde_json::from_value::<JobFilter>(filter).map_err(JobStoreError::persistence)?,
        options: serde_json::from_value::<JobOptions>(options)
            .map_err(JobStoreError::persistence)?,
        status: parse_status(&status)?,
        progress: progress
            .map(serde_json::from_value::<JobProgress>)
            .transpose()
            .map_err(JobStoreError::persistence)?,
        error,
        created_at,
        running_at,
        completed_at,
        failed_at,
        expires_at,
    };
    Ok(Job::from_persisted(data))
}

fn parse_status(value: &str) -> JobStoreResult<JobStatus> {
    JobStatus::try_from(value).map_err(JobStoreError::persistence)
}

#[cfg(test)]
mod tests {
    //! Row conversion tests that run without a database.

    use super::*;
    use crate::job::domain::NewJob;
    use mockable::DefaultClock;
    use rstest::rstest;

    fn sample_job() -> Job {
        let mut filter = JobFilter::default();
        filter.include_databases.insert("orders".to_owned());
        filter.exclude_tables.insert("orders.audit_log".to_owned());
        Job::new_provisioning(
            NewJob {
                schema_version: SchemaVersion::new("1.0"),
                command: JobCommand::Init,
                source_url_encrypted: EncryptedCredential::new("c291cmNl"),
                target_url_encrypted: EncryptedCredential::new("dGFyZ2V0"),
                filter,
                options: JobOptions {
                    drop_existing: true,
                    enable_sync: false,
                    estimated_size_bytes: Some(42),
                },
            },
            chrono::Duration::days(30),
            &DefaultClock,
        )
    }

    fn into_row(new_row: NewJobRow) -> JobRow {
        JobRow {
            id: new_row.id,
            trace_id: new_row.trace_id,
            schema_version: new_row.schema_version,
            command: new_row.command,
            source_url_encrypted: new_row.source_url_encrypted,
            target_url_encrypted: new_row.target_url_encrypted,
            filter: new_row.filter,
            options: new_row.options,
            status: new_row.status,
            progress: new_row.progress,
            error: new_row.error,
            created_at: new_row.created_at,
            running_at: new_row.running_at,
            completed_at: new_row.completed_at,
            failed_at: new_row.failed_at,
            expires_at: new_row.expires_at,
        }
    }

    #[rstest]
    fn rows_preserve_every_job_field() {
        let job = sample_job();
        let row = to_new_row(&job).expect("row conversion should succeed");
        let restored = row_to_job(into_row(row)).expect("job conversion should succeed");
        assert_eq!(restored, job);
    }

    #[rstest]
    fn unknown_persisted_status_is_a_persistence_error() {
        let mut row = into_row(to_new_row(&sample_job()).expect("row conversion should succeed"));
        row.status = "paused".to_owned();
        let err = row_to_job(row).expect_err("unknown status should be rejected");
        assert!(matches!(err, JobStoreError::Persistence(_)));
    }

    #[rstest]
    fn failure_changeset_sets_only_failure_columns() {
        let at = Utc::now();
        let transition = StatusTransition::fail(JobStatus::Running, at, "engine exited with code 3")
            .expect("running to failed is allowed");
        let changeset = to_changeset(&transition);
        assert_eq!(changeset.status, "failed");
        assert_eq!(changeset.failed_at, Some(at));
        assert_eq!(changeset.running_at, None);
        assert_eq!(changeset.completed_at, None);
        assert_eq!(changeset.error.as_deref(), Some("engine exited with code 3"));
    }

    #[rstest]
    fn claim_changeset_sets_running_at() {
        let at = Utc::now();
        let changeset = to_changeset(&StatusTransition::claim(at));
        assert_eq!(changeset.status, "running");
        assert_eq!(changeset.running_at, Some(at));
        assert_eq!(changeset.error, None);
    }

    #[rstest]
    fn schema_sql_defines_status_created_at_index() {
        assert!(SCHEMA_SQL.contains("ON replication_jobs (status, created_at)"));
    }
}
