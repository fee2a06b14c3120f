//! Diesel schema for job persistence.

diesel::table! {
    /// Replication job records.
    replication_jobs (id) {
        /// Job identifier.
        id -> Uuid,
        /// Correlation identifier shared by every component handling the job.
        trace_id -> Uuid,
        /// Accepted submission schema version.
        #[max_length = 16]
        schema_version -> Varchar,
        /// Engine command.
        #[max_length = 16]
        command -> Varchar,
        /// Encrypted source connection URL.
        source_url_encrypted -> Text,
        /// Encrypted target connection URL.
        target_url_encrypted -> Text,
        /// Database and table selection.
        filter -> Jsonb,
        /// Engine options.
        options -> Jsonb,
        /// Lifecycle status.
        #[max_length = 16]
        status -> Varchar,
        /// Latest progress snapshot.
        progress -> Nullable<Jsonb>,
        /// Failure message.
        error -> Nullable<Text>,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Claim timestamp.
        running_at -> Nullable<Timestamptz>,
        /// Completion timestamp.
        completed_at -> Nullable<Timestamptz>,
        /// Failure timestamp.
        failed_at -> Nullable<Timestamptz>,
        /// Retention deadline.
        expires_at -> Timestamptz,
    }
}
