//! SQL schema for the PostgreSQL job repository.

/// Jobs table: one JSONB document per job plus the columns used for
/// filtering and ordering.
pub const CREATE_JOBS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS reel_jobs (
    id VARCHAR(255) PRIMARY KEY,
    status VARCHAR(64) NOT NULL,
    document JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
)
"#;

pub const CREATE_STATUS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_reel_jobs_status ON reel_jobs(status)";

pub const CREATE_UPDATED_AT_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_reel_jobs_updated_at ON reel_jobs(updated_at DESC)";

/// Returns all schema creation statements in the correct order, one
/// command per statement.
pub fn all_schema_statements() -> Vec<&'static str> {
    vec![CREATE_JOBS_TABLE, CREATE_STATUS_INDEX, CREATE_UPDATED_AT_INDEX]
}

/// Table names in the schema.
pub mod tables {
    pub const JOBS: &str = "reel_jobs";
}
