//! SQL migration definitions for the fingerprint database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed as a batch.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: source_fingerprints",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Research-source dedup records. The url_hash primary key is the
-- single invariant preventing duplicate ingestion across processes.
CREATE TABLE IF NOT EXISTS source_fingerprints (
    url_hash     TEXT PRIMARY KEY,
    url          TEXT NOT NULL,
    source_type  TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    queued       INTEGER NOT NULL DEFAULT 1,
    completed_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_fingerprints_completed
    ON source_fingerprints(completed_at);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
