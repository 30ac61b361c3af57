//! SQL migration definitions for the Blogsmith database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

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
        description: "Initial schema: runs, stage_cache",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per pipeline run
CREATE TABLE IF NOT EXISTS runs (
    id                TEXT PRIMARY KEY,
    url               TEXT NOT NULL,
    topic             TEXT,
    status            TEXT NOT NULL,
    started_at        TEXT NOT NULL,
    ended_at          TEXT,
    total_duration_ms INTEGER,
    steps_completed   INTEGER NOT NULL DEFAULT 0,
    failed_stage      TEXT,
    error_message     TEXT,
    report_json       TEXT
);

CREATE INDEX IF NOT EXISTS idx_runs_started_at ON runs(started_at);

-- Memoized raw generator output per stage
CREATE TABLE IF NOT EXISTS stage_cache (
    stage      TEXT NOT NULL,
    input_hash TEXT NOT NULL,
    model      TEXT NOT NULL,
    raw_text   TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (stage, input_hash, model)
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
