//! libSQL storage layer for run history and the stage cache.
//!
//! The [`Storage`] struct wraps a local libSQL database. Two tables matter:
//! `runs` (one row per pipeline run, with the final report as JSON) and
//! `stage_cache` (raw generator output keyed by stage, input hash and model).
//!
//! **Access rules:**
//! - `create` / `serve`: read-write via [`Storage::open`]
//! - `history`: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use blogsmith_shared::{BlogsmithError, Result};
use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use serde::Serialize;

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

/// Lifecycle state of a stored run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    fn parse(s: &str) -> Result<Self> {
        match s {
            "running" => Ok(Self::Running),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            other => Err(BlogsmithError::Storage(format!("unknown run status `{other}`"))),
        }
    }
}

/// A row of the `runs` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRow {
    pub id: String,
    pub url: String,
    pub topic: Option<String>,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub total_duration_ms: Option<u64>,
    pub steps_completed: u32,
    pub failed_stage: Option<String>,
    pub error_message: Option<String>,
}

/// Final state written when a run ends.
#[derive(Debug, Clone)]
pub struct RunCompletion<'a> {
    pub status: RunStatus,
    pub topic: Option<&'a str>,
    pub ended_at: DateTime<Utc>,
    pub total_duration_ms: u64,
    pub steps_completed: u32,
    pub failed_stage: Option<&'a str>,
    pub error_message: Option<&'a str>,
    pub report_json: &'a str,
}

fn storage_err(e: impl std::fmt::Display) -> BlogsmithError {
    BlogsmithError::Storage(e.to_string())
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BlogsmithError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(BlogsmithError::Storage(format!(
                "database not found at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    BlogsmithError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(BlogsmithError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Run history
    // -----------------------------------------------------------------------

    /// Record the start of a run.
    pub async fn insert_run(&self, id: &str, url: &str, started_at: DateTime<Utc>) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO runs (id, url, status, started_at) VALUES (?1, ?2, ?3, ?4)",
                params![id, url, RunStatus::Running.as_str(), started_at.to_rfc3339()],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Record how a run ended.
    pub async fn finish_run(&self, id: &str, done: &RunCompletion<'_>) -> Result<()> {
        self.check_writable()?;
        let updated = self
            .conn
            .execute(
                "UPDATE runs SET
                   status = ?2, topic = ?3, ended_at = ?4, total_duration_ms = ?5,
                   steps_completed = ?6, failed_stage = ?7, error_message = ?8, report_json = ?9
                 WHERE id = ?1",
                params![
                    id,
                    done.status.as_str(),
                    done.topic,
                    done.ended_at.to_rfc3339(),
                    done.total_duration_ms as i64,
                    i64::from(done.steps_completed),
                    done.failed_stage,
                    done.error_message,
                    done.report_json,
                ],
            )
            .await
            .map_err(storage_err)?;

        if updated == 0 {
            return Err(BlogsmithError::Storage(format!("run {id} not found")));
        }
        Ok(())
    }

    /// Get one run by ID.
    pub async fn get_run(&self, id: &str) -> Result<Option<RunRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, url, topic, status, started_at, ended_at, total_duration_ms,
                        steps_completed, failed_stage, error_message
                 FROM runs WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_run(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// The stored report JSON of a finished run.
    pub async fn get_run_report(&self, id: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT report_json FROM runs WHERE id = ?1", params![id])
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<String>(0).ok()),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// Most recent runs first.
    pub async fn list_runs(&self, limit: u32) -> Result<Vec<RunRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, url, topic, status, started_at, ended_at, total_duration_ms,
                        steps_completed, failed_stage, error_message
                 FROM runs ORDER BY started_at DESC, id DESC LIMIT ?1",
                params![i64::from(limit)],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_run(&row)?);
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Stage cache
    // -----------------------------------------------------------------------

    /// Get cached raw generator output for a stage.
    pub async fn get_stage_cache(
        &self,
        stage: &str,
        input_hash: &str,
        model: &str,
    ) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT raw_text FROM stage_cache
                 WHERE stage = ?1 AND input_hash = ?2 AND model = ?3",
                params![stage, input_hash, model],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => {
                let raw: String = row.get(0).map_err(storage_err)?;
                Ok(Some(raw))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// Store raw generator output for a stage (upserts).
    pub async fn set_stage_cache(
        &self,
        stage: &str,
        input_hash: &str,
        model: &str,
        raw_text: &str,
    ) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO stage_cache (stage, input_hash, model, raw_text, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(stage, input_hash, model) DO UPDATE SET
                   raw_text = excluded.raw_text,
                   created_at = excluded.created_at",
                params![stage, input_hash, model, raw_text, now.as_str()],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Drop cached output, for one stage or all of them. Returns rows removed.
    pub async fn clear_stage_cache(&self, stage: Option<&str>) -> Result<u64> {
        self.check_writable()?;
        let removed = match stage {
            Some(stage) => self
                .conn
                .execute("DELETE FROM stage_cache WHERE stage = ?1", params![stage])
                .await,
            None => self.conn.execute("DELETE FROM stage_cache", params![]).await,
        }
        .map_err(storage_err)?;
        Ok(removed)
    }
}

fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| BlogsmithError::Storage(format!("invalid date: {e}")))
}

/// Convert a database row to a [`RunRow`].
fn row_to_run(row: &libsql::Row) -> Result<RunRow> {
    let status: String = row.get(3).map_err(storage_err)?;
    let started_at: String = row.get(4).map_err(storage_err)?;

    Ok(RunRow {
        id: row.get::<String>(0).map_err(storage_err)?,
        url: row.get::<String>(1).map_err(storage_err)?,
        topic: row.get::<String>(2).ok(),
        status: RunStatus::parse(&status)?,
        started_at: parse_time(&started_at)?,
        ended_at: match row.get::<String>(5).ok() {
            Some(s) => Some(parse_time(&s)?),
            None => None,
        },
        total_duration_ms: row.get::<i64>(6).ok().map(|v| v as u64),
        steps_completed: row.get::<i64>(7).map(|v| v as u32).unwrap_or(0),
        failed_stage: row.get::<String>(8).ok(),
        error_message: row.get::<String>(9).ok(),
    })
}
