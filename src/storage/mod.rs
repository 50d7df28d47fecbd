//! SQLite analysis history -- schema, queries, migrations.

pub mod schema;

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use r2d2::Pool as R2D2Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use serde::Serialize;

use crate::pipeline::PipelineResult;

/// Connection Pool type
pub type Pool = R2D2Pool<SqliteConnectionManager>;

/// Open (or create) the SQLite database and return a connection pool.
pub fn open_pool(path: &Path) -> Result<Pool> {
    let manager = SqliteConnectionManager::file(path).with_init(|c| {
        c.execute_batch(
            "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA temp_store = MEMORY;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;",
        )
    });

    let pool = R2D2Pool::new(manager)
        .with_context(|| format!("failed to open history database {}", path.display()))?;

    // Run migrations on a single connection
    let conn = pool.get()?;
    schema::migrate(&conn)?;

    Ok(pool)
}

/// One row of the history listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisRecord {
    pub incident_id: String,
    pub analyzed_at: DateTime<Utc>,
    pub primary_cause: Option<String>,
    pub confidence: f64,
    pub business_impact: String,
    pub postmortem_path: String,
    pub notification_failures: u32,
}

/// Records every pipeline run.
#[derive(Clone)]
pub struct IncidentStore {
    pool: Pool,
}

impl IncidentStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(open_pool(path)?))
    }

    pub fn record(&self, result: &PipelineResult) -> Result<()> {
        let conn = self.pool.get()?;
        let result_json = serde_json::to_string(result)?;
        let failures = result.notifications.values().filter(|o| !o.success).count() as u32;

        conn.execute(
            "INSERT INTO analyses (incident_id, analyzed_at, primary_cause, confidence,
                                   business_impact, postmortem_path, result_json, notification_failures)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                result.incident_id,
                result
                    .analysis_timestamp
                    .to_rfc3339_opts(SecondsFormat::Micros, true),
                result.primary_cause().map(|c| c.category.as_str()),
                result.insight.confidence_score,
                result.insight.business_impact.as_str(),
                result.postmortem.file_path.display().to_string(),
                result_json,
                failures,
            ],
        )?;

        Ok(())
    }

    /// Most recent analyses first.
    pub fn list_recent(&self, limit: usize) -> Result<Vec<AnalysisRecord>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT incident_id, analyzed_at, primary_cause, confidence, business_impact,
                    postmortem_path, notification_failures
             FROM analyses ORDER BY analyzed_at DESC, id DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            let analyzed_at: String = row.get(1)?;
            Ok(AnalysisRecord {
                incident_id: row.get(0)?,
                analyzed_at: DateTime::parse_from_rfc3339(&analyzed_at)
                    .map(|t| t.with_timezone(&Utc))
                    .unwrap_or_default(),
                primary_cause: row.get(2)?,
                confidence: row.get(3)?,
                business_impact: row.get(4)?,
                postmortem_path: row.get(5)?,
                notification_failures: row.get(6)?,
            })
        })?;

        let mut records = Vec::new();
        for r in rows {
            records.push(r?);
        }
        Ok(records)
    }

    /// Full stored result of the latest analysis of `incident_id`.
    pub fn load(&self, incident_id: &str) -> Result<Option<PipelineResult>> {
        let conn = self.pool.get()?;
        let json: Option<String> = conn
            .query_row(
                "SELECT result_json FROM analyses WHERE incident_id = ?1
                 ORDER BY analyzed_at DESC, id DESC LIMIT 1",
                [incident_id],
                |row| row.get(0),
            )
            .optional()?;
        json.map(|j| serde_json::from_str(&j).context("corrupt stored result"))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::CauseCategory;
    use crate::insight::synthesize_at;
    use crate::insight::tests::cause;
    use crate::notify::ChannelOutcome;
    use crate::postmortem::Assembler;
    use crate::remediation::plan;
    use crate::telemetry::IncidentContext;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn result(id: &str, minute: u32, causes: &[crate::detect::RootCause]) -> PipelineResult {
        let alert = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let ctx = IncidentContext::empty(id, alert, 30);
        let insight = synthesize_at(&ctx, causes, Utc.with_ymd_and_hms(2024, 3, 1, 13, minute, 0).unwrap());
        let actions = plan(&insight);
        let report = Assembler::new("reports").build(&insight, &actions, None, None);
        let notifications = BTreeMap::from([
            ("ok".to_string(), ChannelOutcome { success: true, error: None, duration_ms: 3 }),
            (
                "down".to_string(),
                ChannelOutcome { success: false, error: Some("503".to_string()), duration_ms: 9 },
            ),
        ]);
        PipelineResult::new(ctx, &insight, &actions, &report, notifications)
    }

    fn store() -> (tempfile::TempDir, IncidentStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = IncidentStore::open(&dir.path().join("history.db")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_record_and_list_newest_first() {
        let (_dir, store) = store();
        store
            .record(&result("INC-A", 1, &[cause(CauseCategory::DatabaseIssues, 0.8, &["db"])]))
            .unwrap();
        store.record(&result("INC-B", 5, &[])).unwrap();

        let rows = store.list_recent(10).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].incident_id, "INC-B");
        assert_eq!(rows[0].primary_cause, None);
        assert_eq!(rows[0].business_impact, "low");
        assert_eq!(rows[1].primary_cause.as_deref(), Some("database_issues"));
        assert_eq!(rows[1].notification_failures, 1);

        assert_eq!(store.list_recent(1).unwrap().len(), 1);
    }

    #[test]
    fn test_load_returns_full_result() {
        let (_dir, store) = store();
        let original = result("INC-C", 2, &[cause(CauseCategory::DependencyFailure, 0.7, &["api"])]);
        store.record(&original).unwrap();

        assert_eq!(store.load("INC-C").unwrap(), Some(original));
        assert_eq!(store.load("INC-missing").unwrap(), None);
    }
}
