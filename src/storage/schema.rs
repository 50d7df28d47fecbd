//! History database schema.

use anyhow::Result;
use rusqlite::Connection;

/// Create the history tables if they do not exist yet.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS analyses (
            id INTEGER PRIMARY KEY,
            incident_id TEXT NOT NULL,
            analyzed_at TEXT NOT NULL,
            primary_cause TEXT,
            confidence REAL NOT NULL,
            business_impact TEXT NOT NULL,
            postmortem_path TEXT NOT NULL,
            result_json TEXT NOT NULL,
            notification_failures INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_analyses_analyzed ON analyses(analyzed_at);
        CREATE INDEX IF NOT EXISTS idx_analyses_incident ON analyses(incident_id);",
    )?;
    Ok(())
}
