//! Database schema and migrations.

use anyhow::Result;
use rusqlite::Connection;

/// Run all pending migrations.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS test_runs (
            id TEXT PRIMARY KEY,
            project_name TEXT NOT NULL,
            branch TEXT,
            commit_hash TEXT,
            timestamp TEXT NOT NULL,
            status TEXT NOT NULL,
            duration_ms INTEGER NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS test_results (
            id TEXT PRIMARY KEY,
            run_id TEXT NOT NULL REFERENCES test_runs(id) ON DELETE CASCADE,
            test_name TEXT NOT NULL,
            file_name TEXT NOT NULL,
            status TEXT NOT NULL,
            duration_ms INTEGER NOT NULL,
            error TEXT,
            retry INTEGER NOT NULL DEFAULT 0,
            screenshots_json TEXT NOT NULL DEFAULT '[]',
            videos_json TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_test_runs_timestamp ON test_runs(timestamp);
        CREATE INDEX IF NOT EXISTS idx_test_runs_project ON test_runs(project_name);
        CREATE INDEX IF NOT EXISTS idx_test_results_run ON test_results(run_id);
        CREATE INDEX IF NOT EXISTS idx_test_results_name ON test_results(test_name);",
    )?;

    // Migration: add 'metadata_json' to test_runs if missing
    let has_metadata: i32 = conn
        .query_row(
            "SELECT count(*) FROM pragma_table_info('test_runs') WHERE name='metadata_json'",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if has_metadata == 0 {
        conn.execute("ALTER TABLE test_runs ADD COLUMN metadata_json TEXT", [])?;
    }

    Ok(())
}
