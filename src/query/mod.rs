//! Read path -- paginated run listing and single-run retrieval.
//!
//! Aggregated analytics live in [`analytics`]. Everything here is a pure
//! read over the stored run/result history.

pub mod analytics;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params_from_iter, OptionalExtension, Row};

use crate::model::{Page, ResultStatus, RunStatus, StoredResult, StoredRun, TestResult, TestRun};
use crate::storage::Pool;

const RUN_COLUMNS: &str =
    "id, project_name, branch, commit_hash, timestamp, status, duration_ms, metadata_json, created_at";

const RESULT_COLUMNS: &str =
    "id, run_id, test_name, file_name, status, duration_ms, error, retry, screenshots_json, videos_json, created_at";

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Optional filters for the run listing. `status` filters on the run's own
/// aggregate status, never on the statuses of its results.
#[derive(Debug, Clone, Default)]
pub struct RunFilters {
    pub status: Option<RunStatus>,
    pub project_name: Option<String>,
}

/// One-indexed offset/limit pagination.
#[derive(Debug, Clone, Copy)]
pub struct PageParams {
    pub page: i64,
    pub limit: i64,
}

impl Default for PageParams {
    fn default() -> Self {
        Self { page: 1, limit: 20 }
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// List stored runs newest-first with their nested results.
pub fn list_runs(pool: &Pool, filters: &RunFilters, page: PageParams) -> Result<Page<StoredRun>> {
    let conn = pool.get()?;

    let mut clauses: Vec<&str> = Vec::new();
    let mut args: Vec<String> = Vec::new();
    if let Some(status) = filters.status {
        clauses.push("status = ?");
        args.push(status.as_str().to_string());
    }
    if let Some(project) = &filters.project_name {
        clauses.push("project_name = ?");
        args.push(project.clone());
    }
    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM test_runs {where_sql}"),
        params_from_iter(args.iter()),
        |row| row.get(0),
    )?;

    let offset = (page.page - 1) * page.limit;
    let mut stmt = conn.prepare(&format!(
        "SELECT {RUN_COLUMNS} FROM test_runs {where_sql}
         ORDER BY datetime(timestamp) DESC, id
         LIMIT {} OFFSET {}",
        page.limit, offset
    ))?;

    let mut runs: Vec<StoredRun> = stmt
        .query_map(params_from_iter(args.iter()), run_from_row)?
        .collect::<rusqlite::Result<_>>()?;

    for run in &mut runs {
        run.results = results_for_run(&conn, &run.run.id)?;
    }

    let total_pages = if total == 0 {
        0
    } else {
        (total + page.limit - 1) / page.limit
    };

    Ok(Page {
        data: runs,
        total,
        page: page.page,
        limit: page.limit,
        total_pages,
    })
}

/// Fetch one run by id with its nested results, or `None` if absent.
pub fn get_run(pool: &Pool, id: &str) -> Result<Option<StoredRun>> {
    let conn = pool.get()?;

    let run = conn
        .query_row(
            &format!("SELECT {RUN_COLUMNS} FROM test_runs WHERE id = ?1"),
            [id],
            run_from_row,
        )
        .optional()?;

    match run {
        Some(mut run) => {
            run.results = results_for_run(&conn, id)?;
            Ok(Some(run))
        }
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_default()
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<StoredRun> {
    let status: String = row.get(5)?;
    let metadata = row
        .get::<_, Option<String>>(7)?
        .and_then(|raw| serde_json::from_str(&raw).ok());

    Ok(StoredRun {
        run: TestRun {
            id: row.get(0)?,
            project_name: row.get(1)?,
            branch: row.get(2)?,
            commit: row.get(3)?,
            timestamp: parse_ts(&row.get::<_, String>(4)?),
            status: RunStatus::from_db(&status),
            duration: row.get(6)?,
            metadata,
        },
        created_at: parse_ts(&row.get::<_, String>(8)?),
        results: Vec::new(),
    })
}

fn result_from_row(row: &Row<'_>) -> rusqlite::Result<StoredResult> {
    let status: String = row.get(4)?;
    let screenshots = serde_json::from_str(&row.get::<_, String>(8)?).unwrap_or_default();
    let videos = serde_json::from_str(&row.get::<_, String>(9)?).unwrap_or_default();

    Ok(StoredResult {
        result: TestResult {
            id: row.get(0)?,
            run_id: row.get(1)?,
            test_name: row.get(2)?,
            file_name: row.get(3)?,
            status: ResultStatus::from_db(&status),
            duration: row.get(5)?,
            error: row.get(6)?,
            retry: row.get(7)?,
            screenshots,
            videos,
        },
        created_at: parse_ts(&row.get::<_, String>(10)?),
    })
}

fn results_for_run(
    conn: &r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager>,
    run_id: &str,
) -> Result<Vec<StoredResult>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RESULT_COLUMNS} FROM test_results WHERE run_id = ?1 ORDER BY rowid"
    ))?;
    let results = stmt
        .query_map([run_id], result_from_row)?
        .collect::<rusqlite::Result<_>>()?;
    Ok(results)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest;
    use crate::model::Submission;
    use crate::storage;

    fn test_pool() -> (tempfile::TempDir, Pool) {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("testwire.db");
        let pool = storage::open_pool(path.to_str().unwrap()).unwrap();
        (dir, pool)
    }

    fn seed_run(pool: &Pool, id: &str, status: RunStatus, hour: u32) {
        let run = TestRun {
            id: id.to_string(),
            project_name: "default".into(),
            branch: None,
            commit: None,
            timestamp: format!("2026-01-15T{hour:02}:00:00Z").parse().unwrap(),
            status,
            duration: 1000,
            metadata: None,
        };
        let result = TestResult {
            id: format!("{id}-t1"),
            run_id: id.to_string(),
            test_name: "login works".into(),
            file_name: "auth.spec.ts".into(),
            status: ResultStatus::Failed,
            duration: 500,
            error: Some("boom".into()),
            retry: 2,
            screenshots: Vec::new(),
            videos: Vec::new(),
        };
        ingest::ingest_submission(
            pool,
            &Submission {
                run,
                results: vec![result],
            },
        )
        .unwrap();
    }

    #[test]
    fn test_list_is_newest_first() {
        let (_dir, pool) = test_pool();
        seed_run(&pool, "r1", RunStatus::Passed, 1);
        seed_run(&pool, "r2", RunStatus::Passed, 3);
        seed_run(&pool, "r3", RunStatus::Passed, 2);

        let page = list_runs(&pool, &RunFilters::default(), PageParams::default()).unwrap();
        let ids: Vec<&str> = page.data.iter().map(|r| r.run.id.as_str()).collect();
        assert_eq!(ids, vec!["r2", "r3", "r1"]);
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn test_pagination_window_and_total_pages() {
        let (_dir, pool) = test_pool();
        for i in 0..25 {
            seed_run(&pool, &format!("r{i:02}"), RunStatus::Passed, 0);
        }

        let page = list_runs(
            &pool,
            &RunFilters::default(),
            PageParams { page: 2, limit: 10 },
        )
        .unwrap();

        assert_eq!(page.total, 25);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.data.len(), 10);
        // Same timestamp everywhere, so the id tiebreak makes rows 11-20
        // exactly r10..r19.
        assert_eq!(page.data.first().unwrap().run.id, "r10");
        assert_eq!(page.data.last().unwrap().run.id, "r19");
    }

    #[test]
    fn test_status_filter_uses_run_status_only() {
        let (_dir, pool) = test_pool();
        // Run passed even though its single result failed.
        seed_run(&pool, "r1", RunStatus::Passed, 1);
        seed_run(&pool, "r2", RunStatus::Failed, 2);

        let failed = list_runs(
            &pool,
            &RunFilters {
                status: Some(RunStatus::Failed),
                project_name: None,
            },
            PageParams::default(),
        )
        .unwrap();

        let ids: Vec<&str> = failed.data.iter().map(|r| r.run.id.as_str()).collect();
        assert_eq!(ids, vec!["r2"]);
    }

    #[test]
    fn test_get_run_returns_results_with_error_text() {
        let (_dir, pool) = test_pool();
        seed_run(&pool, "r1", RunStatus::Passed, 1);

        let run = get_run(&pool, "r1").unwrap().unwrap();
        assert_eq!(run.results.len(), 1);
        assert_eq!(run.results[0].result.retry, 2);
        assert_eq!(run.results[0].result.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_get_run_missing_is_none() {
        let (_dir, pool) = test_pool();
        assert!(get_run(&pool, "nope").unwrap().is_none());
    }

    #[test]
    fn test_empty_listing() {
        let (_dir, pool) = test_pool();
        let page = list_runs(&pool, &RunFilters::default(), PageParams::default()).unwrap();
        assert_eq!(page.total, 0);
        assert_eq!(page.total_pages, 0);
        assert!(page.data.is_empty());
    }
}
