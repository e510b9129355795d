//! Submission ingestion -- shape validation and transactional persistence.
//!
//! A submission is one run plus its full result sequence. Either the run
//! row and every result row are stored, or nothing is: the insert happens
//! inside a single SQLite transaction. Resubmitting a run id is a
//! constraint violation, never a merge.

use chrono::{SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::model::{StoredResult, StoredRun, Submission};
use crate::storage::Pool;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// One field-level validation failure, reported back to the submitter.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    /// The submission parsed but violated one or more shape constraints.
    #[error("submission failed validation ({} issue(s))", .0.len())]
    Validation(Vec<ValidationIssue>),
    /// A run with this id has already been stored.
    #[error("test run {0} already exists")]
    Duplicate(String),
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("failed to encode field as JSON: {0}")]
    Encode(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Check a parsed submission against the shape constraints the type system
/// cannot express. Collects every violation rather than stopping at the
/// first so the submitter sees the full picture.
pub fn validate(sub: &Submission) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if sub.run.id.is_empty() {
        issues.push(ValidationIssue::new("run.id", "must not be empty"));
    }
    if sub.run.project_name.is_empty() {
        issues.push(ValidationIssue::new("run.projectName", "must not be empty"));
    }
    if sub.run.duration < 0 {
        issues.push(ValidationIssue::new("run.duration", "must be non-negative"));
    }

    let mut seen_ids = std::collections::HashSet::new();
    for (i, result) in sub.results.iter().enumerate() {
        let field = |name: &str| format!("results[{i}].{name}");

        if result.id.is_empty() {
            issues.push(ValidationIssue::new(field("id"), "must not be empty"));
        } else if !seen_ids.insert(result.id.as_str()) {
            issues.push(ValidationIssue::new(
                field("id"),
                "duplicate result id within submission",
            ));
        }
        if result.run_id != sub.run.id {
            issues.push(ValidationIssue::new(
                field("runId"),
                "must reference the submitted run",
            ));
        }
        if result.test_name.is_empty() {
            issues.push(ValidationIssue::new(field("testName"), "must not be empty"));
        }
        if result.duration < 0 {
            issues.push(ValidationIssue::new(
                field("duration"),
                "must be non-negative",
            ));
        }
    }

    issues
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// Validate and persist a submission, returning the stored run with its
/// nested results.
pub fn ingest_submission(pool: &Pool, sub: &Submission) -> Result<StoredRun, IngestError> {
    let issues = validate(sub);
    if !issues.is_empty() {
        debug!(run_id = %sub.run.id, issues = issues.len(), "submission rejected");
        return Err(IngestError::Validation(issues));
    }

    let created_at = Utc::now();
    let created_at_str = created_at.to_rfc3339_opts(SecondsFormat::Millis, true);

    let mut conn = pool.get()?;
    let tx = conn.transaction()?;

    let exists: Option<i64> = tx
        .query_row(
            "SELECT 1 FROM test_runs WHERE id = ?1",
            [&sub.run.id],
            |row| row.get(0),
        )
        .optional()?;
    if exists.is_some() {
        return Err(IngestError::Duplicate(sub.run.id.clone()));
    }

    let metadata_json = sub
        .run
        .metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    tx.execute(
        "INSERT INTO test_runs
             (id, project_name, branch, commit_hash, timestamp, status,
              duration_ms, metadata_json, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            sub.run.id,
            sub.run.project_name,
            sub.run.branch,
            sub.run.commit,
            sub.run
                .timestamp
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            sub.run.status.as_str(),
            sub.run.duration,
            metadata_json,
            created_at_str,
        ],
    )?;

    for result in &sub.results {
        tx.execute(
            "INSERT INTO test_results
                 (id, run_id, test_name, file_name, status, duration_ms,
                  error, retry, screenshots_json, videos_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                result.id,
                result.run_id,
                result.test_name,
                result.file_name,
                result.status.as_str(),
                result.duration,
                result.error,
                result.retry,
                serde_json::to_string(&result.screenshots)?,
                serde_json::to_string(&result.videos)?,
                created_at_str,
            ],
        )?;
    }

    tx.commit()?;

    info!(
        run_id = %sub.run.id,
        project = %sub.run.project_name,
        results = sub.results.len(),
        status = %sub.run.status,
        "stored test run"
    );

    Ok(StoredRun {
        run: sub.run.clone(),
        created_at,
        results: sub
            .results
            .iter()
            .map(|r| StoredResult {
                result: r.clone(),
                created_at,
            })
            .collect(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ResultStatus, RunStatus, TestResult, TestRun};
    use crate::storage;

    fn test_pool() -> (tempfile::TempDir, Pool) {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("testwire.db");
        let pool = storage::open_pool(path.to_str().unwrap()).unwrap();
        (dir, pool)
    }

    fn sample_run(id: &str) -> TestRun {
        TestRun {
            id: id.to_string(),
            project_name: "default".into(),
            branch: Some("main".into()),
            commit: None,
            timestamp: "2026-01-15T10:30:00Z".parse().unwrap(),
            status: RunStatus::Passed,
            duration: 1000,
            metadata: None,
        }
    }

    fn sample_result(id: &str, run_id: &str) -> TestResult {
        TestResult {
            id: id.to_string(),
            run_id: run_id.to_string(),
            test_name: "login works".into(),
            file_name: "auth.spec.ts".into(),
            status: ResultStatus::Passed,
            duration: 250,
            error: None,
            retry: 0,
            screenshots: vec!["shot.png".into()],
            videos: Vec::new(),
        }
    }

    #[test]
    fn test_valid_submission_passes_validation() {
        let sub = Submission {
            run: sample_run("r1"),
            results: vec![sample_result("t1", "r1"), sample_result("t2", "r1")],
        };
        assert!(validate(&sub).is_empty());
    }

    #[test]
    fn test_validation_collects_all_issues() {
        let mut run = sample_run("");
        run.duration = -5;
        let mut bad = sample_result("", "other-run");
        bad.test_name = String::new();
        bad.duration = -1;

        let sub = Submission {
            run,
            results: vec![bad],
        };

        let issues = validate(&sub);
        let fields: Vec<&str> = issues.iter().map(|i| i.field.as_str()).collect();
        assert!(fields.contains(&"run.id"));
        assert!(fields.contains(&"run.duration"));
        assert!(fields.contains(&"results[0].id"));
        assert!(fields.contains(&"results[0].runId"));
        assert!(fields.contains(&"results[0].testName"));
        assert!(fields.contains(&"results[0].duration"));
    }

    #[test]
    fn test_duplicate_result_ids_rejected() {
        let sub = Submission {
            run: sample_run("r1"),
            results: vec![sample_result("t1", "r1"), sample_result("t1", "r1")],
        };
        let issues = validate(&sub);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, "results[1].id");
    }

    #[test]
    fn test_ingest_persists_run_and_results() {
        let (_dir, pool) = test_pool();
        let sub = Submission {
            run: sample_run("r1"),
            results: vec![sample_result("t1", "r1"), sample_result("t2", "r1")],
        };

        let stored = ingest_submission(&pool, &sub).unwrap();
        assert_eq!(stored.run.id, "r1");
        assert_eq!(stored.results.len(), 2);

        let conn = pool.get().unwrap();
        let runs: i64 = conn
            .query_row("SELECT COUNT(*) FROM test_runs", [], |r| r.get(0))
            .unwrap();
        let results: i64 = conn
            .query_row("SELECT COUNT(*) FROM test_results", [], |r| r.get(0))
            .unwrap();
        assert_eq!(runs, 1);
        assert_eq!(results, 2);
    }

    #[test]
    fn test_duplicate_run_id_is_rejected() {
        let (_dir, pool) = test_pool();
        let sub = Submission {
            run: sample_run("r1"),
            results: vec![sample_result("t1", "r1")],
        };

        ingest_submission(&pool, &sub).unwrap();

        let again = Submission {
            run: sample_run("r1"),
            results: vec![sample_result("t9", "r1")],
        };
        match ingest_submission(&pool, &again) {
            Err(IngestError::Duplicate(id)) => assert_eq!(id, "r1"),
            other => panic!("expected Duplicate, got {other:?}"),
        }

        // The original row set is untouched.
        let conn = pool.get().unwrap();
        let results: i64 = conn
            .query_row("SELECT COUNT(*) FROM test_results", [], |r| r.get(0))
            .unwrap();
        assert_eq!(results, 1);
    }

    #[test]
    fn test_failed_insert_rolls_back_whole_submission() {
        let (_dir, pool) = test_pool();

        // Seed a run whose result id will collide with the next submission.
        let first = Submission {
            run: sample_run("r1"),
            results: vec![sample_result("shared-id", "r1")],
        };
        ingest_submission(&pool, &first).unwrap();

        let second = Submission {
            run: sample_run("r2"),
            results: vec![
                sample_result("fresh-id", "r2"),
                sample_result("shared-id", "r2"),
            ],
        };
        assert!(matches!(
            ingest_submission(&pool, &second),
            Err(IngestError::Storage(_))
        ));

        // Neither the run nor its first (otherwise valid) result survived.
        let conn = pool.get().unwrap();
        let run2: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM test_runs WHERE id = 'r2'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        let fresh: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM test_results WHERE id = 'fresh-id'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(run2, 0);
        assert_eq!(fresh, 0);
    }

    #[test]
    fn test_metadata_stored_as_json() {
        let (_dir, pool) = test_pool();
        let mut run = sample_run("r1");
        run.metadata = Some(
            [("ci".to_string(), serde_json::json!(true))]
                .into_iter()
                .collect(),
        );
        let sub = Submission {
            run,
            results: Vec::new(),
        };
        ingest_submission(&pool, &sub).unwrap();

        let conn = pool.get().unwrap();
        let raw: String = conn
            .query_row(
                "SELECT metadata_json FROM test_runs WHERE id = 'r1'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["ci"], serde_json::json!(true));
    }
}
