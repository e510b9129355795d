//! Derived analytics over the stored run/result history.
//!
//! Nothing here is separately owned state: every aggregate is recomputable
//! at any time purely from `test_runs` and `test_results`.

use anyhow::Result;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::storage::Pool;

const TOP_N: i64 = 10;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Inclusive date range for an analytics query.
#[derive(Debug, Clone, Copy)]
pub struct DateRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl DateRange {
    /// The trailing `days`-day window ending now.
    pub fn last_days(days: i64) -> Self {
        let to = Utc::now();
        Self {
            from: to - Duration::days(days),
            to,
        }
    }
}

/// Aggregates for one dashboard analytics view.
///
/// Rates are percentages in `0..=100`; durations are milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub total_runs: i64,
    pub success_rate: f64,
    pub average_duration: f64,
    pub success_rate_history: Vec<HistoryBucket>,
    pub slowest_tests: Vec<SlowTest>,
    pub flaky_tests: Vec<FlakyTest>,
}

/// Per-day success rate over individual test results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryBucket {
    pub date: String,
    pub success_rate: f64,
    pub total_tests: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlowTest {
    pub test_name: String,
    pub average_duration: f64,
    pub run_count: i64,
}

/// A test that needed retries, ranked by how often it fails outright.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlakyTest {
    pub test_name: String,
    pub retry_count: i64,
    pub failure_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<String>,
}

// ---------------------------------------------------------------------------
// Computation
// ---------------------------------------------------------------------------

/// Compute all dashboard aggregates for runs whose timestamp falls in `range`.
pub fn compute(pool: &Pool, range: DateRange) -> Result<Analytics> {
    let conn = pool.get()?;
    let from = range.from.to_rfc3339_opts(SecondsFormat::Millis, true);
    let to = range.to.to_rfc3339_opts(SecondsFormat::Millis, true);

    let (total_runs, passed_runs, average_duration): (i64, i64, f64) = conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(status = 'passed'), 0),
                COALESCE(AVG(duration_ms), 0.0)
         FROM test_runs
         WHERE datetime(timestamp) BETWEEN datetime(?1) AND datetime(?2)",
        params![from, to],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;

    let success_rate = if total_runs == 0 {
        0.0
    } else {
        100.0 * passed_runs as f64 / total_runs as f64
    };

    let mut stmt = conn.prepare(
        "SELECT date(tr.timestamp) AS day,
                COALESCE(SUM(res.status = 'passed'), 0),
                COUNT(*)
         FROM test_results res
         JOIN test_runs tr ON tr.id = res.run_id
         WHERE datetime(tr.timestamp) BETWEEN datetime(?1) AND datetime(?2)
         GROUP BY day
         ORDER BY day",
    )?;
    let success_rate_history = stmt
        .query_map(params![from, to], |row| {
            let passed: i64 = row.get(1)?;
            let total: i64 = row.get(2)?;
            Ok(HistoryBucket {
                date: row.get(0)?,
                success_rate: if total == 0 {
                    0.0
                } else {
                    100.0 * passed as f64 / total as f64
                },
                total_tests: total,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut stmt = conn.prepare(
        "SELECT res.test_name, AVG(res.duration_ms), COUNT(*)
         FROM test_results res
         JOIN test_runs tr ON tr.id = res.run_id
         WHERE datetime(tr.timestamp) BETWEEN datetime(?1) AND datetime(?2)
         GROUP BY res.test_name
         ORDER BY AVG(res.duration_ms) DESC
         LIMIT ?3",
    )?;
    let slowest_tests = stmt
        .query_map(params![from, to, TOP_N], |row| {
            Ok(SlowTest {
                test_name: row.get(0)?,
                average_duration: row.get(1)?,
                run_count: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut stmt = conn.prepare(
        "SELECT res.test_name,
                SUM(res.retry),
                100.0 * SUM(res.status = 'failed') / COUNT(*) AS failure_rate,
                MAX(CASE WHEN res.status = 'failed' THEN tr.timestamp END)
         FROM test_results res
         JOIN test_runs tr ON tr.id = res.run_id
         WHERE datetime(tr.timestamp) BETWEEN datetime(?1) AND datetime(?2)
         GROUP BY res.test_name
         HAVING SUM(res.retry) > 0
         ORDER BY failure_rate DESC
         LIMIT ?3",
    )?;
    let flaky_tests = stmt
        .query_map(params![from, to, TOP_N], |row| {
            Ok(FlakyTest {
                test_name: row.get(0)?,
                retry_count: row.get(1)?,
                failure_rate: row.get(2)?,
                last_failure: row.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(Analytics {
        total_runs,
        success_rate,
        average_duration,
        success_rate_history,
        slowest_tests,
        flaky_tests,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
