//! Core data model -- test runs, test results, and the submission envelope.
//!
//! These types define the JSON wire contract shared by the ingestion
//! endpoint, the query endpoints, and the reporter. Field names are
//! camelCase on the wire; status enums are closed sets, so an unknown
//! status value is a deserialization error at the service boundary.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Status enums
// ---------------------------------------------------------------------------

/// Aggregate outcome of a whole test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    Passed,
    Failed,
    Skipped,
}

impl RunStatus {
    /// Stable string form used in SQL and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Passed => "passed",
            RunStatus::Failed => "failed",
            RunStatus::Skipped => "skipped",
        }
    }

    /// Parse a stored status string. Unknown values collapse to `Failed`.
    pub fn from_db(s: &str) -> Self {
        match s {
            "passed" => RunStatus::Passed,
            "skipped" => RunStatus::Skipped,
            _ => RunStatus::Failed,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "passed" => Ok(RunStatus::Passed),
            "failed" => Ok(RunStatus::Failed),
            "skipped" => Ok(RunStatus::Skipped),
            other => Err(format!("unknown run status: {other}")),
        }
    }
}

/// Outcome of a single test case within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResultStatus {
    Passed,
    Failed,
    Skipped,
    TimedOut,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultStatus::Passed => "passed",
            ResultStatus::Failed => "failed",
            ResultStatus::Skipped => "skipped",
            ResultStatus::TimedOut => "timedOut",
        }
    }

    /// Parse a stored status string. Unknown values collapse to `Failed`.
    pub fn from_db(s: &str) -> Self {
        match s {
            "passed" => ResultStatus::Passed,
            "skipped" => ResultStatus::Skipped,
            "timedOut" => ResultStatus::TimedOut,
            _ => ResultStatus::Failed,
        }
    }
}

impl std::fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Run and result records
// ---------------------------------------------------------------------------

/// One execution of a test suite, as submitted by the reporter.
///
/// The id is reporter-generated and opaque to the service. `metadata` is a
/// free-form key to JSON-value map preserved as-is in storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRun {
    pub id: String,
    pub project_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub status: RunStatus,
    /// Total wall-clock duration in milliseconds.
    pub duration: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

/// One executed test case within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub id: String,
    /// Must reference the run in the same submission.
    pub run_id: String,
    pub test_name: String,
    pub file_name: String,
    pub status: ResultStatus,
    /// Duration in milliseconds.
    pub duration: i64,
    /// Present only when the framework reported a non-empty message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub retry: u32,
    pub screenshots: Vec<String>,
    pub videos: Vec<String>,
}

/// The single batched payload sent once per run: one run plus its results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub run: TestRun,
    pub results: Vec<TestResult>,
}

// ---------------------------------------------------------------------------
// Stored (read-path) shapes
// ---------------------------------------------------------------------------

/// A persisted test result, as returned by the query endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredResult {
    #[serde(flatten)]
    pub result: TestResult,
    pub created_at: DateTime<Utc>,
}

/// A persisted run with its nested results, as returned by the query
/// endpoints and the ingestion success response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRun {
    #[serde(flatten)]
    pub run: TestRun,
    pub created_at: DateTime<Utc>,
    pub results: Vec<StoredResult>,
}

/// Offset/limit pagination envelope for list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
