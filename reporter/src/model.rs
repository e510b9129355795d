//! Wire types for the submission payload, plus the status mappings from
//! the test framework's native vocabulary onto the closed status sets.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Statuses
// ---------------------------------------------------------------------------

/// Aggregate outcome of a whole run. Note there is no mapping into
/// `Skipped`: a native status other than passed/failed collapses to
/// `Failed`, never silently to something milder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    Passed,
    Failed,
    Skipped,
}

impl RunStatus {
    /// Total mapping from the framework's native run status.
    pub fn from_native(status: &str) -> Self {
        match status {
            "passed" => RunStatus::Passed,
            "failed" => RunStatus::Failed,
            // interrupted, timedout, and anything unrecognized
            _ => RunStatus::Failed,
        }
    }
}

/// Outcome of a single test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResultStatus {
    Passed,
    Failed,
    Skipped,
    TimedOut,
}

impl ResultStatus {
    /// Total mapping from the framework's native test status. Unknown
    /// values collapse to `Failed` rather than dropping the result.
    pub fn from_native(status: &str) -> Self {
        match status {
            "passed" => ResultStatus::Passed,
            "failed" => ResultStatus::Failed,
            "skipped" => ResultStatus::Skipped,
            "timedOut" => ResultStatus::TimedOut,
            "interrupted" => ResultStatus::Failed,
            _ => ResultStatus::Failed,
        }
    }
}

// ---------------------------------------------------------------------------
// Payload records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRunData {
    pub id: String,
    pub project_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub status: RunStatus,
    /// Wall-clock duration of the whole run in milliseconds.
    pub duration: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResultData {
    pub id: String,
    pub run_id: String,
    pub test_name: String,
    pub file_name: String,
    pub status: ResultStatus,
    pub duration: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub retry: u32,
    pub screenshots: Vec<String>,
    pub videos: Vec<String>,
}

/// The single batched payload sent once per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub run: TestRunData,
    pub results: Vec<TestResultData>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_status_mapping_is_total() {
        assert_eq!(ResultStatus::from_native("passed"), ResultStatus::Passed);
        assert_eq!(ResultStatus::from_native("failed"), ResultStatus::Failed);
        assert_eq!(ResultStatus::from_native("skipped"), ResultStatus::Skipped);
        assert_eq!(ResultStatus::from_native("timedOut"), ResultStatus::TimedOut);
        assert_eq!(ResultStatus::from_native("interrupted"), ResultStatus::Failed);

        // Fail-closed default for anything the framework invents later.
        assert_eq!(ResultStatus::from_native("flaked"), ResultStatus::Failed);
        assert_eq!(ResultStatus::from_native(""), ResultStatus::Failed);
    }

    #[test]
    fn test_run_status_mapping_never_yields_skipped() {
        assert_eq!(RunStatus::from_native("passed"), RunStatus::Passed);
        assert_eq!(RunStatus::from_native("failed"), RunStatus::Failed);
        assert_eq!(RunStatus::from_native("interrupted"), RunStatus::Failed);
        assert_eq!(RunStatus::from_native("timedout"), RunStatus::Failed);
        assert_eq!(RunStatus::from_native("skipped"), RunStatus::Failed);
        assert_eq!(RunStatus::from_native(""), RunStatus::Failed);
    }

    #[test]
    fn test_payload_serializes_camel_case() {
        let result = TestResultData {
            id: "test_1_a".into(),
            run_id: "run_1_b".into(),
            test_name: "login works".into(),
            file_name: "auth.spec.ts".into(),
            status: ResultStatus::TimedOut,
            duration: 30000,
            error: None,
            retry: 1,
            screenshots: vec!["shot.png".into()],
            videos: Vec::new(),
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["runId"], "run_1_b");
        assert_eq!(json["testName"], "login works");
        assert_eq!(json["status"], "timedOut");
        assert!(json.get("error").is_none());
    }
}
