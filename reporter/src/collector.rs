//! The collector -- translates test lifecycle events into run/result
//! records and delivers exactly one submission per run.
//!
//! Per-test handling is synchronous and does no I/O; the only network
//! call happens once, at run end. Test-end events may arrive concurrently
//! from parallel test workers, so the result buffer is mutex-protected.
//! Ordering across workers is not significant: results are keyed by id.

use std::sync::Mutex;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ReporterConfig;
use crate::events::{Attachment, RunOutcome, TestCase, TestOutcome};
use crate::model::{ResultStatus, RunStatus, Submission, TestResultData, TestRunData};
use crate::submit;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Collecting,
    Done,
}

#[derive(Debug, Clone, Copy)]
struct StartMark {
    instant: Instant,
    wall: DateTime<Utc>,
}

pub struct Reporter {
    config: ReporterConfig,
    run_id: String,
    phase: Mutex<Phase>,
    started: Mutex<Option<StartMark>>,
    results: Mutex<Vec<TestResultData>>,
}

impl Reporter {
    /// Create a reporter for one run. The run id is fixed here and reused
    /// for every result.
    pub fn new(config: ReporterConfig) -> Self {
        Self {
            config,
            run_id: generate_id("run"),
            phase: Mutex::new(Phase::Idle),
            started: Mutex::new(None),
            results: Mutex::new(Vec::new()),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Handle the run-begin event: fix the start time and enter the
    /// collecting phase. No side effects beyond internal state.
    pub fn on_run_begin(&self) {
        if !self.config.enabled {
            return;
        }

        *self.phase.lock().unwrap() = Phase::Collecting;
        *self.started.lock().unwrap() = Some(StartMark {
            instant: Instant::now(),
            wall: Utc::now(),
        });

        info!(
            run_id = %self.run_id,
            api_url = self.config.api_url.as_deref().unwrap_or("disabled"),
            "starting test run"
        );
    }

    /// Handle a test-end event: map the native status fail-closed, capture
    /// duration, retries, error text, and attachments, and append the
    /// result. Must never block or fail the test run.
    pub fn on_test_end(&self, test: &TestCase, outcome: &TestOutcome) {
        if !self.config.enabled {
            return;
        }
        if *self.phase.lock().unwrap() == Phase::Done {
            debug!(run_id = %self.run_id, test = %test.title, "test-end after run end, ignoring");
            return;
        }

        // Error text is captured only when the framework reported a
        // non-empty message; the field is omitted rather than stored empty.
        let error = outcome
            .error
            .as_deref()
            .filter(|msg| !msg.is_empty())
            .map(String::from);

        let result = TestResultData {
            id: generate_id("test"),
            run_id: self.run_id.clone(),
            test_name: test.title.clone(),
            file_name: test.file.clone(),
            status: ResultStatus::from_native(&outcome.status),
            duration: outcome.duration,
            error,
            retry: outcome.retry,
            screenshots: attachment_paths(&outcome.attachments, "screenshot"),
            videos: attachment_paths(&outcome.attachments, "video"),
        };

        self.results.lock().unwrap().push(result);
    }

    /// Handle the run-end event and attempt the single submission.
    ///
    /// Always returns normally: a submission failure (timeout, network
    /// error, non-2xx response) is logged and dropped, never retried, and
    /// never surfaced to the test run.
    pub async fn on_run_end(&self, outcome: &RunOutcome) {
        if !self.config.enabled {
            return;
        }
        {
            let mut phase = self.phase.lock().unwrap();
            if *phase == Phase::Done {
                return;
            }
            *phase = Phase::Done;
        }

        let (duration, timestamp) = match *self.started.lock().unwrap() {
            Some(mark) => (mark.instant.elapsed().as_millis() as i64, mark.wall),
            // Run-end without run-begin: report a zero-length run rather
            // than dropping the collected results.
            None => (0, Utc::now()),
        };

        let results = std::mem::take(&mut *self.results.lock().unwrap());
        let run = TestRunData {
            id: self.run_id.clone(),
            project_name: self.config.project_name.clone(),
            branch: self.config.branch.clone(),
            commit: self.config.commit.clone(),
            timestamp,
            status: RunStatus::from_native(&outcome.status),
            duration,
            metadata: self.config.metadata.clone(),
        };

        info!(
            run_id = %self.run_id,
            status = %outcome.status,
            tests = results.len(),
            duration_ms = duration,
            "test run completed"
        );

        let Some(api_url) = self.config.api_url.as_deref() else {
            info!("api url not configured, results not sent");
            return;
        };

        let submission = Submission { run, results };
        match submit::post_submission(api_url, self.config.timeout_ms, &submission).await {
            Ok(()) => debug!(run_id = %self.run_id, "results sent"),
            Err(e) => warn!(run_id = %self.run_id, error = %e, "failed to send results"),
        }
    }
}

fn attachment_paths(attachments: &[Attachment], kind: &str) -> Vec<String> {
    attachments
        .iter()
        .filter(|a| a.name == kind)
        .map(|a| a.path.clone().unwrap_or_default())
        .collect()
}

/// `{prefix}_{epoch-ms}_{8 random hex chars}`
fn generate_id(prefix: &str) -> String {
    let epoch_ms = Utc::now().timestamp_millis();
    let hex = Uuid::new_v4().simple().to_string();
    format!("{prefix}_{epoch_ms}_{}", &hex[..8])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn passing_outcome() -> TestOutcome {
        TestOutcome {
            status: "passed".into(),
            duration: 120,
            retry: 0,
            error: None,
            attachments: Vec::new(),
        }
    }

    fn test_case(title: &str) -> TestCase {
        TestCase {
            title: title.into(),
            file: "suite.spec.ts".into(),
        }
    }

    fn collecting_reporter(config: ReporterConfig) -> Reporter {
        let reporter = Reporter::new(config);
        reporter.on_run_begin();
        reporter
    }

    #[test]
    fn test_generated_ids_have_the_expected_shape() {
        let id = generate_id("run");
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "run");
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));

        // Two ids never collide.
        assert_ne!(generate_id("run"), generate_id("run"));
    }

    #[test]
    fn test_disabled_reporter_collects_nothing() {
        let reporter = collecting_reporter(ReporterConfig {
            enabled: false,
            ..Default::default()
        });
        reporter.on_test_end(&test_case("a"), &passing_outcome());
        assert!(reporter.results.lock().unwrap().is_empty());
    }

    #[test]
    fn test_results_carry_run_id_and_mapped_status() {
        let reporter = collecting_reporter(ReporterConfig::default());

        let mut outcome = passing_outcome();
        outcome.status = "interrupted".into();
        reporter.on_test_end(&test_case("a"), &outcome);

        let results = reporter.results.lock().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].run_id, reporter.run_id());
        assert_eq!(results[0].status, ResultStatus::Failed);
    }

    #[test]
    fn test_empty_error_message_is_omitted() {
        let reporter = collecting_reporter(ReporterConfig::default());

        let mut with_empty = passing_outcome();
        with_empty.status = "failed".into();
        with_empty.error = Some(String::new());
        reporter.on_test_end(&test_case("a"), &with_empty);

        let mut with_message = passing_outcome();
        with_message.status = "failed".into();
        with_message.error = Some("boom".into());
        reporter.on_test_end(&test_case("b"), &with_message);

        let results = reporter.results.lock().unwrap();
        assert!(results[0].error.is_none());
        assert_eq!(results[1].error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_attachments_partition_preserving_order() {
        let reporter = collecting_reporter(ReporterConfig::default());

        let mut outcome = passing_outcome();
        outcome.attachments = vec![
            Attachment::screenshot("one.png"),
            Attachment::video("run.webm"),
            Attachment {
                name: "trace".into(),
                path: Some("trace.zip".into()),
            },
            Attachment::screenshot("two.png"),
        ];
        reporter.on_test_end(&test_case("a"), &outcome);

        let results = reporter.results.lock().unwrap();
        assert_eq!(results[0].screenshots, vec!["one.png", "two.png"]);
        assert_eq!(results[0].videos, vec!["run.webm"]);
    }

    #[test]
    fn test_concurrent_test_end_events_all_land() {
        let reporter = std::sync::Arc::new(collecting_reporter(ReporterConfig::default()));

        let mut handles = Vec::new();
        for worker in 0..8 {
            let reporter = reporter.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..25 {
                    reporter.on_test_end(
                        &test_case(&format!("worker {worker} case {i}")),
                        &passing_outcome(),
                    );
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let results = reporter.results.lock().unwrap();
        assert_eq!(results.len(), 200);

        // No duplicates: every result got a distinct id.
        let ids: std::collections::HashSet<&str> =
            results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids.len(), 200);
    }

    #[tokio::test]
    async fn test_run_end_without_api_url_is_a_local_no_op() {
        let reporter = collecting_reporter(ReporterConfig::default());
        reporter.on_test_end(&test_case("a"), &passing_outcome());

        reporter
            .on_run_end(&RunOutcome {
                status: "passed".into(),
            })
            .await;

        // Terminal: later events are ignored.
        reporter.on_test_end(&test_case("late"), &passing_outcome());
        assert!(reporter.results.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_end_swallows_submission_failure() {
        // Bind then drop a listener so the submission target refuses.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let reporter = collecting_reporter(ReporterConfig {
            api_url: Some(format!("http://{addr}")),
            timeout_ms: 500,
            ..Default::default()
        });
        reporter.on_test_end(&test_case("a"), &passing_outcome());

        // Must complete without panicking or returning an error.
        reporter
            .on_run_end(&RunOutcome {
                status: "failed".into(),
            })
            .await;
    }

    #[tokio::test]
    async fn test_second_run_end_is_ignored() {
        let reporter = collecting_reporter(ReporterConfig::default());
        let outcome = RunOutcome {
            status: "passed".into(),
        };
        reporter.on_run_end(&outcome).await;
        reporter.on_run_end(&outcome).await; // terminal state, no-op
    }
}
