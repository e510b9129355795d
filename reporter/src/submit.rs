//! One-shot submission of the batched payload.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::debug;

use crate::model::Submission;

/// POST the submission to `{api_url}/api/test-runs` with a bounded
/// timeout. Called at most once per run; the caller decides what to do
/// with a failure (in practice: log and drop).
pub(crate) async fn post_submission(
    api_url: &str,
    timeout_ms: u64,
    submission: &Submission,
) -> Result<()> {
    let url = format!("{}/api/test-runs", api_url.trim_end_matches('/'));
    debug!(%url, results = submission.results.len(), "sending results");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .build()
        .context("failed to build HTTP client")?;

    let response = client
        .post(&url)
        .json(submission)
        .send()
        .await
        .context("failed to reach results endpoint")?;

    let status = response.status();
    if !status.is_success() {
        bail!("results endpoint returned {status}");
    }

    Ok(())
}
