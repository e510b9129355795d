//! Reporter configuration -- compiled-in defaults, TOML loading, and an
//! environment variable override for the config file path.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Configuration for one [`Reporter`](crate::Reporter) instance.
///
/// With `api_url` absent the reporter still collects results but skips the
/// submission at run end.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReporterConfig {
    /// Master switch: when false every reporter operation is a no-op.
    pub enabled: bool,
    /// Base URL of the collection service (e.g. `http://localhost:3001`).
    pub api_url: Option<String>,
    pub project_name: String,
    /// Timeout for the single submission request, in milliseconds.
    pub timeout_ms: u64,
    /// Branch name to stamp on the run, typically provided by CI.
    pub branch: Option<String>,
    /// Commit hash to stamp on the run, typically provided by CI.
    pub commit: Option<String>,
    /// Free-form metadata forwarded with the run as-is.
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url: None,
            project_name: "default".to_string(),
            timeout_ms: 10_000,
            branch: None,
            commit: None,
            metadata: None,
        }
    }
}

impl ReporterConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded reporter configuration");
        Ok(config)
    }

    /// Try to load configuration from, in order:
    /// 1. The path in the `TESTWIRE_REPORTER_CONFIG` environment variable.
    /// 2. `testwire-reporter.toml` in the working directory.
    /// 3. Fall back to compiled-in defaults.
    pub fn load_or_default() -> Self {
        if let Ok(env_path) = std::env::var("TESTWIRE_REPORTER_CONFIG") {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "TESTWIRE_REPORTER_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let local_path = Path::new("testwire-reporter.toml");
        if local_path.exists() {
            match Self::load(local_path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %local_path.display(),
                        error = %e,
                        "local config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
