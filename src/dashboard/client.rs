//! HTTP client for the query API.
//!
//! Read-only: every method is a GET against the server, safe to repeat.
//! Failures are classified into a small taxonomy so the polling layer can
//! distinguish "server said no" from "network is down".

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::model::{Page, StoredRun};
use crate::query::analytics::Analytics;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        code: String,
        message: String,
    },
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Machine-readable code, mirroring the server's error envelope.
    pub fn code(&self) -> &str {
        match self {
            ClientError::Timeout => "TIMEOUT_ERROR",
            ClientError::Network(_) => "NETWORK_ERROR",
            ClientError::Http { code, .. } => code,
            ClientError::Decode(_) => "DECODE_ERROR",
        }
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

/// Body of the server's structured error envelope, when present.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<String>,
    code: Option<String>,
}

/// Health probe response.
#[derive(Debug, Clone, Deserialize)]
pub struct Health {
    pub status: String,
    pub timestamp: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct DashboardClient {
    http: Client,
    base_url: String,
}

impl DashboardClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn health(&self) -> Result<Health, ClientError> {
        self.get_json("/health").await
    }

    pub async fn runs(&self, page: i64, limit: i64) -> Result<Page<StoredRun>, ClientError> {
        self.get_json(&format!("/api/test-runs?page={page}&limit={limit}"))
            .await
    }

    pub async fn run(&self, id: &str) -> Result<StoredRun, ClientError> {
        self.get_json(&format!("/api/test-runs/{id}")).await
    }

    pub async fn analytics(&self) -> Result<Analytics, ClientError> {
        self.get_json("/api/analytics").await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let envelope = response.json::<ErrorEnvelope>().await.unwrap_or(ErrorEnvelope {
                error: None,
                code: None,
            });
            return Err(ClientError::Http {
                status: status.as_u16(),
                code: envelope
                    .code
                    .unwrap_or_else(|| format!("HTTP_{}", status.as_u16())),
                message: envelope
                    .error
                    .unwrap_or_else(|| format!("HTTP {} error", status.as_u16())),
            });
        }

        response.json::<T>().await.map_err(ClientError::from_reqwest)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
