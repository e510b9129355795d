//! Stale-while-revalidate polling over the query API.
//!
//! Each widget (run table, analytics) keeps a [`Snapshot`] of its last
//! successfully fetched data. A failed poll marks the snapshot stale but
//! never discards it, so the dashboard keeps rendering the previous view
//! while the connection recovers.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::client::{DashboardClient, Health};
use super::retry::{RetryPolicy, RetryState};
use crate::model::{Page, StoredRun};
use crate::query::analytics::Analytics;

/// How many runs a dashboard poll pulls per cycle.
const RUNS_PER_POLL: i64 = 20;

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Last-known-good view of one widget's data.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    pub data: Option<T>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub stale: bool,
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self {
            data: None,
            fetched_at: None,
            stale: false,
        }
    }
}

impl<T> Snapshot<T> {
    pub fn record(&mut self, value: T) {
        self.data = Some(value);
        self.fetched_at = Some(Utc::now());
        self.stale = false;
    }

    /// Keep the current data but flag it as outdated.
    pub fn mark_stale(&mut self) {
        if self.data.is_some() {
            self.stale = true;
        }
    }
}

// ---------------------------------------------------------------------------
// Connection state
// ---------------------------------------------------------------------------

/// Whether the health probe is currently reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected { last_seen: DateTime<Utc> },
    Disconnected { retry: RetryState },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected { .. })
    }
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

pub struct DashboardPoller {
    client: DashboardClient,
    policy: RetryPolicy,
    pub connection: ConnectionState,
    pub runs: Snapshot<Page<StoredRun>>,
    pub analytics: Snapshot<Analytics>,
}

impl DashboardPoller {
    pub fn new(client: DashboardClient) -> Self {
        Self::with_policy(client, RetryPolicy::default())
    }

    pub fn with_policy(client: DashboardClient, policy: RetryPolicy) -> Self {
        Self {
            client,
            policy,
            connection: ConnectionState::Disconnected {
                retry: RetryState::Idle,
            },
            runs: Snapshot::default(),
            analytics: Snapshot::default(),
        }
    }

    /// One poll cycle: health probe first, then each widget fetch in
    /// isolation. A failing widget marks only its own snapshot stale.
    pub async fn tick(&mut self) {
        match self.client.health().await {
            Ok(Health { status, .. }) => {
                debug!(%status, "health probe ok");
                self.connection = ConnectionState::Connected {
                    last_seen: Utc::now(),
                };
            }
            Err(err) => {
                warn!(error = %err, code = err.code(), "health probe failed");
                let retry = match self.connection {
                    ConnectionState::Disconnected { retry } => retry,
                    ConnectionState::Connected { .. } => RetryState::Idle,
                };
                self.connection = ConnectionState::Disconnected {
                    retry: retry.on_failure(&self.policy),
                };
                // Nothing else is worth fetching while the server is gone;
                // keep whatever was rendered before.
                self.runs.mark_stale();
                self.analytics.mark_stale();
                return;
            }
        }

        match self.client.runs(1, RUNS_PER_POLL).await {
            Ok(page) => self.runs.record(page),
            Err(err) => {
                warn!(error = %err, code = err.code(), "run listing fetch failed");
                self.runs.mark_stale();
            }
        }

        match self.client.analytics().await {
            Ok(data) => self.analytics.record(data),
            Err(err) => {
                warn!(error = %err, code = err.code(), "analytics fetch failed");
                self.analytics.mark_stale();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_keeps_data_when_marked_stale() {
        let mut snap: Snapshot<i32> = Snapshot::default();

        // Stale on an empty snapshot is a no-op.
        snap.mark_stale();
        assert!(!snap.stale);

        snap.record(42);
        assert!(!snap.stale);
        assert_eq!(snap.data, Some(42));

        snap.mark_stale();
        assert!(snap.stale);
        assert_eq!(snap.data, Some(42), "stale data must survive");

        snap.record(43);
        assert!(!snap.stale);
        assert_eq!(snap.data, Some(43));
    }

    #[test]
    fn test_connection_state_flags() {
        let connected = ConnectionState::Connected {
            last_seen: Utc::now(),
        };
        assert!(connected.is_connected());

        let disconnected = ConnectionState::Disconnected {
            retry: RetryState::Retrying { attempt: 2 },
        };
        assert!(!disconnected.is_connected());
    }

    #[tokio::test]
    async fn test_tick_against_dead_server_accumulates_retries() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = DashboardClient::with_timeout(
            format!("http://{addr}"),
            std::time::Duration::from_millis(500),
        );
        let mut poller = DashboardPoller::new(client);

        poller.tick().await;
        assert_eq!(
            poller.connection,
            ConnectionState::Disconnected {
                retry: RetryState::Retrying { attempt: 1 }
            }
        );

        poller.tick().await;
        assert_eq!(
            poller.connection,
            ConnectionState::Disconnected {
                retry: RetryState::Retrying { attempt: 2 }
            }
        );

        // No data was ever fetched, so nothing is marked stale.
        assert!(poller.runs.data.is_none());
        assert!(!poller.runs.stale);
    }
}
