//! Testwire -- test result collection service.
//!
//! This crate provides the write path (submission ingestion), the read
//! path (paginated run queries and derived analytics), the axum API tying
//! both together, and a polling dashboard client. The reporter that runs
//! inside a test process lives in the `testwire-reporter` crate.

pub mod api;
pub mod dashboard;
pub mod ingest;
pub mod model;
pub mod query;
pub mod storage;

use anyhow::Result;

/// Start the Testwire API server: ingestion and query endpoints plus the
/// health probe.
pub async fn serve(bind: &str, db_path: &str) -> Result<()> {
    tracing::info!(%db_path, "Initializing database");
    let pool = storage::open_pool(db_path)?;

    let state = api::state::AppState { pool };
    let app = api::router(state);

    let addr: std::net::SocketAddr = bind.parse()?;
    tracing::info!(%addr, "Testwire listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
