//! Dashboard client -- polling read-side consumer of the query API.
//!
//! The dashboard holds no durable state of its own: it polls the query
//! endpoints on an interval, renders tables, and tolerates partial or
//! failing responses without losing previously rendered data.

pub mod client;
pub mod poller;
pub mod retry;

pub use client::{ClientError, DashboardClient};
pub use poller::{ConnectionState, DashboardPoller, Snapshot};
pub use retry::{RetryPolicy, RetryState};

use std::time::Duration;

use anyhow::Result;

/// Run the terminal dashboard loop: poll, render, sleep.
pub async fn run(api_url: &str, interval: Duration) -> Result<()> {
    let mut poller = DashboardPoller::new(DashboardClient::new(api_url));

    loop {
        poller.tick().await;
        render(&poller);
        tokio::time::sleep(interval).await;
    }
}

fn render(poller: &DashboardPoller) {
    println!();
    match poller.connection {
        ConnectionState::Connected { last_seen } => {
            println!("Connection: connected (last seen {})", last_seen.to_rfc3339());
        }
        ConnectionState::Disconnected { retry } => match retry {
            RetryState::Exhausted => {
                println!("Connection: disconnected (retries exhausted)");
            }
            RetryState::Retrying { attempt } => {
                println!("Connection: disconnected (attempt {})", attempt);
            }
            _ => println!("Connection: disconnected"),
        },
    }

    match &poller.runs.data {
        None => println!("No run data yet."),
        Some(page) => {
            if poller.runs.stale {
                println!("(showing stale data)");
            }
            println!(
                "{:<34} | {:<14} | {:<8} | {:>9} | Tests",
                "Run", "Project", "Status", "Duration"
            );
            println!(
                "{:-<34}-|-{:-<14}-|-{:-<8}-|-{:-<9}-|-{:-<6}",
                "", "", "", "", ""
            );
            for run in &page.data {
                println!(
                    "{:<34} | {:<14} | {:<8} | {:>7}ms | {}",
                    run.run.id,
                    run.run.project_name,
                    run.run.status,
                    run.run.duration,
                    run.results.len()
                );
            }
            println!("{} runs total", page.total);
        }
    }

    // Analytics render in isolation: a failing analytics fetch never
    // blanks the run table above.
    if let Some(analytics) = &poller.analytics.data {
        let marker = if poller.analytics.stale { " (stale)" } else { "" };
        println!(
            "Success rate: {:.1}%  |  Avg duration: {:.0}ms  |  Runs: {}{}",
            analytics.success_rate, analytics.average_duration, analytics.total_runs, marker
        );
    }
}
