use anyhow::Result;
use clap::{Parser, Subcommand};

use testwire::dashboard;
use testwire::query::analytics::DateRange;
use testwire::query::{self, PageParams, RunFilters};

#[derive(Parser)]
#[command(
    name = "testwire",
    about = "Test result collection service with ingestion API and dashboard",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server (ingestion + query endpoints)
    Serve {
        /// Bind address
        #[arg(long, default_value = "0.0.0.0:3001")]
        bind: String,

        /// SQLite database path
        #[arg(long, default_value = "data/testwire.db")]
        db: String,
    },

    /// Inspect stored test runs
    Runs {
        #[command(subcommand)]
        action: RunsAction,
    },

    /// Print analytics for a trailing window
    Stats {
        /// SQLite database path
        #[arg(long, default_value = "data/testwire.db")]
        db: String,

        /// Window size in days
        #[arg(long, default_value = "30")]
        days: i64,
    },

    /// Poll a running server and render a live run table
    Dashboard {
        /// Base URL of the API server
        #[arg(long, default_value = "http://127.0.0.1:3001")]
        api_url: String,

        /// Poll interval in seconds
        #[arg(long, default_value = "10")]
        interval: u64,
    },
}

#[derive(Subcommand)]
enum RunsAction {
    /// List stored runs, newest first
    List {
        /// SQLite database path
        #[arg(long, default_value = "data/testwire.db")]
        db: String,

        /// Page number (1-indexed)
        #[arg(long, default_value = "1")]
        page: i64,

        /// Rows per page
        #[arg(long, default_value = "20")]
        limit: i64,

        /// Filter by run status (passed, failed, skipped)
        #[arg(long)]
        status: Option<String>,

        /// Filter by project name
        #[arg(long)]
        project: Option<String>,
    },

    /// Show one run with its results
    Show {
        /// Run id
        id: String,

        /// SQLite database path
        #[arg(long, default_value = "data/testwire.db")]
        db: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { bind, db } => {
            tracing::info!(%bind, "Starting Testwire server");
            testwire::serve(&bind, &db).await?;
        }
        Commands::Runs { action } => match action {
            RunsAction::List {
                db,
                page,
                limit,
                status,
                project,
            } => {
                let pool = testwire::storage::open_pool(&db)?;
                let status = status
                    .as_deref()
                    .map(str::parse)
                    .transpose()
                    .map_err(|e: String| anyhow::anyhow!(e))?;
                let filters = RunFilters {
                    status,
                    project_name: project,
                };
                let result = query::list_runs(&pool, &filters, PageParams { page, limit })?;

                if result.data.is_empty() {
                    println!("No runs found.");
                } else {
                    println!(
                        "{:<34} | {:<14} | {:<8} | {:>9} | Timestamp",
                        "Run", "Project", "Status", "Duration"
                    );
                    println!(
                        "{:-<34}-|-{:-<14}-|-{:-<8}-|-{:-<9}-|-{:-<24}",
                        "", "", "", "", ""
                    );
                    for run in &result.data {
                        println!(
                            "{:<34} | {:<14} | {:<8} | {:>7}ms | {}",
                            run.run.id,
                            run.run.project_name,
                            run.run.status,
                            run.run.duration,
                            run.run.timestamp.to_rfc3339()
                        );
                    }
                    println!(
                        "\npage {} of {} ({} runs total)",
                        result.page, result.total_pages, result.total
                    );
                }
            }
            RunsAction::Show { id, db } => {
                let pool = testwire::storage::open_pool(&db)?;
                match query::get_run(&pool, &id)? {
                    None => println!("Run '{}' not found.", id),
                    Some(run) => {
                        println!("Run:      {}", run.run.id);
                        println!("Project:  {}", run.run.project_name);
                        if let Some(branch) = &run.run.branch {
                            println!("Branch:   {}", branch);
                        }
                        if let Some(commit) = &run.run.commit {
                            println!("Commit:   {}", commit);
                        }
                        println!("Status:   {}", run.run.status);
                        println!("Duration: {}ms", run.run.duration);
                        println!("Started:  {}", run.run.timestamp.to_rfc3339());
                        println!();

                        if run.results.is_empty() {
                            println!("No results recorded.");
                        } else {
                            println!(
                                "{:<40} | {:<8} | {:>9} | {:>5} | Error",
                                "Test", "Status", "Duration", "Retry"
                            );
                            println!(
                                "{:-<40}-|-{:-<8}-|-{:-<9}-|-{:-<5}-|-{:-<30}",
                                "", "", "", "", ""
                            );
                            for res in &run.results {
                                println!(
                                    "{:<40} | {:<8} | {:>7}ms | {:>5} | {}",
                                    res.result.test_name,
                                    res.result.status,
                                    res.result.duration,
                                    res.result.retry,
                                    res.result.error.as_deref().unwrap_or("-")
                                );
                            }
                        }
                    }
                }
            }
        },
        Commands::Stats { db, days } => {
            let pool = testwire::storage::open_pool(&db)?;
            let analytics =
                testwire::query::analytics::compute(&pool, DateRange::last_days(days))?;

            println!("\nTestwire Analytics (last {} days)", days);
            println!("Total runs:       {}", analytics.total_runs);
            println!("Success rate:     {:.1}%", analytics.success_rate);
            println!("Average duration: {:.0}ms", analytics.average_duration);

            if !analytics.slowest_tests.is_empty() {
                println!("\nSlowest tests:");
                for test in &analytics.slowest_tests {
                    println!(
                        "  {:<40} {:>8.0}ms avg over {} run(s)",
                        test.test_name, test.average_duration, test.run_count
                    );
                }
            }
            if !analytics.flaky_tests.is_empty() {
                println!("\nFlaky tests:");
                for test in &analytics.flaky_tests {
                    println!(
                        "  {:<40} {:>5.1}% failure rate, {} retries",
                        test.test_name, test.failure_rate, test.retry_count
                    );
                }
            }
            println!();
        }
        Commands::Dashboard { api_url, interval } => {
            tracing::info!(%api_url, interval, "Starting dashboard");
            dashboard::run(&api_url, std::time::Duration::from_secs(interval)).await?;
        }
    }

    Ok(())
}
