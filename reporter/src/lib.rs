//! Testwire reporter -- collects test outcomes inside a test-run process
//! and submits them as one batched payload at run end.
//!
//! Reporting is strictly best-effort: the single submission has a bounded
//! timeout, is never retried, and any failure is logged and swallowed so
//! the test run's own exit status is unaffected by reporting-pipeline
//! availability.

pub mod collector;
pub mod config;
pub mod events;
pub mod model;
mod submit;

pub use collector::Reporter;
pub use config::ReporterConfig;
