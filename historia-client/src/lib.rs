//! Async client for the clinical-records backend: history listing, patient
//! lookup and concurrent draft loading with per-item failures and
//! cooperative cancellation.

pub mod client;
pub mod config;
pub mod error;
pub mod report;

pub use client::{BackendClient, FetchFailure, LoadReport};
pub use config::ClientConfig;
pub use error::ClientError;
pub use report::PatientReport;
pub use tokio_util::sync::CancellationToken;
