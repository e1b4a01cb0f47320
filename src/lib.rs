//! Client for the Veeam Backup Enterprise Manager REST API.
//!
//! Logs in once, keeps the session token, and exposes read-only accessors
//! plus the persistently-failed-job check.

pub mod api;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod transport;

pub use api::{SummaryReport, VeeamClient};
pub use error::{Error, Result};
