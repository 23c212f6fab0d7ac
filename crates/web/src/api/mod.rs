//! REST API endpoint modules.

pub mod authenticate;
pub mod config;
pub mod error_report;
pub mod status;
