//! contingent-common: Shared types, errors, and configuration used across all Contingent crates.

pub mod config;
pub mod error;
pub mod table;

// Re-export commonly used types
pub use config::{ContingentConfig, PollingConfig, QueryConfig, StatsConfig, TaskApiConfig};
pub use error::{ContingentError, Result};
pub use table::{Cell, ContingencyTable, TableLabels};
