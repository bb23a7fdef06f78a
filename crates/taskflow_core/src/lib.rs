//! Core domain logic for TaskFlow.
//! This crate is the single source of truth for business invariants.

pub mod agent;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod policy;
pub mod repo;
pub mod resolver;
pub mod search;
pub mod service;

pub use agent::{DispatchOutcome, DispatchResponse, Dispatcher};
pub use config::{ConfigError, Settings};
pub use db::{open_db, open_db_in_memory, DbError};
pub use error::ErrorKind;
pub use logging::{default_log_level, init_from_settings, init_logging, logging_status};
pub use model::tenant::{Identity, Role};
pub use repo::{DomainStore, RepoError, RepoResult, SqliteStore};
pub use resolver::EntityResolver;
pub use service::{ServiceError, ServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
