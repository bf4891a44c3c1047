//! Shared library for the Crunchyroll metadata scraper.
//!
//! This crate provides common functionality used by the scraper:
//! - Configuration management
//! - Catalog and archive data models
//! - SQLite database and metadata repository
//! - File path utilities
//! - Logging infrastructure

pub mod config;
pub mod db;
pub mod logging;
pub mod models;
pub mod paths;
pub mod repository;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use logging::LogConfig;
pub use models::*;
pub use paths::DataPaths;
pub use repository::{ChangeSet, MetadataRepository, PendingWrite, RepositoryStats};

/// Common result type using anyhow::Error
pub type Result<T> = anyhow::Result<T>;
