//! File path utilities for organizing data files.
//!
//! This module provides a centralized way to manage the data directory
//! layout and cache file names.

use std::path::{Path, PathBuf};

/// File path manager for data files
#[derive(Debug, Clone)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    /// Create a new DataPaths with the given root directory
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Get the root data directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get logs directory
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Create all necessary directories
    pub fn create_dirs(&self) -> std::io::Result<()> {
        for dir in [self.root.clone(), self.logs_dir()] {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(())
    }

    /// Flatten a URI into a filesystem-safe file name
    ///
    /// Keeps the last path segment readable and prefixes the host so avatars
    /// from different CDNs with the same name do not collide.
    pub fn uri_to_filename(uri: &str) -> String {
        let without_scheme = uri.split_once("://").map(|(_, rest)| rest).unwrap_or(uri);
        let without_query = without_scheme.split(['?', '#']).next().unwrap_or_default();

        without_query
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect::<String>()
            .trim_matches('_')
            .to_string()
    }
}
