//! File cache for reviewer and commenter avatars.
//!
//! Each avatar is downloaded once and kept under a filename derived from its
//! URI; later requests for the same URI are answered from disk.

use crate::archive::AvatarCache;
use crate::error::{Result, ScrapError};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use shared::DataPaths;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub struct FileAvatarCache {
    client: Client,
    cache_dir: PathBuf,
}

impl FileAvatarCache {
    pub fn new(cache_dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let cache_dir = cache_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&cache_dir)
            .with_context(|| format!("Failed to create avatar directory: {}", cache_dir.display()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("crunchyroll-scraper/0.1.0")
            .build()
            .context("Failed to create HTTP client")?;

        info!(cache_dir = %cache_dir.display(), "Avatar cache initialized");
        Ok(Self { client, cache_dir })
    }

    /// Local path an avatar URI is stored under
    pub fn cache_path(&self, uri: &str) -> PathBuf {
        self.cache_dir.join(DataPaths::uri_to_filename(uri))
    }

    pub fn exists(&self, uri: &str) -> bool {
        self.cache_path(uri).is_file()
    }

    pub fn stats(&self) -> anyhow::Result<CacheStats> {
        let mut stats = CacheStats::default();
        if !self.cache_dir.exists() {
            return Ok(stats);
        }

        for entry in std::fs::read_dir(&self.cache_dir)? {
            let entry = entry?;
            if entry.path().is_file() {
                stats.total_files += 1;
                stats.total_size_bytes += entry.metadata()?.len();
            }
        }
        Ok(stats)
    }

    async fn download(&self, uri: &str, path: &Path) -> Result<()> {
        let response = self
            .client
            .get(uri)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ScrapError::RequestFailed(format!("avatar {}: {}", uri, e)))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ScrapError::RequestFailed(format!("avatar {}: {}", uri, e)))?;

        tokio::fs::write(path, &bytes)
            .await
            .with_context(|| format!("Failed to write avatar: {}", path.display()))
            .map_err(ScrapError::Persistence)?;

        debug!(uri = uri, path = %path.display(), bytes = bytes.len(), "Avatar cached");
        Ok(())
    }
}

#[async_trait]
impl AvatarCache for FileAvatarCache {
    async fn cache_if_absent(&self, uri: &str) -> Result<String> {
        let path = self.cache_path(uri);
        if !path.is_file() {
            self.download(uri, &path).await?;
        }
        Ok(path.display().to_string())
    }
}

#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub total_files: usize,
    pub total_size_bytes: u64,
}
