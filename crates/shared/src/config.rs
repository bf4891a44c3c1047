//! Scraper configuration, read from a TOML file.
//!
//! Every section and field may be omitted; missing values take the defaults
//! below. Relative paths are resolved against `data.root_dir`.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound for `crunchyroll.max_retries`
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Environment variable that overrides `crunchyroll.access_token`
pub const ACCESS_TOKEN_ENV: &str = "CRUNCHYROLL_ACCESS_TOKEN";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub crunchyroll: CrunchyrollConfig,
    pub archive: ArchiveConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub root_dir: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            root_dir: "data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file holding cached metadata and archived records
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "crunchyroll.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_dir: String,
    /// trace, debug, info, warn or error
    pub default_level: String,
    pub console: bool,
    pub file: bool,
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: "logs".to_string(),
            default_level: "info".to_string(),
            console: true,
            file: true,
            json_format: false,
        }
    }
}

/// Catalog API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrunchyrollConfig {
    /// API host; also the website canonical page URLs are built on
    pub base_url: String,

    /// Locale for catalog requests and cached metadata, e.g. `en-US`
    pub language: String,

    /// Bearer token, obtained outside this tool
    pub access_token: Option<String>,

    pub rate_limit: RateLimitConfig,

    pub max_retries: u32,

    /// Base delay of the exponential retry backoff
    pub retry_delay_ms: u64,

    /// Cached metadata younger than this is not fetched again
    pub staleness_threshold_hours: u64,
}

impl Default for CrunchyrollConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.crunchyroll.com".to_string(),
            language: "en-US".to_string(),
            access_token: None,
            rate_limit: RateLimitConfig {
                requests_per_second: 2.0,
                requests_per_minute: 60,
            },
            max_retries: 3,
            retry_delay_ms: 1000,
            staleness_threshold_hours: 48,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_second: f64,
    pub requests_per_minute: u32,
}

/// Wayback Machine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// CDX search endpoint
    pub cdx_url: String,

    /// Prefix snapshots are served under
    pub web_url: String,

    /// Captures taken after this date are ignored
    pub cutoff_date: NaiveDate,

    pub avatar_cache_dir: String,

    pub rate_limit: RateLimitConfig,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            cdx_url: "https://web.archive.org/cdx/search/cdx".to_string(),
            web_url: "https://web.archive.org/web".to_string(),
            cutoff_date: NaiveDate::from_ymd_opt(2024, 7, 10).unwrap_or_default(),
            avatar_cache_dir: "avatars".to_string(),
            rate_limit: RateLimitConfig {
                requests_per_second: 1.0,
                requests_per_minute: 15,
            },
        }
    }
}

impl Config {
    /// Load and validate a configuration file.
    ///
    /// A missing file yields the defaults. [`ACCESS_TOKEN_ENV`], when set,
    /// replaces the configured token.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            tracing::warn!(path = %path.display(), "Config file not found, using defaults");
            Self::default()
        };

        if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
            if !token.trim().is_empty() {
                config.crunchyroll.access_token = Some(token.trim().to_string());
            }
        }

        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.crunchyroll.language.trim().is_empty() {
            bail!("crunchyroll.language must not be empty");
        }
        if self.crunchyroll.max_retries > MAX_RETRIES_LIMIT {
            bail!(
                "crunchyroll.max_retries must be at most {}, got {}",
                MAX_RETRIES_LIMIT,
                self.crunchyroll.max_retries
            );
        }
        for (name, url) in [
            ("crunchyroll.base_url", &self.crunchyroll.base_url),
            ("archive.cdx_url", &self.archive.cdx_url),
            ("archive.web_url", &self.archive.web_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                bail!("{} must be an http(s) URL, got '{}'", name, url);
            }
        }
        for (name, limits) in [
            ("crunchyroll.rate_limit", &self.crunchyroll.rate_limit),
            ("archive.rate_limit", &self.archive.rate_limit),
        ] {
            if limits.requests_per_second <= 0.0 || limits.requests_per_minute == 0 {
                bail!("{} must allow at least one request", name);
            }
        }
        Ok(())
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data.root_dir)
    }

    pub fn database_path(&self) -> PathBuf {
        self.resolve(&self.database.path)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.resolve(&self.logging.log_dir)
    }

    pub fn avatar_cache_dir(&self) -> PathBuf {
        self.resolve(&self.archive.avatar_cache_dir)
    }

    pub fn staleness_threshold(&self) -> Duration {
        Duration::from_secs(self.crunchyroll.staleness_threshold_hours * 3600)
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir().join(path)
        }
    }
}
