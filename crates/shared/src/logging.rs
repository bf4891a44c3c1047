//! Logging setup: console output plus a daily-rotated log file.
//!
//! `RUST_LOG` takes precedence over the configured level.

use crate::config::Config;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Crates whose events pass the filter at the configured level
const OWN_TARGETS: &[&str] = &["shared", "crunchyroll_scraper"];

/// HTTP stack crates, kept at warn to avoid per-request noise
const QUIET_TARGETS: &[&str] = &["hyper", "reqwest", "h2", "rustls"];

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub log_dir: String,
    /// Log file prefix, also enabled as a filter target
    pub component: String,
    pub default_level: Level,
    pub console: bool,
    pub file: bool,
    /// Write the file log as JSON lines
    pub json_format: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: "data/logs".to_string(),
            component: "crunchyroll-scraper".to_string(),
            default_level: Level::INFO,
            console: true,
            file: true,
            json_format: false,
        }
    }
}

impl LogConfig {
    /// Settings from the `[logging]` section; `verbose` forces DEBUG
    pub fn from_config(config: &Config, component: &str, verbose: bool) -> Self {
        let default_level = if verbose {
            Level::DEBUG
        } else {
            parse_level(&config.logging.default_level)
        };

        Self {
            log_dir: config.log_dir().to_string_lossy().to_string(),
            component: component.to_string(),
            default_level,
            console: config.logging.console,
            file: config.logging.file,
            json_format: config.logging.json_format,
        }
    }

    /// Filter directives used when `RUST_LOG` is unset
    pub fn filter_directives(&self) -> String {
        let component = self.component.replace('-', "_");
        let mut targets: Vec<&str> = vec![&component];
        targets.extend(OWN_TARGETS.iter().filter(|t| **t != component));

        targets
            .iter()
            .map(|t| format!("{}={}", t, self.default_level))
            .chain(QUIET_TARGETS.iter().map(|t| format!("{}=warn", t)))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Install the global subscriber
pub fn init(config: LogConfig) -> Result<()> {
    let log_dir = Path::new(&config.log_dir);
    if config.file {
        std::fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory: {}", config.log_dir))?;
    }

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directives()));

    let mut layers: Vec<BoxedLayer> = Vec::new();
    if config.console {
        layers.push(
            fmt::layer()
                .with_target(true)
                .with_span_events(FmtSpan::NONE)
                .with_writer(std::io::stdout)
                .boxed(),
        );
    }
    if config.file {
        layers.push(file_layer(log_dir, &config));
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    tracing::info!(
        component = %config.component,
        log_dir = %config.log_dir,
        level = %config.default_level,
        "Logging initialized"
    );
    Ok(())
}

fn file_layer(log_dir: &Path, config: &LogConfig) -> BoxedLayer {
    let appender = tracing_appender::rolling::daily(log_dir, &config.component);

    if config.json_format {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_writer(appender)
            .boxed()
    } else {
        fmt::layer()
            .with_ansi(false)
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(appender)
            .boxed()
    }
}

/// Parse a configured level name, falling back to INFO
pub fn parse_level(level: &str) -> Level {
    level.parse().unwrap_or(Level::INFO)
}
