//! Wayback Machine CDX search client.

use super::{ArchiveSearch, Snapshot, SNAPSHOT_TIMESTAMP_FORMAT};
use crate::api::RateLimiter;
use crate::error::{Result, ScrapError};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use reqwest::Client;
use shared::config::ArchiveConfig;
use std::time::Duration;
use tracing::{debug, warn};

/// Columns requested from the CDX API, in order
const CDX_FIELDS: &str = "timestamp,mimetype,statuscode";

pub struct WaybackClient {
    client: Client,
    cdx_url: String,
    rate_limiter: RateLimiter,
}

impl WaybackClient {
    pub fn new(
        cdx_url: String,
        requests_per_second: f64,
        requests_per_minute: u32,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent("crunchyroll-scraper/0.1.0")
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            client,
            cdx_url,
            rate_limiter: RateLimiter::new(requests_per_second, requests_per_minute),
        })
    }

    /// Client for the `[archive]` endpoint and rate limits
    pub fn from_config(archive: &ArchiveConfig) -> anyhow::Result<Self> {
        Self::new(
            archive.cdx_url.clone(),
            archive.rate_limit.requests_per_second,
            archive.rate_limit.requests_per_minute,
        )
    }
}

#[async_trait]
impl ArchiveSearch for WaybackClient {
    async fn search(&self, url: &str, before: NaiveDate) -> Result<Vec<Snapshot>> {
        self.rate_limiter.acquire().await;

        let to = before.format("%Y%m%d").to_string();
        debug!(url = url, to = %to, "Searching archive snapshots");

        let response = self
            .client
            .get(&self.cdx_url)
            .query(&[("url", url), ("output", "json"), ("to", &to), ("fl", CDX_FIELDS)])
            .send()
            .await
            .map_err(|e| ScrapError::RequestFailed(format!("CDX search for {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = url, status = %status, "CDX search failed");
            return Err(ScrapError::RequestFailed(format!(
                "CDX search for {} returned {}",
                url, status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ScrapError::RequestFailed(format!("CDX search for {}: {}", url, e)))?;
        parse_cdx_body(&body)
    }
}

/// Decode a CDX JSON body; the first row is the header.
///
/// An empty body means no captures. Rows whose timestamp cannot be read are
/// skipped.
pub fn parse_cdx_body(body: &str) -> Result<Vec<Snapshot>> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let rows: Vec<Vec<String>> = serde_json::from_str(body)
        .map_err(|e| ScrapError::InvalidResponse(format!("CDX body: {}", e)))?;

    Ok(rows
        .into_iter()
        .skip(1)
        .filter_map(|row| parse_row(&row))
        .collect())
}

fn parse_row(row: &[String]) -> Option<Snapshot> {
    let timestamp = NaiveDateTime::parse_from_str(row.first()?, SNAPSHOT_TIMESTAMP_FORMAT).ok()?;
    Some(Snapshot {
        timestamp,
        mime_type: row.get(1).cloned().unwrap_or_default(),
        status_code: row.get(2).and_then(|s| s.parse().ok()),
    })
}
