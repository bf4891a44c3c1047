//! Catalog API client with rate limiting and retry logic.

use super::rate_limiter::RateLimiter;
use super::types::*;
use crate::catalog::{CatalogClient, RemoteEpisode, RemoteSeason, SeriesDetail};
use crate::error::{Result, ScrapError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Longest wait between two attempts
const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Catalog CMS API client
pub struct CrunchyrollClient {
    /// HTTP client
    client: Client,
    /// Base URL for the catalog API
    base_url: String,
    /// Bearer token, if the session layer provided one
    access_token: Option<String>,
    /// Rate limiter
    rate_limiter: RateLimiter,
    /// Maximum retries for failed requests
    max_retries: u32,
    /// Base delay for retry (exponential backoff)
    retry_delay_ms: u64,
}

impl CrunchyrollClient {
    /// Create a new catalog client
    pub fn new(
        base_url: String,
        access_token: Option<String>,
        requests_per_second: f64,
        requests_per_minute: u32,
        max_retries: u32,
        retry_delay_ms: u64,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("crunchyroll-scraper/0.1.0")
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
            rate_limiter: RateLimiter::new(requests_per_second, requests_per_minute),
            max_retries,
            retry_delay_ms,
        })
    }

    fn backoff(&self, attempt: u32) -> Duration {
        backoff_delay(self.retry_delay_ms, attempt)
    }

    /// Make a GET request with rate limiting and retry logic
    ///
    /// Transport errors, 429 and 5xx are retried with exponential backoff.
    /// 404 maps to [`ScrapError::NotFound`], an undecodable body to
    /// [`ScrapError::InvalidResponse`], anything else to
    /// [`ScrapError::RequestFailed`].
    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, endpoint);

        for attempt in 0..=self.max_retries {
            self.rate_limiter.acquire().await;

            debug!(url = %url, attempt = attempt + 1, "Making API request");

            let mut request = self.client.get(&url).query(query);
            if let Some(token) = &self.access_token {
                request = request.bearer_auth(token);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return match response.json::<T>().await {
                            Ok(data) => {
                                debug!(url = %url, "Request successful");
                                Ok(data)
                            }
                            Err(e) => {
                                warn!(url = %url, error = %e, "Failed to parse response");
                                Err(ScrapError::InvalidResponse(format!(
                                    "{}: {}",
                                    endpoint, e
                                )))
                            }
                        };
                    }

                    if status == StatusCode::NOT_FOUND {
                        return Err(ScrapError::NotFound(endpoint.to_string()));
                    }

                    let retryable =
                        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
                    let error_text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());

                    warn!(
                        url = %url,
                        status = %status,
                        error = %error_text,
                        "Request failed"
                    );

                    if retryable && attempt < self.max_retries {
                        let delay = self.backoff(attempt);
                        debug!(delay_ms = delay.as_millis(), "Retrying after delay");
                        sleep(delay).await;
                        continue;
                    }

                    return Err(ScrapError::RequestFailed(format!(
                        "{} returned {}: {}",
                        endpoint, status, error_text
                    )));
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Request error");

                    if attempt < self.max_retries {
                        let delay = self.backoff(attempt);
                        debug!(delay_ms = delay.as_millis(), "Retrying after delay");
                        sleep(delay).await;
                        continue;
                    }

                    return Err(ScrapError::RequestFailed(format!(
                        "{} failed after {} retries: {}",
                        endpoint, self.max_retries, e
                    )));
                }
            }
        }

        Err(ScrapError::RequestFailed(format!(
            "{} failed after all retries",
            endpoint
        )))
    }

    /// Get current rate limit statistics
    pub async fn requests_last_minute(&self) -> usize {
        self.rate_limiter.current_minute_count().await
    }
}

/// `base_ms * 2^attempt`, capped at [`MAX_BACKOFF`]
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor)).min(MAX_BACKOFF)
}

#[async_trait]
impl CatalogClient for CrunchyrollClient {
    async fn get_seasons(&self, series_id: &str, language: &str) -> Result<Vec<RemoteSeason>> {
        info!(series_id = series_id, "Fetching seasons");
        let response: DataResponse<SeasonItem> = self
            .get(
                &format!("/content/v2/cms/series/{}/seasons", series_id),
                &[("locale", language)],
            )
            .await?;
        Ok(response.data.into_iter().map(RemoteSeason::from).collect())
    }

    async fn get_episodes(&self, season_id: &str, language: &str) -> Result<Vec<RemoteEpisode>> {
        info!(season_id = season_id, "Fetching episodes");
        let response: DataResponse<EpisodeItem> = self
            .get(
                &format!("/content/v2/cms/seasons/{}/episodes", season_id),
                &[("locale", language)],
            )
            .await?;
        Ok(response.data.into_iter().map(RemoteEpisode::from).collect())
    }

    async fn get_episode(&self, episode_id: &str, language: &str) -> Result<RemoteEpisode> {
        debug!(episode_id = episode_id, "Fetching episode");
        let response: DataResponse<ObjectItem> = self
            .get(
                &format!("/content/v2/cms/objects/{}", episode_id),
                &[("locale", language)],
            )
            .await?;

        response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| ScrapError::NotFound(format!("episode {}", episode_id)))?
            .into_episode()
            .ok_or_else(|| {
                ScrapError::InvalidResponse(format!("object {} is not an episode", episode_id))
            })
    }

    async fn get_series_detail(&self, series_id: &str, language: &str) -> Result<SeriesDetail> {
        debug!(series_id = series_id, "Fetching series detail");
        let response: DataResponse<SeriesItem> = self
            .get(
                &format!("/content/v2/cms/series/{}", series_id),
                &[("locale", language)],
            )
            .await?;

        response
            .data
            .into_iter()
            .next()
            .map(SeriesDetail::from)
            .ok_or_else(|| ScrapError::NotFound(format!("series {}", series_id)))
    }

    async fn get_rating(&self, series_id: &str) -> Result<f32> {
        debug!(series_id = series_id, "Fetching rating");
        let response: RatingResponse = self
            .get(&format!("/content-reviews/v2/rating/series/{}", series_id), &[])
            .await?;

        response.average.trim().parse::<f32>().map_err(|e| {
            ScrapError::InvalidResponse(format!("rating '{}': {}", response.average, e))
        })
    }

    async fn search_series_id(&self, name: &str, language: &str) -> Result<Option<String>> {
        info!(name = name, "Searching series");
        let response: DataResponse<SearchBucket> = self
            .get(
                "/content/v2/discover/search",
                &[("q", name), ("n", "6"), ("type", "series"), ("locale", language)],
            )
            .await?;

        Ok(response
            .data
            .into_iter()
            .filter(|bucket| bucket.bucket_type == "series")
            .flat_map(|bucket| bucket.items)
            .find(|item| item.title.trim().eq_ignore_ascii_case(name.trim()))
            .map(|item| item.id))
    }
}
