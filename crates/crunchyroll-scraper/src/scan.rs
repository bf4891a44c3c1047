//! Library scan: resolves, syncs and enriches the items a media host holds.
//!
//! One item failing never stops the scan; failures are logged and counted.

use crate::archive::ArchiveRetriever;
use crate::error::{Result, ScrapError};
use crate::resolver::{lookup, names, IdResolver};
use crate::store::MetadataStore;
use crate::sync::SyncEngine;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::ops::AddAssign;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const SERIES_ID_KEY: &str = "CrunchyrollSeriesId";
pub const SEASON_ID_KEY: &str = "CrunchyrollSeasonId";
pub const EPISODE_ID_KEY: &str = "CrunchyrollEpisodeId";

/// Item as held by the media host
#[derive(Debug, Clone, Default)]
pub struct ScanItem {
    /// Folder or file name
    pub name: String,
    pub path: String,
    pub index_number: Option<i32>,
    pub provider_ids: HashMap<String, String>,
}

impl ScanItem {
    pub fn new(name: &str, path: &str, index_number: Option<i32>) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            index_number,
            provider_ids: HashMap::new(),
        }
    }

    pub fn provider_id(&self, key: &str) -> Option<&str> {
        self.provider_ids.get(key).map(String::as_str)
    }

    /// Record an id; returns whether the stored value changed
    pub fn set_provider_id(&mut self, key: &str, id: &str) -> bool {
        if self.provider_id(key) == Some(id) {
            return false;
        }
        self.provider_ids.insert(key.to_string(), id.to_string());
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct SeasonNode {
    pub season: ScanItem,
    pub episodes: Vec<ScanItem>,
}

#[derive(Debug, Clone, Default)]
pub struct SeriesNode {
    pub series: ScanItem,
    pub seasons: Vec<SeasonNode>,
}

/// Persists item changes back to the media host
#[async_trait]
pub trait HostItemStore: Send + Sync {
    async fn update_item(&self, item: &ScanItem) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub items: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl AddAssign for ScanStats {
    fn add_assign(&mut self, other: Self) {
        self.items += other.items;
        self.resolved += other.resolved;
        self.unresolved += other.unresolved;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}

impl ScanStats {
    fn record(&mut self, result: &Result<Option<String>>) {
        self.items += 1;
        match result {
            Ok(Some(_)) => self.resolved += 1,
            Ok(None) => self.unresolved += 1,
            Err(_) => self.failed += 1,
        }
    }
}

pub struct ScanPipeline {
    resolver: Arc<IdResolver>,
    sync: Arc<SyncEngine>,
    retriever: Option<Arc<ArchiveRetriever>>,
    store: Arc<dyn MetadataStore>,
    host: Arc<dyn HostItemStore>,
    language: String,
    concurrency: usize,
}

impl ScanPipeline {
    pub fn new(
        resolver: Arc<IdResolver>,
        sync: Arc<SyncEngine>,
        store: Arc<dyn MetadataStore>,
        host: Arc<dyn HostItemStore>,
        language: &str,
    ) -> Self {
        Self {
            resolver,
            sync,
            retriever: None,
            store,
            host,
            language: language.to_string(),
            concurrency: 4,
        }
    }

    /// Also fetch archived reviews and comments for resolved items
    pub fn with_retriever(mut self, retriever: Arc<ArchiveRetriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Process every series tree, several series at a time
    pub async fn run(&self, library: &mut [SeriesNode], cancel: &CancellationToken) -> ScanStats {
        info!(series = library.len(), "Starting library scan");

        let results: Vec<ScanStats> = stream::iter(library.iter_mut())
            .map(|node| self.scan_series(node, cancel))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut stats = ScanStats::default();
        for partial in results {
            stats += partial;
        }

        info!(
            items = stats.items,
            resolved = stats.resolved,
            unresolved = stats.unresolved,
            failed = stats.failed,
            skipped = stats.skipped,
            "Library scan finished"
        );
        stats
    }

    /// Process movies, several at a time
    pub async fn run_movies(&self, movies: &mut [ScanItem], cancel: &CancellationToken) -> ScanStats {
        let results: Vec<Result<Option<String>>> = stream::iter(movies.iter_mut())
            .map(|movie| self.process_movie(movie, cancel))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut stats = ScanStats::default();
        for result in &results {
            stats.record(result);
        }
        stats
    }

    async fn scan_series(&self, node: &mut SeriesNode, cancel: &CancellationToken) -> ScanStats {
        let mut stats = ScanStats::default();
        let result = self.process_series(&mut node.series, cancel).await;
        log_failure("series", &node.series, &result);
        stats.record(&result);

        let Ok(Some(series_id)) = result else {
            stats.skipped += count_children(node);
            return stats;
        };

        for season_node in &mut node.seasons {
            if cancel.is_cancelled() {
                stats.skipped += 1 + season_node.episodes.len();
                continue;
            }

            let result = self
                .process_season(&series_id, &mut season_node.season, cancel)
                .await;
            log_failure("season", &season_node.season, &result);
            stats.record(&result);

            let Ok(Some(season_id)) = result else {
                stats.skipped += season_node.episodes.len();
                continue;
            };

            for episode in &mut season_node.episodes {
                let result = self
                    .process_episode(&series_id, &season_id, episode, cancel)
                    .await;
                log_failure("episode", episode, &result);
                stats.record(&result);
            }
        }

        stats
    }

    /// Resolve a series id, sync its tree and fetch its reviews.
    ///
    /// A path tag overrides a stored id; otherwise a stored id, even an empty
    /// one from an earlier failed search, is kept.
    pub async fn process_series(
        &self,
        item: &mut ScanItem,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        let pinned = names::title_id_from_path(&item.path).is_some();
        let series_id = match item.provider_id(SERIES_ID_KEY) {
            Some(id) if !pinned => id.to_string(),
            _ => {
                let found = self
                    .resolver
                    .resolve_title_id(&item.name, &item.path, &self.language, cancel)
                    .await?
                    .unwrap_or_default();
                if item.set_provider_id(SERIES_ID_KEY, &found) {
                    self.host.update_item(item).await?;
                }
                found
            }
        };

        if series_id.is_empty() {
            debug!(name = %item.name, "No catalog entry for series");
            return Ok(None);
        }

        self.sync
            .sync_title_metadata(&series_id, &self.language, cancel)
            .await?;

        if let Some(retriever) = &self.retriever {
            let slug = self
                .store
                .get_title_metadata(&series_id, &self.language)?
                .map(|t| t.slug_title)
                .unwrap_or_default();
            if !slug.is_empty() {
                if let Err(e) = retriever
                    .retrieve_archived_reviews(&series_id, &slug, &self.language, cancel)
                    .await
                {
                    warn!(series_id = %series_id, error = %e, "Archived reviews not retrieved");
                }
            }
        }

        Ok(Some(series_id))
    }

    pub async fn process_season(
        &self,
        series_id: &str,
        item: &mut ScanItem,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        if let Some(id) = item.provider_id(SEASON_ID_KEY).filter(|id| !id.is_empty()) {
            return Ok(Some(id.to_string()));
        }

        let found = self
            .resolver
            .resolve_season_id(series_id, &item.name, item.index_number, &self.language, cancel)
            .await?;
        if let Some(id) = &found {
            item.set_provider_id(SEASON_ID_KEY, id);
            self.host.update_item(item).await?;
        }
        Ok(found)
    }

    pub async fn process_episode(
        &self,
        series_id: &str,
        season_id: &str,
        item: &mut ScanItem,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        let episode_id = match item.provider_id(EPISODE_ID_KEY).filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => {
                let found = self
                    .resolver
                    .resolve_episode_id(
                        season_id,
                        series_id,
                        &item.name,
                        item.index_number,
                        &self.language,
                        cancel,
                    )
                    .await?;
                let Some(id) = found else {
                    return Ok(None);
                };
                item.set_provider_id(EPISODE_ID_KEY, &id);
                self.host.update_item(item).await?;
                id
            }
        };

        self.retrieve_comments(series_id, &episode_id, cancel).await;
        Ok(Some(episode_id))
    }

    /// Movies must already carry their series and episode ids
    pub async fn process_movie(
        &self,
        item: &mut ScanItem,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        let series_id = names::title_id_from_path(&item.path)
            .or_else(|| item.provider_id(SERIES_ID_KEY).map(str::to_string))
            .filter(|id| !id.is_empty());
        let episode_id = item
            .provider_id(EPISODE_ID_KEY)
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        let (Some(series_id), Some(episode_id)) = (series_id, episode_id) else {
            debug!(name = %item.name, "Movie has no catalog ids");
            return Ok(None);
        };
        let season_id = item.provider_id(SEASON_ID_KEY).unwrap_or_default().to_string();

        if item.set_provider_id(SERIES_ID_KEY, &series_id) {
            self.host.update_item(item).await?;
        }

        self.sync
            .sync_movie_metadata(&series_id, &season_id, &episode_id, &self.language, cancel)
            .await?;
        self.retrieve_comments(&series_id, &episode_id, cancel).await;
        Ok(Some(episode_id))
    }

    async fn retrieve_comments(&self, series_id: &str, episode_id: &str, cancel: &CancellationToken) {
        let Some(retriever) = &self.retriever else {
            return;
        };

        let slug = match self.store.get_title_metadata(series_id, &self.language) {
            Ok(title) => title.and_then(|t| lookup::episode_slug(&t, episode_id)),
            Err(e) => {
                warn!(episode_id = episode_id, error = %e, "Cached title unavailable");
                return;
            }
        };
        let Some(slug) = slug.filter(|s| !s.is_empty()) else {
            debug!(episode_id = episode_id, "Episode slug unknown, skipping comments");
            return;
        };

        if let Err(e) = retriever
            .retrieve_archived_comments(episode_id, &slug, &self.language, cancel)
            .await
        {
            warn!(episode_id = episode_id, error = %e, "Archived comments not retrieved");
        }
    }
}

fn count_children(node: &SeriesNode) -> usize {
    node.seasons.iter().map(|s| 1 + s.episodes.len()).sum()
}

fn log_failure(kind: &str, item: &ScanItem, result: &Result<Option<String>>) {
    match result {
        Err(ScrapError::Cancelled) => debug!(kind = kind, name = %item.name, "Cancelled"),
        Err(e) => error!(kind = kind, name = %item.name, path = %item.path, error = %e, "Item failed"),
        Ok(_) => {}
    }
}
