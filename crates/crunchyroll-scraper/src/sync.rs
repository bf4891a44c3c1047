//! Metadata synchronization engine.
//!
//! Keeps the cached title → season → episode tree current. A sync runs at
//! most once at a time per key, is skipped while the cached record is fresh,
//! and only ever adds or refreshes entities.
//!
//! Title syncs and season syncs hold different keys, so both may be writing
//! the same series. Every write therefore re-reads the stored tree and merges
//! into it while holding the series' commit lock.

use crate::catalog::{CatalogClient, RemoteEpisode, RemoteSeason, SeriesDetail};
use crate::error::{cancellable, ensure_not_cancelled, Result, ScrapError};
use crate::lock::ScrapLocks;
use crate::store::MetadataStore;
use chrono::{DateTime, Utc};
use shared::{ChangeSet, Season, TitleMetadata};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Episode a movie-shaped item points at
struct MovieTarget<'a> {
    season_id: &'a str,
    episode_id: &'a str,
}

pub struct SyncEngine {
    catalog: Arc<dyn CatalogClient>,
    store: Arc<dyn MetadataStore>,
    locks: ScrapLocks,
    /// Per-series guard around read-merge-write of the stored tree
    commits: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    staleness_threshold: chrono::Duration,
}

impl SyncEngine {
    pub fn new(
        catalog: Arc<dyn CatalogClient>,
        store: Arc<dyn MetadataStore>,
        staleness_threshold: Duration,
    ) -> Self {
        Self {
            catalog,
            store,
            locks: ScrapLocks::new(),
            commits: Mutex::new(HashMap::new()),
            staleness_threshold: chrono::Duration::from_std(staleness_threshold)
                .unwrap_or_else(|_| chrono::Duration::days(36_500)),
        }
    }

    pub fn locks(&self) -> &ScrapLocks {
        &self.locks
    }

    /// Whether a record synced at `last_synced_at` is still inside the threshold
    pub fn is_fresh(&self, last_synced_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match last_synced_at {
            Some(synced) => now.signed_duration_since(synced) < self.staleness_threshold,
            None => false,
        }
    }

    /// Refresh the full tree of a series.
    ///
    /// Returns `Ok(())` without doing anything when another sync for the same
    /// series is in flight or the cached record is fresh.
    pub async fn sync_title_metadata(
        &self,
        series_id: &str,
        language: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.sync(series_id, language, None, cancel).await
    }

    /// Title sync for a movie-shaped item, plus a direct fetch of its single
    /// episode when the season listings did not surface it
    pub async fn sync_movie_metadata(
        &self,
        series_id: &str,
        season_id: &str,
        episode_id: &str,
        language: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let movie = MovieTarget {
            season_id,
            episode_id,
        };
        self.sync(series_id, language, Some(movie), cancel).await
    }

    /// Fetch one season's episodes into the cached tree of its series.
    ///
    /// Locked on the season id, so it can run nested inside a resolution
    /// that already triggered a title sync for the series.
    pub async fn sync_season_episodes(
        &self,
        series_id: &str,
        season_id: &str,
        language: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let Some(_lock) = self.locks.try_acquire(season_id) else {
            debug!(season_id = season_id, "Season sync already in flight");
            return Ok(());
        };

        if let Some(title) = self.store.get_title_metadata(series_id, language)? {
            let populated = title
                .seasons
                .get(season_id)
                .map_or(false, |season| !season.episodes.is_empty());
            if populated && self.is_fresh(title.last_synced_at, Utc::now()) {
                debug!(season_id = season_id, "Season episodes are fresh");
                return Ok(());
            }
        }

        let episodes = cancellable(cancel, self.catalog.get_episodes(season_id, language)).await?;

        let added = self.commit(series_id, language, cancel, |title| {
            let (season, _) = title
                .seasons
                .insert_if_absent(Season::shell(season_id, language));
            merge_episodes(season, &episodes, language)
        })?;

        info!(
            series_id = series_id,
            season_id = season_id,
            episodes = episodes.len(),
            added = added,
            "Season episodes synced"
        );
        Ok(())
    }

    async fn sync(
        &self,
        series_id: &str,
        language: &str,
        movie: Option<MovieTarget<'_>>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let Some(_lock) = self.locks.try_acquire(series_id) else {
            debug!(series_id = series_id, "Title sync already in flight");
            return Ok(());
        };

        let cached = self.store.get_title_metadata(series_id, language)?;
        if let Some(title) = &cached {
            if self.is_fresh(title.last_synced_at, Utc::now()) {
                debug!(series_id = series_id, "Cached title metadata is fresh");
                return Ok(());
            }
        }

        let detail = cancellable(cancel, self.catalog.get_series_detail(series_id, language)).await?;
        let rating = match cancellable(cancel, self.catalog.get_rating(series_id)).await {
            Ok(rating) => Some(rating),
            Err(ScrapError::Cancelled) => return Err(ScrapError::Cancelled),
            Err(e) => {
                warn!(series_id = series_id, error = %e, "Failed to fetch rating");
                None
            }
        };
        let seasons = cancellable(cancel, self.catalog.get_seasons(series_id, language)).await?;

        let mut listings = Vec::with_capacity(seasons.len());
        for season in seasons {
            let episodes =
                match cancellable(cancel, self.catalog.get_episodes(&season.id, language)).await {
                    Ok(episodes) => episodes,
                    Err(ScrapError::Cancelled) => return Err(ScrapError::Cancelled),
                    Err(e) => {
                        warn!(
                            series_id = series_id,
                            season_id = %season.id,
                            error = %e,
                            "Failed to fetch season episodes, keeping cached ones"
                        );
                        Vec::new()
                    }
                };
            listings.push((season, episodes));
        }

        let movie_episode = match movie {
            Some(movie) if !is_listed(cached.as_ref(), &listings, movie.episode_id) => {
                self.fetch_movie_episode(&movie, language, cancel).await?
            }
            _ => None,
        };

        let added = self.commit(series_id, language, cancel, |title| {
            apply_detail(title, &detail, rating);
            let mut added = merge_listings(title, &listings);
            if let Some((season_id, episode)) = &movie_episode {
                let (season, _) = title
                    .seasons
                    .insert_if_absent(Season::shell(season_id, language));
                added += merge_episodes(season, std::slice::from_ref(episode), language);
            }
            title.last_synced_at = Some(Utc::now());
            added
        })?;

        info!(
            series_id = series_id,
            language = language,
            added = added,
            "Title metadata synced"
        );
        Ok(())
    }

    /// The movie's episode and the season it belongs to; `None` when the
    /// fetch failed in transport
    async fn fetch_movie_episode(
        &self,
        movie: &MovieTarget<'_>,
        language: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<(String, RemoteEpisode)>> {
        let fetch = self.catalog.get_episode(movie.episode_id, language);
        let remote = match cancellable(cancel, fetch).await {
            Ok(remote) => remote,
            Err(ScrapError::RequestFailed(e)) => {
                warn!(episode_id = movie.episode_id, error = %e, "Movie episode fetch failed");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let season_id = if remote.season_id.is_empty() {
            movie.season_id.to_string()
        } else {
            remote.season_id.clone()
        };
        debug!(
            episode_id = movie.episode_id,
            season_id = %season_id,
            "Fetched movie episode"
        );
        Ok(Some((season_id, remote)))
    }

    /// Merge into the stored tree of a series and save it.
    ///
    /// The tree is re-read under the series' commit lock, so entities another
    /// sync stored since this one started are kept. Returns what `apply`
    /// returns.
    fn commit<F>(
        &self,
        series_id: &str,
        language: &str,
        cancel: &CancellationToken,
        apply: F,
    ) -> Result<usize>
    where
        F: FnOnce(&mut TitleMetadata) -> usize,
    {
        let series_lock = self.commit_lock(series_id)?;
        let _guard = series_lock
            .lock()
            .map_err(|_| ScrapError::Internal(format!("commit lock poisoned for {}", series_id)))?;

        ensure_not_cancelled(cancel)?;
        let mut title = self
            .store
            .get_title_metadata(series_id, language)?
            .unwrap_or_else(|| TitleMetadata::new(series_id, language));
        let added = apply(&mut title);

        let mut changes = ChangeSet::new();
        self.store.add_or_update_title_metadata(&mut changes, &title)?;
        self.store.save_changes(changes)?;
        Ok(added)
    }

    fn commit_lock(&self, series_id: &str) -> Result<Arc<Mutex<()>>> {
        let mut commits = self
            .commits
            .lock()
            .map_err(|_| ScrapError::Internal("commit lock table poisoned".to_string()))?;
        Ok(commits.entry(series_id.to_string()).or_default().clone())
    }
}

fn is_listed(
    cached: Option<&TitleMetadata>,
    listings: &[(RemoteSeason, Vec<RemoteEpisode>)],
    episode_id: &str,
) -> bool {
    cached.map_or(false, |title| title.contains_episode(episode_id))
        || listings
            .iter()
            .any(|(_, episodes)| episodes.iter().any(|e| e.id == episode_id))
}

/// Overwrite series-level fields with the remote values; a missing rating
/// keeps the cached one
pub fn apply_detail(title: &mut TitleMetadata, detail: &SeriesDetail, rating: Option<f32>) {
    title.title = detail.title.clone();
    title.description = detail.description.clone();
    title.slug_title = detail.slug_title.clone();
    title.studio = detail.studio.clone();
    title.poster_tall = detail.poster_tall.clone();
    title.poster_wide = detail.poster_wide.clone();
    if let Some(rating) = rating {
        title.rating = rating;
    }
}

/// Merge season listings into the tree; returns the number of new entities.
///
/// Cached seasons and episodes missing from the listings are left untouched.
pub fn merge_listings(
    title: &mut TitleMetadata,
    listings: &[(RemoteSeason, Vec<RemoteEpisode>)],
) -> usize {
    let language = title.language.clone();
    let mut added = 0;

    for (remote, episodes) in listings {
        let (season, inserted) = title.seasons.insert_if_absent(remote.to_season(&language));
        if inserted {
            added += 1;
        } else {
            remote.apply_to(season);
        }
        added += merge_episodes(season, episodes, &language);
    }

    added
}

/// Merge an episode listing into one season; returns the number appended
pub fn merge_episodes(season: &mut Season, episodes: &[RemoteEpisode], language: &str) -> usize {
    let mut added = 0;
    for remote in episodes {
        let (episode, inserted) = season.episodes.insert_if_absent(remote.to_episode(language));
        if inserted {
            added += 1;
        } else {
            remote.apply_to(episode);
        }
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use std::sync::atomic::Ordering;

    fn engine(catalog: Arc<FakeCatalog>, store: Arc<MemoryStore>) -> SyncEngine {
        SyncEngine::new(catalog, store, Duration::from_secs(48 * 3600))
    }

    fn two_season_catalog() -> FakeCatalog {
        FakeCatalog::new()
            .with_series("G1", "Frieren")
            .with_seasons(
                "G1",
                vec![
                    remote_season("S1", 1, 1, "Season One"),
                    remote_season("S2", 2, 2, "Season Two"),
                ],
            )
            .with_episodes(
                "S1",
                vec![
                    remote_episode("E1", "S1", "1", 1.0),
                    remote_episode("E2", "S1", "2", 2.0),
                ],
            )
            .with_episodes("S2", vec![remote_episode("E3", "S2", "1", 1.0)])
    }

    #[tokio::test]
    async fn test_first_sync_builds_tree() {
        let catalog = Arc::new(two_season_catalog());
        let store = Arc::new(MemoryStore::new());
        let engine = engine(catalog.clone(), store.clone());

        engine
            .sync_title_metadata("G1", LANG, &CancellationToken::new())
            .await
            .unwrap();

        let title = store.title("G1").unwrap();
        assert_eq!(title.title, "Frieren");
        assert_eq!(title.rating, 4.5);
        assert_eq!(title.seasons.len(), 2);
        assert_eq!(title.seasons.get("S1").unwrap().episodes.len(), 2);
        assert!(title.last_synced_at.is_some());
        assert_eq!(store.saves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fresh_title_makes_no_remote_calls() {
        let catalog = Arc::new(two_season_catalog());
        let store = Arc::new(MemoryStore::new());
        let mut cached = TitleMetadata::new("G1", LANG);
        cached.title = "Cached".to_string();
        cached.last_synced_at = Some(Utc::now() - chrono::Duration::hours(1));
        store.insert_title(cached.clone());

        engine(catalog.clone(), store.clone())
            .sync_title_metadata("G1", LANG, &CancellationToken::new())
            .await
            .unwrap();

        assert!(catalog.calls().is_empty());
        assert_eq!(store.title("G1").unwrap(), cached);
    }

    #[tokio::test]
    async fn test_stale_title_is_refetched() {
        let catalog = Arc::new(two_season_catalog());
        let store = Arc::new(MemoryStore::new());
        let mut cached = TitleMetadata::new("G1", LANG);
        cached.last_synced_at = Some(Utc::now() - chrono::Duration::hours(49));
        store.insert_title(cached);

        engine(catalog.clone(), store.clone())
            .sync_title_metadata("G1", LANG, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(catalog.count("seasons:"), 1);
        assert_eq!(store.title("G1").unwrap().seasons.len(), 2);
    }

    #[tokio::test]
    async fn test_merge_keeps_seasons_missing_from_remote() {
        let catalog = Arc::new(
            FakeCatalog::new()
                .with_series("G1", "Show")
                .with_seasons(
                    "G1",
                    vec![
                        remote_season("S1", 1, 1, "Renamed"),
                        remote_season("S4", 4, 4, "New"),
                    ],
                )
                .with_episodes("S1", vec![remote_episode("E1", "S1", "1", 1.0)]),
        );
        let store = Arc::new(MemoryStore::new());

        let mut cached = TitleMetadata::new("G1", LANG);
        for (id, number) in [("S1", 1), ("S2", 2), ("S3", 3)] {
            let mut season = remote_season(id, number, number, "Old").to_season(LANG);
            season
                .episodes
                .insert_if_absent(remote_episode(&format!("{}-E1", id), id, "1", 1.0).to_episode(LANG));
            cached.seasons.insert_if_absent(season);
        }
        store.insert_title(cached);

        engine(catalog, store.clone())
            .sync_title_metadata("G1", LANG, &CancellationToken::new())
            .await
            .unwrap();

        let title = store.title("G1").unwrap();
        let ids: Vec<&str> = title.seasons.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["S1", "S2", "S3", "S4"]);
        assert_eq!(title.seasons.get("S1").unwrap().title, "Renamed");
        assert_eq!(title.seasons.get("S1").unwrap().episodes.len(), 2);
        assert_eq!(title.seasons.get("S2").unwrap().title, "Old");
    }

    #[tokio::test]
    async fn test_failed_season_listing_is_absorbed() {
        let catalog = Arc::new(two_season_catalog().failing("episodes:S2", ScrapError::RequestFailed));
        let store = Arc::new(MemoryStore::new());

        engine(catalog, store.clone())
            .sync_title_metadata("G1", LANG, &CancellationToken::new())
            .await
            .unwrap();

        let title = store.title("G1").unwrap();
        assert_eq!(title.seasons.len(), 2);
        assert!(title.seasons.get("S2").unwrap().episodes.is_empty());
    }

    #[tokio::test]
    async fn test_failed_rating_keeps_previous_value() {
        let catalog = Arc::new(two_season_catalog().failing("rating:G1", ScrapError::RequestFailed));
        let store = Arc::new(MemoryStore::new());
        let mut cached = TitleMetadata::new("G1", LANG);
        cached.rating = 3.9;
        store.insert_title(cached);

        engine(catalog, store.clone())
            .sync_title_metadata("G1", LANG, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(store.title("G1").unwrap().rating, 3.9);
    }

    #[tokio::test]
    async fn test_season_list_failure_propagates_without_writes() {
        let catalog = Arc::new(two_season_catalog().failing("seasons:G1", ScrapError::RequestFailed));
        let store = Arc::new(MemoryStore::new());

        let result = engine(catalog, store.clone())
            .sync_title_metadata("G1", LANG, &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(ScrapError::RequestFailed(_))));
        assert!(store.title("G1").is_none());
        assert_eq!(store.saves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_persistence_failures_propagate() {
        let store = Arc::new(MemoryStore::new());
        store.fail_save.store(true, Ordering::SeqCst);
        let result = engine(Arc::new(two_season_catalog()), store.clone())
            .sync_title_metadata("G1", LANG, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ScrapError::Persistence(_))));

        let store = Arc::new(MemoryStore::new());
        store.fail_add.store(true, Ordering::SeqCst);
        let result = engine(Arc::new(two_season_catalog()), store.clone())
            .sync_title_metadata("G1", LANG, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ScrapError::Persistence(_))));
    }

    #[tokio::test]
    async fn test_cancelled_sync_persists_nothing() {
        let store = Arc::new(MemoryStore::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = engine(Arc::new(two_season_catalog()), store.clone())
            .sync_title_metadata("G1", LANG, &cancel)
            .await;

        assert!(matches!(result, Err(ScrapError::Cancelled)));
        assert!(store.title("G1").is_none());
    }

    #[tokio::test]
    async fn test_cancel_during_fetch_saves_nothing() {
        let gate = Gate::default();
        let catalog = Arc::new(two_season_catalog().gated(gate.clone()));
        let store = Arc::new(MemoryStore::new());
        let engine = Arc::new(engine(catalog.clone(), store.clone()));
        let cancel = CancellationToken::new();

        let sync = {
            let engine = engine.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { engine.sync_title_metadata("G1", LANG, &cancel).await })
        };
        gate.entered.notified().await;
        cancel.cancel();

        let result = sync.await.unwrap();
        assert!(matches!(result, Err(ScrapError::Cancelled)));
        assert_eq!(catalog.count("episodes:"), 0);
        assert!(store.title("G1").is_none());
        assert_eq!(store.saves.load(Ordering::SeqCst), 0);
        assert!(!engine.locks().is_held("G1"));
    }

    #[tokio::test]
    async fn test_title_sync_keeps_episodes_from_concurrent_season_sync() {
        let gate = Gate::default();
        let catalog = Arc::new(
            FakeCatalog::new()
                .with_series("G1", "Frieren")
                .with_seasons("G1", vec![remote_season("S1", 1, 1, "Season One")])
                .with_episodes("S1", vec![remote_episode("E1", "S1", "1", 1.0)])
                .with_episodes("S1b", vec![remote_episode("E13", "S1b", "13", 1.0)])
                .gated(gate.clone()),
        );
        let store = Arc::new(MemoryStore::new());
        let engine = Arc::new(engine(catalog, store.clone()));
        let cancel = CancellationToken::new();

        let title_sync = {
            let engine = engine.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { engine.sync_title_metadata("G1", LANG, &cancel).await })
        };
        gate.entered.notified().await;

        // The title sync is parked with a listing that lacks S1b.
        engine
            .sync_season_episodes("G1", "S1b", LANG, &cancel)
            .await
            .unwrap();
        assert!(store.title("G1").unwrap().contains_episode("E13"));

        gate.release.add_permits(1);
        title_sync.await.unwrap().unwrap();

        let title = store.title("G1").unwrap();
        assert!(title.contains_episode("E13"));
        assert!(title.contains_episode("E1"));
        assert_eq!(title.title, "Frieren");
        assert!(title.last_synced_at.is_some());
        assert_eq!(store.saves.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_syncs_run_once() {
        let gate = Gate::default();
        let catalog = Arc::new(two_season_catalog().gated(gate.clone()));
        let store = Arc::new(MemoryStore::new());
        let engine = Arc::new(engine(catalog.clone(), store.clone()));
        let cancel = CancellationToken::new();

        let first = {
            let engine = engine.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { engine.sync_title_metadata("G1", LANG, &cancel).await })
        };
        gate.entered.notified().await;

        // The first sync is parked inside its critical section.
        engine.sync_title_metadata("G1", LANG, &cancel).await.unwrap();
        assert!(engine.locks().is_held("G1"));

        gate.release.add_permits(1);
        first.await.unwrap().unwrap();

        assert_eq!(catalog.count("seasons:"), 1);
        assert_eq!(catalog.count("series:"), 1);
        assert_eq!(store.saves.load(Ordering::SeqCst), 1);
        assert!(!engine.locks().is_held("G1"));
    }

    #[tokio::test]
    async fn test_movie_episode_fetched_when_missing() {
        let catalog = Arc::new(
            FakeCatalog::new()
                .with_series("G9", "Movie Series")
                .with_object(remote_episode("M1", "MS1", "", 1.0)),
        );
        let store = Arc::new(MemoryStore::new());

        engine(catalog.clone(), store.clone())
            .sync_movie_metadata("G9", "MS1", "M1", LANG, &CancellationToken::new())
            .await
            .unwrap();

        let title = store.title("G9").unwrap();
        assert!(title.contains_episode("M1"));
        assert!(title.seasons.get("MS1").is_some());
        assert_eq!(catalog.count("episode:M1"), 1);
    }

    #[tokio::test]
    async fn test_movie_episode_request_failure_is_tolerated() {
        let catalog = Arc::new(
            FakeCatalog::new()
                .with_series("G9", "Movie Series")
                .failing("episode:M1", ScrapError::RequestFailed),
        );
        let store = Arc::new(MemoryStore::new());

        engine(catalog, store.clone())
            .sync_movie_metadata("G9", "MS1", "M1", LANG, &CancellationToken::new())
            .await
            .unwrap();

        assert!(!store.title("G9").unwrap().contains_episode("M1"));
    }

    #[tokio::test]
    async fn test_movie_episode_other_failure_propagates() {
        let catalog = Arc::new(
            FakeCatalog::new()
                .with_series("G9", "Movie Series")
                .failing("episode:M1", ScrapError::InvalidResponse),
        );
        let store = Arc::new(MemoryStore::new());

        let result = engine(catalog, store.clone())
            .sync_movie_metadata("G9", "MS1", "M1", LANG, &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(ScrapError::InvalidResponse(_))));
        assert!(store.title("G9").is_none());
    }

    #[tokio::test]
    async fn test_movie_episode_already_listed_skips_fetch() {
        let catalog = Arc::new(
            FakeCatalog::new()
                .with_series("G9", "Movie Series")
                .with_seasons("G9", vec![remote_season("MS1", 1, 1, "Movie")])
                .with_episodes("MS1", vec![remote_episode("M1", "MS1", "", 1.0)]),
        );
        let store = Arc::new(MemoryStore::new());

        engine(catalog.clone(), store)
            .sync_movie_metadata("G9", "MS1", "M1", LANG, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(catalog.count("episode:"), 0);
    }

    #[tokio::test]
    async fn test_season_episodes_merge_into_cached_tree() {
        let catalog = Arc::new(
            FakeCatalog::new().with_episodes("S1b", vec![remote_episode("E13", "S1b", "13", 1.0)]),
        );
        let store = Arc::new(MemoryStore::new());
        let mut cached = TitleMetadata::new("G1", LANG);
        cached.seasons.insert_if_absent(remote_season("S1b", 1, 2, "Part 2").to_season(LANG));
        cached.last_synced_at = Some(Utc::now());
        store.insert_title(cached);

        engine(catalog.clone(), store.clone())
            .sync_season_episodes("G1", "S1b", LANG, &CancellationToken::new())
            .await
            .unwrap();

        let title = store.title("G1").unwrap();
        assert!(title.seasons.get("S1b").unwrap().episodes.contains("E13"));
        assert_eq!(catalog.calls(), vec!["episodes:S1b".to_string()]);
    }

    #[tokio::test]
    async fn test_season_episodes_failure_propagates() {
        let catalog = Arc::new(FakeCatalog::new().failing("episodes:S1b", ScrapError::RequestFailed));
        let store = Arc::new(MemoryStore::new());

        let result = engine(catalog, store.clone())
            .sync_season_episodes("G1", "S1b", LANG, &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(ScrapError::RequestFailed(_))));
        assert!(store.title("G1").is_none());
    }

    #[test]
    fn test_is_fresh() {
        let engine = engine(Arc::new(FakeCatalog::new()), Arc::new(MemoryStore::new()));
        let now = Utc::now();
        assert!(!engine.is_fresh(None, now));
        assert!(engine.is_fresh(Some(now - chrono::Duration::hours(47)), now));
        assert!(!engine.is_fresh(Some(now - chrono::Duration::hours(48)), now));
    }
}
