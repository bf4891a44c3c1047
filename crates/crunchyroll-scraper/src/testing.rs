//! In-memory collaborators for unit tests.

use crate::archive::{ArchiveSearch, AvatarCache, ContentExtractor, Snapshot};
use crate::catalog::{CatalogClient, RemoteEpisode, RemoteSeason, SeriesDetail};
use crate::error::{Result, ScrapError};
use crate::store::MetadataStore;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use shared::{ChangeSet, Comment, ImageSource, PendingWrite, Review, TitleMetadata};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, Semaphore};
use tokio_util::sync::CancellationToken;

pub const LANG: &str = "en-US";

type ErrorCtor = fn(String) -> ScrapError;

pub fn remote_season(id: &str, number: i32, sequence: i32, title: &str) -> RemoteSeason {
    RemoteSeason {
        id: id.to_string(),
        title: title.to_string(),
        slug_title: title.to_lowercase().replace(' ', "-"),
        season_number: number,
        season_sequence_number: sequence,
        season_display_number: number.to_string(),
        identifier: format!("{}|S{}", id, number),
    }
}

pub fn remote_episode(id: &str, season_id: &str, number: &str, sequence: f64) -> RemoteEpisode {
    RemoteEpisode {
        id: id.to_string(),
        title: format!("Episode {}", number),
        description: String::new(),
        episode_number: number.to_string(),
        sequence_number: sequence,
        slug_title: format!("episode-{}", id.to_lowercase()),
        thumbnail: ImageSource::default(),
        season_id: season_id.to_string(),
    }
}

/// Blocks `get_seasons` until released, to hold a sync inside its critical section
#[derive(Clone)]
pub struct Gate {
    pub entered: Arc<Notify>,
    pub release: Arc<Semaphore>,
}

impl Default for Gate {
    fn default() -> Self {
        Self {
            entered: Arc::new(Notify::new()),
            release: Arc::new(Semaphore::new(0)),
        }
    }
}

/// Scripted catalog that records every call
#[derive(Default)]
pub struct FakeCatalog {
    series: Mutex<HashMap<String, SeriesDetail>>,
    seasons: Mutex<HashMap<String, Vec<RemoteSeason>>>,
    episodes: Mutex<HashMap<String, Vec<RemoteEpisode>>>,
    objects: Mutex<HashMap<String, RemoteEpisode>>,
    search: Mutex<HashMap<String, String>>,
    failures: Mutex<HashMap<String, ErrorCtor>>,
    calls: Mutex<Vec<String>>,
    gate: Mutex<Option<Gate>>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(self, series_id: &str, title: &str) -> Self {
        self.series.lock().unwrap().insert(
            series_id.to_string(),
            SeriesDetail {
                title: title.to_string(),
                slug_title: title.to_lowercase().replace(' ', "-"),
                ..Default::default()
            },
        );
        self
    }

    pub fn with_seasons(self, series_id: &str, seasons: Vec<RemoteSeason>) -> Self {
        self.seasons
            .lock()
            .unwrap()
            .insert(series_id.to_string(), seasons);
        self
    }

    pub fn with_episodes(self, season_id: &str, episodes: Vec<RemoteEpisode>) -> Self {
        self.episodes
            .lock()
            .unwrap()
            .insert(season_id.to_string(), episodes);
        self
    }

    pub fn with_object(self, episode: RemoteEpisode) -> Self {
        self.objects
            .lock()
            .unwrap()
            .insert(episode.id.clone(), episode);
        self
    }

    pub fn with_search_result(self, name: &str, series_id: &str) -> Self {
        self.search
            .lock()
            .unwrap()
            .insert(name.to_string(), series_id.to_string());
        self
    }

    /// Make the call recorded as `key` (e.g. "episodes:S1") fail
    pub fn failing(self, key: &str, error: ErrorCtor) -> Self {
        self.failures.lock().unwrap().insert(key.to_string(), error);
        self
    }

    pub fn gated(self, gate: Gate) -> Self {
        *self.gate.lock().unwrap() = Some(gate);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn record(&self, key: String) -> Result<()> {
        self.calls.lock().unwrap().push(key.clone());
        match self.failures.lock().unwrap().get(&key) {
            Some(error) => Err(error(key)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CatalogClient for FakeCatalog {
    async fn get_seasons(&self, series_id: &str, _language: &str) -> Result<Vec<RemoteSeason>> {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            let _permit = gate.release.acquire().await;
        }
        self.record(format!("seasons:{}", series_id))?;
        Ok(self
            .seasons
            .lock()
            .unwrap()
            .get(series_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_episodes(&self, season_id: &str, _language: &str) -> Result<Vec<RemoteEpisode>> {
        self.record(format!("episodes:{}", season_id))?;
        Ok(self
            .episodes
            .lock()
            .unwrap()
            .get(season_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_episode(&self, episode_id: &str, _language: &str) -> Result<RemoteEpisode> {
        self.record(format!("episode:{}", episode_id))?;
        self.objects
            .lock()
            .unwrap()
            .get(episode_id)
            .cloned()
            .ok_or_else(|| ScrapError::NotFound(episode_id.to_string()))
    }

    async fn get_series_detail(&self, series_id: &str, _language: &str) -> Result<SeriesDetail> {
        self.record(format!("series:{}", series_id))?;
        Ok(self
            .series
            .lock()
            .unwrap()
            .get(series_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_rating(&self, series_id: &str) -> Result<f32> {
        self.record(format!("rating:{}", series_id))?;
        Ok(4.5)
    }

    async fn search_series_id(&self, name: &str, _language: &str) -> Result<Option<String>> {
        self.record(format!("search:{}", name))?;
        Ok(self.search.lock().unwrap().get(name).cloned())
    }
}

/// Store with the same staging semantics as the SQLite repository
#[derive(Default)]
pub struct MemoryStore {
    titles: Mutex<HashMap<(String, String), TitleMetadata>>,
    reviews: Mutex<HashMap<String, Vec<Review>>>,
    comments: Mutex<HashMap<String, Vec<Comment>>>,
    pub fail_add: AtomicBool,
    pub fail_save: AtomicBool,
    pub saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a title directly, bypassing staging
    pub fn insert_title(&self, title: TitleMetadata) {
        self.titles
            .lock()
            .unwrap()
            .insert((title.crunchyroll_id.clone(), title.language.clone()), title);
    }

    pub fn title(&self, series_id: &str) -> Option<TitleMetadata> {
        self.titles
            .lock()
            .unwrap()
            .get(&(series_id.to_string(), LANG.to_string()))
            .cloned()
    }

    pub fn stored_reviews(&self, title_id: &str) -> Option<Vec<Review>> {
        self.reviews.lock().unwrap().get(title_id).cloned()
    }

    pub fn stored_comments(&self, episode_id: &str) -> Option<Vec<Comment>> {
        self.comments.lock().unwrap().get(episode_id).cloned()
    }

    fn check_add(&self) -> Result<()> {
        if self.fail_add.load(Ordering::SeqCst) {
            return Err(ScrapError::Persistence(anyhow::anyhow!("add failed")));
        }
        Ok(())
    }
}

impl MetadataStore for MemoryStore {
    fn get_title_metadata(&self, series_id: &str, language: &str) -> Result<Option<TitleMetadata>> {
        Ok(self
            .titles
            .lock()
            .unwrap()
            .get(&(series_id.to_string(), language.to_string()))
            .cloned())
    }

    fn add_or_update_title_metadata(
        &self,
        changes: &mut ChangeSet,
        title: &TitleMetadata,
    ) -> Result<()> {
        self.check_add()?;
        changes.add_or_update_title_metadata(title);
        Ok(())
    }

    fn reviews_exist(&self, title_id: &str) -> Result<bool> {
        Ok(self.reviews.lock().unwrap().contains_key(title_id))
    }

    fn add_reviews(
        &self,
        changes: &mut ChangeSet,
        title_id: &str,
        language: &str,
        reviews: &[Review],
    ) -> Result<()> {
        self.check_add()?;
        changes.add_reviews(title_id, language, reviews);
        Ok(())
    }

    fn comments_exist(&self, episode_id: &str) -> Result<bool> {
        Ok(self.comments.lock().unwrap().contains_key(episode_id))
    }

    fn add_comments(
        &self,
        changes: &mut ChangeSet,
        episode_id: &str,
        language: &str,
        comments: &[Comment],
    ) -> Result<()> {
        self.check_add()?;
        changes.add_comments(episode_id, language, comments);
        Ok(())
    }

    fn save_changes(&self, changes: ChangeSet) -> Result<()> {
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(ScrapError::Persistence(anyhow::anyhow!("save failed")));
        }
        for write in changes.into_writes() {
            match write {
                PendingWrite::Title(title) => self.insert_title(title),
                PendingWrite::Reviews { title_id, reviews, .. } => {
                    self.reviews.lock().unwrap().insert(title_id, reviews);
                }
                PendingWrite::Comments {
                    episode_id,
                    comments,
                    ..
                } => {
                    self.comments.lock().unwrap().insert(episode_id, comments);
                }
            }
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn snapshot(timestamp: &str) -> Snapshot {
    Snapshot {
        timestamp: NaiveDateTime::parse_from_str(timestamp, "%Y%m%d%H%M%S").unwrap(),
        mime_type: "text/html".to_string(),
        status_code: Some(200),
    }
}

/// Archive search returning a fixed snapshot list
#[derive(Default)]
pub struct FakeArchive {
    pub snapshots: Vec<Snapshot>,
    pub fail: bool,
    pub searches: Mutex<Vec<(String, NaiveDate)>>,
}

#[async_trait]
impl ArchiveSearch for FakeArchive {
    async fn search(&self, url: &str, before: NaiveDate) -> Result<Vec<Snapshot>> {
        self.searches.lock().unwrap().push((url.to_string(), before));
        if self.fail {
            return Err(ScrapError::RequestFailed("cdx unavailable".to_string()));
        }
        Ok(self.snapshots.clone())
    }
}

/// Extractor answering per snapshot URL; unknown URLs are invalid pages
#[derive(Default)]
pub struct FakeExtractor {
    reviews: Mutex<HashMap<String, Vec<Review>>>,
    comments: Mutex<HashMap<String, Vec<Comment>>>,
    failures: Mutex<HashMap<String, ErrorCtor>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeExtractor {
    pub fn with_reviews(self, url: &str, reviews: Vec<Review>) -> Self {
        self.reviews.lock().unwrap().insert(url.to_string(), reviews);
        self
    }

    pub fn with_comments(self, url: &str, comments: Vec<Comment>) -> Self {
        self.comments
            .lock()
            .unwrap()
            .insert(url.to_string(), comments);
        self
    }

    pub fn failing(self, url: &str, error: ErrorCtor) -> Self {
        self.failures.lock().unwrap().insert(url.to_string(), error);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn answer<T: Clone>(&self, url: &str, table: &Mutex<HashMap<String, Vec<T>>>) -> Result<Vec<T>> {
        self.calls.lock().unwrap().push(url.to_string());
        if let Some(error) = self.failures.lock().unwrap().get(url) {
            return Err(error(url.to_string()));
        }
        table
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| ScrapError::InvalidPage(url.to_string()))
    }
}

#[async_trait]
impl ContentExtractor for FakeExtractor {
    async fn extract_reviews(&self, snapshot_url: &str, _language: &str) -> Result<Vec<Review>> {
        self.answer(snapshot_url, &self.reviews)
    }

    async fn extract_comments(&self, snapshot_url: &str, _language: &str) -> Result<Vec<Comment>> {
        self.answer(snapshot_url, &self.comments)
    }
}

/// Avatar cache that prefixes cached URIs, or fails every call
#[derive(Default)]
pub struct FakeAvatars {
    pub fail: bool,
    /// Fired on the first request, after extraction and before staging
    pub cancel_on_request: Option<CancellationToken>,
    pub requested: Mutex<Vec<String>>,
}

#[async_trait]
impl AvatarCache for FakeAvatars {
    async fn cache_if_absent(&self, uri: &str) -> Result<String> {
        self.requested.lock().unwrap().push(uri.to_string());
        if let Some(cancel) = &self.cancel_on_request {
            cancel.cancel();
        }
        if self.fail {
            return Err(ScrapError::RequestFailed(uri.to_string()));
        }
        Ok(format!("cache://{}", uri))
    }
}
