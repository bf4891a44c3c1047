//! Remote catalog contract.
//!
//! The resolver and sync engine only talk to the catalog through
//! [`CatalogClient`]; [`crate::api::CrunchyrollClient`] is the HTTP
//! implementation.

use crate::error::Result;
use async_trait::async_trait;
use shared::{Episode, ImageSource, Season};

/// Season as listed by the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteSeason {
    pub id: String,
    pub title: String,
    pub slug_title: String,
    pub season_number: i32,
    pub season_sequence_number: i32,
    pub season_display_number: String,
    pub identifier: String,
}

impl RemoteSeason {
    /// Build the cached entity, without episodes
    pub fn to_season(&self, language: &str) -> Season {
        let mut season = Season::shell(&self.id, language);
        self.apply_to(&mut season);
        season
    }

    /// Refresh the descriptive fields of a cached season in place
    pub fn apply_to(&self, season: &mut Season) {
        season.title = self.title.clone();
        season.slug_title = self.slug_title.clone();
        season.season_number = self.season_number;
        season.season_sequence_number = self.season_sequence_number;
        season.season_display_number = self.season_display_number.clone();
        season.identifier = self.identifier.clone();
    }
}

/// Episode as listed by the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteEpisode {
    pub id: String,
    pub title: String,
    pub description: String,
    pub episode_number: String,
    pub sequence_number: f64,
    pub slug_title: String,
    pub thumbnail: ImageSource,
    pub season_id: String,
}

impl RemoteEpisode {
    pub fn to_episode(&self, language: &str) -> Episode {
        Episode {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            episode_number: self.episode_number.clone(),
            sequence_number: self.sequence_number,
            slug_title: self.slug_title.clone(),
            thumbnail: self.thumbnail.clone(),
            language: language.to_string(),
        }
    }

    pub fn apply_to(&self, episode: &mut Episode) {
        episode.title = self.title.clone();
        episode.description = self.description.clone();
        episode.episode_number = self.episode_number.clone();
        episode.sequence_number = self.sequence_number;
        episode.slug_title = self.slug_title.clone();
        episode.thumbnail = self.thumbnail.clone();
    }
}

/// Series-level details
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SeriesDetail {
    pub title: String,
    pub description: String,
    pub slug_title: String,
    pub studio: String,
    pub poster_tall: ImageSource,
    pub poster_wide: ImageSource,
}

/// Read-only access to the remote catalog
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// List the seasons of a series
    async fn get_seasons(&self, series_id: &str, language: &str) -> Result<Vec<RemoteSeason>>;

    /// List the episodes of a season
    async fn get_episodes(&self, season_id: &str, language: &str) -> Result<Vec<RemoteEpisode>>;

    /// Fetch one episode, including the id of the season it belongs to
    async fn get_episode(&self, episode_id: &str, language: &str) -> Result<RemoteEpisode>;

    async fn get_series_detail(&self, series_id: &str, language: &str) -> Result<SeriesDetail>;

    /// Average community rating of a series
    async fn get_rating(&self, series_id: &str) -> Result<f32>;

    /// Find the series whose title matches `name`, `Ok(None)` when none does
    async fn search_series_id(&self, name: &str, language: &str) -> Result<Option<String>>;
}
