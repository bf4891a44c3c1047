//! Catalog API response types.
//!
//! These types represent the JSON responses of the CMS endpoints, and their
//! conversion into the catalog records the engine works with.

use crate::catalog::{RemoteEpisode, RemoteSeason, SeriesDetail};
use serde::{Deserialize, Serialize};
use shared::ImageSource;

/// Standard `{"data": [...]}` wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub total: u32,
}

/// Image variant; the API nests them as lists of resolutions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageItem {
    pub source: String,
    pub width: u32,
    pub height: u32,
    #[serde(rename = "type", default)]
    pub image_type: String,
}

/// Pick the widest variant of the first resolution group
pub fn best_image(groups: &[Vec<ImageItem>]) -> ImageSource {
    groups
        .first()
        .and_then(|group| group.iter().max_by_key(|image| image.width))
        .map(|image| ImageSource {
            uri: image.source.clone(),
            width: image.width,
            height: image.height,
        })
        .unwrap_or_default()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub slug_title: String,
    pub season_number: i32,
    #[serde(default)]
    pub season_sequence_number: i32,
    #[serde(default)]
    pub season_display_number: String,
    #[serde(default)]
    pub identifier: String,
}

impl From<SeasonItem> for RemoteSeason {
    fn from(item: SeasonItem) -> Self {
        Self {
            id: item.id,
            title: item.title,
            slug_title: item.slug_title,
            season_number: item.season_number,
            season_sequence_number: item.season_sequence_number,
            season_display_number: item.season_display_number,
            identifier: item.identifier,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EpisodeImages {
    #[serde(default)]
    pub thumbnail: Vec<Vec<ImageItem>>,
}

/// Episode as returned by the season episode listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Display number, `null` for some specials
    #[serde(default)]
    pub episode: Option<String>,
    #[serde(default)]
    pub sequence_number: f64,
    #[serde(default)]
    pub slug_title: String,
    #[serde(default)]
    pub images: EpisodeImages,
    pub season_id: String,
}

impl From<EpisodeItem> for RemoteEpisode {
    fn from(item: EpisodeItem) -> Self {
        Self {
            thumbnail: best_image(&item.images.thumbnail),
            id: item.id,
            title: item.title,
            description: item.description,
            episode_number: item.episode.unwrap_or_default(),
            sequence_number: item.sequence_number,
            slug_title: item.slug_title,
            season_id: item.season_id,
        }
    }
}

/// Episode returned by the object endpoint; episode fields are nested
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub slug_title: String,
    #[serde(default)]
    pub images: EpisodeImages,
    pub episode_metadata: Option<EpisodeMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeMetadata {
    #[serde(default)]
    pub episode: Option<String>,
    #[serde(default)]
    pub sequence_number: f64,
    pub season_id: String,
}

impl ObjectItem {
    /// Convert when the object is an episode, `None` otherwise
    pub fn into_episode(self) -> Option<RemoteEpisode> {
        let metadata = self.episode_metadata?;
        Some(RemoteEpisode {
            thumbnail: best_image(&self.images.thumbnail),
            id: self.id,
            title: self.title,
            description: self.description,
            episode_number: metadata.episode.unwrap_or_default(),
            sequence_number: metadata.sequence_number,
            slug_title: self.slug_title,
            season_id: metadata.season_id,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeriesImages {
    #[serde(default)]
    pub poster_tall: Vec<Vec<ImageItem>>,
    #[serde(default)]
    pub poster_wide: Vec<Vec<ImageItem>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesItem {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub slug_title: String,
    #[serde(default)]
    pub content_provider: String,
    #[serde(default)]
    pub images: SeriesImages,
}

impl From<SeriesItem> for SeriesDetail {
    fn from(item: SeriesItem) -> Self {
        Self {
            poster_tall: best_image(&item.images.poster_tall),
            poster_wide: best_image(&item.images.poster_wide),
            title: item.title,
            description: item.description,
            slug_title: item.slug_title,
            studio: item.content_provider,
        }
    }
}

/// Rating summary; the average comes back as a string such as "4.8"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingResponse {
    pub average: String,
}

/// One bucket of search results, grouped by object type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchBucket {
    #[serde(rename = "type")]
    pub bucket_type: String,
    #[serde(default)]
    pub items: Vec<SearchItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchItem {
    pub id: String,
    pub title: String,
}
