//! Data models for the project.
//!
//! This module defines the cached catalog tree (title → seasons → episodes)
//! and the archived page records (reviews, comments) attached to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Entity addressed by its catalog id
pub trait Keyed {
    fn key(&self) -> &str;
}

/// Ordered child collection indexed by catalog id.
///
/// Entries can be inserted or updated in place but never removed, so a merge
/// against a partial remote listing cannot drop previously resolved entities.
/// Mutable access is by id only; callers must not change an entry's id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<T>", into = "Vec<T>")]
pub struct Children<T: Keyed + Clone> {
    items: Vec<T>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl<T: Keyed + Clone> Children<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.index.get(id).map(|&i| &self.items[i])
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        match self.index.get(id) {
            Some(&i) => Some(&mut self.items[i]),
            None => None,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Append `item` unless an entry with the same id exists.
    ///
    /// Returns the stored entry and whether it was newly inserted.
    pub fn insert_if_absent(&mut self, item: T) -> (&mut T, bool) {
        if let Some(&i) = self.index.get(item.key()) {
            return (&mut self.items[i], false);
        }
        let i = self.items.len();
        self.index.insert(item.key().to_string(), i);
        self.items.push(item);
        (&mut self.items[i], true)
    }
}

impl<T: Keyed + Clone> Default for Children<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Keyed + Clone> From<Vec<T>> for Children<T> {
    fn from(items: Vec<T>) -> Self {
        let mut children = Self::new();
        for item in items {
            children.insert_if_absent(item);
        }
        children
    }
}

impl<T: Keyed + Clone> From<Children<T>> for Vec<T> {
    fn from(children: Children<T>) -> Self {
        children.items
    }
}

impl<'a, T: Keyed + Clone> IntoIterator for &'a Children<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Image reference with its pixel size
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageSource {
    pub uri: String,
    pub width: u32,
    pub height: u32,
}

/// Cached series metadata, identified by (crunchyroll_id, language)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleMetadata {
    pub crunchyroll_id: String,
    pub language: String,
    pub title: String,
    pub description: String,
    pub slug_title: String,
    pub studio: String,
    pub rating: f32,
    pub poster_tall: ImageSource,
    pub poster_wide: ImageSource,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub seasons: Children<Season>,
}

impl TitleMetadata {
    /// Empty record for a title that has never been synced
    pub fn new(crunchyroll_id: &str, language: &str) -> Self {
        Self {
            crunchyroll_id: crunchyroll_id.to_string(),
            language: language.to_string(),
            title: String::new(),
            description: String::new(),
            slug_title: String::new(),
            studio: String::new(),
            rating: 0.0,
            poster_tall: ImageSource::default(),
            poster_wide: ImageSource::default(),
            last_synced_at: None,
            seasons: Children::new(),
        }
    }

    /// Whether any season of this title holds the given episode
    pub fn contains_episode(&self, episode_id: &str) -> bool {
        self.seasons.iter().any(|s| s.episodes.contains(episode_id))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Season {
    pub id: String,
    pub title: String,
    pub slug_title: String,
    pub season_number: i32,
    /// Remote ordering key; differs from `season_number` for duplicated numbers
    pub season_sequence_number: i32,
    pub season_display_number: String,
    pub identifier: String,
    pub language: String,
    pub episodes: Children<Episode>,
}

impl Season {
    /// Season holding only its id, before the listing has been fetched
    pub fn shell(id: &str, language: &str) -> Self {
        Self {
            id: id.to_string(),
            title: String::new(),
            slug_title: String::new(),
            season_number: 0,
            season_sequence_number: 0,
            season_display_number: String::new(),
            identifier: String::new(),
            language: language.to_string(),
            episodes: Children::new(),
        }
    }
}

impl Keyed for Season {
    fn key(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Display number, may be empty or non-numeric ("SP", "FMI1")
    pub episode_number: String,
    /// Half-integer values place specials between numbered episodes
    pub sequence_number: f64,
    pub slug_title: String,
    pub thumbnail: ImageSource,
    pub language: String,
}

impl Keyed for Episode {
    fn key(&self) -> &str {
        &self.id
    }
}

/// Review extracted from an archived series page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub author: ReviewAuthor,
    pub title: String,
    pub body: String,
    pub rating: ReviewRating,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewAuthor {
    pub username: String,
    pub avatar_uri: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewRating {
    pub likes: i32,
    pub dislikes: i32,
    pub total: i32,
    /// Star rating as shown on the page, e.g. "5s"
    pub author_rating: String,
}

/// Comment extracted from an archived episode page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub author: String,
    pub avatar_icon_uri: String,
    pub message: String,
    pub likes: i32,
    pub replies_count: i32,
    pub created_at: Option<DateTime<Utc>>,
}
