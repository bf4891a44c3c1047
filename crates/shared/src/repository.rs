//! Metadata repository over the SQLite database.
//!
//! Writes are collected in a [`ChangeSet`] owned by the operation producing
//! them and committed together by [`MetadataRepository::save_changes`], so a
//! caller can fail between the two steps without leaving half a batch on
//! disk, and concurrent operations never commit each other's writes.

use crate::models::*;
use crate::Database;
use anyhow::{anyhow, Context, Result};
use rusqlite::{params, OptionalExtension};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Write waiting in a [`ChangeSet`]
#[derive(Debug, Clone)]
pub enum PendingWrite {
    Title(TitleMetadata),
    Reviews {
        title_id: String,
        language: String,
        reviews: Vec<Review>,
    },
    Comments {
        episode_id: String,
        language: String,
        comments: Vec<Comment>,
    },
}

/// Unit of work of a single operation
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    writes: Vec<PendingWrite>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an insert-or-replace of a title tree
    pub fn add_or_update_title_metadata(&mut self, title: &TitleMetadata) {
        debug!(crunchyroll_id = %title.crunchyroll_id, "Staged title metadata");
        self.writes.push(PendingWrite::Title(title.clone()));
    }

    /// Stage the reviews extracted for a title
    pub fn add_reviews(&mut self, title_id: &str, language: &str, reviews: &[Review]) {
        self.writes.push(PendingWrite::Reviews {
            title_id: title_id.to_string(),
            language: language.to_string(),
            reviews: reviews.to_vec(),
        });
    }

    /// Stage the comments extracted for an episode
    pub fn add_comments(&mut self, episode_id: &str, language: &str, comments: &[Comment]) {
        self.writes.push(PendingWrite::Comments {
            episode_id: episode_id.to_string(),
            language: language.to_string(),
            comments: comments.to_vec(),
        });
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn into_writes(self) -> Vec<PendingWrite> {
        self.writes
    }
}

/// Repository for cached titles and archived page records
pub struct MetadataRepository {
    db: Mutex<Database>,
}

impl MetadataRepository {
    /// Create a new repository with the given database
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    fn db(&self) -> Result<MutexGuard<'_, Database>> {
        self.db.lock().map_err(|_| anyhow!("Database mutex poisoned"))
    }

    /// Load the cached tree for a title, if one was ever synced
    pub fn get_title_metadata(
        &self,
        crunchyroll_id: &str,
        language: &str,
    ) -> Result<Option<TitleMetadata>> {
        let db = self.db()?;

        let title = db
            .conn()
            .query_row(
                "SELECT crunchyroll_id, language, title, description, slug_title, studio,
                        rating, poster_tall, poster_wide, seasons, last_synced_at
                 FROM title_metadata WHERE crunchyroll_id = ?1 AND language = ?2",
                params![crunchyroll_id, language],
                row_to_title,
            )
            .optional()
            .context("Failed to query title metadata")?;

        match title {
            Some(row) => Ok(Some(row.decode()?)),
            None => Ok(None),
        }
    }

    /// Whether reviews were already extracted for a title
    pub fn reviews_exist(&self, title_id: &str) -> Result<bool> {
        let db = self.db()?;
        let count: i64 = db
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM title_reviews WHERE title_id = ?1",
                params![title_id],
                |row| row.get(0),
            )
            .context("Failed to query reviews")?;
        Ok(count > 0)
    }

    /// Load stored reviews for a title
    pub fn get_reviews(&self, title_id: &str) -> Result<Option<Vec<Review>>> {
        let db = self.db()?;
        let json: Option<String> = db
            .conn()
            .query_row(
                "SELECT reviews FROM title_reviews WHERE title_id = ?1",
                params![title_id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query reviews")?;

        json.map(|j| serde_json::from_str(&j).context("Failed to decode stored reviews"))
            .transpose()
    }

    /// Whether comments were already extracted for an episode
    pub fn comments_exist(&self, episode_id: &str) -> Result<bool> {
        let db = self.db()?;
        let count: i64 = db
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM episode_comments WHERE episode_id = ?1",
                params![episode_id],
                |row| row.get(0),
            )
            .context("Failed to query comments")?;
        Ok(count > 0)
    }

    /// Load stored comments for an episode
    pub fn get_comments(&self, episode_id: &str) -> Result<Option<Vec<Comment>>> {
        let db = self.db()?;
        let json: Option<String> = db
            .conn()
            .query_row(
                "SELECT comments FROM episode_comments WHERE episode_id = ?1",
                params![episode_id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query comments")?;

        json.map(|j| serde_json::from_str(&j).context("Failed to decode stored comments"))
            .transpose()
    }

    /// Commit the writes of `changes` in one transaction
    ///
    /// Returns the number of writes committed. Nothing is written when the
    /// transaction fails.
    pub fn save_changes(&self, changes: ChangeSet) -> Result<usize> {
        let writes = changes.into_writes();
        if writes.is_empty() {
            return Ok(0);
        }

        let mut db = self.db()?;
        let tx = db
            .conn_mut()
            .transaction()
            .context("Failed to begin transaction")?;

        for write in &writes {
            match write {
                PendingWrite::Title(title) => {
                    tx.execute(
                        "INSERT OR REPLACE INTO title_metadata (
                            crunchyroll_id, language, title, description, slug_title, studio,
                            rating, poster_tall, poster_wide, seasons, last_synced_at
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                        params![
                            title.crunchyroll_id,
                            title.language,
                            title.title,
                            title.description,
                            title.slug_title,
                            title.studio,
                            title.rating as f64,
                            serde_json::to_string(&title.poster_tall)?,
                            serde_json::to_string(&title.poster_wide)?,
                            serde_json::to_string(&title.seasons)?,
                            title.last_synced_at,
                        ],
                    )
                    .context("Failed to write title metadata")?;
                }
                PendingWrite::Reviews {
                    title_id,
                    language,
                    reviews,
                } => {
                    tx.execute(
                        "INSERT OR REPLACE INTO title_reviews (title_id, language, reviews)
                         VALUES (?1, ?2, ?3)",
                        params![title_id, language, serde_json::to_string(reviews)?],
                    )
                    .context("Failed to write reviews")?;
                }
                PendingWrite::Comments {
                    episode_id,
                    language,
                    comments,
                } => {
                    tx.execute(
                        "INSERT OR REPLACE INTO episode_comments (episode_id, language, comments)
                         VALUES (?1, ?2, ?3)",
                        params![episode_id, language, serde_json::to_string(comments)?],
                    )
                    .context("Failed to write comments")?;
                }
            }
        }

        tx.commit().context("Failed to commit staged writes")?;
        debug!(writes = writes.len(), "Saved changes");

        Ok(writes.len())
    }

    /// Get repository statistics
    pub fn get_stats(&self) -> Result<RepositoryStats> {
        let db = self.db()?;
        let conn = db.conn();

        let count = |sql: &str| -> Result<usize> {
            let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as usize)
        };

        let stats = RepositoryStats {
            titles: count("SELECT COUNT(*) FROM title_metadata")?,
            titles_with_reviews: count("SELECT COUNT(*) FROM title_reviews")?,
            episodes_with_comments: count("SELECT COUNT(*) FROM episode_comments")?,
        };

        info!(
            titles = stats.titles,
            reviews = stats.titles_with_reviews,
            comments = stats.episodes_with_comments,
            "Repository statistics"
        );

        Ok(stats)
    }
}

/// Raw title row before its JSON columns are decoded
struct TitleRow {
    crunchyroll_id: String,
    language: String,
    title: String,
    description: String,
    slug_title: String,
    studio: String,
    rating: f64,
    poster_tall: String,
    poster_wide: String,
    seasons: String,
    last_synced_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl TitleRow {
    fn decode(self) -> Result<TitleMetadata> {
        Ok(TitleMetadata {
            poster_tall: serde_json::from_str(&self.poster_tall)
                .context("Failed to decode poster_tall")?,
            poster_wide: serde_json::from_str(&self.poster_wide)
                .context("Failed to decode poster_wide")?,
            seasons: serde_json::from_str(&self.seasons).context("Failed to decode seasons")?,
            crunchyroll_id: self.crunchyroll_id,
            language: self.language,
            title: self.title,
            description: self.description,
            slug_title: self.slug_title,
            studio: self.studio,
            rating: self.rating as f32,
            last_synced_at: self.last_synced_at,
        })
    }
}

fn row_to_title(row: &rusqlite::Row) -> rusqlite::Result<TitleRow> {
    Ok(TitleRow {
        crunchyroll_id: row.get(0)?,
        language: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        slug_title: row.get(4)?,
        studio: row.get(5)?,
        rating: row.get(6)?,
        poster_tall: row.get(7)?,
        poster_wide: row.get(8)?,
        seasons: row.get(9)?,
        last_synced_at: row.get(10)?,
    })
}

/// Repository statistics
#[derive(Debug, Clone)]
pub struct RepositoryStats {
    pub titles: usize,
    pub titles_with_reviews: usize,
    pub episodes_with_comments: usize,
}
