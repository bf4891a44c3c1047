//! Persistence contract for the cached catalog tree and archived records.

use crate::error::{Result, ScrapError};
use shared::{ChangeSet, Comment, MetadataRepository, Review, TitleMetadata};

/// Cached metadata storage with staged writes.
///
/// `add_*` methods stage into the caller's [`ChangeSet`]; nothing is visible
/// to readers until [`MetadataStore::save_changes`] commits that set.
pub trait MetadataStore: Send + Sync {
    fn get_title_metadata(&self, series_id: &str, language: &str)
        -> Result<Option<TitleMetadata>>;

    fn add_or_update_title_metadata(
        &self,
        changes: &mut ChangeSet,
        title: &TitleMetadata,
    ) -> Result<()>;

    fn reviews_exist(&self, title_id: &str) -> Result<bool>;

    fn add_reviews(
        &self,
        changes: &mut ChangeSet,
        title_id: &str,
        language: &str,
        reviews: &[Review],
    ) -> Result<()>;

    fn comments_exist(&self, episode_id: &str) -> Result<bool>;

    fn add_comments(
        &self,
        changes: &mut ChangeSet,
        episode_id: &str,
        language: &str,
        comments: &[Comment],
    ) -> Result<()>;

    fn save_changes(&self, changes: ChangeSet) -> Result<()>;
}

impl MetadataStore for MetadataRepository {
    fn get_title_metadata(
        &self,
        series_id: &str,
        language: &str,
    ) -> Result<Option<TitleMetadata>> {
        MetadataRepository::get_title_metadata(self, series_id, language)
            .map_err(ScrapError::Persistence)
    }

    fn add_or_update_title_metadata(
        &self,
        changes: &mut ChangeSet,
        title: &TitleMetadata,
    ) -> Result<()> {
        changes.add_or_update_title_metadata(title);
        Ok(())
    }

    fn reviews_exist(&self, title_id: &str) -> Result<bool> {
        MetadataRepository::reviews_exist(self, title_id).map_err(ScrapError::Persistence)
    }

    fn add_reviews(
        &self,
        changes: &mut ChangeSet,
        title_id: &str,
        language: &str,
        reviews: &[Review],
    ) -> Result<()> {
        changes.add_reviews(title_id, language, reviews);
        Ok(())
    }

    fn comments_exist(&self, episode_id: &str) -> Result<bool> {
        MetadataRepository::comments_exist(self, episode_id).map_err(ScrapError::Persistence)
    }

    fn add_comments(
        &self,
        changes: &mut ChangeSet,
        episode_id: &str,
        language: &str,
        comments: &[Comment],
    ) -> Result<()> {
        changes.add_comments(episode_id, language, comments);
        Ok(())
    }

    fn save_changes(&self, changes: ChangeSet) -> Result<()> {
        MetadataRepository::save_changes(self, changes)
            .map(|_| ())
            .map_err(ScrapError::Persistence)
    }
}
