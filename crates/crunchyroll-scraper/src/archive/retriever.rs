//! Archived review and comment retrieval.

use super::{canonical_url, unarchive_url, ArchiveSearch, ArchivedRecord, AvatarCache, ContentExtractor};
use crate::error::{cancellable, ensure_not_cancelled, Result};
use crate::store::MetadataStore;
use chrono::NaiveDate;
use shared::config::{ArchiveConfig, CrunchyrollConfig};
use shared::ChangeSet;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Where pages live and which captures may be used
#[derive(Debug, Clone)]
pub struct ArchiveSettings {
    /// Catalog website, used to build canonical page URLs
    pub site_url: String,
    /// Archive prefix snapshot URLs are built under
    pub web_url: String,
    /// Only captures taken up to this date are considered
    pub cutoff_date: NaiveDate,
}

impl ArchiveSettings {
    pub fn from_config(crunchyroll: &CrunchyrollConfig, archive: &ArchiveConfig) -> Self {
        Self {
            site_url: crunchyroll.base_url.clone(),
            web_url: archive.web_url.clone(),
            cutoff_date: archive.cutoff_date,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalOutcome {
    /// Records were already stored for the entity; nothing was fetched
    AlreadyStored,
    /// Records were extracted (possibly none) and stored
    Stored { records: usize },
}

pub struct ArchiveRetriever {
    search: Arc<dyn ArchiveSearch>,
    extractor: Arc<dyn ContentExtractor>,
    avatars: Arc<dyn AvatarCache>,
    store: Arc<dyn MetadataStore>,
    settings: ArchiveSettings,
}

impl ArchiveRetriever {
    pub fn new(
        search: Arc<dyn ArchiveSearch>,
        extractor: Arc<dyn ContentExtractor>,
        avatars: Arc<dyn AvatarCache>,
        store: Arc<dyn MetadataStore>,
        settings: ArchiveSettings,
    ) -> Self {
        Self {
            search,
            extractor,
            avatars,
            store,
            settings,
        }
    }

    /// Store the archived reviews of a series page, once per series
    pub async fn retrieve_archived_reviews(
        &self,
        title_id: &str,
        slug: &str,
        language: &str,
        cancel: &CancellationToken,
    ) -> Result<RetrievalOutcome> {
        if self.store.reviews_exist(title_id)? {
            debug!(title_id = title_id, "Reviews already stored");
            return Ok(RetrievalOutcome::AlreadyStored);
        }

        let url = canonical_url(&self.settings.site_url, language, "series", title_id, slug);
        let extractor = &self.extractor;
        let mut reviews = self
            .first_readable_snapshot(&url, cancel, |snapshot_url| async move {
                extractor.extract_reviews(&snapshot_url, language).await
            })
            .await?;
        self.relink_avatars(&mut reviews).await;

        ensure_not_cancelled(cancel)?;
        let mut changes = ChangeSet::new();
        self.store.add_reviews(&mut changes, title_id, language, &reviews)?;
        self.store.save_changes(changes)?;

        info!(title_id = title_id, reviews = reviews.len(), "Archived reviews stored");
        Ok(RetrievalOutcome::Stored {
            records: reviews.len(),
        })
    }

    /// Store the archived comments of an episode page, once per episode
    pub async fn retrieve_archived_comments(
        &self,
        episode_id: &str,
        slug: &str,
        language: &str,
        cancel: &CancellationToken,
    ) -> Result<RetrievalOutcome> {
        if self.store.comments_exist(episode_id)? {
            debug!(episode_id = episode_id, "Comments already stored");
            return Ok(RetrievalOutcome::AlreadyStored);
        }

        let url = canonical_url(&self.settings.site_url, language, "watch", episode_id, slug);
        let extractor = &self.extractor;
        let mut comments = self
            .first_readable_snapshot(&url, cancel, |snapshot_url| async move {
                extractor.extract_comments(&snapshot_url, language).await
            })
            .await?;
        self.relink_avatars(&mut comments).await;

        ensure_not_cancelled(cancel)?;
        let mut changes = ChangeSet::new();
        self.store.add_comments(&mut changes, episode_id, language, &comments)?;
        self.store.save_changes(changes)?;

        info!(episode_id = episode_id, comments = comments.len(), "Archived comments stored");
        Ok(RetrievalOutcome::Stored {
            records: comments.len(),
        })
    }

    /// Extract from the newest capture that can be read.
    ///
    /// Transport and page-format failures move on to the next older capture;
    /// any other failure ends the search. No capture at all, or none readable,
    /// yields an empty list.
    async fn first_readable_snapshot<T, F, Fut>(
        &self,
        url: &str,
        cancel: &CancellationToken,
        extract: F,
    ) -> Result<Vec<T>>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<Vec<T>>>,
    {
        let mut snapshots = cancellable(cancel, self.search.search(url, self.settings.cutoff_date)).await?;
        if snapshots.is_empty() {
            debug!(url = url, "No archived snapshots");
            return Ok(Vec::new());
        }
        snapshots.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        for snapshot in &snapshots {
            let snapshot_url = snapshot.archive_url(&self.settings.web_url, url);
            match cancellable(cancel, extract(snapshot_url.clone())).await {
                Ok(records) => {
                    debug!(url = %snapshot_url, records = records.len(), "Snapshot extracted");
                    return Ok(records);
                }
                Err(e) if e.is_retryable_snapshot_failure() => {
                    debug!(url = %snapshot_url, error = %e, "Snapshot unusable, trying older one");
                }
                Err(e) => return Err(e),
            }
        }

        warn!(url = url, snapshots = snapshots.len(), "No readable snapshot");
        Ok(Vec::new())
    }

    async fn relink_avatars<R: ArchivedRecord>(&self, records: &mut [R]) {
        for record in records.iter_mut() {
            let uri = record.avatar_uri_mut();
            if uri.is_empty() {
                continue;
            }
            if let Some(original) = unarchive_url(&self.settings.web_url, uri) {
                *uri = original;
            }

            match self.avatars.cache_if_absent(uri).await {
                Ok(cached) => *uri = cached,
                Err(e) => debug!(uri = %uri, error = %e, "Avatar not cached"),
            }
        }
    }
}
