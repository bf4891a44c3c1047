//! Resolution of local folder and file names into catalog ids.
//!
//! Every resolution answers `Ok(Some(id))`, `Ok(None)` when nothing matches,
//! or an error when a lookup could not be carried out.

pub mod lookup;
pub mod names;

use crate::catalog::CatalogClient;
use crate::error::{cancellable, Result, ScrapError};
use crate::store::MetadataStore;
use crate::sync::SyncEngine;
use shared::TitleMetadata;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct IdResolver {
    catalog: Arc<dyn CatalogClient>,
    store: Arc<dyn MetadataStore>,
    sync: Arc<SyncEngine>,
}

impl IdResolver {
    pub fn new(
        catalog: Arc<dyn CatalogClient>,
        store: Arc<dyn MetadataStore>,
        sync: Arc<SyncEngine>,
    ) -> Self {
        Self {
            catalog,
            store,
            sync,
        }
    }

    /// Series id for a series folder.
    ///
    /// A `[CrunchyrollId-<id>]` tag in the path is returned as is; otherwise
    /// the catalog is searched with the normalized folder name.
    pub async fn resolve_title_id(
        &self,
        name: &str,
        path: &str,
        language: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        if let Some(id) = names::title_id_from_path(path) {
            debug!(path = path, series_id = %id, "Series id pinned by path tag");
            return Ok(Some(id));
        }

        let search_name = names::normalize_series_name(name);
        if search_name.is_empty() {
            return Err(ScrapError::NotAllowed(format!(
                "series folder '{}' has no searchable name",
                name
            )));
        }

        let found = cancellable(cancel, self.catalog.search_series_id(&search_name, language)).await?;
        info!(name = %search_name, series_id = ?found, "Series search finished");
        Ok(found)
    }

    /// Season id for a season folder of `series_id`
    pub async fn resolve_season_id(
        &self,
        series_id: &str,
        folder_name: &str,
        index_number: Option<i32>,
        language: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        let key = names::season_search_key(folder_name);
        let title = self.cached_title(series_id, language)?;

        if let Some(key) = &key {
            if let Some(id) = title.as_ref().and_then(|t| lookup::season_id_by_name(t, key)) {
                debug!(series_id = series_id, key = %key, season_id = %id, "Season matched by name");
                return Ok(Some(id));
            }
        }

        let Some(number) = index_number else {
            return Err(match key {
                Some(key) => ScrapError::Internal(format!(
                    "no season named '{}' in series {} and no season number to fall back on",
                    key, series_id
                )),
                None => ScrapError::NotAllowed(format!(
                    "season folder '{}' has neither a title nor a season number",
                    folder_name
                )),
            });
        };

        if let Some(id) = title.as_ref().and_then(|t| lookup::season_id_by_number(t, number)) {
            debug!(series_id = series_id, number = number, season_id = %id, "Season matched by number");
            return Ok(Some(id));
        }

        let seasons = cancellable(cancel, self.catalog.get_seasons(series_id, language)).await?;
        let found = seasons
            .into_iter()
            .find(|s| s.season_number == number)
            .map(|s| s.id);
        debug!(series_id = series_id, number = number, season_id = ?found, "Season list scanned");
        Ok(found)
    }

    /// Episode id for a file inside season `season_id` of `series_id`
    pub async fn resolve_episode_id(
        &self,
        season_id: &str,
        series_id: &str,
        file_name: &str,
        index_number: Option<i32>,
        language: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        let index_number = index_number.filter(|_| !names::has_fractional_episode_number(file_name));

        let Some(number) = index_number else {
            let title = self.cached_title(series_id, language)?;
            let Some(title) = title else {
                return Ok(None);
            };
            return Ok(match names::extract_episode_identifier(file_name) {
                Some(identifier) => lookup::episode_id_by_identifier(&title, season_id, &identifier),
                None => lookup::episode_id_by_name(&title, season_id, file_name),
            });
        };

        let identifier = number.to_string();
        let title = self.cached_title(series_id, language)?;
        if let Some(id) = title
            .as_ref()
            .and_then(|t| lookup::episode_id_by_identifier(t, season_id, &identifier))
        {
            return Ok(Some(id));
        }

        let Some(duplicate) = title
            .as_ref()
            .and_then(|t| lookup::duplicate_next_season_id(t, season_id))
        else {
            return Ok(None);
        };

        debug!(
            season_id = season_id,
            duplicate_season_id = %duplicate,
            episode = %identifier,
            "Episode not found, trying duplicate season"
        );
        self.sync
            .sync_season_episodes(series_id, &duplicate, language, cancel)
            .await?;

        let title = self.cached_title(series_id, language)?;
        Ok(title.and_then(|t| lookup::episode_id_by_identifier(&t, &duplicate, &identifier)))
    }

    fn cached_title(&self, series_id: &str, language: &str) -> Result<Option<TitleMetadata>> {
        self.store.get_title_metadata(series_id, language)
    }
}
