//! Recovery of historical review and comment pages from a web archive.

pub mod retriever;
pub mod wayback;

pub use retriever::{ArchiveRetriever, ArchiveSettings, RetrievalOutcome};
pub use wayback::WaybackClient;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use shared::{Comment, Review};

pub const SNAPSHOT_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// One capture of a URL held by the archive
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub timestamp: NaiveDateTime,
    pub mime_type: String,
    pub status_code: Option<u16>,
}

impl Snapshot {
    /// Address of this capture of `url` under the archive's web prefix
    pub fn archive_url(&self, web_url: &str, url: &str) -> String {
        format!(
            "{}/{}/{}",
            web_url.trim_end_matches('/'),
            self.timestamp.format(SNAPSHOT_TIMESTAMP_FORMAT),
            url
        )
    }
}

#[async_trait]
pub trait ArchiveSearch: Send + Sync {
    /// All captures of `url` taken up to `before`
    async fn search(&self, url: &str, before: NaiveDate) -> Result<Vec<Snapshot>>;
}

/// Parses archived pages.
///
/// Implementations report a page they cannot read as
/// [`crate::error::ScrapError::InvalidPage`] and transport problems as
/// [`crate::error::ScrapError::RequestFailed`]; both make the retriever move
/// on to an older capture.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    async fn extract_reviews(&self, snapshot_url: &str, language: &str) -> Result<Vec<Review>>;

    async fn extract_comments(&self, snapshot_url: &str, language: &str) -> Result<Vec<Comment>>;
}

#[async_trait]
pub trait AvatarCache: Send + Sync {
    /// Store the image at `uri` locally unless already present; returns the
    /// URI to record
    async fn cache_if_absent(&self, uri: &str) -> Result<String>;
}

/// Extracted record carrying an author avatar
pub trait ArchivedRecord: Send {
    fn avatar_uri_mut(&mut self) -> &mut String;
}

impl ArchivedRecord for Review {
    fn avatar_uri_mut(&mut self) -> &mut String {
        &mut self.author.avatar_uri
    }
}

impl ArchivedRecord for Comment {
    fn avatar_uri_mut(&mut self) -> &mut String {
        &mut self.avatar_icon_uri
    }
}

/// Upstream URL of a resource served through the archive.
///
/// `https://web.archive.org/web/20200101000000im_/https://img/a.png` becomes
/// `https://img/a.png`; URIs outside `web_url` yield `None`.
pub fn unarchive_url(web_url: &str, uri: &str) -> Option<String> {
    let prefix = strip_scheme(web_url.trim_end_matches('/'));
    let rest = strip_scheme(uri).strip_prefix(prefix)?.strip_prefix('/')?;
    let (timestamp, original) = rest.split_once('/')?;

    if !timestamp.starts_with(|c: char| c.is_ascii_digit()) || !original.starts_with("http") {
        return None;
    }
    Some(original.to_string())
}

/// Page URL on the catalog's website; English pages carry no locale segment
pub fn canonical_url(site_url: &str, language: &str, kind: &str, id: &str, slug: &str) -> String {
    let site_url = site_url.trim_end_matches('/');
    let slug = urlencoding::encode(slug);
    match locale_segment(language) {
        Some(locale) => format!("{}/{}/{}/{}/{}", site_url, locale, kind, id, slug),
        None => format!("{}/{}/{}/{}", site_url, kind, id, slug),
    }
}

fn locale_segment(language: &str) -> Option<String> {
    let code = language
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    (!code.is_empty() && code != "en").then_some(code)
}

fn strip_scheme(url: &str) -> &str {
    url.split_once("://").map_or(url, |(_, rest)| rest)
}
