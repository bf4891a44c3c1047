//! Crunchyroll metadata scraper library.
//!
//! Resolves local library names into catalog ids, keeps a cached copy of
//! each series' season and episode tree, and recovers archived reviews and
//! comments from the Wayback Machine.

pub mod api;
pub mod archive;
pub mod avatar;
pub mod catalog;
pub mod error;
pub mod lock;
pub mod resolver;
pub mod scan;
pub mod store;
pub mod sync;

#[cfg(test)]
mod testing;

pub use api::{CrunchyrollClient, RateLimiter};
pub use archive::{ArchiveRetriever, ArchiveSettings, RetrievalOutcome, WaybackClient};
pub use avatar::FileAvatarCache;
pub use catalog::CatalogClient;
pub use error::{Result, ScrapError};
pub use lock::ScrapLocks;
pub use resolver::IdResolver;
pub use scan::{HostItemStore, ScanItem, ScanPipeline, ScanStats};
pub use store::MetadataStore;
pub use sync::SyncEngine;
