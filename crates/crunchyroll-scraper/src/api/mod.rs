//! Catalog CMS API client implementation.
//!
//! This module provides a rate-limited, retry-enabled client for the remote
//! catalog, implementing [`crate::catalog::CatalogClient`].

pub mod client;
pub mod rate_limiter;
pub mod types;

pub use client::CrunchyrollClient;
pub use rate_limiter::RateLimiter;
