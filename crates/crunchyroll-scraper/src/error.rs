//! Error taxonomy shared by the resolver, sync engine and archive retriever.
//!
//! "No match" is never an error: lookups return `Ok(None)` for that case and
//! reserve [`ScrapError`] for failures.

use std::future::Future;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum ScrapError {
    /// Entity absent from the cached catalog
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resolution impossible with the inputs given
    #[error("Not allowed: {0}")]
    NotAllowed(String),

    /// Transport-level failure talking to a remote service
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Payload received but not decodable
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Archived page present but not in a recognizable format
    #[error("Invalid page: {0}")]
    InvalidPage(String),

    /// Unexpected or ambiguous state
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Persistence failure: {0:#}")]
    Persistence(#[source] anyhow::Error),
}

impl ScrapError {
    /// Failures the archive retriever answers by trying an older snapshot
    pub fn is_retryable_snapshot_failure(&self) -> bool {
        matches!(self, ScrapError::RequestFailed(_) | ScrapError::InvalidPage(_))
    }
}

pub type Result<T> = std::result::Result<T, ScrapError>;

/// Await a remote call unless the token fires first.
///
/// The losing future is dropped, which aborts the in-flight request.
pub async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ScrapError::Cancelled),
        result = fut => result,
    }
}

/// Fail with [`ScrapError::Cancelled`] if the token already fired
pub fn ensure_not_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(ScrapError::Cancelled)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancellable_passes_result_through() {
        let cancel = CancellationToken::new();
        let value = cancellable(&cancel, async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_cancellable_aborts_pending_call() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let result: Result<()> = cancellable(&cancel, async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(ScrapError::Cancelled)));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ScrapError::RequestFailed("timeout".into()).is_retryable_snapshot_failure());
        assert!(ScrapError::InvalidPage("layout".into()).is_retryable_snapshot_failure());
        assert!(!ScrapError::Internal("boom".into()).is_retryable_snapshot_failure());
        assert!(!ScrapError::Cancelled.is_retryable_snapshot_failure());
    }
}
