//! Per-key, non-blocking mutual exclusion for sync runs.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Registry of keys with a sync in flight
#[derive(Debug, Clone, Default)]
pub struct ScrapLocks {
    held: Arc<Mutex<HashSet<String>>>,
}

impl ScrapLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock for `key` without waiting.
    ///
    /// Returns `None` when another caller holds it. The lock is released when
    /// the returned guard is dropped.
    pub fn try_acquire(&self, key: &str) -> Option<ScrapLock> {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        if !held.insert(key.to_string()) {
            debug!(key = key, "Scrap lock already held");
            return None;
        }

        Some(ScrapLock {
            key: key.to_string(),
            held: self.held.clone(),
        })
    }

    pub fn is_held(&self, key: &str) -> bool {
        self.held
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(key)
    }
}

/// Held lock for one key
#[derive(Debug)]
pub struct ScrapLock {
    key: String,
    held: Arc<Mutex<HashSet<String>>>,
}

impl Drop for ScrapLock {
    fn drop(&mut self) {
        self.held
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.key);
    }
}
