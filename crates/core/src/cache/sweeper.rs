//! Owned background task that periodically enforces a cache's size bound.
//!
//! The sweep is tied to its [`CacheSweeper`] handle: dropping the handle or
//! calling [`CacheSweeper::shutdown`] cancels the task, so it never outlives
//! the component that started it.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{BoundedCache, CacheValue};

/// Handle to a running sweep task.
pub struct CacheSweeper {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl CacheSweeper {
    /// Spawn a sweep over `cache` every `interval`.
    ///
    /// `parent` lets the owner cancel the sweep together with its other
    /// background work; the sweep runs on a child token of it.
    pub fn spawn<K, V>(
        cache: Arc<BoundedCache<K, V>>,
        interval: Duration,
        parent: &CancellationToken,
    ) -> Self
    where
        K: Eq + Hash + Clone + Send + 'static,
        V: CacheValue,
    {
        let cancel = parent.child_token();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            tracing::debug!(interval_secs = interval.as_secs(), "Cache sweeper started");
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        tracing::debug!("Cache sweeper stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        let evicted = cache.sweep();
                        if evicted > 0 {
                            tracing::info!(evicted, "Cache sweep evicted entries");
                        }
                    }
                }
            }
        });

        Self {
            cancel,
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Cancel the sweep and wait for the task to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Cache sweeper task ended abnormally");
            }
        }
    }
}

impl Drop for CacheSweeper {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
