//! Frame retrieval under bounded concurrency.
//!
//! [`fetch_frames`] runs at most `limit` fetches at once and returns frames
//! in input order no matter which finishes first. The first failure aborts
//! the batch; fetches still in flight are dropped.

mod backend;
mod http;
mod wget;

use std::future::Future;

use futures::stream::{FuturesUnordered, StreamExt};
use sino_core::reply::Lookup;
use tokio::sync::Semaphore;

use crate::error::FetchError;
use crate::frame::{FetchedFrame, FrameJob, Locator};

pub use backend::ConfiguredFetcher;
pub use http::HttpFetcher;
pub use wget::WgetFetcher;

/// Retrieves the raw bytes of one frame resource.
///
/// A resource that does not exist is `Ok(Lookup::NotFound)`; `Err` is
/// reserved for transport and tool failures.
pub trait FrameFetcher: Send + Sync {
    fn fetch(
        &self,
        locator: &Locator,
    ) -> impl Future<Output = Result<Lookup<Vec<u8>>, FetchError>> + Send;
}

/// Fetch every job with at most `limit` requests in flight.
///
/// A `limit` of zero is treated as one.
pub async fn fetch_frames<F>(
    fetcher: &F,
    jobs: &[FrameJob],
    limit: usize,
) -> Result<Vec<FetchedFrame>, FetchError>
where
    F: FrameFetcher,
{
    let semaphore = Semaphore::new(limit.max(1));
    let mut slots: Vec<Option<FetchedFrame>> = vec![None; jobs.len()];

    tracing::debug!(frames = jobs.len(), limit, "Fetching frames");

    let mut pending: FuturesUnordered<_> = jobs
        .iter()
        .enumerate()
        .map(|(slot, job)| {
            let semaphore = &semaphore;
            async move {
                let _permit = semaphore.acquire().await;
                (slot, job, fetcher.fetch(&job.locator).await)
            }
        })
        .collect();

    while let Some((slot, job, result)) = pending.next().await {
        match result {
            Ok(Lookup::Found(bytes)) => {
                tracing::trace!(index = job.index, bytes = bytes.len(), "Frame fetched");
                slots[slot] = Some(FetchedFrame::from_job(job, bytes));
            }
            Ok(Lookup::NotFound) => {
                tracing::warn!(index = job.index, locator = %job.locator, "Frame not found");
                return Err(FetchError::NotFound {
                    index: job.index,
                    locator: job.locator.to_string(),
                });
            }
            Err(e) => {
                tracing::warn!(index = job.index, locator = %job.locator, error = %e, "Frame fetch failed");
                return Err(e);
            }
        }
    }

    Ok(slots.into_iter().flatten().collect())
}

/// Read a local frame, mapping a missing file to [`Lookup::NotFound`].
pub(crate) async fn read_local(path: &std::path::Path) -> Result<Lookup<Vec<u8>>, FetchError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Lookup::Found(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Lookup::NotFound),
        Err(source) => Err(FetchError::Io {
            locator: path.display().to_string(),
            source,
        }),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    /// Scripted fetcher: each locator maps to a delay and an outcome.
    #[derive(Default)]
    pub struct ScriptedFetcher {
        responses: HashMap<String, (Duration, Option<Vec<u8>>)>,
        failures: HashMap<String, Duration>,
        in_flight: AtomicUsize,
        pub peak_in_flight: AtomicUsize,
        pub calls: AtomicUsize,
    }

    impl ScriptedFetcher {
        pub fn found(mut self, source: &str, delay_ms: u64, bytes: &[u8]) -> Self {
            self.responses.insert(
                source.to_owned(),
                (Duration::from_millis(delay_ms), Some(bytes.to_vec())),
            );
            self
        }

        pub fn missing(mut self, source: &str, delay_ms: u64) -> Self {
            self.responses
                .insert(source.to_owned(), (Duration::from_millis(delay_ms), None));
            self
        }

        pub fn failing(mut self, source: &str, delay_ms: u64) -> Self {
            self.failures
                .insert(source.to_owned(), Duration::from_millis(delay_ms));
            self
        }

        pub fn peak(&self) -> usize {
            self.peak_in_flight.load(Ordering::SeqCst)
        }
    }

    impl FrameFetcher for ScriptedFetcher {
        async fn fetch(&self, locator: &Locator) -> Result<Lookup<Vec<u8>>, FetchError> {
            let key = locator.to_string();
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

            let outcome = if let Some(delay) = self.failures.get(&key) {
                tokio::time::sleep(*delay).await;
                Err(FetchError::Status {
                    locator: key,
                    status: 500,
                })
            } else {
                match self.responses.get(&key) {
                    Some((delay, bytes)) => {
                        tokio::time::sleep(*delay).await;
                        Ok(bytes.clone().into())
                    }
                    None => Ok(Lookup::NotFound),
                }
            };

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            outcome
        }
    }
}
