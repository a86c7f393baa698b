//! Fetcher chosen at startup from [`FetchBackend`].

use sino_core::config::{FetchBackend, OrchestratorConfig};
use sino_core::process::ProcessGateway;
use sino_core::reply::Lookup;

use super::{FrameFetcher, HttpFetcher, WgetFetcher};
use crate::error::FetchError;
use crate::frame::Locator;

#[derive(Debug, Clone)]
pub enum ConfiguredFetcher {
    Http(HttpFetcher),
    Wget(WgetFetcher),
}

impl ConfiguredFetcher {
    /// Build the fetcher named by `config.fetch_backend`. `gateway` runs
    /// `wget` and is unused for HTTP.
    pub fn from_config(
        config: &OrchestratorConfig,
        gateway: ProcessGateway,
    ) -> Result<Self, FetchError> {
        tracing::debug!(backend = %config.fetch_backend, "Selecting frame fetcher");
        match config.fetch_backend {
            FetchBackend::Http => HttpFetcher::from_config(config).map(Self::Http),
            FetchBackend::Wget => Ok(Self::Wget(WgetFetcher::from_config(config, gateway))),
        }
    }

    pub fn backend(&self) -> FetchBackend {
        match self {
            Self::Http(_) => FetchBackend::Http,
            Self::Wget(_) => FetchBackend::Wget,
        }
    }
}

impl FrameFetcher for ConfiguredFetcher {
    async fn fetch(&self, locator: &Locator) -> Result<Lookup<Vec<u8>>, FetchError> {
        match self {
            Self::Http(fetcher) => fetcher.fetch(locator).await,
            Self::Wget(fetcher) => fetcher.fetch(locator).await,
        }
    }
}
