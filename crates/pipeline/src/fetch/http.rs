//! HTTP frame retrieval using [`reqwest`].

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use sino_core::config::OrchestratorConfig;
use sino_core::reply::Lookup;

use super::{read_local, FrameFetcher};
use crate::error::FetchError;
use crate::frame::Locator;

/// Fetches URLs over HTTP(S) and reads local paths from disk.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a client sending `user_agent` and `headers` on every request,
    /// each bounded by `timeout`.
    pub fn new(
        user_agent: &str,
        headers: HeaderMap,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client })
    }

    /// Client with the configured user agent and request timeout.
    pub fn from_config(config: &OrchestratorConfig) -> Result<Self, FetchError> {
        Self::new(&config.user_agent, HeaderMap::new(), config.fetch_timeout)
    }

    /// Reuse an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn get(&self, url: &str) -> Result<Lookup<Vec<u8>>, FetchError> {
        let transport = |source| FetchError::Transport {
            locator: url.to_owned(),
            source,
        };

        let response = self.client.get(url).send().await.map_err(transport)?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(Lookup::NotFound);
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                locator: url.to_owned(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(transport)?;
        Ok(Lookup::Found(bytes.to_vec()))
    }
}

impl FrameFetcher for HttpFetcher {
    async fn fetch(&self, locator: &Locator) -> Result<Lookup<Vec<u8>>, FetchError> {
        match locator {
            Locator::Url(url) => self.get(url).await,
            Locator::Path(path) => read_local(path).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new("sino-test", HeaderMap::new(), Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn local_paths_are_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0.png");
        std::fs::write(&path, b"png-bytes").unwrap();

        let found = fetcher().fetch(&Locator::Path(path)).await.unwrap();
        assert_eq!(found, Lookup::Found(b"png-bytes".to_vec()));

        let missing = fetcher()
            .fetch(&Locator::Path(dir.path().join("1.png")))
            .await
            .unwrap();
        assert_eq!(missing, Lookup::NotFound);
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_error() {
        // Port 9 on loopback (discard) is closed on test machines.
        let err = fetcher()
            .fetch(&Locator::Url("http://127.0.0.1:9/frame.png".into()))
            .await
            .unwrap_err();
        assert_matches!(err, FetchError::Transport { .. });
    }
}
