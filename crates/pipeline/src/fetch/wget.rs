//! Frame retrieval through the `wget` binary, run by the process gateway.
//!
//! Each download goes to its own staged file, which is read back and removed
//! before the fetch returns.

use std::path::PathBuf;
use std::time::Duration;

use sino_core::config::OrchestratorConfig;
use sino_core::process::{ProcessGateway, ProcessInvocation, TimeBudget};
use sino_core::reply::Lookup;

use super::{read_local, FrameFetcher};
use crate::error::FetchError;
use crate::frame::Locator;
use crate::staging::StagedFiles;

/// wget exit status for an error response from the server (4xx/5xx).
const WGET_SERVER_ERROR: i32 = 8;

const TOOL: &str = "wget";

#[derive(Debug, Clone)]
pub struct WgetFetcher {
    gateway: ProcessGateway,
    dir: PathBuf,
    user_agent: String,
    timeout: Duration,
}

impl WgetFetcher {
    /// `gateway` must allow `wget`; downloads are staged under `dir`.
    pub fn new(
        gateway: ProcessGateway,
        dir: impl Into<PathBuf>,
        user_agent: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            gateway,
            dir: dir.into(),
            user_agent: user_agent.into(),
            timeout,
        }
    }

    /// Downloads staged under the configured temp dir, with the configured
    /// user agent and timeout.
    pub fn from_config(config: &OrchestratorConfig, gateway: ProcessGateway) -> Self {
        Self::new(
            gateway,
            &config.temp_dir,
            &config.user_agent,
            config.fetch_timeout,
        )
    }

    /// Arguments for one download into `target`.
    pub fn download_args(&self, url: &str, target: &std::path::Path) -> Vec<String> {
        vec![
            url.to_owned(),
            "--random-wait".to_owned(),
            format!("--timeout={}", self.timeout.as_secs().max(1)),
            "-U".to_owned(),
            self.user_agent.clone(),
            "-O".to_owned(),
            target.display().to_string(),
        ]
    }

    async fn download(&self, url: &str) -> Result<Lookup<Vec<u8>>, FetchError> {
        let mut staged = StagedFiles::new(&self.dir);
        let target = staged.output_path("download");

        let budget = TimeBudget {
            limit: self.timeout * 3,
            grace: Duration::from_secs(1),
        };
        let output = self
            .gateway
            .exec_argv(
                ProcessInvocation::new(TOOL)
                    .args(self.download_args(url, &target))
                    .split_streams()
                    .time_bounded(budget),
            )
            .await?;

        let result = if output.success() {
            tokio::fs::read(&target)
                .await
                .map(Lookup::Found)
                .map_err(|source| FetchError::Io {
                    locator: url.to_owned(),
                    source,
                })
        } else {
            let detail = output
                .stderr()
                .map(|e| e.text_lossy().trim().to_owned())
                .unwrap_or_default();
            if output.exit_code == Some(WGET_SERVER_ERROR) && detail.contains(" 404") {
                Ok(Lookup::NotFound)
            } else {
                Err(FetchError::Tool {
                    tool: TOOL.to_owned(),
                    locator: url.to_owned(),
                    exit_code: output.exit_code,
                    detail,
                })
            }
        };

        staged.cleanup().await;
        result
    }
}

impl FrameFetcher for WgetFetcher {
    async fn fetch(&self, locator: &Locator) -> Result<Lookup<Vec<u8>>, FetchError> {
        match locator {
            Locator::Url(url) => self.download(url).await,
            Locator::Path(path) => read_local(path).await,
        }
    }
}
