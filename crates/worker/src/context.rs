//! Application context built once at startup and passed to every handler.
//!
//! Owns the two process gateways (interactive commands and media tools),
//! the media pipeline, the render cache and its sweeper. Background work
//! hangs off one root [`CancellationToken`] cancelled by
//! [`AppContext::shutdown`].

use std::sync::Arc;

use sino_core::cache::{BoundedCache, CacheSweeper};
use sino_core::config::OrchestratorConfig;
use sino_core::process::{AllowedEnv, CommandPolicy, ProcessGateway, TimeBudget};
use sino_core::ConfigError;
use sino_pipeline::{ConfiguredFetcher, FetchError, FrameFetcher, MediaPipeline, PipelineSettings};
use tokio_util::sync::CancellationToken;

/// Rendered artifacts keyed by request fingerprint.
pub type RenderCache = BoundedCache<String, Vec<u8>>;

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

pub struct AppContext<F = ConfiguredFetcher> {
    config: OrchestratorConfig,
    shell: ProcessGateway,
    pipeline: MediaPipeline<F>,
    renders: Arc<RenderCache>,
    sweeper: CacheSweeper,
    cancel: CancellationToken,
}

impl AppContext<ConfiguredFetcher> {
    /// Production wiring: the configured fetch backend, static allowlists,
    /// inherited environment. Must be called inside a tokio runtime.
    pub fn from_config(config: OrchestratorConfig) -> Result<Self, ContextError> {
        let media = media_gateway(AllowedEnv::from_parent());
        let fetcher = ConfiguredFetcher::from_config(&config, media)?;
        Self::with_fetcher(config, fetcher)
    }
}

impl<F: FrameFetcher> AppContext<F> {
    pub fn with_fetcher(config: OrchestratorConfig, fetcher: F) -> Result<Self, ContextError> {
        let env = AllowedEnv::from_parent();
        let shell = ProcessGateway::new(CommandPolicy::shell_commands(), env.clone());
        let pipeline =
            MediaPipeline::new(media_gateway(env), fetcher, PipelineSettings::from_config(&config));
        Self::from_parts(config, shell, pipeline)
    }

    /// Assemble from prebuilt parts.
    pub fn from_parts(
        config: OrchestratorConfig,
        shell: ProcessGateway,
        pipeline: MediaPipeline<F>,
    ) -> Result<Self, ContextError> {
        let renders = Arc::new(RenderCache::from_config(&config.cache)?);
        let cancel = CancellationToken::new();
        let sweeper =
            CacheSweeper::spawn(Arc::clone(&renders), config.cache.sweep_interval, &cancel);

        tracing::info!(
            cache_max_size = config.cache.max_size,
            cache_compress = config.cache.compress,
            fetch_concurrency = config.fetch_concurrency,
            fetch_backend = %config.fetch_backend,
            pipeline_timeout_secs = ?config.pipeline_timeout.map(|d| d.as_secs()),
            temp_dir = %config.temp_dir.display(),
            "Application context ready"
        );

        Ok(Self {
            config,
            shell,
            pipeline,
            renders,
            sweeper,
            cancel,
        })
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn shell(&self) -> &ProcessGateway {
        &self.shell
    }

    pub fn pipeline(&self) -> &MediaPipeline<F> {
        &self.pipeline
    }

    pub fn renders(&self) -> &RenderCache {
        &self.renders
    }

    /// Budget applied to interactive commands.
    pub fn shell_budget(&self) -> TimeBudget {
        TimeBudget {
            limit: self.config.shell_timeout,
            grace: self.config.shell_kill_grace,
        }
    }

    /// Token for background work that must stop with the context.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_sweeping(&self) -> bool {
        self.sweeper.is_running()
    }

    /// Cancel background work and wait for it to stop.
    pub async fn shutdown(self) {
        tracing::info!("Shutting down application context");
        self.cancel.cancel();
        self.sweeper.shutdown().await;
    }
}

fn media_gateway(env: AllowedEnv) -> ProcessGateway {
    ProcessGateway::new(CommandPolicy::media_tools(), env)
}
