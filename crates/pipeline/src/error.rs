//! Error types for frame fetching and media assembly.

use sino_core::process::GatewayError;

/// A single frame could not be retrieved. Any one of these aborts the batch.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The resource does not exist (HTTP 404 or missing local file).
    #[error("frame {index} not found: {locator}")]
    NotFound { index: usize, locator: String },

    #[error("{locator}: unexpected HTTP status {status}")]
    Status { locator: String, status: u16 },

    #[error("request for {locator} failed: {source}")]
    Transport {
        locator: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("reading {locator} failed: {source}")]
    Io {
        locator: String,
        #[source]
        source: std::io::Error,
    },

    /// The external retrieval tool ran but did not produce the resource.
    #[error("{tool} could not retrieve {locator} (exit code {exit_code:?}): {detail}")]
    Tool {
        tool: String,
        locator: String,
        exit_code: Option<i32>,
        detail: String,
    },

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Failure of a media job. Staged files are removed before any of these
/// reaches the caller.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("frame fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("no frames to assemble")]
    NoFrames,

    #[error("failed to stage frames: {0}")]
    Staging(#[source] std::io::Error),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("failed to read transcoder output: {0}")]
    Artifact(#[source] std::io::Error),

    /// The transcoder did not produce a usable artifact. `detail` carries
    /// its diagnostics and is never empty.
    #[error("transcode failed: {detail}")]
    TranscodeFailed { detail: String },

    #[error("media job timed out after {limit_ms}ms")]
    Timeout { limit_ms: u64 },
}
