//! Media assembly: bounded-concurrency frame fetching, transcoder command
//! lines, and job lifecycle with guaranteed temp-file cleanup.

pub mod error;
pub mod fetch;
pub mod frame;
pub mod job;
pub mod pipeline;
pub mod staging;
pub mod transcode;

pub use error::{FetchError, PipelineError};
pub use fetch::{fetch_frames, ConfiguredFetcher, FrameFetcher, HttpFetcher, WgetFetcher};
pub use frame::{FetchedFrame, FrameJob, Locator};
pub use pipeline::{Artifact, MediaPipeline, PipelineSettings, RenderRequest};
pub use transcode::{Container, Strategy, ToolCommand, TranscodeOptions};
