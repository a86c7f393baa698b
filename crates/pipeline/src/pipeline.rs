//! The media pipeline: fetch frames, drive the transcoder, return the
//! artifact.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sino_core::config::OrchestratorConfig;
use sino_core::hashing::Fingerprint;
use sino_core::process::{Encoding, ProcessGateway, ProcessInvocation, DEFAULT_MAX_CAPTURE_BYTES};
use sino_core::reply::{MediaSource, Reply};

use crate::error::{FetchError, PipelineError};
use crate::fetch::{self, FrameFetcher};
use crate::frame::{FetchedFrame, FrameJob};
use crate::job::{JobState, TranscodeJob};
use crate::staging::StagedFiles;
use crate::transcode::{
    self, Container, SlideInput, Strategy, ToolCommand, TranscodeOptions,
};

/// Pipeline-wide limits.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub temp_dir: PathBuf,
    pub fetch_concurrency: usize,
    /// End-to-end budget per job; `None` disables it.
    pub timeout: Option<Duration>,
    /// Largest artifact accepted. A larger one fails the job instead of
    /// being cut short.
    pub max_artifact_bytes: usize,
}

impl PipelineSettings {
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self {
            temp_dir: config.temp_dir.clone(),
            fetch_concurrency: config.fetch_concurrency,
            timeout: config.pipeline_timeout,
            max_artifact_bytes: DEFAULT_MAX_CAPTURE_BYTES,
        }
    }
}

/// A transcoded video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    pub container: Container,
    pub frame_count: usize,
}

impl Artifact {
    pub fn filename(&self, stem: &str) -> String {
        format!("{stem}.{}", self.container.extension())
    }

    /// Wrap as an animation upload.
    pub fn into_reply(self, stem: &str, caption: Option<String>) -> Reply {
        let filename = self.filename(stem);
        Reply::Animation {
            media: MediaSource::upload(filename, self.bytes),
            caption,
        }
    }
}

/// Frames plus encoder settings: everything that determines an artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub frames: Vec<FrameJob>,
    pub options: TranscodeOptions,
}

impl RenderRequest {
    pub fn new(frames: Vec<FrameJob>, options: TranscodeOptions) -> Self {
        Self { frames, options }
    }

    /// Stable cache key for this request.
    pub fn fingerprint(&self) -> String {
        let o = &self.options;
        let mut fp = Fingerprint::new("render")
            .field(o.frame_rate.to_string())
            .field(&o.codec)
            .field(&o.preset)
            .field(o.crf.to_string())
            .field(&o.pixel_format)
            .field(o.tune.as_deref().unwrap_or(""))
            .field(o.hwaccel.as_deref().unwrap_or(""))
            .field([u8::from(o.even_dimensions)])
            .field(o.container().format_name());
        for frame in &self.frames {
            fp = fp
                .field(frame.locator.to_string())
                .field(frame.duration.map(|d| d.to_string()).unwrap_or_default());
        }
        fp.finish()
    }
}

/// Fetches frames and assembles them into a video through the gateway.
#[derive(Debug, Clone)]
pub struct MediaPipeline<F> {
    gateway: ProcessGateway,
    fetcher: F,
    transcoder: ToolCommand,
    settings: PipelineSettings,
}

impl<F: FrameFetcher> MediaPipeline<F> {
    /// `gateway` must allow the transcoder program (`ffmpeg` by default).
    pub fn new(gateway: ProcessGateway, fetcher: F, settings: PipelineSettings) -> Self {
        Self {
            gateway,
            fetcher,
            transcoder: ToolCommand::default(),
            settings,
        }
    }

    pub fn with_transcoder(mut self, transcoder: ToolCommand) -> Self {
        self.transcoder = transcoder;
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Fetch `jobs` in order under the configured concurrency limit.
    pub async fn fetch_frames(&self, jobs: &[FrameJob]) -> Result<Vec<FetchedFrame>, FetchError> {
        fetch::fetch_frames(&self.fetcher, jobs, self.settings.fetch_concurrency).await
    }

    /// Transcode already fetched frames.
    pub async fn assemble_video(
        &self,
        frames: Vec<FetchedFrame>,
        options: &TranscodeOptions,
    ) -> Result<Artifact, PipelineError> {
        let mut job = TranscodeJob::new(&self.settings.temp_dir);
        let outcome = self
            .bounded(self.transcode(&mut job, frames, options))
            .await;
        job.finish(outcome).await
    }

    /// Fetch and transcode in one job.
    pub async fn render(&self, request: &RenderRequest) -> Result<Artifact, PipelineError> {
        let mut job = TranscodeJob::new(&self.settings.temp_dir);
        tracing::info!(
            job = %job.id(),
            frames = request.frames.len(),
            strategy = ?request.options.strategy,
            "Rendering frames"
        );
        let outcome = self
            .bounded(async {
                let frames = self.fetch_frames(&request.frames).await?;
                self.transcode(&mut job, frames, &request.options).await
            })
            .await;
        job.finish(outcome).await
    }

    async fn bounded<T>(
        &self,
        work: impl Future<Output = Result<T, PipelineError>>,
    ) -> Result<T, PipelineError> {
        match self.settings.timeout {
            None => work.await,
            Some(limit) => tokio::time::timeout(limit, work).await.unwrap_or_else(|_| {
                Err(PipelineError::Timeout {
                    limit_ms: limit.as_millis() as u64,
                })
            }),
        }
    }

    async fn transcode(
        &self,
        job: &mut TranscodeJob,
        frames: Vec<FetchedFrame>,
        options: &TranscodeOptions,
    ) -> Result<Artifact, PipelineError> {
        if frames.is_empty() {
            return Err(PipelineError::NoFrames);
        }
        let frame_count = frames.len();

        job.advance(JobState::Staging);
        let (args, output_path) = match options.strategy {
            Strategy::Streaming => (transcode::streaming_args(options), None),
            Strategy::Filesystem => {
                let (args, output) = stage_files(job.staged_mut(), &frames, options).await?;
                (args, Some(output))
            }
        };

        let mut invocation = ProcessInvocation::new(&self.transcoder.program)
            .args(&self.transcoder.leading_args)
            .args(args)
            .encoding(Encoding::Binary)
            .split_streams()
            .max_capture_bytes(self.settings.max_artifact_bytes);
        if output_path.is_none() {
            if frames.iter().any(|f| f.duration.is_some()) {
                tracing::debug!(job = %job.id(), "Per-frame durations ignored when streaming");
            }
            invocation = invocation.stdin(concat_frames(frames));
        }

        job.advance(JobState::Transcoding);
        let output = self.gateway.exec_argv(invocation).await?;

        job.advance(JobState::Validating);
        let limit = self.settings.max_artifact_bytes;
        if output.truncated {
            return Err(oversized(limit));
        }
        let exit_code = output.exit_code;
        let (stdout, stderr) = output.into_split();
        let diagnostics = stderr
            .map(|e| e.text_lossy().into_owned())
            .unwrap_or_default();
        let bytes = match &output_path {
            None => stdout.into_bytes(),
            Some(path) => read_artifact(path).await?,
        };
        if bytes.len() > limit {
            return Err(oversized(limit));
        }

        transcode::validate_artifact(&bytes, exit_code, &diagnostics)
            .map_err(|detail| PipelineError::TranscodeFailed { detail })?;
        if exit_code != Some(0) {
            tracing::warn!(
                job = %job.id(),
                exit_code = ?exit_code,
                stderr = %diagnostics.trim(),
                "Transcoder exited abnormally but produced an artifact"
            );
        }

        tracing::info!(job = %job.id(), bytes = bytes.len(), frame_count, "Artifact ready");
        Ok(Artifact {
            bytes,
            container: options.container(),
            frame_count,
        })
    }
}

fn oversized(limit: usize) -> PipelineError {
    PipelineError::TranscodeFailed {
        detail: format!("transcoder output exceeded the {limit} byte limit"),
    }
}

fn concat_frames(frames: Vec<FetchedFrame>) -> Vec<u8> {
    let total = frames.iter().map(|f| f.bytes.len()).sum();
    frames
        .into_iter()
        .fold(Vec::with_capacity(total), |mut buf, frame| {
            buf.extend_from_slice(&frame.bytes);
            buf
        })
}

/// Write frames to disk and pick the input form: a `%04d` sequence when
/// every frame shares an extension and none is timed, a looped slideshow
/// otherwise.
async fn stage_files(
    staged: &mut StagedFiles,
    frames: &[FetchedFrame],
    options: &TranscodeOptions,
) -> Result<(Vec<String>, PathBuf), PipelineError> {
    let mut inputs = Vec::with_capacity(frames.len());
    for (position, frame) in frames.iter().enumerate() {
        let path = staged
            .write_frame(position, &frame.extension, &frame.bytes)
            .await
            .map_err(PipelineError::Staging)?;
        inputs.push(SlideInput {
            path,
            duration: frame.duration.unwrap_or_else(|| options.frame_period()),
        });
    }
    let output = staged.output_path(Container::Mp4.extension());

    let first_ext = &frames[0].extension;
    let sequence = frames.iter().all(|f| &f.extension == first_ext)
        && frames.iter().all(|f| f.duration.is_none());
    let args = if sequence {
        transcode::sequence_args(options, &staged.frame_pattern(first_ext), &output)
    } else {
        transcode::slideshow_args(options, &inputs, &output)
    };
    Ok((args, output))
}

/// A tool that exits without writing its output leaves nothing to read;
/// that is an empty artifact, not an I/O failure.
async fn read_artifact(path: &Path) -> Result<Vec<u8>, PipelineError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(PipelineError::Artifact(e)),
    }
}
