//! Transcoder command lines.
//!
//! Builders here are pure: they turn [`TranscodeOptions`] and staged inputs
//! into an ffmpeg argument vector. Running it is the pipeline's job.

use std::path::{Path, PathBuf};

/// Artifacts smaller than this are treated as a failed transcode.
pub const MIN_ARTIFACT_BYTES: usize = 64;

/// Rounds both dimensions down to even values, which yuv420p requires.
pub const EVEN_SCALE_FILTER: &str = "scale=w=trunc(iw/2)*2:h=trunc(ih/2)*2:flags=lanczos";

/// How frames reach the transcoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Frames piped to stdin, container read from stdout. No temp files.
    #[default]
    Streaming,
    /// Frames written to temp files, container written to a temp file.
    Filesystem,
}

impl Strategy {
    pub fn container(self) -> Container {
        match self {
            Self::Streaming => Container::Matroska,
            Self::Filesystem => Container::Mp4,
        }
    }
}

/// Output container. Matroska can be written to a pipe; MP4 needs a
/// seekable file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Matroska,
    Mp4,
}

impl Container {
    /// Value for ffmpeg's `-f`.
    pub fn format_name(self) -> &'static str {
        match self {
            Self::Matroska => "matroska",
            Self::Mp4 => "mp4",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Matroska => "mkv",
            Self::Mp4 => "mp4",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Matroska => "video/x-matroska",
            Self::Mp4 => "video/mp4",
        }
    }
}

/// Encoder settings for one job.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeOptions {
    pub frame_rate: u32,
    pub codec: String,
    pub preset: String,
    pub crf: u8,
    pub pixel_format: String,
    pub tune: Option<String>,
    /// Input hardware acceleration (`-hwaccel`), streaming only.
    pub hwaccel: Option<String>,
    pub even_dimensions: bool,
    pub strategy: Strategy,
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        Self {
            frame_rate: 5,
            codec: "libx264".into(),
            preset: "slow".into(),
            crf: 26,
            pixel_format: "yuv420p".into(),
            tune: Some("stillimage".into()),
            hwaccel: Some("auto".into()),
            even_dimensions: true,
            strategy: Strategy::Streaming,
        }
    }
}

impl TranscodeOptions {
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_frame_rate(mut self, fps: u32) -> Self {
        self.frame_rate = fps.max(1);
        self
    }

    pub fn container(&self) -> Container {
        self.strategy.container()
    }

    /// Seconds a frame without an explicit duration is shown.
    pub fn frame_period(&self) -> f64 {
        1.0 / f64::from(self.frame_rate.max(1))
    }

    fn encoder_args(&self, args: &mut Vec<String>) {
        args.extend([
            "-r:v".into(),
            self.frame_rate.to_string(),
            "-codec:v".into(),
            self.codec.clone(),
            "-preset".into(),
            self.preset.clone(),
            "-crf".into(),
            self.crf.to_string(),
            "-pix_fmt".into(),
            self.pixel_format.clone(),
        ]);
        if let Some(tune) = &self.tune {
            args.extend(["-tune".into(), tune.clone()]);
        }
    }
}

fn preamble() -> Vec<String> {
    ["-hide_banner", "-y", "-loglevel", "error"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Frames on stdin as `image2pipe`, Matroska on stdout.
pub fn streaming_args(options: &TranscodeOptions) -> Vec<String> {
    let mut args = preamble();
    args.extend(["-f".into(), "image2pipe".into()]);
    if let Some(hwaccel) = &options.hwaccel {
        args.extend(["-hwaccel".into(), hwaccel.clone()]);
    }
    args.extend([
        "-r".into(),
        options.frame_rate.to_string(),
        "-i".into(),
        "pipe:0".into(),
    ]);
    if options.even_dimensions {
        args.extend(["-filter_complex".into(), EVEN_SCALE_FILTER.into()]);
    }
    options.encoder_args(&mut args);
    args.extend([
        "-f".into(),
        Container::Matroska.format_name().into(),
        "pipe:1".into(),
    ]);
    args
}

/// A numbered image sequence read through a `%04d` pattern.
pub fn sequence_args(options: &TranscodeOptions, pattern: &Path, output: &Path) -> Vec<String> {
    let mut args = preamble();
    args.extend([
        "-framerate".into(),
        options.frame_rate.to_string(),
        "-i".into(),
        pattern.display().to_string(),
    ]);
    if options.even_dimensions {
        args.extend(["-vf".into(), EVEN_SCALE_FILTER.into()]);
    }
    options.encoder_args(&mut args);
    args.extend(file_output(output));
    args
}

/// One staged still image and how long it is shown.
#[derive(Debug, Clone, PartialEq)]
pub struct SlideInput {
    pub path: PathBuf,
    pub duration: f64,
}

/// One looped input per image, joined with the concat filter.
pub fn slideshow_args(options: &TranscodeOptions, inputs: &[SlideInput], output: &Path) -> Vec<String> {
    let mut args = preamble();
    for input in inputs {
        args.extend([
            "-loop".into(),
            "1".into(),
            "-t".into(),
            input.duration.to_string(),
            "-i".into(),
            input.path.display().to_string(),
        ]);
    }
    args.extend([
        "-filter_complex".into(),
        concat_graph(inputs.len(), options.even_dimensions),
        "-map".into(),
        "[out]".into(),
    ]);
    options.encoder_args(&mut args);
    args.extend(file_output(output));
    args
}

fn concat_graph(count: usize, even_dimensions: bool) -> String {
    let mut graph = String::new();
    let mut labels = String::new();
    for i in 0..count {
        if even_dimensions {
            graph.push_str(&format!("[{i}:v]{EVEN_SCALE_FILTER},setsar=1[v{i}];"));
            labels.push_str(&format!("[v{i}]"));
        } else {
            labels.push_str(&format!("[{i}:v]"));
        }
    }
    graph.push_str(&format!("{labels}concat=n={count}:v=1:a=0[out]"));
    graph
}

fn file_output(output: &Path) -> [String; 5] {
    [
        "-movflags".into(),
        "+faststart".into(),
        "-f".into(),
        Container::Mp4.format_name().into(),
        output.display().to_string(),
    ]
}

/// Check the artifact size; `diagnostics` is the transcoder's stderr.
///
/// The returned detail is never empty.
pub fn validate_artifact(
    bytes: &[u8],
    exit_code: Option<i32>,
    diagnostics: &str,
) -> Result<(), String> {
    if bytes.len() >= MIN_ARTIFACT_BYTES {
        return Ok(());
    }
    let diagnostics = diagnostics.trim();
    if diagnostics.is_empty() {
        Err(format!(
            "transcoder produced {} bytes (minimum {MIN_ARTIFACT_BYTES}), exit code {exit_code:?}",
            bytes.len()
        ))
    } else {
        Err(diagnostics.to_owned())
    }
}

/// Program plus any fixed leading arguments used to run the transcoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub leading_args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }
}

impl Default for ToolCommand {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}
