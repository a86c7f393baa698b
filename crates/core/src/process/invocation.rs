//! Per-call process description and captured results.

use std::borrow::Cow;
use std::ffi::{OsStr, OsString};
use std::time::Duration;

/// Default per-stream capture cap (64 MiB).
pub const DEFAULT_MAX_CAPTURE_BYTES: usize = 64 * 1024 * 1024;

/// How captured bytes are handed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// Raw bytes.
    Binary,
    /// UTF-8 text; invalid sequences are replaced.
    #[default]
    Utf8,
}

/// Whether stdout and stderr are captured separately or interleaved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamMode {
    /// One buffer, chunks appended in arrival order.
    #[default]
    Merged,
    Split,
}

/// Wall-clock budget for a time-bounded invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBudget {
    /// Time before the graceful termination signal is sent.
    pub limit: Duration,
    /// Time between the termination signal and the forced kill.
    pub grace: Duration,
}

/// A single argv-only process invocation.
#[derive(Debug, Clone)]
pub struct ProcessInvocation {
    pub command: String,
    pub args: Vec<OsString>,
    pub stdin: Option<Vec<u8>>,
    pub encoding: Encoding,
    pub streams: StreamMode,
    pub budget: Option<TimeBudget>,
    pub max_capture_bytes: usize,
}

impl ProcessInvocation {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            stdin: None,
            encoding: Encoding::default(),
            streams: StreamMode::default(),
            budget: None,
            max_capture_bytes: DEFAULT_MAX_CAPTURE_BYTES,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Bytes written to the child's stdin, which is then closed.
    pub fn stdin(mut self, data: Vec<u8>) -> Self {
        self.stdin = Some(data);
        self
    }

    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn split_streams(mut self) -> Self {
        self.streams = StreamMode::Split;
        self
    }

    pub fn time_bounded(mut self, budget: TimeBudget) -> Self {
        self.budget = Some(budget);
        self
    }

    pub fn max_capture_bytes(mut self, limit: usize) -> Self {
        self.max_capture_bytes = limit;
        self
    }

    /// Command and arguments as one vector, for logging.
    pub fn argv_lossy(&self) -> Vec<Cow<'_, str>> {
        std::iter::once(Cow::Borrowed(self.command.as_str()))
            .chain(self.args.iter().map(|a| a.to_string_lossy()))
            .collect()
    }
}

/// Captured bytes of one stream (or of both, when merged).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Captured {
    Text(String),
    Bytes(Vec<u8>),
}

impl Captured {
    pub(crate) fn decode(bytes: Vec<u8>, encoding: Encoding) -> Self {
        match encoding {
            Encoding::Binary => Self::Bytes(bytes),
            Encoding::Utf8 => match String::from_utf8(bytes) {
                Ok(s) => Self::Text(s),
                Err(e) => Self::Text(String::from_utf8_lossy(e.as_bytes()).into_owned()),
            },
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(s) => s.as_bytes(),
            Self::Bytes(b) => b.as_slice(),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Text(s) => s.into_bytes(),
            Self::Bytes(b) => b,
        }
    }

    pub fn text_lossy(&self) -> Cow<'_, str> {
        match self {
            Self::Text(s) => Cow::Borrowed(s.as_str()),
            Self::Bytes(b) => String::from_utf8_lossy(b),
        }
    }
}

/// Stream layout of a finished invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Streams {
    Merged(Captured),
    Split { stdout: Captured, stderr: Captured },
}

/// Result of a completed invocation.
///
/// A nonzero exit is still a completed invocation; callers inspect
/// [`exit_code`](Self::exit_code) and stderr themselves.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub streams: Streams,
    /// Exit code, or `None` when the process was ended by a signal.
    pub exit_code: Option<i32>,
    /// Terminating signal, if any.
    pub signal: Option<i32>,
    /// The time budget ran out and the process was terminated.
    pub timed_out: bool,
    /// At least one stream exceeded the capture cap.
    pub truncated: bool,
    pub duration_ms: u64,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stdout when split, the merged buffer otherwise.
    pub fn stdout(&self) -> &Captured {
        match &self.streams {
            Streams::Merged(all) => all,
            Streams::Split { stdout, .. } => stdout,
        }
    }

    /// Stderr, only available when streams were split.
    pub fn stderr(&self) -> Option<&Captured> {
        match &self.streams {
            Streams::Merged(_) => None,
            Streams::Split { stderr, .. } => Some(stderr),
        }
    }

    pub fn into_split(self) -> (Captured, Option<Captured>) {
        match self.streams {
            Streams::Merged(all) => (all, None),
            Streams::Split { stdout, stderr } => (stdout, Some(stderr)),
        }
    }
}
