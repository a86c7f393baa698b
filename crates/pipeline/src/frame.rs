//! Frame descriptors: where a frame comes from and what came back.

use std::fmt;
use std::path::{Path, PathBuf};

/// Extension assumed when a locator carries none.
pub const DEFAULT_EXTENSION: &str = "png";

/// Location of one frame resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Url(String),
    Path(PathBuf),
}

impl Locator {
    /// `http://` and `https://` become URLs, `file://` and everything else a
    /// local path. Schemes match case-insensitively.
    pub fn parse(source: &str) -> Self {
        const FILE_SCHEME: &str = "file://";
        let lower = source.get(..8).unwrap_or(source).to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Self::Url(source.to_owned())
        } else if lower.starts_with(FILE_SCHEME) {
            Self::Path(PathBuf::from(&source[FILE_SCHEME.len()..]))
        } else {
            Self::Path(PathBuf::from(source))
        }
    }

    /// Lower-cased alphanumeric extension of the last path segment, ignoring
    /// any query string or fragment.
    pub fn extension(&self) -> String {
        let ext = match self {
            Self::Url(url) => {
                let path = url.split(['?', '#']).next().unwrap_or(url);
                let segment = path.rsplit('/').next().unwrap_or(path);
                segment.rsplit_once('.').map(|(_, ext)| ext.to_owned())
            }
            Self::Path(path) => Path::new(path)
                .extension()
                .map(|ext| ext.to_string_lossy().into_owned()),
        };
        match ext {
            Some(ext) if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) => {
                ext.to_ascii_lowercase()
            }
            _ => DEFAULT_EXTENSION.to_owned(),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => f.write_str(url),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// One frame to fetch. `index` fixes its position in the output.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameJob {
    pub index: usize,
    pub locator: Locator,
    /// Seconds this frame stays on screen; `None` means one frame period.
    pub duration: Option<f64>,
}

impl FrameJob {
    pub fn new(index: usize, source: &str) -> Self {
        Self {
            index,
            locator: Locator::parse(source),
            duration: None,
        }
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    /// Parse `source` or `source@seconds`.
    ///
    /// The suffix after the last `@` is a duration only when it is a
    /// positive finite number, so `https://user@host/f.png` stays untimed.
    pub fn parse_timed(index: usize, spec: &str) -> Self {
        let timed = spec.rsplit_once('@').and_then(|(source, suffix)| {
            let seconds = suffix.parse::<f64>().ok()?;
            (seconds.is_finite() && seconds > 0.0).then_some((source, seconds))
        });
        match timed {
            Some((source, seconds)) => Self::new(index, source).with_duration(seconds),
            None => Self::new(index, spec),
        }
    }

    /// Jobs indexed in iteration order.
    pub fn from_sources<I, S>(sources: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        sources
            .into_iter()
            .enumerate()
            .map(|(index, source)| Self::new(index, source.as_ref()))
            .collect()
    }

    /// Like [`FrameJob::from_sources`], accepting `source@seconds` entries.
    pub fn from_timed_sources<I, S>(specs: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        specs
            .into_iter()
            .enumerate()
            .map(|(index, spec)| Self::parse_timed(index, spec.as_ref()))
            .collect()
    }
}

/// A fetched frame, ready for staging.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedFrame {
    pub index: usize,
    pub extension: String,
    pub duration: Option<f64>,
    pub bytes: Vec<u8>,
}

impl FetchedFrame {
    pub fn from_job(job: &FrameJob, bytes: Vec<u8>) -> Self {
        Self {
            index: job.index,
            extension: job.locator.extension(),
            duration: job.duration,
            bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_distinguishes_urls_and_paths() {
        assert_eq!(
            Locator::parse("https://a.test/f.jpg"),
            Locator::Url("https://a.test/f.jpg".into())
        );
        assert_eq!(
            Locator::parse("HTTP://a.test/f.jpg"),
            Locator::Url("HTTP://a.test/f.jpg".into())
        );
        assert_eq!(
            Locator::parse("file:///tmp/f.png"),
            Locator::Path("/tmp/f.png".into())
        );
        assert_eq!(Locator::parse("frames/1.png"), Locator::Path("frames/1.png".into()));
    }

    #[test]
    fn file_scheme_is_case_insensitive() {
        for source in ["FILE:///tmp/f.png", "File:///tmp/f.png", "file:///tmp/f.png"] {
            assert_eq!(Locator::parse(source), Locator::Path("/tmp/f.png".into()));
        }
        assert_eq!(Locator::parse("FILE:///tmp/f.png").extension(), "png");
    }

    #[test]
    fn timed_sources_split_on_a_numeric_suffix() {
        let jobs = FrameJob::from_timed_sources([
            "a.png@2.5",
            "https://user@host.test/b.png",
            "c.png@0",
            "d@e.png@1",
            "f.png",
        ]);
        assert_eq!(jobs[0].locator, Locator::Path("a.png".into()));
        assert_eq!(jobs[0].duration, Some(2.5));
        assert_eq!(jobs[1].locator, Locator::Url("https://user@host.test/b.png".into()));
        assert_eq!(jobs[1].duration, None);
        assert_eq!(jobs[2].locator, Locator::Path("c.png@0".into()));
        assert_eq!(jobs[2].duration, None);
        assert_eq!(jobs[3].locator, Locator::Path("d@e.png".into()));
        assert_eq!(jobs[3].duration, Some(1.0));
        assert_eq!(jobs[4].index, 4);
        assert_eq!(jobs[4].duration, None);
    }

    #[test]
    fn extension_ignores_query_and_defaults() {
        assert_eq!(Locator::parse("https://a.test/x/f.JPG?s=1#t").extension(), "jpg");
        assert_eq!(Locator::parse("https://a.test/x/frame").extension(), "png");
        assert_eq!(Locator::parse("https://a.test/a.b/frame").extension(), "png");
        assert_eq!(Locator::parse("/tmp/f.webp").extension(), "webp");
        assert_eq!(Locator::parse("/tmp/f.we-p").extension(), "png");
    }

    #[test]
    fn from_sources_indexes_in_order() {
        let jobs = FrameJob::from_sources(["a.png", "b.png"]);
        assert_eq!(jobs[0].index, 0);
        assert_eq!(jobs[1].index, 1);
        assert_eq!(jobs[1].locator, Locator::Path("b.png".into()));
    }
}
