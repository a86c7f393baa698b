//! Temporary files owned by one media job.
//!
//! Every path a job writes (or asks a tool to write) is registered here
//! first. [`StagedFiles::cleanup`] removes them all; if the owning future is
//! dropped before that, [`Drop`] removes them synchronously instead. Either
//! way each path is removed once, and a failed removal is logged, never
//! returned.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

static JOB_SEQUENCE: AtomicU32 = AtomicU32::new(0);

/// Unique file-name prefix: millisecond timestamp in hex plus a
/// process-wide sequence number.
pub fn job_prefix() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let seq = JOB_SEQUENCE.fetch_add(1, Ordering::Relaxed) & 0xffff;
    format!("sino-{millis:x}-{seq:04x}")
}

/// Registry of a job's temp paths.
#[derive(Debug)]
pub struct StagedFiles {
    dir: PathBuf,
    prefix: String,
    paths: Vec<PathBuf>,
}

impl StagedFiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            prefix: job_prefix(),
            paths: Vec::new(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// `<dir>/<prefix>_<index:04>.<ext>`
    pub fn frame_path(&self, index: usize, extension: &str) -> PathBuf {
        self.dir
            .join(format!("{}_{index:04}.{extension}", self.prefix))
    }

    /// `<dir>/<prefix>_%04d.<ext>`, the numbered-sequence input pattern
    /// matching [`frame_path`](Self::frame_path).
    pub fn frame_pattern(&self, extension: &str) -> PathBuf {
        self.dir.join(format!("{}_%04d.{extension}", self.prefix))
    }

    /// Register `<dir>/<prefix>.<ext>` and return it.
    pub fn output_path(&mut self, extension: &str) -> PathBuf {
        let path = self.dir.join(format!("{}.{extension}", self.prefix));
        self.track(path.clone());
        path
    }

    /// Register a path created by someone else (an external tool).
    pub fn track(&mut self, path: PathBuf) {
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    /// Write one frame. The path is registered before the write so a
    /// partial file is still cleaned up.
    pub async fn write_frame(
        &mut self,
        index: usize,
        extension: &str,
        bytes: &[u8],
    ) -> io::Result<PathBuf> {
        let path = self.frame_path(index, extension);
        self.track(path.clone());
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Remove every registered path.
    pub async fn cleanup(&mut self) {
        for path in std::mem::take(&mut self.paths) {
            remove_best_effort(&path).await;
        }
    }
}

impl Drop for StagedFiles {
    fn drop(&mut self) {
        if self.paths.is_empty() {
            return;
        }
        tracing::debug!(
            prefix = %self.prefix,
            count = self.paths.len(),
            "Removing staged files on drop"
        );
        for path in self.paths.drain(..) {
            log_removal(&path, std::fs::remove_file(&path));
        }
    }
}

/// Remove `path`, logging instead of failing.
pub async fn remove_best_effort(path: &Path) {
    log_removal(path, tokio::fs::remove_file(path).await);
}

fn log_removal(path: &Path, result: io::Result<()>) {
    match result {
        Ok(()) => {}
        // Tools may never have created their output.
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "Staged file already absent");
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove staged file");
        }
    }
}
