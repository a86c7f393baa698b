//! Lifecycle of one media job.
//!
//! ```text
//! Fetching -> Staging -> Transcoding -> Validating -> Succeeded
//!     \___________\____________\_____________\-----> Failed
//! ```
//!
//! Staged files are removed on entry to either terminal state.

use std::path::Path;

use crate::staging::StagedFiles;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Fetching,
    Staging,
    Transcoding,
    Validating,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        use JobState::*;
        match (self, next) {
            (Fetching, Staging) | (Staging, Transcoding) | (Transcoding, Validating) => true,
            (Validating, Succeeded) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fetching => "fetching",
            Self::Staging => "staging",
            Self::Transcoding => "transcoding",
            Self::Validating => "validating",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

/// A job in flight: its state, history and staged files.
#[derive(Debug)]
pub struct TranscodeJob {
    state: JobState,
    history: Vec<JobState>,
    staged: StagedFiles,
}

impl TranscodeJob {
    pub fn new(temp_dir: &Path) -> Self {
        let staged = StagedFiles::new(temp_dir);
        tracing::debug!(job = %staged.prefix(), "Media job created");
        Self {
            state: JobState::Fetching,
            history: vec![JobState::Fetching],
            staged,
        }
    }

    pub fn id(&self) -> &str {
        self.staged.prefix()
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn history(&self) -> &[JobState] {
        &self.history
    }

    pub fn staged(&self) -> &StagedFiles {
        &self.staged
    }

    pub fn staged_mut(&mut self) -> &mut StagedFiles {
        &mut self.staged
    }

    /// Move to a non-terminal state. Invalid transitions are logged and
    /// ignored.
    pub fn advance(&mut self, next: JobState) {
        if next.is_terminal() || !self.state.can_transition_to(next) {
            tracing::error!(
                job = %self.id(),
                from = self.state.as_str(),
                to = next.as_str(),
                "Invalid media job transition"
            );
            return;
        }
        self.enter(next);
    }

    /// Enter the terminal state matching `outcome`, removing staged files
    /// first.
    pub async fn finish<T, E>(&mut self, outcome: Result<T, E>) -> Result<T, E>
    where
        E: std::fmt::Display,
    {
        self.staged.cleanup().await;
        match &outcome {
            Ok(_) => {
                if self.state.can_transition_to(JobState::Succeeded) {
                    self.enter(JobState::Succeeded);
                } else {
                    tracing::error!(
                        job = %self.id(),
                        from = self.state.as_str(),
                        "Media job finished early, marking failed"
                    );
                    self.enter(JobState::Failed);
                }
            }
            Err(e) => {
                tracing::warn!(job = %self.id(), stage = self.state.as_str(), error = %e, "Media job failed");
                if !self.state.is_terminal() {
                    self.enter(JobState::Failed);
                }
            }
        }
        outcome
    }

    fn enter(&mut self, next: JobState) {
        tracing::debug!(
            job = %self.id(),
            from = self.state.as_str(),
            to = next.as_str(),
            "Media job transition"
        );
        self.state = next;
        self.history.push(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use JobState::*;

    #[test]
    fn forward_path_is_allowed() {
        assert!(Fetching.can_transition_to(Staging));
        assert!(Staging.can_transition_to(Transcoding));
        assert!(Transcoding.can_transition_to(Validating));
        assert!(Validating.can_transition_to(Succeeded));
    }

    #[test]
    fn any_live_state_can_fail() {
        for state in [Fetching, Staging, Transcoding, Validating] {
            assert!(state.can_transition_to(Failed), "{state:?}");
        }
        assert!(!Succeeded.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Failed));
    }

    #[test]
    fn skipping_and_reversing_are_rejected() {
        assert!(!Fetching.can_transition_to(Transcoding));
        assert!(!Transcoding.can_transition_to(Staging));
        assert!(!Fetching.can_transition_to(Succeeded));
    }

    #[tokio::test]
    async fn success_records_history_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = TranscodeJob::new(dir.path());
        job.advance(Staging);
        job.staged_mut().write_frame(0, "png", b"x").await.unwrap();
        job.advance(Transcoding);
        job.advance(Validating);

        let out: Result<u8, String> = job.finish(Ok(1)).await;

        assert_eq!(out, Ok(1));
        assert_eq!(job.state(), Succeeded);
        assert_eq!(
            job.history(),
            [Fetching, Staging, Transcoding, Validating, Succeeded]
        );
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn failure_from_any_stage_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = TranscodeJob::new(dir.path());
        job.advance(Staging);
        job.staged_mut().write_frame(0, "png", b"x").await.unwrap();

        let out: Result<(), String> = job.finish(Err("boom".into())).await;

        assert!(out.is_err());
        assert_eq!(job.state(), Failed);
        assert!(job.staged().paths().is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn invalid_advance_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = TranscodeJob::new(dir.path());
        job.advance(Validating);
        job.advance(Succeeded);
        assert_eq!(job.state(), Fetching);
        assert_eq!(job.history(), [Fetching]);
    }
}
