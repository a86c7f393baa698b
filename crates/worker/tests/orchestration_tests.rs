//! Integration tests for the worker handlers.
//!
//! Real processes are spawned through gateways whose allowlists name
//! ordinary POSIX tools, and `sh` stands in for the transcoder.

use std::path::Path;
use std::time::Duration;

use assert_matches::assert_matches;
use sino_core::config::OrchestratorConfig;
use sino_core::process::{AllowedEnv, CommandPolicy, ProcessGateway, TimeBudget};
use sino_core::reply::{MediaSource, Reply};
use sino_pipeline::{
    FetchError, FrameJob, HttpFetcher, MediaPipeline, PipelineError, PipelineSettings,
    RenderRequest, Strategy, ToolCommand, TranscodeOptions,
};
use sino_worker::{render, shell, AppContext};

fn budget() -> TimeBudget {
    TimeBudget {
        limit: Duration::from_secs(5),
        grace: Duration::from_secs(1),
    }
}

fn context(temp_dir: &Path, transcoder_script: &str) -> AppContext<HttpFetcher> {
    let config = OrchestratorConfig {
        temp_dir: temp_dir.to_path_buf(),
        ..OrchestratorConfig::default()
    };
    let env = AllowedEnv::from_parent();
    let shell = ProcessGateway::new(CommandPolicy::from_names(["printf", "uptime"]), env.clone());
    let pipeline = MediaPipeline::new(
        ProcessGateway::new(CommandPolicy::from_names(["sh"]), env),
        HttpFetcher::from_config(&config).unwrap(),
        PipelineSettings::from_config(&config),
    )
    .with_transcoder(ToolCommand::new("sh").with_leading_args(["-c", transcoder_script, "ffmpeg"]));
    AppContext::from_parts(config, shell, pipeline).unwrap()
}

fn write_frames(dir: &Path, count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            let path = dir.join(format!("frame{i}.png"));
            std::fs::write(&path, vec![b'0' + i as u8; 48]).unwrap();
            path.display().to_string()
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Shell commands
// ---------------------------------------------------------------------------

#[tokio::test]
async fn allowed_command_output_is_sanitized_monospace() {
    let temp = tempfile::tempdir().unwrap();
    let ctx = context(temp.path(), "cat");

    let reply = shell::run_command_line(ctx.shell(), r"printf \033[1mbold\033[0m", budget())
        .await
        .unwrap();

    assert_eq!(reply, Reply::monospace("bold"));
    ctx.shutdown().await;
}

#[tokio::test]
async fn disallowed_command_is_a_text_notice() {
    let temp = tempfile::tempdir().unwrap();
    let ctx = context(temp.path(), "cat");

    let reply = shell::run_command_line(ctx.shell(), "rm -rf /", budget())
        .await
        .unwrap();

    assert_eq!(reply, Reply::text("rm: inaccessible or not found"));
    ctx.shutdown().await;
}

#[tokio::test]
async fn oversized_output_is_delivered_as_a_document() {
    let temp = tempfile::tempdir().unwrap();
    let ctx = context(temp.path(), "cat");

    let reply = shell::run_command_line(ctx.shell(), "printf %5000s x", budget())
        .await
        .unwrap();

    assert_eq!(
        reply.caption(),
        Some("Command output too long (5000 > 4095)!\nHere is your output text document.")
    );
    assert_matches!(
        reply,
        Reply::Document { media: MediaSource::Upload { ref filename, ref bytes }, .. }
            if filename == "printf_%5000s_x.txt" && bytes.len() == 5000
    );
    ctx.shutdown().await;
}

#[tokio::test]
async fn production_allowlist_excludes_media_tools() {
    let ctx = AppContext::from_config(OrchestratorConfig::default()).unwrap();

    let reply = shell::run_command_line(ctx.shell(), "ffmpeg -version", budget())
        .await
        .unwrap();

    assert_eq!(reply, Reply::text("ffmpeg: inaccessible or not found"));
    ctx.shutdown().await;
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

#[tokio::test]
async fn identical_requests_are_served_from_cache() {
    let temp = tempfile::tempdir().unwrap();
    let frames = tempfile::tempdir().unwrap();
    let ctx = context(temp.path(), "cat");
    let sources = write_frames(frames.path(), 3);
    let request = RenderRequest::new(FrameJob::from_sources(&sources), TranscodeOptions::default());

    let first = render::render_frames(&ctx, &request, Some("clip".into()))
        .await
        .unwrap();
    let second = render::render_frames(&ctx, &request, None).await.unwrap();

    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert_eq!(first.fingerprint, second.fingerprint);
    assert_eq!(first.reply.caption(), Some("clip"));
    assert_matches!(
        &second.reply,
        Reply::Animation { media: MediaSource::Upload { bytes, filename }, .. }
            if bytes.len() == 144 && bytes[0] == b'0' && bytes[143] == b'2' && filename.ends_with(".mkv")
    );
    assert_eq!(ctx.renders().len(), 1);
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    ctx.shutdown().await;
}

#[tokio::test]
async fn missing_frame_fails_the_render_and_caches_nothing() {
    let temp = tempfile::tempdir().unwrap();
    let frames = tempfile::tempdir().unwrap();
    let ctx = context(temp.path(), "cat");
    let mut sources = write_frames(frames.path(), 1);
    sources.push(frames.path().join("absent.png").display().to_string());
    let request = RenderRequest::new(FrameJob::from_sources(&sources), TranscodeOptions::default());

    let err = render::render_frames(&ctx, &request, None).await.unwrap_err();

    assert_matches!(err, PipelineError::Fetch(FetchError::NotFound { index: 1, .. }));
    assert!(ctx.renders().is_empty());
    ctx.shutdown().await;
}

#[tokio::test]
async fn failed_transcode_is_not_cached() {
    let temp = tempfile::tempdir().unwrap();
    let frames = tempfile::tempdir().unwrap();
    let ctx = context(temp.path(), "cat >/dev/null; echo 'no encoder' >&2; exit 1");
    let sources = write_frames(frames.path(), 2);
    let request = RenderRequest::new(FrameJob::from_sources(&sources), TranscodeOptions::default());

    let err = render::render_frames(&ctx, &request, None).await.unwrap_err();

    assert_matches!(err, PipelineError::TranscodeFailed { ref detail } if detail == "no encoder");
    assert!(ctx.renders().is_empty());
    ctx.shutdown().await;
}

#[tokio::test]
async fn timed_sources_render_as_a_slideshow() {
    let temp = tempfile::tempdir().unwrap();
    let frames = tempfile::tempdir().unwrap();
    let script = r#"case "$*" in *"-loop 1 -t 1.5 -i "*) ;; *) echo "untimed: $*" >&2; exit 2;; esac; for last; do :; done; head -c 100 /dev/zero > "$last""#;
    let ctx = context(temp.path(), script);
    let mut sources = write_frames(frames.path(), 2);
    sources[0].push_str("@1.5");
    let jobs = FrameJob::from_timed_sources(&sources);
    assert_eq!(jobs[0].duration, Some(1.5));
    let request = RenderRequest::new(
        jobs,
        TranscodeOptions::default().with_strategy(Strategy::Filesystem),
    );

    let outcome = render::render_frames(&ctx, &request, None).await.unwrap();

    assert_matches!(
        &outcome.reply,
        Reply::Animation { media: MediaSource::Upload { bytes, filename }, .. }
            if bytes.len() == 100 && filename.ends_with(".mp4")
    );
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    ctx.shutdown().await;
}
