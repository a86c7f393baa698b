//! `sino-worker` -- runs the orchestration core from the command line.
//!
//! # Environment variables
//!
//! See [`sino_core::config::OrchestratorConfig::from_env`]. A `.env` file in
//! the working directory is loaded first. Log verbosity follows `RUST_LOG`.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use sino_core::config::{FetchBackend, OrchestratorConfig};
use sino_core::reply::{MediaSource, Reply};
use sino_pipeline::{FrameJob, RenderRequest, Strategy, TranscodeOptions};
use sino_worker::{render, shell, AppContext};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "sino-worker")]
#[command(about = "Sandboxed command runner and frame-to-video renderer")]
#[command(version)]
struct Cli {
    /// Frame fetcher, overriding `SINO_FETCHER`
    #[arg(long, value_enum, global = true)]
    fetcher: Option<FetcherArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an allow-listed command and print its reply
    Shell {
        /// Command and arguments, passed without a shell
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        argv: Vec<String>,
    },
    /// Fetch frames and assemble them into a video
    Render {
        /// Output frame rate
        #[arg(long, default_value_t = 5)]
        fps: u32,
        #[arg(long, value_enum, default_value_t = StrategyArg::Stream)]
        strategy: StrategyArg,
        /// Where to write the video (defaults to `<fingerprint>.<ext>`)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Frame URLs or local paths, in display order. Append `@SECONDS`
        /// to hold a frame for that long (implies `--strategy files`)
        #[arg(required = true)]
        sources: Vec<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    /// Pipe frames through stdin/stdout
    Stream,
    /// Stage frames as temp files
    Files,
}

#[derive(Clone, Copy, ValueEnum)]
enum FetcherArg {
    /// Built-in HTTP client
    Http,
    /// The wget binary
    Wget,
}

impl From<FetcherArg> for FetchBackend {
    fn from(value: FetcherArg) -> Self {
        match value {
            FetcherArg::Http => FetchBackend::Http,
            FetcherArg::Wget => FetchBackend::Wget,
        }
    }
}

impl From<StrategyArg> for Strategy {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::Stream => Strategy::Streaming,
            StrategyArg::Files => Strategy::Filesystem,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sino_worker=info,sino_core=info,sino_pipeline=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = OrchestratorConfig::from_env().context("invalid configuration")?;
    if let Some(fetcher) = cli.fetcher {
        config.fetch_backend = fetcher.into();
    }
    let ctx = AppContext::from_config(config).context("failed to build application context")?;

    let result = run(&ctx, cli.command).await;
    ctx.shutdown().await;
    result
}

async fn run(ctx: &AppContext, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Shell { argv } => {
            let reply = shell::run_argv(ctx.shell(), &argv, ctx.shell_budget()).await?;
            emit(&reply, None).await
        }
        Commands::Render {
            fps,
            strategy,
            out,
            sources,
        } => {
            let frames = FrameJob::from_timed_sources(&sources);
            let mut strategy = Strategy::from(strategy);
            if strategy == Strategy::Streaming && frames.iter().any(|f| f.duration.is_some()) {
                tracing::info!("Timed frames need staged files, switching strategy");
                strategy = Strategy::Filesystem;
            }
            let options = TranscodeOptions::default()
                .with_frame_rate(fps)
                .with_strategy(strategy);
            let request = RenderRequest::new(frames, options);
            let outcome = render::render_frames(ctx, &request, None).await?;
            tracing::info!(
                fingerprint = %outcome.fingerprint,
                from_cache = outcome.from_cache,
                "Render finished"
            );
            emit(&outcome.reply, out.as_deref()).await
        }
    }
}

/// Text goes to stdout; media is written to `out` or its upload name.
async fn emit(reply: &Reply, out: Option<&Path>) -> anyhow::Result<()> {
    match reply {
        Reply::Text { body, .. } => {
            println!("{body}");
        }
        Reply::Photo { media, caption }
        | Reply::Animation { media, caption }
        | Reply::Document { media, caption } => {
            if let Some(caption) = caption {
                eprintln!("{caption}");
            }
            match media {
                MediaSource::Url(url) => println!("{url}"),
                MediaSource::Upload { filename, bytes } => {
                    let path = out.map_or_else(|| PathBuf::from(filename), Path::to_path_buf);
                    tokio::fs::write(&path, bytes)
                        .await
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("{}", path.display());
                }
            }
        }
    }
    Ok(())
}
