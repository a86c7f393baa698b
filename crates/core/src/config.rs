//! Orchestration settings loaded from environment variables.
//!
//! All fields have defaults suitable for a single bot process. Call
//! `dotenvy::dotenv()` before [`OrchestratorConfig::from_env`] to pick up a
//! local `.env` file.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Default User-Agent sent with frame fetches.
pub const DEFAULT_USER_AGENT: &str = concat!("sino/", env!("CARGO_PKG_VERSION"));

/// How frame URLs are retrieved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchBackend {
    /// In-process HTTP client.
    #[default]
    Http,
    /// The `wget` binary, run through the media gateway.
    Wget,
}

impl FromStr for FetchBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "wget" => Ok(Self::Wget),
            other => Err(format!("unknown fetcher {other:?}, expected \"http\" or \"wget\"")),
        }
    }
}

impl fmt::Display for FetchBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Http => "http",
            Self::Wget => "wget",
        })
    }
}

/// Settings for the shared [`BoundedCache`](crate::cache::BoundedCache).
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries (must be positive).
    pub max_size: usize,
    /// Compress binary values on insert.
    pub compress: bool,
    /// Interval of the background bound-enforcement sweep.
    pub sweep_interval: Duration,
}

/// Top-level configuration for the gateway, pipeline and cache.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub cache: CacheConfig,
    /// Maximum simultaneous in-flight frame fetches.
    pub fetch_concurrency: usize,
    pub fetch_backend: FetchBackend,
    /// Per-request timeout for HTTP frame fetches.
    pub fetch_timeout: Duration,
    /// Wall-clock budget for interactive commands.
    pub shell_timeout: Duration,
    /// Grace period between the termination signal and the forced kill.
    pub shell_kill_grace: Duration,
    /// End-to-end budget for one media job. `None` disables the timeout.
    pub pipeline_timeout: Option<Duration>,
    /// Directory used for staged frames and transcoder output.
    pub temp_dir: PathBuf,
    pub user_agent: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig {
                max_size: 128,
                compress: true,
                sweep_interval: Duration::from_secs(3600),
            },
            fetch_concurrency: 8,
            fetch_backend: FetchBackend::Http,
            fetch_timeout: Duration::from_secs(10),
            shell_timeout: Duration::from_secs(30),
            shell_kill_grace: Duration::from_secs(10),
            pipeline_timeout: Some(Duration::from_secs(120)),
            temp_dir: std::env::temp_dir(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl OrchestratorConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                      | Default       |
    /// |------------------------------|---------------|
    /// | `SINO_CACHE_MAX_SIZE`        | `128`         |
    /// | `SINO_CACHE_COMPRESS`        | `true`        |
    /// | `SINO_CACHE_SWEEP_SECS`      | `3600`        |
    /// | `SINO_FETCH_CONCURRENCY`     | `8`           |
    /// | `SINO_FETCHER`               | `http` (or `wget`) |
    /// | `SINO_FETCH_TIMEOUT_SECS`    | `10`          |
    /// | `SINO_SHELL_TIMEOUT_SECS`    | `30`          |
    /// | `SINO_SHELL_GRACE_SECS`      | `10`          |
    /// | `SINO_PIPELINE_TIMEOUT_SECS` | `120` (0 = off) |
    /// | `SINO_TEMP_DIR`              | OS temp dir   |
    /// | `SINO_USER_AGENT`            | `sino/<ver>`  |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let max_size = parse_var(&lookup, "SINO_CACHE_MAX_SIZE", defaults.cache.max_size)?;
        if max_size == 0 {
            return Err(ConfigError::InvalidCacheCapacity(max_size));
        }

        let fetch_concurrency =
            parse_var(&lookup, "SINO_FETCH_CONCURRENCY", defaults.fetch_concurrency)?;
        if fetch_concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }

        let pipeline_secs: u64 = parse_var(&lookup, "SINO_PIPELINE_TIMEOUT_SECS", 120)?;

        let sweep_secs: u64 = parse_var(
            &lookup,
            "SINO_CACHE_SWEEP_SECS",
            defaults.cache.sweep_interval.as_secs(),
        )?;
        if sweep_secs == 0 {
            return Err(ConfigError::InvalidVar {
                name: "SINO_CACHE_SWEEP_SECS",
                value: "0".into(),
                reason: "sweep interval must be positive".into(),
            });
        }

        Ok(Self {
            cache: CacheConfig {
                max_size,
                compress: parse_var(&lookup, "SINO_CACHE_COMPRESS", defaults.cache.compress)?,
                sweep_interval: Duration::from_secs(sweep_secs),
            },
            fetch_concurrency,
            fetch_backend: parse_var(&lookup, "SINO_FETCHER", defaults.fetch_backend)?,
            fetch_timeout: Duration::from_secs(parse_var(
                &lookup,
                "SINO_FETCH_TIMEOUT_SECS",
                defaults.fetch_timeout.as_secs(),
            )?),
            shell_timeout: Duration::from_secs(parse_var(
                &lookup,
                "SINO_SHELL_TIMEOUT_SECS",
                defaults.shell_timeout.as_secs(),
            )?),
            shell_kill_grace: Duration::from_secs(parse_var(
                &lookup,
                "SINO_SHELL_GRACE_SECS",
                defaults.shell_kill_grace.as_secs(),
            )?),
            pipeline_timeout: (pipeline_secs > 0).then(|| Duration::from_secs(pipeline_secs)),
            temp_dir: lookup("SINO_TEMP_DIR")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.temp_dir),
            user_agent: lookup("SINO_USER_AGENT")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.user_agent),
        })
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidVar {
            name,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}
