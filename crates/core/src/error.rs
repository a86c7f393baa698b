/// Configuration errors. Fatal at construction time.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cache max_size must be a positive number, got {0}")]
    InvalidCacheCapacity(usize),

    #[error("invalid value for {name}: {value:?} ({reason})")]
    InvalidVar {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("fetch concurrency limit must be at least 1")]
    InvalidConcurrency,
}
