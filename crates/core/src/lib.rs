//! Core building blocks of the sino bot's resource orchestration layer.
//!
//! - [`cache`]: bounded, optionally compressing in-memory cache.
//! - [`process`]: allow-listed, argv-only process gateway.
//! - [`reply`]: tagged reply union and lookup results for the front end.
//! - [`config`]: environment-driven settings.
//! - [`hashing`]: request fingerprints for cache keys.

pub mod cache;
pub mod config;
pub mod error;
pub mod hashing;
pub mod process;
pub mod reply;

pub use error::ConfigError;
