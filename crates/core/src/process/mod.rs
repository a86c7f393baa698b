//! Sandboxed process execution.
//!
//! Programs are spawned by argument vector only, after an allowlist check,
//! with a scrubbed environment. Output is buffered per call, optionally
//! sanitized for chat rendering, and bounded in size.

mod capture;
pub mod env;
pub mod gateway;
pub mod invocation;
pub mod policy;
pub mod sanitize;

pub use env::AllowedEnv;
pub use gateway::{GatewayError, PlainOutput, ProcessGateway};
pub use invocation::{
    Captured, Encoding, ProcessInvocation, ProcessOutput, StreamMode, Streams, TimeBudget,
    DEFAULT_MAX_CAPTURE_BYTES,
};
pub use policy::CommandPolicy;
pub use sanitize::{ansi_filter, SanitizedText, OUTPUT_LIMIT_LENGTH};
