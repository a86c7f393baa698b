//! Front-end handlers for the sino bot: interactive commands and frame
//! rendering, wired through one [`context::AppContext`].

pub mod context;
pub mod render;
pub mod shell;

pub use context::{AppContext, ContextError};
