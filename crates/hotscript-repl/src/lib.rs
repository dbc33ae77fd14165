//! HotScript REPL - interactive console for a hot-reloading script solution
//!
//! This crate provides command parsing and evaluation over a running
//! `ScriptHost`.

pub mod repl;

// Re-export commonly used types for convenience
pub use repl::{Repl, ReplCommand};
