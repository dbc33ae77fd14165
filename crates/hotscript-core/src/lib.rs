//! # HotScript Core
//!
//! Hosting engine for externally authored `.gs` scripts that extend a host
//! application at runtime:
//! - Virtual code filesystem layering in-memory files over mapped directories
//! - Remote archive fetching into that filesystem
//! - Symbol discovery of extension points and their methods
//! - Binder compilation turning `(object, method)` into a script callable
//! - Solutions holding one immutable generation of compiled scripts
//! - A supervisor that rebuilds and republishes solutions on change
//!
//! Scripts run on the embedded HotScript interpreter (Go-like syntax).

#![warn(clippy::all)]

pub mod ast;
pub mod codefs;
pub mod evaluator;
pub mod fetch;
pub mod host;
pub mod hotreload;
pub mod options;
pub mod parser;
pub mod script;
pub mod solution;

// Re-export commonly used types
pub use codefs::{CodeFs, FsError};
pub use evaluator::{
    EvaluatorError, HostObject, Interpreter, ScriptInterpreter, SymbolTable, Value,
};
pub use fetch::{ArchiveFetcher, FetchError, RemoteFingerprint};
pub use host::ScriptRef;
pub use hotreload::{load_solution, ScriptHost};
pub use options::{OptionsError, ScriptOptions};
pub use parser::ParseError;
pub use script::{BindMode, Script, ScriptLibrary};
pub use solution::{Project, Solution, SolutionError};

/// HotScript version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// File extension of script sources
pub const SOURCE_EXTENSION: &str = "gs";

/// Initialize tracing for HotScript components
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("hotscript_core=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Error types for script hosting
#[derive(thiserror::Error, Debug)]
pub enum HotScriptError {
    #[error("Configuration error: {0}")]
    Options(#[from] OptionsError),

    #[error("Load error: {0}")]
    Solution(#[from] SolutionError),

    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluatorError),

    #[error("Callback error: {0}")]
    Callback(#[from] anyhow::Error),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("script host is shut down")]
    ShutDown,

    #[error("Task error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result type for script hosting operations
pub type Result<T> = std::result::Result<T, HotScriptError>;
