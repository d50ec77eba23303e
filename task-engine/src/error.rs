//! Errors surfaced by the engine's configuration loading and CLI.

use thiserror::Error;

/// Top-level error type for everything outside the execution core itself
/// (which never returns an error — see [`task_executor::execute`]).
#[derive(Debug, Error)]
pub enum EngineError {
    /// A config file or extra-rules file could not be read.
    #[error("io error reading {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// A config or rules file did not parse as the expected JSON shape.
    #[error("invalid json in {path}: {source}")]
    Json {
        /// Path that failed to parse.
        path: String,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
    /// A CLI argument or subcommand was malformed.
    #[error("{0}")]
    Config(String),
}
