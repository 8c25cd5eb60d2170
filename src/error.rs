use std::io;
use thiserror::Error;

use crate::config::settings::ConfigError;

/// Errors that can occur during git operations
#[derive(Debug, Error)]
pub enum GitError {
    #[error("Not a git repository")]
    NotARepository,

    #[error("git {operation} failed: {stderr}")]
    CommandFailed { operation: String, stderr: String },

    #[error("Failed to spawn git: {0}")]
    SpawnFailed(String),

    #[error("git {operation} timed out after {timeout_secs}s")]
    Timeout { operation: String, timeout_secs: u64 },

    #[error("git {operation} produced more than {limit_bytes} bytes of output")]
    OutputTooLarge { operation: String, limit_bytes: usize },

    #[error("Failed to parse git output: {0}")]
    ParseError(String),

    #[error("Unsupported git version {found}: the engine needs {required} or newer for {missing}")]
    GitVersionTooOld {
        found: String,
        required: String,
        missing: String,
    },

    #[error("Failed to detect git version: {0}")]
    GitVersionDetectionFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

/// Top-level engine error that wraps all module-specific errors
///
/// This provides a unified error type for embedding applications while
/// preserving the specific error context from each module. All module errors
/// automatically convert to EngineError via the `From` trait.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Git error: {0}")]
    Git(#[from] GitError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for git operations
pub type GitResult<T> = std::result::Result<T, GitError>;

/// Result type for engine-level operations
pub type EngineResult<T> = std::result::Result<T, EngineError>;
