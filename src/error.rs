//! Console-level errors.

use thiserror::Error;

use crate::process::ProcessError;

/// Result type alias for console commands.
pub type Result<T> = std::result::Result<T, ConsoleError>;

/// Errors surfaced by the console application and its commands.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// No command is registered under the requested name.
    #[error("Command \"{0}\" is not defined.")]
    CommandNotFound(String),

    /// Arguments did not match a command's definition.
    #[error(transparent)]
    Usage(#[from] clap::Error),

    /// Environment configuration could not be parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Reading input or writing output failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A process could not be run.
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// JSON rendering failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A command gave up with a message.
    #[error("{0}")]
    Failed(String),
}

impl ConsoleError {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new command failure
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    /// The process exit code this error maps to: clap's own code for usage
    /// errors, 1 for everything else.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(err) => err.exit_code(),
            _ => 1,
        }
    }
}
