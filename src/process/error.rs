//! Errors raised while resolving or running processes.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use super::result::ProcessResult;

/// Everything that can go wrong between building a process and reading its result.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The pending process was run without a command.
    #[error("no command was given to the process")]
    MissingCommand,

    /// The operating system refused to start the process.
    #[error("failed to start process [{command}]: {source}")]
    Spawn {
        /// The command line that failed to start.
        command: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Waiting on a started process failed.
    #[error("failed to wait for process [{command}]: {source}")]
    Wait {
        /// The command line being waited on.
        command: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The process ran longer than its timeout and was killed.
    #[error("process [{command}] exceeded the timeout of {} seconds", timeout.as_secs_f64())]
    Timeout {
        /// The command line that timed out.
        command: String,
        /// The timeout that was exceeded.
        timeout: Duration,
    },

    /// Stray processes are prevented and no fake matched this command.
    #[error("attempted process [{command}] without a matching fake")]
    StrayProcess {
        /// The unmatched command line.
        command: String,
    },

    /// A fake sequence ran out of responses.
    #[error("a process was invoked, but the process result sequence is empty")]
    SequenceExhausted,

    /// A process result was turned into an error with `throw_if_failed`.
    #[error(
        "process [{}] failed with exit code {}: {}",
        .0.command(),
        .0.exit_code_label(),
        .0.error_output().trim_end()
    )]
    Failed(Box<ProcessResult>),

    /// A cassette file could not be read or written.
    #[error("cassette {}: {source}", path.display())]
    CassetteIo {
        /// The cassette path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A cassette file could not be parsed or serialized.
    #[error("cassette {}: {source}", path.display())]
    CassetteFormat {
        /// The cassette path.
        path: PathBuf,
        /// The underlying YAML error.
        #[source]
        source: serde_yaml::Error,
    },
}
