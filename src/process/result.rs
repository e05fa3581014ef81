//! Results of finished processes.

use serde::{Deserialize, Serialize};

use super::error::ProcessError;

/// Which stream a chunk of process output was written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

/// The outcome of a process that ran to completion, for real or faked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessResult {
    command: String,
    exit_code: Option<i32>,
    output: String,
    error_output: String,
}

impl ProcessResult {
    /// Creates a result from its raw parts.
    ///
    /// `exit_code` is `None` when the process was terminated by a signal.
    pub fn new(
        command: impl Into<String>,
        exit_code: Option<i32>,
        output: impl Into<String>,
        error_output: impl Into<String>,
    ) -> Self {
        Self {
            command: command.into(),
            exit_code,
            output: output.into(),
            error_output: error_output.into(),
        }
    }

    /// The command line that produced this result.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Whether the process exited with status zero.
    #[must_use]
    pub fn successful(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Whether the process exited with a non-zero status or was killed.
    #[must_use]
    pub fn failed(&self) -> bool {
        !self.successful()
    }

    /// The exit code, if the process exited normally.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Everything the process wrote to standard output.
    #[must_use]
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Everything the process wrote to standard error.
    #[must_use]
    pub fn error_output(&self) -> &str {
        &self.error_output
    }

    /// Whether standard output contains `needle`.
    #[must_use]
    pub fn seen_in_output(&self, needle: &str) -> bool {
        self.output.contains(needle)
    }

    /// Whether standard error contains `needle`.
    #[must_use]
    pub fn seen_in_error_output(&self, needle: &str) -> bool {
        self.error_output.contains(needle)
    }

    /// Returns the result unchanged when successful, or a
    /// [`ProcessError::Failed`] carrying it otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Failed`] when the process failed.
    pub fn throw_if_failed(self) -> Result<Self, ProcessError> {
        if self.failed() {
            return Err(ProcessError::Failed(Box::new(self)));
        }
        Ok(self)
    }

    pub(crate) fn exit_code_label(&self) -> String {
        self.exit_code.map_or_else(|| "none (terminated by signal)".to_string(), |c| c.to_string())
    }
}
