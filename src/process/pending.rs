//! Pending processes: a command plus everything needed to run it, resolved
//! against fake handlers before anything is spawned.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::ProcessError;
use super::factory::Factory;
use super::fake::{FakeHandlers, FakeProcessDescription};
use super::invoked::{InvokedProcess, OutputCallback, RealProcess};
use super::result::{OutputKind, ProcessResult};

/// Timeout applied to new pending processes unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// The program to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessCommand {
    /// A command line interpreted by `sh -c`.
    Shell(String),
    /// A program and its arguments, executed without a shell.
    Argv(Vec<String>),
}

impl ProcessCommand {
    /// The command as a single line, used for fake matching and assertions.
    ///
    /// Argv arguments that need it are single-quoted.
    #[must_use]
    pub fn command_line(&self) -> String {
        match self {
            Self::Shell(line) => line.clone(),
            Self::Argv(argv) => argv.iter().map(|arg| quote(arg)).collect::<Vec<_>>().join(" "),
        }
    }
}

fn quote(arg: &str) -> Cow<'_, str> {
    let plain = !arg.is_empty()
        && arg.chars().all(|c| c.is_ascii_alphanumeric() || "-_./=:,@%+".contains(c));
    if plain {
        Cow::Borrowed(arg)
    } else {
        Cow::Owned(format!("'{}'", arg.replace('\'', r"'\''")))
    }
}

impl From<&str> for ProcessCommand {
    fn from(line: &str) -> Self {
        Self::Shell(line.to_string())
    }
}

impl From<String> for ProcessCommand {
    fn from(line: String) -> Self {
        Self::Shell(line)
    }
}

impl From<&String> for ProcessCommand {
    fn from(line: &String) -> Self {
        Self::Shell(line.clone())
    }
}

impl From<Vec<String>> for ProcessCommand {
    fn from(argv: Vec<String>) -> Self {
        Self::Argv(argv)
    }
}

impl From<Vec<&str>> for ProcessCommand {
    fn from(argv: Vec<&str>) -> Self {
        Self::Argv(argv.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for ProcessCommand {
    fn from(argv: [&str; N]) -> Self {
        Self::Argv(argv.into_iter().map(str::to_string).collect())
    }
}

/// A not-yet-executed process specification.
///
/// Built fluently, usually from [`Factory::new_pending_process`], then either
/// run to completion or started in the background.
#[derive(Clone)]
pub struct PendingProcess {
    factory: Option<Factory>,
    command: Option<ProcessCommand>,
    path: Option<PathBuf>,
    env: BTreeMap<String, String>,
    timeout: Option<Duration>,
    input: Option<String>,
    quietly: bool,
    fake_handlers: FakeHandlers,
}

impl Default for PendingProcess {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PendingProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingProcess")
            .field("command", &self.command)
            .field("path", &self.path)
            .field("env", &self.env)
            .field("timeout", &self.timeout)
            .field("input", &self.input)
            .field("quietly", &self.quietly)
            .finish_non_exhaustive()
    }
}

impl PendingProcess {
    /// A pending process that belongs to no factory: never faked, never recorded.
    #[must_use]
    pub fn new() -> Self {
        Self {
            factory: None,
            command: None,
            path: None,
            env: BTreeMap::new(),
            timeout: Some(DEFAULT_TIMEOUT),
            input: None,
            quietly: false,
            fake_handlers: FakeHandlers::default(),
        }
    }

    pub(crate) fn for_factory(factory: Factory) -> Self {
        Self { factory: Some(factory), ..Self::new() }
    }

    /// Replaces the fake handlers consulted before spawning.
    #[must_use]
    pub fn with_fake_handlers(mut self, handlers: FakeHandlers) -> Self {
        self.fake_handlers = handlers;
        self
    }

    /// Sets the command.
    #[must_use]
    pub fn command(mut self, command: impl Into<ProcessCommand>) -> Self {
        self.command = Some(command.into());
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Adds environment variables on top of the inherited environment.
    #[must_use]
    pub fn env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env.extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Sets the maximum run time.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Removes the timeout.
    #[must_use]
    pub fn forever(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Sets text written to the process's standard input.
    #[must_use]
    pub fn input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// Discards output instead of capturing it.
    #[must_use]
    pub fn quietly(mut self) -> Self {
        self.quietly = true;
        self
    }

    /// The command as a single line, or empty when unset.
    #[must_use]
    pub fn command_line(&self) -> String {
        self.command.as_ref().map(ProcessCommand::command_line).unwrap_or_default()
    }

    /// The command, if set.
    #[must_use]
    pub fn process_command(&self) -> Option<&ProcessCommand> {
        self.command.as_ref()
    }

    /// The working directory, if set.
    #[must_use]
    pub fn working_directory(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Environment variables added for this process.
    #[must_use]
    pub fn environment(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// The timeout, or `None` when the process may run forever.
    #[must_use]
    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout
    }

    /// Standard input text, if set.
    #[must_use]
    pub fn input_text(&self) -> Option<&str> {
        self.input.as_deref()
    }

    /// Whether output is discarded.
    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.quietly
    }

    /// Runs the process to completion.
    ///
    /// # Errors
    ///
    /// See [`run_with_output`](Self::run_with_output).
    pub fn run(self) -> Result<ProcessResult, ProcessError> {
        self.run_with_output(|_, _| {})
    }

    /// Runs the process to completion, passing each chunk of output to
    /// `on_output` as it arrives.
    ///
    /// A matching fake handler answers without spawning anything. The exit
    /// code is reported, never turned into an error; use
    /// [`ProcessResult::throw_if_failed`] for that.
    ///
    /// # Errors
    ///
    /// Returns an error when no command is set, when stray processes are
    /// prevented and nothing matched, when a fake sequence is exhausted, or
    /// when the process cannot be spawned or exceeds its timeout.
    pub fn run_with_output<F>(self, mut on_output: F) -> Result<ProcessResult, ProcessError>
    where
        F: FnMut(OutputKind, &str),
    {
        let command = self.command.clone().ok_or(ProcessError::MissingCommand)?;
        let command_line = command.command_line();

        if let Some(description) = self.resolve_fake(&command_line)? {
            let result = description.replay(&command_line, &mut on_output);
            self.record(&result);
            return Ok(result);
        }

        self.guard_against_stray(&command_line)?;
        let result = RealProcess::spawn(&self, &command, command_line)?.wait(&mut on_output)?;
        self.record(&result);
        Ok(result)
    }

    /// Starts the process without waiting for it.
    ///
    /// # Errors
    ///
    /// Same as [`run`](Self::run), minus the timeout, which is enforced by
    /// [`InvokedProcess::wait`].
    pub fn start(self) -> Result<InvokedProcess, ProcessError> {
        self.start_inner(None)
    }

    /// Starts the process, passing output chunks to `on_output` while it is
    /// polled or waited on.
    ///
    /// # Errors
    ///
    /// See [`start`](Self::start).
    pub fn start_with_output<F>(self, on_output: F) -> Result<InvokedProcess, ProcessError>
    where
        F: FnMut(OutputKind, &str) + Send + 'static,
    {
        self.start_inner(Some(Box::new(on_output)))
    }

    fn start_inner(self, on_output: Option<OutputCallback>) -> Result<InvokedProcess, ProcessError> {
        let mut process = self.start_unrecorded(on_output)?;
        process.commit_record();
        Ok(process)
    }

    /// Starts the process but holds back recording a fake until
    /// [`InvokedProcess::commit_record`] is called.
    pub(crate) fn start_unrecorded(self, on_output: Option<OutputCallback>) -> Result<InvokedProcess, ProcessError> {
        let command = self.command.clone().ok_or(ProcessError::MissingCommand)?;
        let command_line = command.command_line();

        if let Some(description) = self.resolve_fake(&command_line)? {
            let result = description.to_result(&command_line);
            let process = InvokedProcess::fake(command_line, description, on_output);
            return Ok(process.with_unrecorded(self, result));
        }

        self.guard_against_stray(&command_line)?;
        let process = RealProcess::spawn(&self, &command, command_line)?;
        Ok(InvokedProcess::real(process, self, on_output))
    }

    fn resolve_fake(&self, command_line: &str) -> Result<Option<FakeProcessDescription>, ProcessError> {
        let Some(handler) = self.fake_handlers.resolve(command_line) else {
            return Ok(None);
        };
        debug!(command = %command_line, "resolved process against fake handler");
        Ok(Some(handler.resolve(self)?.into_description()))
    }

    fn guard_against_stray(&self, command_line: &str) -> Result<(), ProcessError> {
        if self.factory.as_ref().is_some_and(Factory::preventing_stray_processes) {
            warn!(command = %command_line, "blocked stray process");
            return Err(ProcessError::StrayProcess { command: command_line.to_string() });
        }
        Ok(())
    }

    pub(crate) fn record(&self, result: &ProcessResult) {
        if let Some(factory) = &self.factory {
            factory.record_if_recording(self.detached(), result.clone());
        }
    }

    /// A copy that no longer refers to its factory, for storing in the log.
    fn detached(&self) -> Self {
        Self { factory: None, fake_handlers: FakeHandlers::default(), ..self.clone() }
    }
}
