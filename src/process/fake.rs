//! Fake process results and the handler table that substitutes them for
//! real execution.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use super::error::ProcessError;
use super::pattern::{CommandPattern, CATCH_ALL};
use super::pending::PendingProcess;
use super::result::{OutputKind, ProcessResult};

/// Output text for a fake, given either as one string or as a list of lines.
///
/// Non-empty output always ends with exactly one newline per line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FakeOutput(String);

impl FakeOutput {
    fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let text: String =
            lines.into_iter().map(|line| format!("{}\n", line.as_ref().trim_end_matches('\n'))).collect();
        Self(text)
    }

    fn from_text(text: &str) -> Self {
        if text.is_empty() {
            return Self::default();
        }
        Self(format!("{}\n", text.trim_end_matches('\n')))
    }

    /// The normalized text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FakeOutput {
    fn from(text: &str) -> Self {
        Self::from_text(text)
    }
}

impl From<String> for FakeOutput {
    fn from(text: String) -> Self {
        Self::from_text(&text)
    }
}

impl From<Vec<&str>> for FakeOutput {
    fn from(lines: Vec<&str>) -> Self {
        Self::from_lines(lines)
    }
}

impl From<Vec<String>> for FakeOutput {
    fn from(lines: Vec<String>) -> Self {
        Self::from_lines(lines)
    }
}

impl<const N: usize> From<[&str; N]> for FakeOutput {
    fn from(lines: [&str; N]) -> Self {
        Self::from_lines(lines)
    }
}

/// A literal fake result: output, error output and exit code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FakeProcessResult {
    output: String,
    error_output: String,
    exit_code: i32,
}

impl FakeProcessResult {
    /// Creates a fake result.
    pub fn new(output: impl Into<FakeOutput>, error_output: impl Into<FakeOutput>, exit_code: i32) -> Self {
        Self {
            output: output.into().0,
            error_output: error_output.into().0,
            exit_code,
        }
    }

    /// A fake result whose output is kept byte for byte.
    pub(crate) fn verbatim(output: String, error_output: String, exit_code: i32) -> Self {
        Self { output, error_output, exit_code }
    }

    /// A copy of this result with different output.
    #[must_use]
    pub fn with_output(self, output: impl Into<FakeOutput>) -> Self {
        Self { output: output.into().0, ..self }
    }

    /// A copy of this result with different error output.
    #[must_use]
    pub fn with_error_output(self, error_output: impl Into<FakeOutput>) -> Self {
        Self { error_output: error_output.into().0, ..self }
    }

    /// A copy of this result with a different exit code.
    #[must_use]
    pub fn with_exit_code(self, exit_code: i32) -> Self {
        Self { exit_code, ..self }
    }

    /// The faked standard output.
    #[must_use]
    pub fn output(&self) -> &str {
        &self.output
    }

    /// The faked standard error.
    #[must_use]
    pub fn error_output(&self) -> &str {
        &self.error_output
    }

    /// The faked exit code.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    /// The result a process running `command` would report.
    #[must_use]
    pub fn to_result(&self, command: &str) -> ProcessResult {
        ProcessResult::new(command, Some(self.exit_code), &self.output, &self.error_output)
    }
}

/// A scripted fake lifecycle: output chunks in order, an exit code and the
/// number of `running()` polls that report the process as still alive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeProcessDescription {
    process_id: u32,
    chunks: Vec<(OutputKind, String)>,
    exit_code: i32,
    iterations: usize,
}

impl Default for FakeProcessDescription {
    fn default() -> Self {
        Self { process_id: 1000, chunks: Vec::new(), exit_code: 0, iterations: 0 }
    }
}

impl FakeProcessDescription {
    /// Starts an empty description: no output, exit code zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the reported process id.
    #[must_use]
    pub fn id(mut self, process_id: u32) -> Self {
        self.process_id = process_id;
        self
    }

    /// Appends a line of standard output.
    #[must_use]
    pub fn output(mut self, line: impl AsRef<str>) -> Self {
        self.chunks.push((OutputKind::Stdout, format!("{}\n", line.as_ref().trim_end_matches('\n'))));
        self
    }

    /// Appends a line of standard error.
    #[must_use]
    pub fn error_output(mut self, line: impl AsRef<str>) -> Self {
        self.chunks.push((OutputKind::Stderr, format!("{}\n", line.as_ref().trim_end_matches('\n'))));
        self
    }

    /// Replaces all standard output with `output`.
    #[must_use]
    pub fn replace_output(mut self, output: impl Into<FakeOutput>) -> Self {
        self.chunks.retain(|(kind, _)| *kind != OutputKind::Stdout);
        let output = output.into().0;
        if !output.is_empty() {
            self.chunks.push((OutputKind::Stdout, output));
        }
        self
    }

    /// Replaces all standard error with `output`.
    #[must_use]
    pub fn replace_error_output(mut self, output: impl Into<FakeOutput>) -> Self {
        self.chunks.retain(|(kind, _)| *kind != OutputKind::Stderr);
        let output = output.into().0;
        if !output.is_empty() {
            self.chunks.push((OutputKind::Stderr, output));
        }
        self
    }

    /// Sets the exit code.
    #[must_use]
    pub fn exit_code(mut self, exit_code: i32) -> Self {
        self.exit_code = exit_code;
        self
    }

    /// Number of `running()` polls that report the process as alive.
    #[must_use]
    pub fn iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub(crate) fn process_id(&self) -> u32 {
        self.process_id
    }

    pub(crate) fn run_iterations(&self) -> usize {
        self.iterations
    }

    pub(crate) fn chunks(&self) -> &[(OutputKind, String)] {
        &self.chunks
    }

    /// The result a process running `command` would report.
    #[must_use]
    pub fn to_result(&self, command: &str) -> ProcessResult {
        let mut output = String::new();
        let mut error_output = String::new();
        for (kind, chunk) in &self.chunks {
            match kind {
                OutputKind::Stdout => output.push_str(chunk),
                OutputKind::Stderr => error_output.push_str(chunk),
            }
        }
        ProcessResult::new(command, Some(self.exit_code), output, error_output)
    }

    /// Feeds every chunk to `on_output` and returns the final result.
    pub(crate) fn replay(&self, command: &str, on_output: &mut dyn FnMut(OutputKind, &str)) -> ProcessResult {
        for (kind, chunk) in &self.chunks {
            on_output(*kind, chunk);
        }
        self.to_result(command)
    }
}

impl From<FakeProcessResult> for FakeProcessDescription {
    fn from(result: FakeProcessResult) -> Self {
        let mut description = Self::new().exit_code(result.exit_code);
        if !result.output.is_empty() {
            description.chunks.push((OutputKind::Stdout, result.output));
        }
        if !result.error_output.is_empty() {
            description.chunks.push((OutputKind::Stderr, result.error_output));
        }
        description
    }
}

/// What a fake handler produces for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeResponse {
    /// A literal result.
    Result(FakeProcessResult),
    /// A scripted lifecycle.
    Description(FakeProcessDescription),
}

impl FakeResponse {
    pub(crate) fn into_description(self) -> FakeProcessDescription {
        match self {
            Self::Result(result) => result.into(),
            Self::Description(description) => description,
        }
    }
}

impl From<FakeProcessResult> for FakeResponse {
    fn from(result: FakeProcessResult) -> Self {
        Self::Result(result)
    }
}

impl From<FakeProcessDescription> for FakeResponse {
    fn from(description: FakeProcessDescription) -> Self {
        Self::Description(description)
    }
}

impl From<&str> for FakeResponse {
    fn from(output: &str) -> Self {
        Self::Result(FakeProcessResult::new(output, "", 0))
    }
}

impl From<String> for FakeResponse {
    fn from(output: String) -> Self {
        Self::Result(FakeProcessResult::new(output, "", 0))
    }
}

/// Responses handed out one per invocation, in order.
#[derive(Debug)]
pub struct FakeProcessSequence {
    responses: Mutex<VecDeque<FakeResponse>>,
    fail_when_empty: bool,
    empty_response: FakeProcessResult,
}

impl FakeProcessSequence {
    /// Creates a sequence from the given responses.
    pub fn new<I, R>(responses: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<FakeResponse>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            fail_when_empty: true,
            empty_response: FakeProcessResult::default(),
        }
    }

    /// Appends a response.
    #[must_use]
    pub fn push(self, response: impl Into<FakeResponse>) -> Self {
        self.queue().push_back(response.into());
        self
    }

    /// Appends `response` `times` times.
    #[must_use]
    pub fn push_times(self, response: impl Into<FakeResponse>, times: usize) -> Self {
        let response = response.into();
        self.queue().extend(std::iter::repeat(response).take(times));
        self
    }

    /// Once exhausted, keep answering with an empty successful result
    /// instead of failing.
    #[must_use]
    pub fn dont_fail_when_empty(self) -> Self {
        Self { fail_when_empty: false, ..self }
    }

    /// Whether every response has been handed out.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue().is_empty()
    }

    /// Takes the next response.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::SequenceExhausted`] when empty, unless
    /// [`dont_fail_when_empty`](Self::dont_fail_when_empty) was set.
    pub fn next_response(&self) -> Result<FakeResponse, ProcessError> {
        match self.queue().pop_front() {
            Some(response) => Ok(response),
            None if self.fail_when_empty => Err(ProcessError::SequenceExhausted),
            None => Ok(FakeResponse::Result(self.empty_response.clone())),
        }
    }

    fn queue(&self) -> std::sync::MutexGuard<'_, VecDeque<FakeResponse>> {
        self.responses.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

type HandlerFn = dyn Fn(&PendingProcess) -> Result<FakeResponse, ProcessError> + Send + Sync;

/// A function or literal value substituted for real process execution.
#[derive(Clone)]
pub struct FakeHandler(Arc<HandlerFn>);

impl FakeHandler {
    /// Wraps a closure that inspects the pending process and picks a response.
    pub fn using<F, R>(handler: F) -> Self
    where
        F: Fn(&PendingProcess) -> R + Send + Sync + 'static,
        R: Into<FakeResponse>,
    {
        Self(Arc::new(move |process: &PendingProcess| Ok::<FakeResponse, ProcessError>(handler(process).into())))
    }

    /// Resolves the response for `process`.
    ///
    /// # Errors
    ///
    /// Propagates sequence exhaustion.
    pub fn resolve(&self, process: &PendingProcess) -> Result<FakeResponse, ProcessError> {
        (self.0)(process)
    }

    fn constant(response: FakeResponse) -> Self {
        Self(Arc::new(move |_: &PendingProcess| Ok::<_, ProcessError>(response.clone())))
    }
}

impl fmt::Debug for FakeHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FakeHandler(..)")
    }
}

impl From<FakeResponse> for FakeHandler {
    fn from(response: FakeResponse) -> Self {
        Self::constant(response)
    }
}

impl From<FakeProcessResult> for FakeHandler {
    fn from(result: FakeProcessResult) -> Self {
        Self::constant(result.into())
    }
}

impl From<FakeProcessDescription> for FakeHandler {
    fn from(description: FakeProcessDescription) -> Self {
        Self::constant(description.into())
    }
}

impl From<&str> for FakeHandler {
    fn from(output: &str) -> Self {
        Self::constant(output.into())
    }
}

impl From<String> for FakeHandler {
    fn from(output: String) -> Self {
        Self::constant(output.into())
    }
}

impl From<FakeProcessSequence> for FakeHandler {
    fn from(sequence: FakeProcessSequence) -> Self {
        let sequence = Arc::new(sequence);
        Self(Arc::new(move |_: &PendingProcess| sequence.next_response()))
    }
}

/// Ordered pattern table. Explicit patterns are tried in insertion order;
/// the catch-all is consulted last.
#[derive(Debug, Clone, Default)]
pub struct FakeHandlers {
    entries: Vec<(CommandPattern, FakeHandler)>,
}

impl FakeHandlers {
    /// A table holding only a catch-all handler.
    #[must_use]
    pub fn catch_all(handler: FakeHandler) -> Self {
        let mut handlers = Self::default();
        handlers.insert(CATCH_ALL, handler);
        handlers
    }

    /// Adds a handler, replacing any handler already registered for the
    /// same pattern while keeping its position.
    pub fn insert(&mut self, pattern: impl Into<String>, handler: FakeHandler) {
        self.insert_pattern(CommandPattern::new(pattern), handler);
    }

    /// Adds a handler for exactly `command`, with no wildcard expansion.
    pub fn insert_exact(&mut self, command: impl Into<String>, handler: FakeHandler) {
        self.insert_pattern(CommandPattern::exact(command), handler);
    }

    fn insert_pattern(&mut self, pattern: CommandPattern, handler: FakeHandler) {
        let existing = self
            .entries
            .iter_mut()
            .find(|(p, _)| p.as_str() == pattern.as_str() && p.is_exact() == pattern.is_exact());
        if let Some(entry) = existing {
            entry.1 = handler;
        } else {
            self.entries.push((pattern, handler));
        }
    }

    /// Whether no handler is installed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The handler for `command`, if any.
    #[must_use]
    pub fn resolve(&self, command: &str) -> Option<&FakeHandler> {
        self.entries
            .iter()
            .find(|(pattern, _)| !pattern.is_catch_all() && pattern.matches(command))
            .or_else(|| self.entries.iter().find(|(pattern, _)| pattern.is_catch_all()))
            .map(|(_, handler)| handler)
    }
}
