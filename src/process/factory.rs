//! The process factory: builds pending processes, holds fake handlers and
//! the log of recorded invocations.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::debug;

use super::cassette::Cassette;
use super::error::ProcessError;
use super::fake::{
    FakeHandler, FakeHandlers, FakeOutput, FakeProcessDescription, FakeProcessResult,
    FakeProcessSequence, FakeResponse,
};
use super::invoked::InvokedProcess;
use super::pending::{PendingProcess, ProcessCommand, DEFAULT_TIMEOUT};
use super::pool::{Pool, PoolKey, ProcessPoolResults};
use super::result::{OutputKind, ProcessResult};

/// A (process specification, result) pair logged for later assertions.
#[derive(Debug, Clone)]
pub struct RecordedProcess {
    /// The process as it was configured when it ran.
    pub process: PendingProcess,
    /// What it produced.
    pub result: ProcessResult,
}

struct FactoryState {
    recording: bool,
    recorded: Vec<RecordedProcess>,
    fake_handlers: FakeHandlers,
    prevent_stray_processes: bool,
    default_timeout: Option<Duration>,
}

impl Default for FactoryState {
    fn default() -> Self {
        Self {
            recording: false,
            recorded: Vec::new(),
            fake_handlers: FakeHandlers::default(),
            prevent_stray_processes: false,
            default_timeout: Some(DEFAULT_TIMEOUT),
        }
    }
}

/// Builds pending processes and, in tests, fakes and records them.
///
/// Clones share the same handlers and log.
#[derive(Clone, Default)]
pub struct Factory {
    state: Arc<Mutex<FactoryState>>,
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Factory")
            .field("recording", &state.recording)
            .field("recorded", &state.recorded.len())
            .field("prevent_stray_processes", &state.prevent_stray_processes)
            .finish_non_exhaustive()
    }
}

impl Factory {
    /// A factory that runs everything for real.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FactoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Builds a literal fake result.
    pub fn result(
        &self,
        output: impl Into<FakeOutput>,
        error_output: impl Into<FakeOutput>,
        exit_code: i32,
    ) -> FakeProcessResult {
        FakeProcessResult::new(output, error_output, exit_code)
    }

    /// Begins describing a fake process lifecycle.
    #[must_use]
    pub fn describe(&self) -> FakeProcessDescription {
        FakeProcessDescription::new()
    }

    /// Builds a sequence of fake responses handed out in order.
    pub fn sequence<I, R>(&self, responses: I) -> FakeProcessSequence
    where
        I: IntoIterator<Item = R>,
        R: Into<FakeResponse>,
    {
        FakeProcessSequence::new(responses)
    }

    /// Fakes every process with an empty successful result and starts recording.
    pub fn fake(&self) -> &Self {
        self.fake_using(|_: &PendingProcess| FakeProcessResult::default())
    }

    /// Fakes every process with `handler` and starts recording.
    ///
    /// Replaces any handlers installed earlier.
    pub fn fake_using<F, R>(&self, handler: F) -> &Self
    where
        F: Fn(&PendingProcess) -> R + Send + Sync + 'static,
        R: Into<FakeResponse>,
    {
        let mut state = self.state();
        state.recording = true;
        state.fake_handlers = FakeHandlers::catch_all(FakeHandler::using(handler));
        self
    }

    /// Installs handlers keyed by command pattern and starts recording.
    ///
    /// `*` in a pattern matches anything; the pattern `"*"` alone is the
    /// catch-all, consulted only when no other pattern matches. Handlers are
    /// merged into those installed earlier.
    pub fn fake_for<I, P, H>(&self, handlers: I) -> &Self
    where
        I: IntoIterator<Item = (P, H)>,
        P: Into<String>,
        H: Into<FakeHandler>,
    {
        let mut state = self.state();
        state.recording = true;
        for (pattern, handler) in handlers {
            state.fake_handlers.insert(pattern, handler.into());
        }
        self
    }

    /// Records real processes too, without faking anything.
    pub fn start_recording(&self) -> &Self {
        self.state().recording = true;
        self
    }

    /// Whether processes are being recorded.
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.state().recording
    }

    /// Records `process` and `result` when recording is on.
    pub fn record_if_recording(&self, process: PendingProcess, result: ProcessResult) -> &Self {
        if self.is_recording() {
            self.record(process, result);
        }
        self
    }

    /// Appends `process` and `result` to the log.
    pub fn record(&self, process: PendingProcess, result: ProcessResult) -> &Self {
        debug!(command = %result.command(), code = ?result.exit_code(), "recorded process");
        self.state().recorded.push(RecordedProcess { process, result });
        self
    }

    /// A snapshot of the log, in the order processes finished.
    #[must_use]
    pub fn recorded(&self) -> Vec<RecordedProcess> {
        self.state().recorded.clone()
    }

    /// Makes unmatched processes fail instead of running for real.
    pub fn prevent_stray_processes(&self, prevent: bool) -> &Self {
        self.state().prevent_stray_processes = prevent;
        self
    }

    /// Whether unmatched processes fail instead of running.
    #[must_use]
    pub fn preventing_stray_processes(&self) -> bool {
        self.state().prevent_stray_processes
    }

    /// Sets the timeout given to new pending processes (`None` for no timeout).
    pub fn set_default_timeout(&self, timeout: Option<Duration>) -> &Self {
        self.state().default_timeout = timeout;
        self
    }

    /// Clears handlers, the log and both flags.
    pub fn reset(&self) -> &Self {
        *self.state() = FactoryState::default();
        self
    }

    fn count_matching<F>(&self, predicate: F) -> usize
    where
        F: Fn(&PendingProcess, &ProcessResult) -> bool,
    {
        self.recorded().iter().filter(|entry| predicate(&entry.process, &entry.result)).count()
    }

    /// Asserts that at least one recorded process satisfies `predicate`.
    ///
    /// # Panics
    ///
    /// Panics when none does.
    #[track_caller]
    pub fn assert_ran<F>(&self, predicate: F) -> &Self
    where
        F: Fn(&PendingProcess, &ProcessResult) -> bool,
    {
        assert!(self.count_matching(predicate) > 0, "An expected process was not invoked.");
        self
    }

    /// Asserts that a process with exactly this command line ran.
    ///
    /// # Panics
    ///
    /// Panics when none did.
    #[track_caller]
    pub fn assert_ran_command(&self, command: &str) -> &Self {
        assert!(
            self.count_matching(|process, _| process.command_line() == command) > 0,
            "An expected process [{command}] was not invoked."
        );
        self
    }

    /// Asserts that exactly `times` recorded processes satisfy `predicate`.
    ///
    /// # Panics
    ///
    /// Panics when the count differs.
    #[track_caller]
    pub fn assert_ran_times<F>(&self, predicate: F, times: usize) -> &Self
    where
        F: Fn(&PendingProcess, &ProcessResult) -> bool,
    {
        let count = self.count_matching(predicate);
        assert_eq!(count, times, "An expected process ran {count} times instead of {times} times.");
        self
    }

    /// Asserts that no recorded process satisfies `predicate`.
    ///
    /// # Panics
    ///
    /// Panics when one does.
    #[track_caller]
    pub fn assert_not_ran<F>(&self, predicate: F) -> &Self
    where
        F: Fn(&PendingProcess, &ProcessResult) -> bool,
    {
        assert!(self.count_matching(predicate) == 0, "An unexpected process was invoked.");
        self
    }

    /// Alias of [`assert_not_ran`](Self::assert_not_ran).
    ///
    /// # Panics
    ///
    /// Panics when a recorded process satisfies `predicate`.
    #[track_caller]
    pub fn assert_did_not_run<F>(&self, predicate: F) -> &Self
    where
        F: Fn(&PendingProcess, &ProcessResult) -> bool,
    {
        self.assert_not_ran(predicate)
    }

    /// Asserts that nothing was recorded.
    ///
    /// # Panics
    ///
    /// Panics when the log is not empty.
    #[track_caller]
    pub fn assert_nothing_ran(&self) -> &Self {
        assert!(self.state().recorded.is_empty(), "An unexpected process was invoked.");
        self
    }

    /// A pending process wired to this factory's handlers and log.
    #[must_use]
    pub fn new_pending_process(&self) -> PendingProcess {
        let (handlers, timeout) = {
            let state = self.state();
            (state.fake_handlers.clone(), state.default_timeout)
        };
        let process = PendingProcess::for_factory(self.clone()).with_fake_handlers(handlers);
        match timeout {
            Some(timeout) => process.timeout(timeout),
            None => process.forever(),
        }
    }

    /// A pending process with `command` set.
    #[must_use]
    pub fn command(&self, command: impl Into<ProcessCommand>) -> PendingProcess {
        self.new_pending_process().command(command)
    }

    /// A pending process running in `path`.
    #[must_use]
    pub fn path(&self, path: impl Into<PathBuf>) -> PendingProcess {
        self.new_pending_process().path(path)
    }

    /// A pending process with extra environment variables.
    #[must_use]
    pub fn env<I, K, V>(&self, vars: I) -> PendingProcess
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.new_pending_process().env(vars)
    }

    /// A pending process with `timeout`.
    #[must_use]
    pub fn timeout(&self, timeout: Duration) -> PendingProcess {
        self.new_pending_process().timeout(timeout)
    }

    /// A pending process fed `input` on stdin.
    #[must_use]
    pub fn input(&self, input: impl Into<String>) -> PendingProcess {
        self.new_pending_process().input(input)
    }

    /// A pending process whose output is discarded.
    #[must_use]
    pub fn quietly(&self) -> PendingProcess {
        self.new_pending_process().quietly()
    }

    /// Runs `command` to completion.
    ///
    /// # Errors
    ///
    /// See [`PendingProcess::run_with_output`].
    pub fn run(&self, command: impl Into<ProcessCommand>) -> Result<ProcessResult, ProcessError> {
        self.command(command).run()
    }

    /// Starts `command` without waiting.
    ///
    /// # Errors
    ///
    /// See [`PendingProcess::start`].
    pub fn start(&self, command: impl Into<ProcessCommand>) -> Result<InvokedProcess, ProcessError> {
        self.command(command).start()
    }

    /// Collects pending processes into a pool without starting them.
    pub fn pool<F>(&self, build: F) -> Pool
    where
        F: FnOnce(&mut Pool),
    {
        let mut pool = Pool::new(self.clone());
        build(&mut pool);
        pool
    }

    /// Runs a pool of processes and waits for all of them.
    ///
    /// # Errors
    ///
    /// See [`Pool::start`] and [`super::pool::InvokedProcessPool::wait`].
    pub fn concurrently<F>(&self, build: F) -> Result<ProcessPoolResults, ProcessError>
    where
        F: FnOnce(&mut Pool),
    {
        self.pool(build).start()?.wait()
    }

    /// Runs a pool of processes, passing every output chunk with its pool
    /// key to `on_output`, and waits for all of them.
    ///
    /// # Errors
    ///
    /// See [`concurrently`](Self::concurrently).
    pub fn concurrently_with_output<F, O>(&self, build: F, on_output: O) -> Result<ProcessPoolResults, ProcessError>
    where
        F: FnOnce(&mut Pool),
        O: FnMut(&PoolKey, OutputKind, &str) + Send + 'static,
    {
        self.pool(build).start_with_output(on_output)?.wait()
    }

    /// Writes the log to a YAML cassette at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be serialized or written.
    pub fn save_cassette(&self, path: &Path, name: &str) -> Result<PathBuf, ProcessError> {
        let cassette = Cassette::from_recorded(name, &self.recorded());
        cassette.save(path)?;
        Ok(path.to_path_buf())
    }

    /// Fakes every command recorded in the cassette at `path`, replaying its
    /// results in recorded order, and starts recording.
    ///
    /// Recorded commands match only themselves; a `*` in one is not a wildcard.
    ///
    /// # Errors
    ///
    /// Returns an error when the cassette cannot be read or parsed.
    pub fn fake_from_cassette(&self, path: &Path) -> Result<&Self, ProcessError> {
        let cassette = Cassette::load(path)?;
        let mut state = self.state();
        state.recording = true;
        for (command, handler) in cassette.into_handlers() {
            state.fake_handlers.insert_exact(command, handler);
        }
        drop(state);
        Ok(self)
    }
}
