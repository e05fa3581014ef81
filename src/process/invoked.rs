//! Started processes, real or faked.

use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::error::ProcessError;
use super::fake::FakeProcessDescription;
use super::pending::{PendingProcess, ProcessCommand};
use super::result::{OutputKind, ProcessResult};

pub(crate) type OutputCallback = Box<dyn FnMut(OutputKind, &str) + Send>;

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A child process with reader threads draining its pipes into a channel.
pub(crate) struct RealProcess {
    command_line: String,
    child: Child,
    events: Receiver<(OutputKind, String)>,
    output: String,
    error_output: String,
    timeout: Option<Duration>,
    started: Instant,
}

impl RealProcess {
    pub(crate) fn spawn(
        pending: &PendingProcess,
        command: &ProcessCommand,
        command_line: String,
    ) -> Result<Self, ProcessError> {
        let mut cmd = match command {
            ProcessCommand::Shell(line) => {
                let mut cmd = Command::new("sh");
                cmd.arg("-c").arg(line);
                cmd
            }
            ProcessCommand::Argv(argv) => {
                let (program, args) = argv.split_first().ok_or(ProcessError::MissingCommand)?;
                let mut cmd = Command::new(program);
                cmd.args(args);
                cmd
            }
        };
        if let Some(path) = pending.working_directory() {
            cmd.current_dir(path);
        }
        cmd.envs(pending.environment());
        cmd.stdin(if pending.input_text().is_some() { Stdio::piped() } else { Stdio::null() });
        if pending.is_quiet() {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        } else {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        }

        debug!(command = %command_line, "spawning process");
        let mut child = cmd
            .spawn()
            .map_err(|source| ProcessError::Spawn { command: command_line.clone(), source })?;

        if let (Some(input), Some(mut stdin)) = (pending.input_text(), child.stdin.take()) {
            let input = input.to_string();
            thread::spawn(move || {
                // A child that exits without reading stdin closes the pipe; that is not our error.
                let _ = stdin.write_all(input.as_bytes());
            });
        }

        let (tx, events) = mpsc::channel();
        if let Some(stdout) = child.stdout.take() {
            drain(stdout, OutputKind::Stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            drain(stderr, OutputKind::Stderr, tx);
        }

        Ok(Self {
            command_line,
            child,
            events,
            output: String::new(),
            error_output: String::new(),
            timeout: pending.timeout_duration(),
            started: Instant::now(),
        })
    }

    fn id(&self) -> u32 {
        self.child.id()
    }

    fn push(&mut self, kind: OutputKind, chunk: &str) {
        match kind {
            OutputKind::Stdout => self.output.push_str(chunk),
            OutputKind::Stderr => self.error_output.push_str(chunk),
        }
    }

    fn poll(&mut self, on_output: &mut dyn FnMut(OutputKind, &str)) -> bool {
        while let Ok((kind, chunk)) = self.events.try_recv() {
            on_output(kind, &chunk);
            self.push(kind, &chunk);
        }
        matches!(self.child.try_wait(), Ok(None))
    }

    pub(crate) fn wait(
        mut self,
        on_output: &mut dyn FnMut(OutputKind, &str),
    ) -> Result<ProcessResult, ProcessError> {
        let deadline = self.timeout.map(|timeout| self.started + timeout);
        loop {
            let event = match deadline {
                Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                    Some(left) => self.events.recv_timeout(left),
                    None => self.events.try_recv().map_err(|err| match err {
                        TryRecvError::Empty => RecvTimeoutError::Timeout,
                        TryRecvError::Disconnected => RecvTimeoutError::Disconnected,
                    }),
                },
                None => self.events.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match event {
                Ok((kind, chunk)) => {
                    on_output(kind, &chunk);
                    self.push(kind, &chunk);
                }
                Err(RecvTimeoutError::Timeout) => {
                    if !self.has_exited()? {
                        return Err(self.kill_for_timeout());
                    }
                    // Exited in time; the readers stop at EOF.
                    while let Ok((kind, chunk)) = self.events.recv() {
                        on_output(kind, &chunk);
                        self.push(kind, &chunk);
                    }
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let status = self.wait_for_exit(deadline)?;
        debug!(command = %self.command_line, code = ?status.code(), "process finished");
        Ok(ProcessResult::new(self.command_line, status.code(), self.output, self.error_output))
    }

    fn has_exited(&mut self) -> Result<bool, ProcessError> {
        match self.child.try_wait() {
            Ok(status) => Ok(status.is_some()),
            Err(source) => Err(self.wait_error(source)),
        }
    }

    fn wait_for_exit(&mut self, deadline: Option<Instant>) -> Result<ExitStatus, ProcessError> {
        let Some(deadline) = deadline else {
            return self.child.wait().map_err(|source| self.wait_error(source));
        };
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => {}
                Err(source) => return Err(self.wait_error(source)),
            }
            if Instant::now() >= deadline {
                return Err(self.kill_for_timeout());
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        }
    }

    fn wait_error(&self, source: std::io::Error) -> ProcessError {
        ProcessError::Wait { command: self.command_line.clone(), source }
    }

    fn kill_for_timeout(&mut self) -> ProcessError {
        warn!(command = %self.command_line, "process exceeded its timeout; killing it");
        self.abort();
        ProcessError::Timeout {
            command: self.command_line.clone(),
            timeout: self.timeout.unwrap_or_default(),
        }
    }

    fn abort(&mut self) {
        // Either call fails only when the child already exited.
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn drain<R>(stream: R, kind: OutputKind, tx: Sender<(OutputKind, String)>)
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    if tx.send((kind, String::from_utf8_lossy(&line).into_owned())).is_err() {
                        break;
                    }
                }
            }
        }
    });
}

struct FakeInvokedProcess {
    command_line: String,
    description: FakeProcessDescription,
    remaining_iterations: usize,
    next_chunk: usize,
    output: String,
    error_output: String,
}

impl FakeInvokedProcess {
    fn emit_next(&mut self, on_output: &mut dyn FnMut(OutputKind, &str)) {
        if let Some((kind, chunk)) = self.description.chunks().get(self.next_chunk) {
            on_output(*kind, chunk);
            match kind {
                OutputKind::Stdout => self.output.push_str(chunk),
                OutputKind::Stderr => self.error_output.push_str(chunk),
            }
            self.next_chunk += 1;
        }
    }

    fn poll(&mut self, on_output: &mut dyn FnMut(OutputKind, &str)) -> bool {
        if self.remaining_iterations == 0 {
            return false;
        }
        self.remaining_iterations -= 1;
        self.emit_next(on_output);
        true
    }

    fn wait(mut self, on_output: &mut dyn FnMut(OutputKind, &str)) -> ProcessResult {
        while self.next_chunk < self.description.chunks().len() {
            self.emit_next(on_output);
        }
        self.description.to_result(&self.command_line)
    }
}

enum Invoked {
    Real { process: RealProcess, pending: PendingProcess },
    Fake(FakeInvokedProcess),
}

/// A process that has been started and can be polled or waited on.
pub struct InvokedProcess {
    inner: Invoked,
    on_output: Option<OutputCallback>,
    unrecorded: Option<(PendingProcess, ProcessResult)>,
}

impl InvokedProcess {
    pub(crate) fn real(process: RealProcess, pending: PendingProcess, on_output: Option<OutputCallback>) -> Self {
        Self { inner: Invoked::Real { process, pending }, on_output, unrecorded: None }
    }

    pub(crate) fn fake(
        command_line: String,
        description: FakeProcessDescription,
        on_output: Option<OutputCallback>,
    ) -> Self {
        let remaining_iterations = description.run_iterations();
        Self {
            inner: Invoked::Fake(FakeInvokedProcess {
                command_line,
                description,
                remaining_iterations,
                next_chunk: 0,
                output: String::new(),
                error_output: String::new(),
            }),
            on_output,
            unrecorded: None,
        }
    }

    pub(crate) fn with_unrecorded(mut self, pending: PendingProcess, result: ProcessResult) -> Self {
        self.unrecorded = Some((pending, result));
        self
    }

    /// Records a faked start that was held back; a no-op otherwise.
    pub(crate) fn commit_record(&mut self) {
        if let Some((pending, result)) = self.unrecorded.take() {
            pending.record(&result);
        }
    }

    /// The operating system process id (or the faked one).
    #[must_use]
    pub fn id(&self) -> u32 {
        match &self.inner {
            Invoked::Real { process, .. } => process.id(),
            Invoked::Fake(fake) => fake.description.process_id(),
        }
    }

    /// The command line being run.
    #[must_use]
    pub fn command(&self) -> &str {
        match &self.inner {
            Invoked::Real { process, .. } => &process.command_line,
            Invoked::Fake(fake) => &fake.command_line,
        }
    }

    /// Standard output received so far.
    #[must_use]
    pub fn output(&self) -> &str {
        match &self.inner {
            Invoked::Real { process, .. } => &process.output,
            Invoked::Fake(fake) => &fake.output,
        }
    }

    /// Standard error received so far.
    #[must_use]
    pub fn error_output(&self) -> &str {
        match &self.inner {
            Invoked::Real { process, .. } => &process.error_output,
            Invoked::Fake(fake) => &fake.error_output,
        }
    }

    /// Collects pending output and reports whether the process is still alive.
    ///
    /// A fake reports itself alive for its described number of iterations,
    /// emitting one output chunk per poll.
    pub fn running(&mut self) -> bool {
        let mut noop = |_: OutputKind, _: &str| {};
        let on_output: &mut dyn FnMut(OutputKind, &str) = match self.on_output.as_mut() {
            Some(callback) => callback,
            None => &mut noop,
        };
        match &mut self.inner {
            Invoked::Real { process, .. } => process.poll(on_output),
            Invoked::Fake(fake) => fake.poll(on_output),
        }
    }

    /// Waits for the process to finish.
    ///
    /// # Errors
    ///
    /// Returns an error when the process exceeds its timeout or cannot be
    /// waited on.
    pub fn wait(self) -> Result<ProcessResult, ProcessError> {
        let mut noop = |_: OutputKind, _: &str| {};
        let mut callback = self.on_output;
        let on_output: &mut dyn FnMut(OutputKind, &str) = match callback.as_mut() {
            Some(callback) => callback,
            None => &mut noop,
        };
        match self.inner {
            Invoked::Real { process, pending } => {
                let result = process.wait(on_output)?;
                pending.record(&result);
                Ok(result)
            }
            Invoked::Fake(fake) => Ok(fake.wait(on_output)),
        }
    }

    pub(crate) fn abort(&mut self) {
        if let Invoked::Real { process, .. } = &mut self.inner {
            process.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn real_process_can_be_started_and_waited() {
        let mut process = PendingProcess::new().command("sleep 0.2; echo done").start().unwrap();
        assert!(process.id() > 0);
        assert!(process.running());
        let result = process.wait().unwrap();
        assert!(result.successful());
        assert_eq!(result.output(), "done\n");
    }

    #[test]
    fn started_process_streams_to_callback_on_wait() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let process = PendingProcess::new()
            .command("echo a; echo b 1>&2")
            .start_with_output(move |kind, chunk| sink.lock().unwrap().push((kind, chunk.to_string())))
            .unwrap();
        let result = process.wait().unwrap();
        assert_eq!(result.output(), "a\n");
        assert_eq!(result.error_output(), "b\n");
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen.contains(&(OutputKind::Stdout, "a\n".to_string())));
        assert!(seen.contains(&(OutputKind::Stderr, "b\n".to_string())));
    }

    #[test]
    fn fake_runs_for_its_described_iterations() {
        let description = FakeProcessDescription::new().id(77).output("one").output("two").iterations(2);
        let mut process = InvokedProcess::fake("build".into(), description, None);
        assert_eq!(process.id(), 77);
        assert_eq!(process.command(), "build");
        assert!(process.running());
        assert_eq!(process.output(), "one\n");
        assert!(process.running());
        assert_eq!(process.output(), "one\ntwo\n");
        assert!(!process.running());
        let result = process.wait().unwrap();
        assert_eq!(result.output(), "one\ntwo\n");
    }

    #[test]
    fn fake_wait_emits_remaining_output() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let description = FakeProcessDescription::new().output("x").error_output("y").exit_code(3);
        let process = InvokedProcess::fake(
            "job".into(),
            description,
            Some(Box::new(move |_: OutputKind, chunk: &str| sink.lock().unwrap().push(chunk.to_string()))),
        );
        let result = process.wait().unwrap();
        assert_eq!(result.exit_code(), Some(3));
        assert_eq!(*seen.lock().unwrap(), vec!["x\n".to_string(), "y\n".to_string()]);
    }

    #[test]
    fn started_process_times_out_on_wait() {
        let process = PendingProcess::new()
            .command("sleep 5")
            .timeout(Duration::from_millis(150))
            .start()
            .unwrap();
        let err = process.wait().unwrap_err();
        assert!(matches!(err, ProcessError::Timeout { .. }));
    }

    #[test]
    fn process_that_finished_before_its_deadline_is_not_a_timeout() {
        let process = PendingProcess::new()
            .command("echo quick")
            .timeout(Duration::from_millis(200))
            .start()
            .unwrap();
        thread::sleep(Duration::from_millis(500));
        let result = process.wait().unwrap();
        assert!(result.successful());
        assert_eq!(result.output(), "quick\n");
    }
}
