//! Output streams with verbosity filtering.

use std::io::{self, IsTerminal, Write};
use std::sync::{Arc, Mutex, PoisonError};

use colored::Colorize;

use crate::process::OutputKind;

/// How much a command should print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    /// Only errors.
    Quiet,
    /// Regular output.
    #[default]
    Normal,
    /// `-v`
    Verbose,
    /// `-vv`
    VeryVerbose,
    /// `-vvv`
    Debug,
}

impl Verbosity {
    /// Maps the global `--quiet` flag and `-v` count to a level.
    #[must_use]
    pub fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            2 => Self::VeryVerbose,
            _ => Self::Debug,
        }
    }

    /// The log filter directive matching this level.
    #[must_use]
    pub fn log_level(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "warn",
            Self::Verbose => "info",
            Self::VeryVerbose => "debug",
            Self::Debug => "trace",
        }
    }
}

/// Highlighting for a line written to a decorated stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    /// Green text.
    Info,
    /// Yellow text.
    Comment,
    /// Black on cyan.
    Question,
    /// Yellow text, on the error stream.
    Warning,
    /// White on red, on the error stream.
    Error,
}

impl Style {
    fn paint(self, text: &str) -> String {
        match self {
            Self::Info => text.green().to_string(),
            Self::Comment | Self::Warning => text.yellow().to_string(),
            Self::Question => text.black().on_cyan().to_string(),
            Self::Error => text.white().on_red().to_string(),
        }
    }
}

/// Where a command writes: a regular and an error stream.
pub struct Output {
    stdout: Box<dyn Write + Send>,
    stderr: Box<dyn Write + Send>,
    verbosity: Verbosity,
    decorated: bool,
}

impl Output {
    /// Writes to the given streams, undecorated.
    pub fn new(stdout: impl Write + Send + 'static, stderr: impl Write + Send + 'static) -> Self {
        Self {
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
            verbosity: Verbosity::Normal,
            decorated: false,
        }
    }

    /// Writes to the process's standard streams, decorated when stdout is a
    /// terminal.
    #[must_use]
    pub fn stdio() -> Self {
        let mut output = Self::new(io::stdout(), io::stderr());
        output.decorated = io::stdout().is_terminal();
        output
    }

    /// Discards everything.
    #[must_use]
    pub fn sink() -> Self {
        Self::new(io::sink(), io::sink())
    }

    /// Writes into memory, readable through the returned handle.
    #[must_use]
    pub fn buffered() -> (Self, BufferedOutput) {
        let buffer = BufferedOutput::default();
        let output = Self::new(
            SharedWriter(Arc::clone(&buffer.stdout)),
            SharedWriter(Arc::clone(&buffer.stderr)),
        );
        (output, buffer)
    }

    /// The current verbosity.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// Changes the verbosity.
    pub fn set_verbosity(&mut self, verbosity: Verbosity) {
        self.verbosity = verbosity;
    }

    /// Whether styled lines carry color codes.
    #[must_use]
    pub fn is_decorated(&self) -> bool {
        self.decorated
    }

    /// Turns color codes on or off.
    pub fn set_decorated(&mut self, decorated: bool) {
        self.decorated = decorated;
    }

    fn styled(&self, style: Style, text: &str) -> String {
        if self.decorated {
            style.paint(text)
        } else {
            text.to_string()
        }
    }

    /// Whether messages at `level` are shown.
    #[must_use]
    pub fn shows(&self, level: Verbosity) -> bool {
        self.verbosity != Verbosity::Quiet && self.verbosity >= level
    }

    /// Writes `text` without a newline, unless quiet.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot be written.
    pub fn write(&mut self, text: &str) -> io::Result<()> {
        if !self.shows(Verbosity::Normal) {
            return Ok(());
        }
        self.stdout.write_all(text.as_bytes())?;
        self.stdout.flush()
    }

    /// Writes a line, unless quiet.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot be written.
    pub fn write_line(&mut self, text: &str) -> io::Result<()> {
        self.write_line_at(Verbosity::Normal, text)
    }

    /// Writes a line when the verbosity is at least `level`.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot be written.
    pub fn write_line_at(&mut self, level: Verbosity, text: &str) -> io::Result<()> {
        if !self.shows(level) {
            return Ok(());
        }
        writeln!(self.stdout, "{text}")
    }

    /// Writes a highlighted line; warnings and errors go to the error stream
    /// whatever the verbosity, the rest only unless quiet.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot be written.
    pub fn write_styled_line(&mut self, style: Style, text: &str) -> io::Result<()> {
        let line = self.styled(style, text);
        match style {
            Style::Warning | Style::Error => self.write_error_line(&line),
            Style::Info | Style::Comment | Style::Question => self.write_line(&line),
        }
    }

    /// Writes a line to the error stream, whatever the verbosity.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot be written.
    pub fn write_error_line(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.stderr, "{text}")
    }

    /// Writes text to the error stream, whatever the verbosity.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot be written.
    pub fn write_error(&mut self, text: &str) -> io::Result<()> {
        self.stderr.write_all(text.as_bytes())?;
        self.stderr.flush()
    }

    /// Forwards a chunk of child process output to the matching stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot be written.
    pub fn write_process_chunk(&mut self, kind: OutputKind, chunk: &str) -> io::Result<()> {
        match kind {
            OutputKind::Stdout => self.write(chunk),
            OutputKind::Stderr => self.write_error(chunk),
        }
    }
}

/// Read side of [`Output::buffered`].
#[derive(Debug, Clone, Default)]
pub struct BufferedOutput {
    stdout: Arc<Mutex<Vec<u8>>>,
    stderr: Arc<Mutex<Vec<u8>>>,
}

impl BufferedOutput {
    /// Everything written to the regular stream.
    #[must_use]
    pub fn stdout(&self) -> String {
        read(&self.stdout)
    }

    /// Everything written to the error stream.
    #[must_use]
    pub fn stderr(&self) -> String {
        read(&self.stderr)
    }
}

fn read(buffer: &Mutex<Vec<u8>>) -> String {
    String::from_utf8_lossy(&buffer.lock().unwrap_or_else(PoisonError::into_inner)).into_owned()
}

struct SharedWriter(Arc<Mutex<Vec<u8>>>);

impl Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_map_to_levels() {
        assert_eq!(Verbosity::from_flags(false, 0), Verbosity::Normal);
        assert_eq!(Verbosity::from_flags(false, 2), Verbosity::VeryVerbose);
        assert_eq!(Verbosity::from_flags(false, 9), Verbosity::Debug);
        assert_eq!(Verbosity::from_flags(true, 3), Verbosity::Quiet);
    }

    #[test]
    fn quiet_suppresses_everything_but_errors() {
        let (mut output, buffer) = Output::buffered();
        output.set_verbosity(Verbosity::Quiet);
        output.write_line("hello").unwrap();
        output.write_error_line("broken").unwrap();
        assert_eq!(buffer.stdout(), "");
        assert_eq!(buffer.stderr(), "broken\n");
    }

    #[test]
    fn verbose_lines_need_a_verbose_level() {
        let (mut output, buffer) = Output::buffered();
        output.write_line_at(Verbosity::Verbose, "hidden").unwrap();
        output.set_verbosity(Verbosity::Verbose);
        output.write_line_at(Verbosity::Verbose, "shown").unwrap();
        output.write_line_at(Verbosity::Debug, "still hidden").unwrap();
        assert_eq!(buffer.stdout(), "shown\n");
    }

    #[test]
    fn styled_lines_stay_plain_when_undecorated() {
        let (mut output, buffer) = Output::buffered();
        assert!(!output.is_decorated());
        output.write_styled_line(Style::Info, "saved").unwrap();
        output.write_styled_line(Style::Error, "failed").unwrap();
        assert_eq!(buffer.stdout(), "saved\n");
        assert_eq!(buffer.stderr(), "failed\n");
    }

    #[test]
    fn decorated_styles_differ() {
        colored::control::set_override(true);
        let (mut output, buffer) = Output::buffered();
        output.set_decorated(true);
        output.write_styled_line(Style::Info, "a").unwrap();
        output.write_styled_line(Style::Comment, "a").unwrap();
        output.write_styled_line(Style::Question, "a").unwrap();
        let stdout = buffer.stdout();
        let lines: Vec<&str> = stdout.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|line| line.contains('a') && line.contains("\x1b[")));
        assert_ne!(lines[0], lines[1]);
        assert_ne!(lines[1], lines[2]);
        assert_ne!(lines[0], lines[2]);
    }

    #[test]
    fn process_chunks_go_to_their_stream() {
        let (mut output, buffer) = Output::buffered();
        output.write_process_chunk(OutputKind::Stdout, "out\n").unwrap();
        output.write_process_chunk(OutputKind::Stderr, "err\n").unwrap();
        assert_eq!(buffer.stdout(), "out\n");
        assert_eq!(buffer.stderr(), "err\n");
    }
}
