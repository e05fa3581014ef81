//! The command contract and the context a command runs in.

use crate::console::{Application, Input, Output, Style, Verbosity};
use crate::error::{ConsoleError, Result};
use crate::process::Factory;

/// A named console command.
///
/// Implementors describe their arguments through [`Command::configure`] and do
/// their work in [`Command::handle`], returning the exit code.
pub trait Command: Send + Sync {
    /// The name the command is invoked by.
    fn name(&self) -> &str;

    /// One-line description shown by `list` and `--help`.
    fn description(&self) -> &str {
        ""
    }

    /// Adds arguments and options to the command's definition.
    fn configure(&self, command: clap::Command) -> clap::Command {
        command
    }

    /// Hidden commands still run but are left out of `list`.
    fn hidden(&self) -> bool {
        false
    }

    /// Runs the command.
    ///
    /// # Errors
    ///
    /// Any error is reported by the application, which exits with its code.
    fn handle(&self, ctx: &mut CommandContext<'_>) -> Result<i32>;
}

/// The clap definition of `command`, named after it.
#[must_use]
pub fn definition(command: &dyn Command) -> clap::Command {
    let base = clap::Command::new(command.name().to_string()).about(command.description().to_string());
    command.configure(base).hide(command.hidden())
}

/// Everything a running command can reach: its application, its input and
/// its output.
pub struct CommandContext<'a> {
    app: &'a Application,
    input: Input<'a>,
    output: &'a mut Output,
}

impl<'a> CommandContext<'a> {
    pub(crate) fn new(app: &'a Application, input: Input<'a>, output: &'a mut Output) -> Self {
        Self { app, input, output }
    }

    /// The application running this command.
    #[must_use]
    pub fn application(&self) -> &'a Application {
        self.app
    }

    /// The application's process factory.
    #[must_use]
    pub fn process(&self) -> &'a Factory {
        self.app.factory()
    }

    /// Parsed arguments and the answer stream.
    #[must_use]
    pub fn input(&self) -> &Input<'a> {
        &self.input
    }

    /// The output this command writes to.
    pub fn output(&mut self) -> &mut Output {
        &mut *self.output
    }

    /// A positional argument's value.
    #[must_use]
    pub fn argument(&self, name: &str) -> Option<&str> {
        self.input.value(name)
    }

    /// Every value of a multi-valued argument or option.
    #[must_use]
    pub fn arguments(&self, name: &str) -> Vec<&str> {
        self.input.values(name)
    }

    /// An option's value.
    #[must_use]
    pub fn option(&self, name: &str) -> Option<&str> {
        self.input.value(name)
    }

    /// Whether a boolean option was passed.
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        self.input.flag(name)
    }

    /// Writes a plain line.
    ///
    /// # Errors
    ///
    /// Returns an error if output cannot be written.
    pub fn line(&mut self, text: impl AsRef<str>) -> Result<()> {
        Ok(self.output.write_line(text.as_ref())?)
    }

    /// Writes an informational line, green on a terminal.
    ///
    /// # Errors
    ///
    /// Returns an error if output cannot be written.
    pub fn info(&mut self, text: impl AsRef<str>) -> Result<()> {
        Ok(self.output.write_styled_line(Style::Info, text.as_ref())?)
    }

    /// Writes a comment line, yellow on a terminal.
    ///
    /// # Errors
    ///
    /// Returns an error if output cannot be written.
    pub fn comment(&mut self, text: impl AsRef<str>) -> Result<()> {
        Ok(self.output.write_styled_line(Style::Comment, text.as_ref())?)
    }

    /// Writes a question line, black on cyan on a terminal.
    ///
    /// # Errors
    ///
    /// Returns an error if output cannot be written.
    pub fn question(&mut self, text: impl AsRef<str>) -> Result<()> {
        Ok(self.output.write_styled_line(Style::Question, text.as_ref())?)
    }

    /// Writes a warning to the error stream.
    ///
    /// # Errors
    ///
    /// Returns an error if output cannot be written.
    pub fn warn(&mut self, text: impl AsRef<str>) -> Result<()> {
        Ok(self.output.write_styled_line(Style::Warning, text.as_ref())?)
    }

    /// Writes an error to the error stream.
    ///
    /// # Errors
    ///
    /// Returns an error if output cannot be written.
    pub fn error(&mut self, text: impl AsRef<str>) -> Result<()> {
        Ok(self.output.write_styled_line(Style::Error, text.as_ref())?)
    }

    /// Writes `count` blank lines.
    ///
    /// # Errors
    ///
    /// Returns an error if output cannot be written.
    pub fn new_line(&mut self, count: usize) -> Result<()> {
        for _ in 0..count {
            self.output.write_line("")?;
        }
        Ok(())
    }

    /// Writes a line only at `-v` or above.
    ///
    /// # Errors
    ///
    /// Returns an error if output cannot be written.
    pub fn verbose(&mut self, text: impl AsRef<str>) -> Result<()> {
        Ok(self.output.write_line_at(Verbosity::Verbose, text.as_ref())?)
    }

    /// Asks a yes/no question. Answers starting with `y` mean yes; an empty
    /// answer, end of input or a non-interactive run give `default`.
    ///
    /// # Errors
    ///
    /// Returns an error if the prompt cannot be written or the answer read.
    pub fn confirm(&mut self, question: &str, default: bool) -> Result<bool> {
        if !self.input.is_interactive() {
            return Ok(default);
        }
        let hint = if default { "yes" } else { "no" };
        self.output.write(&format!(" {question} (yes/no) [{hint}]:\n > "))?;
        let answer = match self.input.read_line()? {
            Some(answer) if !answer.trim().is_empty() => answer,
            _ => return Ok(default),
        };
        Ok(answer.trim_start().starts_with(['y', 'Y']))
    }

    /// Asks a free-form question.
    ///
    /// # Errors
    ///
    /// Returns an error if the prompt cannot be written or the answer read,
    /// or when no answer and no default are available.
    pub fn ask(&mut self, question: &str, default: Option<&str>) -> Result<String> {
        if self.input.is_interactive() {
            let prompt = match default {
                Some(default) => format!(" {question} [{default}]:\n > "),
                None => format!(" {question}:\n > "),
            };
            self.output.write(&prompt)?;
            if let Some(answer) = self.input.read_line()? {
                let answer = answer.trim();
                if !answer.is_empty() {
                    return Ok(answer.to_string());
                }
            }
        }
        default
            .map(str::to_string)
            .ok_or_else(|| ConsoleError::failed(format!("No answer given to \"{question}\"")))
    }

    /// Asks the user to pick one of `choices`, by number or by name. Invalid
    /// answers are rejected and the question asked again.
    ///
    /// # Errors
    ///
    /// Returns an error if the prompt cannot be written or the answer read,
    /// or when input ends without a valid answer and there is no default.
    pub fn choice(&mut self, question: &str, choices: &[&str], default: Option<usize>) -> Result<String> {
        let fallback = default.and_then(|index| choices.get(index)).map(|choice| (*choice).to_string());
        if !self.input.is_interactive() {
            return fallback.ok_or_else(|| ConsoleError::failed(format!("No answer given to \"{question}\"")));
        }

        loop {
            let prompt = match &fallback {
                Some(choice) => format!(" {question} [{choice}]:\n"),
                None => format!(" {question}:\n"),
            };
            self.output.write(&prompt)?;
            for (index, choice) in choices.iter().enumerate() {
                self.output.write(&format!("  [{index}] {choice}\n"))?;
            }
            self.output.write(" > ")?;

            let Some(answer) = self.input.read_line()? else {
                return fallback.ok_or_else(|| ConsoleError::failed(format!("No answer given to \"{question}\"")));
            };
            let answer = answer.trim();
            if answer.is_empty() {
                if let Some(choice) = &fallback {
                    return Ok(choice.clone());
                }
            }
            let picked = answer
                .parse::<usize>()
                .ok()
                .and_then(|index| choices.get(index))
                .or_else(|| choices.iter().find(|choice| **choice == answer));
            if let Some(choice) = picked {
                return Ok((*choice).to_string());
            }
            self.output.write_error_line(&format!("Value \"{answer}\" is invalid"))?;
        }
    }

    /// Runs another registered command with `args`, sharing this command's
    /// output and input.
    ///
    /// # Errors
    ///
    /// Returns an error when the command does not exist, its arguments do
    /// not parse, or it fails.
    pub fn call<I, T>(&mut self, name: &str, args: I) -> Result<i32>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let interactive = self.input.is_interactive();
        self.app.call_with(name, args, self.input.reader(), &mut *self.output, interactive)
    }

    /// Like [`CommandContext::call`], discarding everything the command prints.
    ///
    /// # Errors
    ///
    /// Same as [`CommandContext::call`].
    pub fn call_silently<I, T>(&mut self, name: &str, args: I) -> Result<i32>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut sink = Output::sink();
        let interactive = self.input.is_interactive();
        self.app.call_with(name, args, self.input.reader(), &mut sink, interactive)
    }
}
