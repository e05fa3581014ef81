//! Command registry and dispatcher.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::{self, BufRead};

use clap::{ArgMatches, Args, FromArgMatches};
use tracing::{debug, warn};

use crate::cli::GlobalOptions;
use crate::config::ConsoleConfig;
use crate::console::command::definition;
use crate::console::list::ListCommand;
use crate::console::{Command, CommandContext, Input, Output};
use crate::error::{ConsoleError, Result};
use crate::process::Factory;

/// Runs when no sub-command is given.
const DEFAULT_COMMAND: &str = "list";

/// A named, versioned set of commands sharing one process factory.
pub struct Application {
    name: String,
    version: String,
    commands: BTreeMap<String, Box<dyn Command>>,
    factory: Factory,
    config: ConsoleConfig,
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .field("factory", &self.factory)
            .field("config", &self.config)
            .finish()
    }
}

impl Application {
    /// An application holding only the built-in `list` command.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        let mut app = Self {
            name: name.into(),
            version: version.into(),
            commands: BTreeMap::new(),
            factory: Factory::new(),
            config: ConsoleConfig::default(),
        };
        app.add(ListCommand);
        app
    }

    /// Uses `factory` for every process the commands start.
    #[must_use]
    pub fn with_factory(mut self, factory: Factory) -> Self {
        self.factory = factory;
        self
    }

    /// Replaces the environment-derived settings, such as interactivity.
    #[must_use]
    pub fn with_config(mut self, config: ConsoleConfig) -> Self {
        self.config = config;
        self
    }

    /// Name shown in help and by `--version`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Version printed by `--version`.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The process factory shared by every command.
    #[must_use]
    pub fn factory(&self) -> &Factory {
        &self.factory
    }

    /// The settings commands run with.
    #[must_use]
    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    /// Registers `command`, replacing any command of the same name.
    pub fn add(&mut self, command: impl Command + 'static) -> &mut Self {
        self.add_boxed(Box::new(command))
    }

    /// Registers an already boxed command.
    pub fn add_boxed(&mut self, command: Box<dyn Command>) -> &mut Self {
        let name = command.name().to_string();
        if self.commands.insert(name.clone(), command).is_some() {
            debug!(command = %name, "replaced registered command");
        }
        self
    }

    /// The command registered as `name`.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&dyn Command> {
        self.commands.get(name).map(AsRef::as_ref)
    }

    /// Whether a command is registered as `name`.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Every registered command, ordered by name.
    pub fn all(&self) -> impl Iterator<Item = &dyn Command> {
        self.commands.values().map(AsRef::as_ref)
    }

    /// The full clap definition: global options plus one sub-command per
    /// registered command.
    #[must_use]
    pub fn definition(&self) -> clap::Command {
        let root = clap::Command::new(self.name.clone()).version(self.version.clone());
        let root = GlobalOptions::augment_args(root);
        self.commands.values().fold(root, |root, command| root.subcommand(definition(command.as_ref())))
    }

    /// Parses `args` (program name first) and runs the selected command,
    /// returning the exit code. Errors are written to `output`'s error
    /// stream rather than returned.
    pub fn run<I, T>(&self, args: I, input: &mut dyn BufRead, output: &mut Output) -> i32
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = match self.definition().try_get_matches_from(args) {
            Ok(matches) => matches,
            Err(err) => return render_usage(&err, output),
        };

        let globals = GlobalOptions::from_arg_matches(&matches).unwrap_or_default();
        output.set_verbosity(globals.verbosity());
        let interactive = !(globals.no_interaction || self.config.no_interaction);

        let outcome = match matches.subcommand() {
            Some((name, sub_matches)) => match self.find(name) {
                Some(command) => self.execute(command, sub_matches.clone(), input, output, interactive),
                None => Err(ConsoleError::CommandNotFound(name.to_string())),
            },
            None => self.call_with(DEFAULT_COMMAND, Vec::<String>::new(), input, output, interactive),
        };

        match outcome {
            Ok(code) => code,
            Err(ConsoleError::Usage(err)) => render_usage(&err, output),
            Err(err) => {
                warn!(error = %err, "command failed");
                if let Err(write_err) = output.write_error_line(&err.to_string()) {
                    debug!(error = %write_err, "could not report command failure");
                }
                err.exit_code()
            }
        }
    }

    /// [`Application::run`] over the process's own arguments and streams.
    pub fn run_stdio<I, T>(&self, args: I) -> i32
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut output = Output::stdio();
        self.run(args, &mut input, &mut output)
    }

    /// Runs the command `name` with `args` (no program or command name),
    /// without prompting.
    ///
    /// # Errors
    ///
    /// Returns an error when the command does not exist, its arguments do
    /// not parse, or it fails.
    pub fn call<I, T>(&self, name: &str, args: I, output: &mut Output) -> Result<i32>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut input = io::empty();
        self.call_with(name, args, &mut input, output, false)
    }

    pub(crate) fn call_with<I, T>(
        &self,
        name: &str,
        args: I,
        input: &mut dyn BufRead,
        output: &mut Output,
        interactive: bool,
    ) -> Result<i32>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let command = self.find(name).ok_or_else(|| ConsoleError::CommandNotFound(name.to_string()))?;
        let argv = std::iter::once(name.to_string()).chain(args.into_iter().map(Into::into));
        let matches = definition(command).try_get_matches_from(argv)?;
        self.execute(command, matches, input, output, interactive)
    }

    fn execute(
        &self,
        command: &dyn Command,
        matches: ArgMatches,
        input: &mut dyn BufRead,
        output: &mut Output,
        interactive: bool,
    ) -> Result<i32> {
        debug!(command = command.name(), interactive, "running command");
        let mut ctx = CommandContext::new(self, Input::new(matches, input, interactive), output);
        let code = command.handle(&mut ctx)?;
        debug!(command = command.name(), code, "command finished");
        Ok(code)
    }
}

fn render_usage(err: &clap::Error, output: &mut Output) -> i32 {
    let text = err.render().to_string();
    let written = if err.use_stderr() { output.write_error(&text) } else { output.write(&text) };
    if let Err(write_err) = written {
        debug!(error = %write_err, "could not print usage");
    }
    err.exit_code()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::FakeProcessResult;

    struct Fixed {
        name: &'static str,
        code: i32,
    }

    impl Command for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "Exit with a fixed code"
        }

        fn handle(&self, ctx: &mut CommandContext<'_>) -> Result<i32> {
            ctx.line(format!("{} ran", self.name))?;
            Ok(self.code)
        }
    }

    struct Fail;

    impl Command for Fail {
        fn name(&self) -> &str {
            "fail"
        }

        fn handle(&self, _ctx: &mut CommandContext<'_>) -> Result<i32> {
            Err(ConsoleError::failed("it broke"))
        }
    }

    struct Uptime;

    impl Command for Uptime {
        fn name(&self) -> &str {
            "uptime"
        }

        fn handle(&self, ctx: &mut CommandContext<'_>) -> Result<i32> {
            let result = ctx.process().run("uptime")?;
            ctx.line(result.output().trim_end())?;
            Ok(result.exit_code().unwrap_or(1))
        }
    }

    fn run(app: &Application, args: &[&str]) -> (i32, String, String) {
        let (mut output, buffer) = Output::buffered();
        let mut input = io::empty();
        let code = app.run(args.iter().copied(), &mut input, &mut output);
        (code, buffer.stdout(), buffer.stderr())
    }

    #[test]
    fn new_registers_list() {
        let app = Application::new("demo", "1.0.0");
        assert!(app.has("list"));
        assert!(!app.has("build"));
        assert_eq!(app.name(), "demo");
        assert_eq!(app.version(), "1.0.0");
        assert_eq!(app.all().count(), 1);
    }

    #[test]
    fn add_replaces_commands_with_the_same_name() {
        let mut app = Application::new("demo", "1.0.0");
        app.add(Fixed { name: "build", code: 0 }).add(Fixed { name: "build", code: 7 });
        let (code, stdout, _) = run(&app, &["demo", "build"]);
        assert_eq!(code, 7);
        assert_eq!(stdout, "build ran\n");
        assert_eq!(app.all().filter(|command| command.name() == "build").count(), 1);
    }

    #[test]
    fn all_is_sorted_by_name() {
        let mut app = Application::new("demo", "1.0.0");
        app.add(Fixed { name: "zeta", code: 0 }).add(Fixed { name: "alpha", code: 0 });
        let names: Vec<&str> = app.all().map(Command::name).collect();
        assert_eq!(names, vec!["alpha", "list", "zeta"]);
    }

    #[test]
    fn find_misses_unknown_names() {
        let app = Application::new("demo", "1.0.0");
        assert!(app.find("list").is_some());
        assert!(app.find("nope").is_none());
    }

    #[test]
    fn help_and_version_exit_zero() {
        let app = Application::new("demo", "1.2.3");
        let (code, stdout, _) = run(&app, &["demo", "--version"]);
        assert_eq!(code, 0);
        assert_eq!(stdout, "demo 1.2.3\n");

        let (code, stdout, _) = run(&app, &["demo", "--help"]);
        assert_eq!(code, 0);
        assert!(stdout.contains("Usage:"));
    }

    #[test]
    fn usage_errors_exit_two() {
        let app = Application::new("demo", "1.0.0");
        let (code, _, stderr) = run(&app, &["demo", "nope"]);
        assert_eq!(code, 2);
        assert!(stderr.contains("nope"));
    }

    #[test]
    fn no_sub_command_lists_commands() {
        let mut app = Application::new("demo", "1.0.0");
        app.add(Fixed { name: "build", code: 0 });
        let (code, stdout, _) = run(&app, &["demo"]);
        assert_eq!(code, 0);
        assert!(stdout.contains("build"));
        assert!(stdout.contains("Exit with a fixed code"));
    }

    #[test]
    fn command_errors_are_printed_and_exit_one() {
        let mut app = Application::new("demo", "1.0.0");
        app.add(Fail);
        let (code, _, stderr) = run(&app, &["demo", "fail"]);
        assert_eq!(code, 1);
        assert_eq!(stderr, "it broke\n");
    }

    #[test]
    fn quiet_silences_regular_output() {
        let mut app = Application::new("demo", "1.0.0");
        app.add(Fixed { name: "build", code: 0 });
        let (code, stdout, _) = run(&app, &["demo", "build", "--quiet"]);
        assert_eq!(code, 0);
        assert_eq!(stdout, "");
    }

    #[test]
    fn call_runs_commands_programmatically() {
        let mut app = Application::new("demo", "1.0.0");
        app.add(Fixed { name: "build", code: 3 });
        let (mut output, buffer) = Output::buffered();
        assert_eq!(app.call("build", Vec::<String>::new(), &mut output).unwrap(), 3);
        assert_eq!(buffer.stdout(), "build ran\n");
        assert!(matches!(
            app.call("nope", Vec::<String>::new(), &mut output),
            Err(ConsoleError::CommandNotFound(_))
        ));
        assert!(matches!(app.call("build", ["--bogus"], &mut output), Err(ConsoleError::Usage(_))));
    }

    #[test]
    fn commands_share_the_application_factory() {
        let factory = Factory::new();
        factory.fake_for([("uptime", FakeProcessResult::default().with_output("up 3 days"))]);
        let mut app = Application::new("demo", "1.0.0").with_factory(factory.clone());
        app.add(Uptime);

        let (code, stdout, _) = run(&app, &["demo", "uptime"]);
        assert_eq!(code, 0);
        assert_eq!(stdout, "up 3 days\n");
        factory.assert_ran_command("uptime");
    }

    #[test]
    fn config_can_disable_interaction() {
        let config = ConsoleConfig { no_interaction: true, ..ConsoleConfig::default() };
        let app = Application::new("demo", "1.0.0").with_config(config);
        assert!(app.config().no_interaction);
    }
}
