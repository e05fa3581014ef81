//! `artisan concurrently` command.

use std::path::PathBuf;

use clap::Arg;

use crate::console::{Command, CommandContext};
use crate::error::Result;
use crate::process::PendingProcess;

/// Runs several shell commands as one pool and prints each one's output
/// prefixed with its name.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcurrentlyCommand;

impl Command for ConcurrentlyCommand {
    fn name(&self) -> &str {
        "concurrently"
    }

    fn description(&self) -> &str {
        "Run shell commands concurrently"
    }

    fn configure(&self, command: clap::Command) -> clap::Command {
        command
            .arg(
                Arg::new("commands")
                    .value_name("COMMAND")
                    .required(true)
                    .num_args(1..)
                    .help("Command lines to run, one quoted argument each"),
            )
            .arg(
                Arg::new("names")
                    .long("names")
                    .value_name("NAMES")
                    .value_delimiter(',')
                    .help("Comma-separated labels for the commands, in order"),
            )
            .arg(Arg::new("cwd").long("cwd").value_name("DIR").help("Working directory for every command"))
    }

    fn handle(&self, ctx: &mut CommandContext<'_>) -> Result<i32> {
        let commands: Vec<String> = ctx.arguments("commands").into_iter().map(str::to_string).collect();
        let names: Vec<String> = ctx.arguments("names").into_iter().map(str::to_string).collect();
        let cwd = ctx.option("cwd").map(PathBuf::from);

        let results = ctx.process().concurrently(|pool| {
            for (index, command) in commands.iter().enumerate() {
                let cwd = cwd.clone();
                let build = move |process: PendingProcess| {
                    let process = process.command(command.as_str());
                    match cwd {
                        Some(dir) => process.path(dir),
                        None => process,
                    }
                };
                match names.get(index) {
                    Some(name) => pool.add_as(name.as_str(), build),
                    None => pool.add(build),
                };
            }
        })?;

        let mut exit_code = 0;
        for (key, result) in results.iter() {
            for line in result.output().lines() {
                ctx.line(format!("[{key}] {line}"))?;
            }
            for line in result.error_output().lines() {
                ctx.error(format!("[{key}] {line}"))?;
            }
            if exit_code == 0 && result.failed() {
                exit_code = result.exit_code().unwrap_or(1);
            }
            ctx.verbose(format!("[{key}] exited with {}", result.exit_code_label()))?;
        }
        Ok(exit_code)
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use crate::config::ConsoleConfig;
    use crate::console::Output;
    use crate::process::{Factory, FakeProcessResult};

    use super::*;

    fn run(factory: &Factory, args: &[&str]) -> (i32, String, String) {
        let app = crate::commands::application(factory.clone(), ConsoleConfig::default());
        let (mut output, buffer) = Output::buffered();
        let mut input = io::empty();
        let code = app.run(args.iter().copied(), &mut input, &mut output);
        (code, buffer.stdout(), buffer.stderr())
    }

    #[test]
    fn prefixes_output_with_pool_keys() {
        let factory = Factory::new();
        factory.fake_for([
            ("npm run build", FakeProcessResult::default().with_output(vec!["compiled", "done"])),
            ("cargo test", FakeProcessResult::default().with_error_output("1 failed").with_exit_code(101)),
        ]);

        let (code, stdout, stderr) =
            run(&factory, &["artisan", "concurrently", "--names", "web,api", "npm run build", "cargo test"]);
        assert_eq!(code, 101);
        assert_eq!(stdout, "[web] compiled\n[web] done\n");
        assert_eq!(stderr, "[api] 1 failed\n");
        factory.assert_ran_times(|_, _| true, 2);
    }

    #[test]
    fn unnamed_commands_use_their_position() {
        let factory = Factory::new();
        factory.fake_using(|process: &PendingProcess| FakeProcessResult::default().with_output(process.command_line()));

        let (code, stdout, _) = run(&factory, &["artisan", "concurrently", "first", "second"]);
        assert_eq!(code, 0);
        assert_eq!(stdout, "[0] first\n[1] second\n");
    }

    #[test]
    fn runs_real_commands_side_by_side() {
        let factory = Factory::new();
        let (code, stdout, _) = run(&factory, &["artisan", "concurrently", "echo one", "echo two; exit 4"]);
        assert_eq!(code, 4);
        assert!(stdout.contains("[0] one\n"));
        assert!(stdout.contains("[1] two\n"));
    }
}
