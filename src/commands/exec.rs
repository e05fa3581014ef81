//! `artisan exec` command.

use std::time::Duration;

use clap::{Arg, ArgAction};

use crate::console::{Command, CommandContext};
use crate::error::Result;

/// Runs one shell command through the factory, streaming its output and
/// exiting with its exit code.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecCommand;

impl Command for ExecCommand {
    fn name(&self) -> &str {
        "exec"
    }

    fn description(&self) -> &str {
        "Run a shell command"
    }

    fn configure(&self, command: clap::Command) -> clap::Command {
        command
            .arg(
                Arg::new("command")
                    .value_name("COMMAND")
                    .required(true)
                    .num_args(1..)
                    .trailing_var_arg(true)
                    .allow_hyphen_values(true)
                    .help("The command line to run"),
            )
            .arg(Arg::new("cwd").long("cwd").value_name("DIR").help("Working directory for the command"))
            .arg(
                Arg::new("timeout")
                    .long("timeout")
                    .value_name("SECONDS")
                    .value_parser(clap::value_parser!(u64))
                    .help("Kill the command after this many seconds (0 disables the limit)"),
            )
            .arg(
                Arg::new("confirm")
                    .long("confirm")
                    .action(ArgAction::SetTrue)
                    .help("Ask before running the command"),
            )
    }

    fn handle(&self, ctx: &mut CommandContext<'_>) -> Result<i32> {
        let line = ctx.arguments("command").join(" ");
        if ctx.flag("confirm") && !ctx.confirm(&format!("Run `{line}`?"), false)? {
            ctx.comment("Command cancelled.")?;
            return Ok(1);
        }

        let mut process = ctx.process().command(line.as_str());
        if let Some(dir) = ctx.option("cwd") {
            process = process.path(dir);
        }
        match ctx.input().matches().try_get_one::<u64>("timeout").ok().flatten().copied() {
            Some(0) => process = process.forever(),
            Some(seconds) => process = process.timeout(Duration::from_secs(seconds)),
            None => {}
        }

        let output = ctx.output();
        let mut write_error = None;
        let result = process.run_with_output(|kind, chunk| {
            if let Err(err) = output.write_process_chunk(kind, chunk) {
                write_error.get_or_insert(err);
            }
        })?;
        if let Some(err) = write_error {
            return Err(err.into());
        }

        ctx.verbose(format!("`{}` exited with {}", result.command(), result.exit_code_label()))?;
        Ok(result.exit_code().unwrap_or(1))
    }
}
