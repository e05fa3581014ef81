//! The built-in `list` command.

use clap::Arg;
use serde::Serialize;

use crate::console::{Command, CommandContext};
use crate::error::Result;

/// Lists the registered commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListCommand;

#[derive(Debug, Serialize)]
struct ListDocument<'a> {
    application: ApplicationSummary<'a>,
    commands: Vec<CommandSummary<'a>>,
}

#[derive(Debug, Serialize)]
struct ApplicationSummary<'a> {
    name: &'a str,
    version: &'a str,
}

#[derive(Debug, Serialize)]
struct CommandSummary<'a> {
    name: &'a str,
    description: &'a str,
}

impl Command for ListCommand {
    fn name(&self) -> &str {
        "list"
    }

    fn description(&self) -> &str {
        "List commands"
    }

    fn configure(&self, command: clap::Command) -> clap::Command {
        command.arg(
            Arg::new("format")
                .long("format")
                .value_name("FORMAT")
                .value_parser(["txt", "json"])
                .default_value("txt")
                .help("The output format"),
        )
    }

    fn handle(&self, ctx: &mut CommandContext<'_>) -> Result<i32> {
        let app = ctx.application();
        let commands: Vec<CommandSummary<'_>> = app
            .all()
            .filter(|command| !command.hidden())
            .map(|command| CommandSummary { name: command.name(), description: command.description() })
            .collect();

        if ctx.option("format") == Some("json") {
            let document = ListDocument {
                application: ApplicationSummary { name: app.name(), version: app.version() },
                commands,
            };
            ctx.line(serde_json::to_string_pretty(&document)?)?;
            return Ok(0);
        }

        ctx.line(format!("{} {}", app.name(), app.version()))?;
        ctx.new_line(1)?;
        ctx.line("Usage:")?;
        ctx.line("  command [options] [arguments]")?;
        ctx.new_line(1)?;
        ctx.line("Available commands:")?;
        let width = commands.iter().map(|command| command.name.len()).max().unwrap_or(0);
        for command in &commands {
            let row = format!("  {:<width$}  {}", command.name, command.description);
            ctx.line(row.trim_end())?;
        }
        Ok(0)
    }
}
