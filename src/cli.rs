//! Global CLI options shared by every command.

use clap::{ArgAction, Args};

use crate::console::Verbosity;

/// Options accepted before or after any sub-command.
#[derive(Debug, Clone, Default, Args)]
pub struct GlobalOptions {
    /// Do not output any message.
    #[arg(short, long, global = true)]
    pub quiet: bool,
    /// Increase the verbosity of messages: 1 for normal output, 2 for more
    /// verbose output and 3 for debug.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
    /// Do not ask any interactive question.
    #[arg(short = 'n', long, global = true)]
    pub no_interaction: bool,
}

impl GlobalOptions {
    /// The output verbosity these options select.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}

/// Picks the verbosity out of raw arguments before clap has seen them, so
/// logging can be set up first. Stops at `--`.
pub fn scan_verbosity<S: AsRef<str>>(args: &[S]) -> Verbosity {
    let mut quiet = false;
    let mut verbose: u8 = 0;
    for arg in args.iter().skip(1).map(AsRef::as_ref) {
        match arg {
            "--" => break,
            "-q" | "--quiet" => quiet = true,
            "--verbose" => verbose = verbose.saturating_add(1),
            short if short.len() > 1 && short.starts_with('-') && short[1..].chars().all(|c| c == 'v') => {
                let count = u8::try_from(short.len() - 1).unwrap_or(u8::MAX);
                verbose = verbose.saturating_add(count);
            }
            _ => {}
        }
    }
    Verbosity::from_flags(quiet, verbose)
}
