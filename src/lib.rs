//! Core library entry for the `artisan` console.
//!
//! [`console`] holds the command layer, [`process`] the fakeable process
//! factory it hands to commands.

pub mod cli;
pub mod commands;
pub mod config;
pub mod console;
pub mod error;
pub mod logging;
pub mod process;

use std::ffi::OsString;

use tracing::error;

use crate::config::ConsoleConfig;
use crate::process::Factory;

/// Run the `artisan` binary with the provided arguments and the process's
/// standard streams, returning the exit code.
///
/// When `ARTISAN_RECORD` is set, every process run is written to that cassette
/// once the command finishes, whatever its outcome.
pub fn run<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    let lossy: Vec<String> = args.iter().map(|arg| arg.to_string_lossy().into_owned()).collect();
    logging::init_logger(cli::scan_verbosity(&lossy));

    let config = match ConsoleConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return err.exit_code();
        }
    };

    let factory = Factory::new();
    if let Err(err) = config.apply(&factory) {
        eprintln!("{err}");
        return err.exit_code();
    }

    let app = commands::application(factory.clone(), config.clone());
    let code = app.run_stdio(args);

    match config.finish_recording(&factory) {
        Ok(Some(path)) => eprintln!("Recording saved to: {}", path.display()),
        Ok(None) => {}
        Err(err) => {
            error!(error = %err, "could not save recording");
            eprintln!("{err}");
            return err.exit_code();
        }
    }
    code
}

#[cfg(test)]
mod tests {
    use super::run;

    #[test]
    fn run_lists_commands() {
        assert_eq!(run(["artisan", "list", "--quiet"]), 0);
    }

    #[test]
    fn run_errors_on_unknown_subcommand() {
        assert_eq!(run(["artisan", "unknown"]), 2);
    }
}
