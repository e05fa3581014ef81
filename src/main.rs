//! Binary entrypoint for the `artisan` console.

use std::process::ExitCode;

fn main() -> ExitCode {
    // A missing .env file is fine; the environment alone configures the run.
    dotenvy::dotenv().ok();
    let code = artisan::run(std::env::args_os());
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
