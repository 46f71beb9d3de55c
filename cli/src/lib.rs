//! `syscage` entry point.
//!
//! Parses the command line, compiles the syscall policy, installs it as a
//! seccomp filter and replaces the process with the requested command.
mod cli;
mod exec;
mod launch;
mod quiesce;

use std::io::Write;

use clap::CommandFactory;
use clap::Parser;
use tracing_subscriber::EnvFilter;

pub use cli::Cli;
pub use launch::LaunchError;
pub use launch::launch;
pub use launch::resolve_config;

pub fn run_main() -> ! {
    let cli = Cli::parse();
    init_logging();

    let err = match launch(cli) {
        Ok(never) => match never {},
        Err(err) => err,
    };
    // The filter may already be loaded and deny writes, so a failed report
    // must not stop the exit.
    let mut stderr = std::io::stderr();
    if matches!(err, LaunchError::MissingCommand) {
        let _ = writeln!(stderr, "{}", Cli::command().render_usage());
    } else {
        let _ = writeln!(stderr, "syscage: {err}");
    }
    std::process::exit(err.exit_code());
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}
