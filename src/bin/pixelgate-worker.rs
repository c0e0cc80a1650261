//! Isolated image worker.
//!
//! `pixelgate-worker <path>`: decodes the file at `path`, prints one JSON
//! document on stdout and exits 0 (success), 1 (usage), 2 (unrecognized
//! image) or 3 (processing failed). Settings come from the environment; see
//! [`pixelgate::protocol`].

use pixelgate::protocol::{ENV_LOG, WorkerExit};
use pixelgate::worker::{self, WorkerSettings};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> ExitCode {
    init_logging();

    let path = match worker::parse_args(std::env::args_os().skip(1)) {
        Ok(path) => path,
        Err(usage) => {
            eprintln!("{usage}");
            return exit_code(WorkerExit::Usage);
        }
    };

    let document = worker::run_worker(&path, &WorkerSettings::from_env());
    println!("{}", document.to_line());
    exit_code(document.exit())
}

fn exit_code(exit: WorkerExit) -> ExitCode {
    // Codes are 0..=3.
    ExitCode::from(exit.code() as u8)
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_env(ENV_LOG)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .with(filter)
        .init();
}
