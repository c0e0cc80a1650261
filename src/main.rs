use clap::{Parser, Subcommand};
use pixelgate::pipeline::{FailureClass, Pipeline};
use pixelgate::preflight::PreflightChecker;
use pixelgate::{config, output};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pixelgate")]
#[command(about = "Gate untrusted images and derive thumbnails in an isolated worker")]
#[command(long_about = "\
Gate untrusted images and derive thumbnails in an isolated worker

Every input goes through two stages:

  1. Preflight (in process): format sniff, container verification, and a
     pixel ceiling read from the header. No pixel data is decoded.
  2. Worker (separate process): the bytes are staged to a temp file and
     `pixelgate-worker` decodes them under a hard timeout, then derives a
     thumbnail. The staged file is always removed.

Exit status of `process`: 0 on success, 1 when the input is rejected,
2 when processing failed on our side (timeout, crash, launch failure).

Run 'pixelgate gen-config' to generate a documented pixelgate.toml.")]
#[command(version)]
struct Cli {
    /// Config file (TOML). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the in-process preflight check only
    Check {
        /// Image file to check
        file: PathBuf,
    },
    /// Run preflight, then derive a thumbnail in the isolated worker
    Process {
        /// Image file to process
        file: PathBuf,
        /// Print the JSON response document instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// Print a stock pixelgate.toml with all options documented
    GenConfig,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging();

    match cli.command {
        Command::Check { file } => {
            let config = config::load_config(cli.config.as_deref())?;
            let bytes = std::fs::read(&file)?;
            let result = PreflightChecker::new(&config.preflight).check(&bytes);
            output::print_check_result(&result);
            Ok(if result.is_accepted() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }
        Command::Process { file, json } => {
            let config = config::load_config(cli.config.as_deref())?;
            let bytes = std::fs::read(&file)?;
            let result = Pipeline::from_config(&config).run(&bytes);
            if json {
                output::print_response_json(&result);
            } else {
                output::print_process_result(&result);
            }
            Ok(match &result {
                Ok(_) => ExitCode::SUCCESS,
                Err(e) => match e.class() {
                    FailureClass::Client => ExitCode::from(1),
                    FailureClass::Server => ExitCode::from(2),
                },
            })
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Log to stderr, filtered by `RUST_LOG` (default `warn`). stdout carries results only.
fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
