//! Command-line front-end (A5, §6): parses `argv`, resolves the layered
//! configuration, dispatches to a subcommand, and maps the result to one
//! of the four documented exit codes (§6).

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

mod app;
mod backend;
mod cli;
mod commands;
mod output;

use app::App;
use apm_core::Error;
use clap::Parser;
use cli::Cli;
use output::OutputFormat;
use tracing_subscriber::EnvFilter;

const EXIT_SUCCESS: i32 = 0;
const EXIT_OPERATION_FAILED: i32 = 1;
const EXIT_USAGE_ERROR: i32 = 2;
const EXIT_CANCELLED: i32 = 130;

fn exit_code_for(err: &Error) -> i32 {
    match err {
        Error::Cancelled => EXIT_CANCELLED,
        Error::InvalidParameters { .. } => EXIT_USAGE_ERROR,
        _ => EXIT_OPERATION_FAILED,
    }
}

fn init_tracing(app: &App) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(app.resolved.log_level.as_filter()));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match app.format {
        OutputFormat::Json => {
            let _ = subscriber.json().try_init();
        }
        OutputFormat::Human => {
            let _ = subscriber.try_init();
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let app = match App::load(&cli) {
        Ok(app) => app,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(EXIT_USAGE_ERROR);
        }
    };

    init_tracing(&app);

    let result = commands::dispatch(&app, cli.command).await;

    match result {
        Ok(()) => std::process::exit(EXIT_SUCCESS),
        Err(err) => {
            match app.format {
                OutputFormat::Json => eprintln!("{}", output::render_error_json(&err)),
                OutputFormat::Human => eprintln!("error [{}]: {err}", err.code()),
            }
            std::process::exit(exit_code_for(&err));
        }
    }
}
