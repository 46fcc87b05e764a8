//! annopipe CLI entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Parse arguments** — see [`args::Cli`].
//! 2. **Wire observability** — `tracing-subscriber` with an `EnvFilter`, pretty
//!    or JSON output on stderr, and an OpenTelemetry OTLP exporter when an
//!    endpoint is given. Spans and events from every crate in the workspace
//!    flow through it.
//! 3. **Construct drivers** — the remote driver from the `[remote]` settings
//!    and the in-process driver with the built-in engines.
//! 4. **Run the command** — `run` streams JSON Lines documents through the
//!    pipeline; `check` instantiates it and prints what each component
//!    declares.

mod args;
mod commands;
mod io;
mod telemetry;

use std::process::ExitCode;

use clap::Parser;

use crate::args::{Cli, Command};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let telemetry = match telemetry::init(cli.log_format, cli.otlp_endpoint.as_deref()) {
        Ok(telemetry) => telemetry,
        Err(error) => {
            eprintln!("annopipe: failed to initialise logging: {error:#}");
            return ExitCode::FAILURE;
        }
    };

    let outcome = match cli.command {
        Command::Run(args) => commands::run(args).await,
        Command::Check(args) => commands::check(args).await,
    };
    telemetry.shutdown();

    match outcome {
        Ok(code) => code,
        Err(error) => {
            eprintln!("annopipe: {error:#}");
            ExitCode::FAILURE
        }
    }
}
