use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Orchestrates annotation pipelines over remote, containerized, and
/// in-process components.
#[derive(Debug, Parser)]
#[command(name = "annopipe", version, about)]
pub struct Cli {
    /// Log output format. Filtering follows `RUST_LOG` (default `info`).
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    pub log_format: LogFormat,

    /// Export spans to this OTLP/gRPC collector (e.g. `http://localhost:4317`).
    #[arg(long, env = "ANNOPIPE_OTLP_ENDPOINT", global = true)]
    pub otlp_endpoint: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Process JSON Lines documents through the configured pipeline.
    Run(RunArgs),
    /// Instantiate the pipeline, print each component's typesystem, and tear
    /// it down again.
    Check(CheckArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Pipeline configuration (TOML).
    #[arg(short, long)]
    pub config: PathBuf,

    /// Input documents, one JSON object per line. `-` reads stdin.
    #[arg(short, long, default_value = "-")]
    pub input: PathBuf,

    /// Where to write processed documents. `-` writes stdout.
    #[arg(short, long, default_value = "-")]
    pub output: PathBuf,

    /// Overrides `workers` from the configuration.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Skip capability negotiation for every component.
    #[arg(long)]
    pub skip_verification: bool,

    /// Stop at the first failed document.
    #[arg(long)]
    pub abort_on_error: bool,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Pipeline configuration (TOML).
    #[arg(short, long)]
    pub config: PathBuf,
}
