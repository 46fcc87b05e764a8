use std::io::Write as _;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use composer::{Composer, InMemoryPerformanceSink, PipelineConfig};
use in_process::{in_process_driver, EngineRegistry};
use pipeline::{Document, DocumentId, DriverKind};
use remote::{build_client, remote_driver, transport};
use serde_json::json;
use tracing::{error, info, warn};

use crate::args::{CheckArgs, RunArgs};
use crate::io;

/// Exit code when the run finished but some documents failed.
const PARTIAL_FAILURE: u8 = 2;

const PROBE_TEXT: &str = "This is a probe document used to verify the pipeline.";

fn probe_document() -> Result<Document> {
    let id = DocumentId::new("annopipe-probe").context("probe document id")?;
    Ok(Document::new(id, PROBE_TEXT).with_language("en"))
}

fn build_composer(config: &PipelineConfig) -> Result<Composer> {
    let remote = remote_driver(config.remote.transport()).context("failed to build the remote driver")?;
    let in_process = in_process_driver(EngineRegistry::with_builtins());

    if config.components.iter().any(|c| c.driver == DriverKind::Container) {
        warn!("Container components need a container runtime, which this binary does not provide");
    }
    Ok(Composer::from_config(config)
        .with_driver(Arc::new(remote))
        .with_driver(Arc::new(in_process)))
}

pub async fn run(args: RunArgs) -> Result<ExitCode> {
    let mut config = PipelineConfig::load(&args.config)?;
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    config.skip_verification |= args.skip_verification;
    config.abort_on_error |= args.abort_on_error;
    config.validate()?;

    let documents = io::read_path(&args.input)?;
    info!(documents = documents.len(), components = config.components.len(), "Starting pipeline");

    let sink = Arc::new(InMemoryPerformanceSink::new());
    let mut composer = build_composer(&config)?.with_sink(sink.clone());
    composer.instantiate(&probe_document()?).await?;
    let outcome = composer.run(documents).await;
    composer.shutdown().await;
    let report = outcome?;

    io::write_path(&args.output, &report.documents)?;
    for summary in sink.summary() {
        info!(
            component = %summary.component,
            documents = summary.documents,
            failures = summary.failures,
            mean_wait_ms = summary.mean_wait().as_millis() as u64,
            mean_process_ms = summary.mean_process().as_millis() as u64,
            "Component performance"
        );
    }
    for failure in &report.failures {
        error!(error = %failure, "Document failed");
    }

    if report.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(PARTIAL_FAILURE))
    }
}

pub async fn check(args: CheckArgs) -> Result<ExitCode> {
    let config = PipelineConfig::load(&args.config)?;
    let mut composer = build_composer(&config)?;
    composer.instantiate(&probe_document()?).await?;
    let typesystems = composer.typesystems();
    composer.shutdown().await;

    let client = build_client(&config.remote.transport())?;
    let mut lines = Vec::new();
    for ((label, typesystem), descriptor) in typesystems?.into_iter().zip(&config.components) {
        let documentation = match descriptor.addresses.first() {
            Some(address) => transport::fetch_documentation(&client, address)
                .await
                .unwrap_or_else(|error| {
                    warn!(component = %label, error = %error, "Documentation unavailable");
                    None
                }),
            None => descriptor.description.clone(),
        };
        let line = json!({
            "component": label,
            "driver": descriptor.driver,
            "media_type": typesystem.media_type,
            "typesystem": typesystem.body,
            "documentation": documentation,
        });
        lines.push(line);
    }

    let mut out = std::io::stdout().lock();
    for line in lines {
        writeln!(out, "{line}")?;
    }
    Ok(ExitCode::SUCCESS)
}
