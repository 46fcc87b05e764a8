//! The pipeline runner.

use std::sync::Arc;
use std::time::Instant;

use driver::{Backoff, RetryConfig};
use pipeline::{
    ComponentDescriptor, Document, Driver, InstanceId, NullPerformanceSink, PerformanceSink,
    PipelineError, Typesystem,
};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, instrument, warn};

use crate::{PipelineConfig, RunReport};

/// How a [`Composer`] instantiates components and runs documents.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposerSettings {
    pub workers: usize,
    pub skip_verification: bool,
    pub abort_on_error: bool,
    pub retry: RetryConfig,
}

impl Default for ComposerSettings {
    fn default() -> Self {
        Self {
            workers: 1,
            skip_verification: false,
            abort_on_error: false,
            retry: RetryConfig::default(),
        }
    }
}

impl From<&PipelineConfig> for ComposerSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            workers: config.workers,
            skip_verification: config.skip_verification,
            abort_on_error: config.abort_on_error,
            retry: config.retry.clone(),
        }
    }
}

/// A component bound to the driver instance serving it.
#[derive(Clone)]
struct Stage {
    label: String,
    driver: Arc<dyn Driver>,
    id: InstanceId,
}

/// Builds a pipeline from component descriptors and runs documents through
/// it.
///
/// Lifecycle: [`add`](Self::add) components, [`instantiate`](Self::instantiate)
/// them once, [`run`](Self::run) any number of batches, then
/// [`shutdown`](Self::shutdown).
pub struct Composer {
    settings: ComposerSettings,
    drivers: Vec<Arc<dyn Driver>>,
    components: Vec<ComponentDescriptor>,
    stages: Arc<Vec<Stage>>,
    sink: Arc<dyn PerformanceSink>,
}

impl Composer {
    pub fn new(settings: ComposerSettings) -> Self {
        Self {
            settings,
            drivers: Vec::new(),
            components: Vec::new(),
            stages: Arc::new(Vec::new()),
            sink: Arc::new(NullPerformanceSink),
        }
    }

    /// Settings and components from a loaded configuration.
    pub fn from_config(config: &PipelineConfig) -> Self {
        let mut composer = Self::new(ComposerSettings::from(config));
        for descriptor in &config.components {
            composer.add(descriptor.clone());
        }
        composer
    }

    /// Registers a driver. The first registered driver that accepts a
    /// component serves it.
    #[must_use]
    pub fn with_driver(mut self, driver: Arc<dyn Driver>) -> Self {
        self.drivers.push(driver);
        self
    }

    /// Replaces the performance sink (default: records are discarded).
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn PerformanceSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Appends a component to the pipeline.
    pub fn add(&mut self, descriptor: ComponentDescriptor) -> &mut Self {
        self.components.push(descriptor);
        self
    }

    pub fn components(&self) -> &[ComponentDescriptor] {
        &self.components
    }

    pub fn is_instantiated(&self) -> bool {
        !self.stages.is_empty()
    }

    /// Instantiates every component, in order, with its driver.
    ///
    /// Fails before any document is processed. If a component cannot be
    /// instantiated, the ones already instantiated are destroyed again.
    #[instrument(skip_all, fields(components = self.components.len()))]
    pub async fn instantiate(&mut self, probe: &Document) -> Result<(), PipelineError> {
        if self.is_instantiated() {
            return Err(PipelineError::Configuration {
                message: "pipeline is already instantiated".to_string(),
            });
        }
        if self.components.is_empty() {
            return Err(PipelineError::Configuration {
                message: "pipeline has no components".to_string(),
            });
        }

        let mut stages = Vec::with_capacity(self.components.len());
        for (index, descriptor) in self.components.iter().enumerate() {
            let label = PipelineError::component_label(descriptor.name.as_ref(), index);
            let outcome = match self.driver_for(descriptor) {
                Some(driver) => driver
                    .instantiate(descriptor, probe, self.settings.skip_verification)
                    .await
                    .map(|id| Stage {
                        label: label.clone(),
                        driver: driver.clone(),
                        id,
                    })
                    .map_err(|source| PipelineError::Instantiation {
                        component: label.clone(),
                        source,
                    }),
                None => Err(PipelineError::NoDriver {
                    component: label.clone(),
                }),
            };

            match outcome {
                Ok(stage) => {
                    debug!(component = %label, instance_id = %stage.id, "Component instantiated");
                    stages.push(stage);
                }
                Err(error) => {
                    warn!(component = %label, error = %error, "Instantiation failed, rolling back");
                    destroy_stages(&stages).await;
                    return Err(error);
                }
            }
        }

        info!(components = stages.len(), "Pipeline instantiated");
        self.stages = Arc::new(stages);
        Ok(())
    }

    fn driver_for(&self, descriptor: &ComponentDescriptor) -> Option<&Arc<dyn Driver>> {
        self.drivers
            .iter()
            .find(|driver| driver.kind() == descriptor.driver && driver.can_accept(descriptor))
    }

    /// Typesystems of the instantiated components, labelled.
    pub fn typesystems(&self) -> Result<Vec<(String, Typesystem)>, PipelineError> {
        self.stages
            .iter()
            .map(|stage| {
                stage
                    .driver
                    .typesystem(stage.id)
                    .map(|ts| (stage.label.clone(), ts))
                    .map_err(|source| PipelineError::Instantiation {
                        component: stage.label.clone(),
                        source,
                    })
            })
            .collect()
    }

    /// Processes `documents` through every component.
    ///
    /// Up to `workers` documents are in flight at once; each one visits the
    /// components strictly in order. Failed documents are reported in the
    /// [`RunReport`], or end the run when `abort_on_error` is set.
    #[instrument(skip_all, fields(documents = documents.len(), workers = self.settings.workers))]
    pub async fn run(&self, documents: Vec<Document>) -> Result<RunReport, PipelineError> {
        if !self.is_instantiated() {
            return Err(PipelineError::Configuration {
                message: "pipeline must be instantiated before running documents".to_string(),
            });
        }

        let started = Instant::now();
        let total = documents.len();
        let workers = Arc::new(Semaphore::new(self.settings.workers.max(1)));
        let mut tasks = JoinSet::new();
        let mut outcomes: Vec<Option<Result<Document, PipelineError>>> =
            std::iter::repeat_with(|| None).take(total).collect();

        for (index, document) in documents.into_iter().enumerate() {
            while let Some(joined) = tasks.try_join_next() {
                self.collect(joined, &mut outcomes, &mut tasks)?;
            }
            let permit = workers
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| PipelineError::Configuration {
                    message: e.to_string(),
                })?;
            let stages = self.stages.clone();
            let sink = self.sink.clone();
            let retry = self.settings.retry.clone();
            tasks.spawn(async move {
                let _permit = permit;
                (index, process_document(&stages, document, sink.as_ref(), &retry).await)
            });
        }
        while let Some(joined) = tasks.join_next().await {
            self.collect(joined, &mut outcomes, &mut tasks)?;
        }

        let mut report = RunReport::default();
        for outcome in outcomes.into_iter().flatten() {
            match outcome {
                Ok(document) => report.documents.push(document),
                Err(error) => report.failures.push(error),
            }
        }
        report.elapsed = started.elapsed();
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Pipeline run finished"
        );
        Ok(report)
    }

    fn collect(
        &self,
        joined: Result<(usize, Result<Document, PipelineError>), JoinError>,
        outcomes: &mut [Option<Result<Document, PipelineError>>],
        tasks: &mut JoinSet<(usize, Result<Document, PipelineError>)>,
    ) -> Result<(), PipelineError> {
        let (index, outcome) = match joined {
            Ok(joined) => joined,
            Err(error) if error.is_panic() => std::panic::resume_unwind(error.into_panic()),
            Err(_) => return Ok(()),
        };
        match outcome {
            Err(error) if self.settings.abort_on_error => {
                warn!(error = %error, "Aborting run");
                tasks.abort_all();
                Err(error)
            }
            outcome => {
                outcomes[index] = Some(outcome);
                Ok(())
            }
        }
    }

    /// Destroys every instantiated component and shuts the drivers down.
    pub async fn shutdown(&mut self) {
        destroy_stages(&self.stages).await;
        self.stages = Arc::new(Vec::new());
        for driver in &self.drivers {
            driver.shutdown().await;
        }
        info!("Pipeline shut down");
    }
}

async fn destroy_stages(stages: &[Stage]) {
    for stage in stages.iter().rev() {
        if let Err(error) = stage.driver.destroy(stage.id).await {
            warn!(component = %stage.label, error = %error, "Failed to destroy component");
        }
    }
}

async fn process_document(
    stages: &[Stage],
    mut document: Document,
    sink: &dyn PerformanceSink,
    retry: &RetryConfig,
) -> Result<Document, PipelineError> {
    for stage in stages {
        let mut attempt = 0;
        loop {
            let error = match stage.driver.run(stage.id, &mut document, sink).await {
                Ok(()) => break,
                Err(error) => error,
            };
            match Backoff::next_retry(retry, &error, attempt) {
                Some(delay) => {
                    debug!(
                        component = %stage.label,
                        document = %document.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Retrying document"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => {
                    return Err(PipelineError::DocumentFailed {
                        document: document.id.clone(),
                        component: stage.label.clone(),
                        source: error,
                    })
                }
            }
        }
    }
    Ok(document)
}
