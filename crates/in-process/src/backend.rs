use std::collections::BTreeMap;

use async_trait::async_trait;
use driver::{Backend, ComponentDriver, ProvisionRequest, Provisioned};
use pipeline::{
    CommunicationContract, ComponentDescriptor, Document, DriverError, DriverKind, EngineName,
};
use tracing::{debug, info, warn};

use crate::{AnalysisEngine, EngineError, EngineRegistry};

/// Driver for engines running inside this process.
pub type InProcessDriver = ComponentDriver<InProcessBackend>;

pub fn in_process_driver(registry: EngineRegistry) -> InProcessDriver {
    ComponentDriver::new(InProcessBackend::new(registry))
}

/// One pool handle: an engine instance of its own.
///
/// The engine is moved onto a blocking thread for each document and put back
/// afterwards; it is `None` only while that call is in flight.
pub struct EngineHandle {
    engine: Option<Box<dyn AnalysisEngine>>,
}

/// [`Backend`] that instantiates registered engines.
#[derive(Debug, Clone, Default)]
pub struct InProcessBackend {
    registry: EngineRegistry,
}

impl InProcessBackend {
    pub fn new(registry: EngineRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    fn replacement(&self, name: &EngineName) -> Result<Box<dyn AnalysisEngine>, DriverError> {
        self.registry.create(name).ok_or_else(|| DriverError::Engine {
            engine: name.to_string(),
            message: "engine instance lost and no longer registered".to_string(),
        })
    }
}

fn engine_error(engine: &EngineName, error: EngineError) -> DriverError {
    DriverError::Engine {
        engine: engine.to_string(),
        message: error.to_string(),
    }
}

/// Runs `engine` on a copy of `document` on tokio's blocking pool, so
/// CPU-bound engines never stall the async workers.
///
/// Returns the engine with the annotated copy, or `None` for the engine if it
/// panicked.
async fn process_blocking(
    name: &EngineName,
    mut engine: Box<dyn AnalysisEngine>,
    document: &Document,
    parameters: &BTreeMap<String, String>,
) -> (Option<Box<dyn AnalysisEngine>>, Result<Document, DriverError>) {
    let mut scratch = document.clone();
    let parameters = parameters.clone();
    let joined = tokio::task::spawn_blocking(move || {
        let outcome = engine.process(&mut scratch, &parameters);
        (engine, outcome.map(|()| scratch))
    })
    .await;
    match joined {
        Ok((engine, outcome)) => (Some(engine), outcome.map_err(|e| engine_error(name, e))),
        Err(e) => (
            None,
            Err(DriverError::Engine {
                engine: name.to_string(),
                message: format!("engine did not finish: {e}"),
            }),
        ),
    }
}

fn engine_name(descriptor: &ComponentDescriptor) -> Result<&EngineName, DriverError> {
    descriptor
        .engine
        .as_ref()
        .ok_or_else(|| DriverError::invalid_descriptor("in-process component has no engine name"))
}

#[async_trait]
impl Backend for InProcessBackend {
    type Handle = EngineHandle;

    fn kind(&self) -> DriverKind {
        DriverKind::InProcess
    }

    fn can_accept(&self, descriptor: &ComponentDescriptor) -> bool {
        descriptor
            .engine
            .as_ref()
            .is_some_and(|name| self.registry.contains(name))
    }

    async fn provision(
        &self,
        request: ProvisionRequest<'_>,
    ) -> Result<Provisioned<EngineHandle>, DriverError> {
        let name = engine_name(request.descriptor)?;
        let create = || {
            self.registry.create(name).ok_or_else(|| {
                DriverError::invalid_descriptor(format!("no engine registered as '{name}'"))
            })
        };

        let typesystem = if request.skip_verification {
            create()?.typesystem()
        } else {
            let (engine, probed) =
                process_blocking(name, create()?, request.probe, &request.descriptor.parameters)
                    .await;
            let probe = probed?;
            debug!(engine = %name, annotations = probe.annotations.len(), "Probe document processed");
            match engine {
                Some(engine) => engine.typesystem(),
                None => create()?.typesystem(),
            }
        };

        let handles = (0..request.descriptor.concurrency.get())
            .map(|_| create().map(|engine| EngineHandle { engine: Some(engine) }))
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            instance_id = %request.id,
            engine = %name,
            instances = handles.len(),
            "Engine instances ready"
        );
        Ok(Provisioned {
            contract: CommunicationContract::native(typesystem),
            handles,
        })
    }

    async fn process(
        &self,
        handle: &mut EngineHandle,
        _contract: &CommunicationContract,
        descriptor: &ComponentDescriptor,
        document: &mut Document,
    ) -> Result<(), DriverError> {
        let name = engine_name(descriptor)?;
        let engine = match handle.engine.take() {
            Some(engine) => engine,
            None => self.replacement(name)?,
        };
        let (engine, outcome) = process_blocking(name, engine, document, &descriptor.parameters).await;
        handle.engine = match engine {
            Some(engine) => Some(engine),
            None => {
                warn!(engine = %name, "Engine instance lost, a fresh one serves the next document");
                self.registry.create(name)
            }
        };
        *document = outcome?;
        Ok(())
    }
}
