use std::sync::Arc;

use async_trait::async_trait;
use driver::{Backend, ComponentDriver, ProvisionRequest, Provisioned};
use pipeline::{
    CommunicationContract, ComponentDescriptor, Document, DriverError, DriverKind,
};
use remote::{build_client, transport, HttpNegotiator, HttpTransportConfig};
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::{ContainerError, ContainerRuntime, ContainerSpec, RunningContainer};

/// Driver for components started from container images.
pub type ContainerDriver<R> = ComponentDriver<ContainerBackend<R>>;

/// Builds a [`ContainerDriver`] on top of `runtime`.
pub fn container_driver<R: ContainerRuntime>(
    runtime: Arc<R>,
    config: ContainerConfig,
) -> Result<ContainerDriver<R>, DriverError> {
    Ok(ComponentDriver::new(ContainerBackend::new(runtime, config)?))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerConfig {
    pub transport: HttpTransportConfig,
    /// Leave containers running when their component is destroyed.
    pub keep_running_after_destroy: bool,
}

/// One pool handle: a container of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    pub container: RunningContainer,
    pub slot: usize,
}

impl From<ContainerError> for DriverError {
    fn from(error: ContainerError) -> Self {
        DriverError::Provisioning {
            message: error.to_string(),
        }
    }
}

/// [`Backend`] that starts one container per handle.
pub struct ContainerBackend<R> {
    runtime: Arc<R>,
    client: Client,
    negotiator: HttpNegotiator,
    keep_running_after_destroy: bool,
}

impl<R: ContainerRuntime> ContainerBackend<R> {
    pub fn new(runtime: Arc<R>, config: ContainerConfig) -> Result<Self, DriverError> {
        let client = build_client(&config.transport)?;
        Ok(Self {
            runtime,
            negotiator: HttpNegotiator::new(client.clone(), config.transport),
            client,
            keep_running_after_destroy: config.keep_running_after_destroy,
        })
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    async fn stop_all<'a>(&self, containers: impl IntoIterator<Item = &'a RunningContainer>) {
        for container in containers {
            match self.runtime.stop(container).await {
                Ok(()) => debug!(container = %container.id, "Stopped container"),
                Err(error) => warn!(container = %container.id, error = %error, "Failed to stop container"),
            }
        }
    }

    async fn start_and_negotiate(
        &self,
        request: &ProvisionRequest<'_>,
        started: &mut Vec<RunningContainer>,
    ) -> Result<CommunicationContract, DriverError> {
        let descriptor = request.descriptor;
        let image = descriptor
            .image
            .clone()
            .ok_or_else(|| DriverError::invalid_descriptor("container component has no image"))?;

        for slot in 0..descriptor.concurrency.get() {
            let spec = ContainerSpec {
                image: image.clone(),
                component: descriptor.name.clone(),
                instance: request.id,
                slot,
                environment: descriptor.parameters.clone(),
            };
            let container = self.runtime.start(&spec).await?;
            debug!(
                container = %container.id,
                address = %container.address,
                slot,
                "Started container"
            );
            started.push(container);
        }

        let mut contract: Option<CommunicationContract> = None;
        for container in started.iter() {
            let negotiated = self
                .negotiator
                .negotiate(
                    &container.address,
                    request.probe,
                    request.skip_verification,
                    request.observer,
                )
                .await?;
            match &contract {
                Some(bound) if bound.format() != negotiated.format() => {
                    return Err(DriverError::ProtocolMismatch {
                        address: container.address.clone(),
                        detail: format!(
                            "declares {} but its siblings declare {}",
                            negotiated.format(),
                            bound.format()
                        ),
                    });
                }
                Some(_) => {}
                None => contract = Some(negotiated),
            }
        }
        contract.ok_or_else(|| DriverError::Provisioning {
            message: "no container was started".to_string(),
        })
    }
}

#[async_trait]
impl<R: ContainerRuntime> Backend for ContainerBackend<R> {
    type Handle = ContainerHandle;

    fn kind(&self) -> DriverKind {
        DriverKind::Container
    }

    fn can_accept(&self, descriptor: &ComponentDescriptor) -> bool {
        descriptor.image.is_some()
    }

    async fn provision(
        &self,
        request: ProvisionRequest<'_>,
    ) -> Result<Provisioned<ContainerHandle>, DriverError> {
        let mut started = Vec::with_capacity(request.descriptor.concurrency.get());
        let contract = match self.start_and_negotiate(&request, &mut started).await {
            Ok(contract) => contract,
            Err(error) => {
                self.stop_all(&started).await;
                return Err(error);
            }
        };

        info!(
            instance_id = %request.id,
            containers = started.len(),
            format = %contract.format(),
            "Containers understand the v1 protocol"
        );
        let handles = started
            .into_iter()
            .enumerate()
            .map(|(slot, container)| ContainerHandle { container, slot })
            .collect();
        Ok(Provisioned { contract, handles })
    }

    async fn process(
        &self,
        handle: &mut ContainerHandle,
        contract: &CommunicationContract,
        descriptor: &ComponentDescriptor,
        document: &mut Document,
    ) -> Result<(), DriverError> {
        transport::process_document(
            &self.client,
            &handle.container.address,
            contract,
            &descriptor.parameters,
            document,
        )
        .await
    }

    async fn teardown(&self, handles: Vec<ContainerHandle>) {
        if self.keep_running_after_destroy {
            info!(containers = handles.len(), "Leaving containers running");
            return;
        }
        let containers: Vec<&RunningContainer> = handles.iter().map(|h| &h.container).collect();
        self.stop_all(containers).await;
    }
}
