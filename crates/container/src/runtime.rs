//! Port to the container engine.

use std::collections::BTreeMap;

use async_trait::async_trait;
use pipeline::{ComponentName, EndpointAddress, ImageName, InstanceId};
use thiserror::Error;

/// What to start for one pool handle.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSpec {
    pub image: ImageName,
    /// Component the container belongs to, if named.
    pub component: Option<ComponentName>,
    pub instance: InstanceId,
    /// Position of the handle in the component's pool.
    pub slot: usize,
    /// Component parameters, exposed to the container as environment.
    pub environment: BTreeMap<String, String>,
}

/// A started container and the address its HTTP service listens on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningContainer {
    /// Engine-assigned container identifier.
    pub id: String,
    pub address: EndpointAddress,
}

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("Failed to start container from {image}: {message}")]
    Start { image: ImageName, message: String },

    #[error("Failed to stop container {container}: {message}")]
    Stop { container: String, message: String },
}

/// Starts and stops containers.
///
/// `start` returns once the container is running; the service inside may
/// still be booting, which negotiation waits out.
#[async_trait]
pub trait ContainerRuntime: Send + Sync + 'static {
    async fn start(&self, spec: &ContainerSpec) -> Result<RunningContainer, ContainerError>;

    async fn stop(&self, container: &RunningContainer) -> Result<(), ContainerError>;
}
