//! annopipe container driver.
//!
//! Components described by an image are started on demand, one container per
//! pool handle, through a [`ContainerRuntime`]. Each container is then treated
//! like a remote service: negotiated with [`remote::HttpNegotiator`] and fed
//! documents through [`remote::transport`].
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** The container engine itself stays behind
//! [`ContainerRuntime`]; no engine client ships in this crate. Deployments
//! provide an implementation for Docker, Podman, or a cluster scheduler.

mod backend;
mod runtime;

pub use backend::{container_driver, ContainerBackend, ContainerConfig, ContainerDriver, ContainerHandle};
pub use runtime::{ContainerError, ContainerRuntime, ContainerSpec, RunningContainer};
