//! Shared driver base for annopipe.
//!
//! Every backend variant (remote HTTP, containerized, in-process) plugs a
//! [`Backend`] into [`ComponentDriver`], which supplies the parts that are the
//! same for all of them:
//!
//! - [`InstancePool`] — N handles per component with parked (not spinning)
//!   checkout and RAII release.
//! - [`ComponentRegistry`] — identifier → component map that tolerates
//!   concurrent lookups during `instantiate`/`destroy`.
//! - Lifecycle: `Unregistered → Negotiating → Ready → Destroyed`, with no
//!   registration on failed negotiation.
//! - Performance reporting for every `run`.
//!
//! ## Architectural Layer
//!
//! **Orchestration support.** No network or process I/O happens here; the
//! backends own all of it.

mod backend;
mod base;
mod component;
mod observer;
pub mod pool;
pub mod registry;
pub mod retry;

pub use backend::{Backend, ProvisionRequest, Provisioned};
pub use base::ComponentDriver;
pub use component::InstantiatedComponent;
pub use observer::TracingObserver;
pub use pool::{InstancePool, Lease};
pub use registry::ComponentRegistry;
pub use retry::{Backoff, RetryConfig};
