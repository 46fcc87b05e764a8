//! annopipe in-process driver.
//!
//! Components backed by an [`AnalysisEngine`] run inside the orchestrator.
//! Engines are looked up by name in an [`EngineRegistry`]; each pool handle
//! owns one engine instance, so an engine never sees two documents at once.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** No serialisation happens on this path: the contract is
//! [`pipeline::WireFormat::Native`] and documents are handed over by
//! reference.

mod backend;
pub mod builtins;
mod engine;
mod registry;

pub use backend::{in_process_driver, EngineHandle, InProcessBackend, InProcessDriver};
pub use engine::{AnalysisEngine, EngineError};
pub use registry::{EngineFactory, EngineRegistry};
