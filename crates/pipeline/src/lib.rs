//! Core domain for annopipe.
//!
//! This crate contains every domain concept, newtype identifier, shared value
//! type, wire codec, and error type used by the drivers and the pipeline
//! runner. Infrastructure crates implement the traits defined here; they
//! never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* a driver must do; the `driver`, `remote`, `container`,
//! and `in-process` crates define *how*.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`InstanceId`, `DocumentId`, `EndpointAddress`, etc.) |
//! | [`types`] | Shared value types (`Concurrency`, `ProtocolVersion`, `WireFormat`, etc.) |
//! | [`descriptor`] | [`ComponentDescriptor`] and its builder |
//! | [`document`] | The minimal [`Document`] model |
//! | [`contract`] | Wire codecs and [`CommunicationContract`] |
//! | [`errors`] | Error taxonomy and retry policy |
//! | [`ports`] | [`Driver`], [`PerformanceSink`], [`NegotiationObserver`] |

pub mod contract;
pub mod descriptor;
pub mod document;
pub mod errors;
pub mod identifiers;
pub mod ports;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use contract::{codec_for, CommunicationContract, DocumentCodec, JsonCodec, PlainTextCodec};
pub use descriptor::ComponentDescriptor;
pub use document::{Annotation, Document};
pub use errors::{CodecError, DriverError, PipelineError, RetryPolicy};
pub use identifiers::{
    ComponentName, DocumentId, EndpointAddress, EngineName, ImageName, InstanceId,
};
pub use ports::{Driver, NegotiationObserver, NullPerformanceSink, PerformanceSink};
pub use types::{
    ComponentState, Concurrency, DriverKind, PerformanceRecord, ProtocolVersion, Timestamp,
    Typesystem, WireFormat,
};
