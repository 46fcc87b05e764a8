//! Error and retry-policy types for the annopipe domain.
//!
//! [`DriverError`] covers every failure a driver operation can surface.
//! [`PipelineError`] wraps driver failures with the pipeline context they
//! occurred in. [`CodecError`] is produced by the wire codecs.
//!
//! [`RetryPolicy`] is a cross-cutting concern: any error type that participates
//! in retry decisions must be able to produce a [`RetryPolicy`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ComponentName, DocumentId, EndpointAddress, InstanceId, WireFormat};

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// Returned by [`DriverError::retry_policy`] to let the pipeline runner decide
/// whether to re-submit a document without aborting.
///
/// - `Retryable` errors: transport failures after a successful negotiation.
/// - `NonRetryable` errors: invalid descriptors, negotiation failures, unknown
///   identifiers, codec failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    Retryable {
        /// Minimum back-off before the next attempt. `None` means apply the
        /// caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried.
    NonRetryable,
}

impl RetryPolicy {
    /// Returns `true` for [`RetryPolicy::Retryable`].
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }
}

// ---------------------------------------------------------------------------
// Codec errors
// ---------------------------------------------------------------------------

/// A document could not be encoded for, or decoded from, the wire.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The document could not be serialised in the negotiated format.
    #[error("Failed to encode document for {format}: {message}")]
    Encode {
        format: WireFormat,
        message: String,
    },

    /// The backend's response was not valid in the negotiated format.
    #[error("Failed to decode {format} response: {message}")]
    Decode {
        format: WireFormat,
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Driver errors
// ---------------------------------------------------------------------------

/// Errors produced by [`crate::Driver`] operations.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The descriptor lacks a field the driver requires (e.g. an address).
    ///
    /// Raised synchronously by `instantiate`; never retried.
    #[error("Invalid component descriptor: {reason}")]
    InvalidDescriptor {
        /// What is missing or malformed.
        reason: String,
    },

    /// The backend did not answer the readiness probe within the budget.
    #[error("Backend at {address} did not become ready within {waited:?} ({attempts} probes)")]
    NegotiationTimeout {
        address: EndpointAddress,
        waited: Duration,
        attempts: u32,
    },

    /// The backend answered but does not speak a recognised protocol.
    #[error("Backend at {address} speaks an unsupported protocol: {detail}")]
    ProtocolMismatch {
        address: EndpointAddress,
        detail: String,
    },

    /// No live component is registered under the identifier.
    #[error("Unknown instance identifier {id}; it was never instantiated or has been destroyed")]
    UnknownIdentifier { id: InstanceId },

    /// Send or receive failed after negotiation succeeded.
    ///
    /// The endpoint handle has already been returned to its pool when this
    /// error reaches the caller.
    #[error("Transport failure talking to {address}: {message}")]
    TransportFailure {
        address: EndpointAddress,
        message: String,
    },

    /// Encoding the request or decoding the response failed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// An in-process engine failed while processing a document.
    #[error("Engine '{engine}' failed: {message}")]
    Engine { engine: String, message: String },

    /// Backing resources (e.g. containers) could not be provisioned.
    #[error("Failed to provision backend resources: {message}")]
    Provisioning { message: String },

    /// The driver has been shut down and accepts no further calls.
    #[error("Driver has been shut down")]
    ShutDown,
}

impl DriverError {
    /// Returns whether the failed operation may be retried.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::TransportFailure { .. } => RetryPolicy::Retryable { after: None },
            _ => RetryPolicy::NonRetryable,
        }
    }

    /// Shorthand for building an [`DriverError::InvalidDescriptor`].
    pub fn invalid_descriptor(reason: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline-level errors
// ---------------------------------------------------------------------------

/// Errors that halt or fail a pipeline run.
///
/// These wrap a [`DriverError`] with the component and document it occurred
/// for, so batch reports can attribute failures.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The pipeline configuration is invalid.
    ///
    /// Produced at load time; the pipeline never starts with an invalid config.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// No registered driver accepts the component descriptor.
    #[error("No driver accepts component '{component}'")]
    NoDriver { component: String },

    /// A component could not be instantiated; the run never started.
    #[error("Failed to instantiate component '{component}': {source}")]
    Instantiation {
        component: String,
        #[source]
        source: DriverError,
    },

    /// A document failed in one component.
    #[error("Document '{document}' failed in component '{component}': {source}")]
    DocumentFailed {
        document: DocumentId,
        component: String,
        #[source]
        source: DriverError,
    },
}

impl PipelineError {
    /// Label used for a component in error messages: its name if it has one,
    /// otherwise its position in the pipeline.
    pub fn component_label(name: Option<&ComponentName>, index: usize) -> String {
        match name {
            Some(name) => name.to_string(),
            None => format!("#{index}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transport_failures_are_retryable() {
        let address = EndpointAddress::new("http://localhost:1").unwrap();
        let transport = DriverError::TransportFailure {
            address: address.clone(),
            message: "connection reset".into(),
        };
        assert!(transport.retry_policy().is_retryable());

        let mismatch = DriverError::ProtocolMismatch {
            address,
            detail: "xmi".into(),
        };
        assert_eq!(mismatch.retry_policy(), RetryPolicy::NonRetryable);
        assert!(!DriverError::invalid_descriptor("no url")
            .retry_policy()
            .is_retryable());
    }

    #[test]
    fn test_component_label_prefers_name() {
        let name = ComponentName::new("ner").unwrap();
        assert_eq!(PipelineError::component_label(Some(&name), 3), "ner");
        assert_eq!(PipelineError::component_label(None, 3), "#3");
    }
}
