//! annopipe remote driver.
//!
//! Talks to components that are already running as HTTP services. Every
//! component is negotiated once ([`HttpNegotiator`]): the driver probes
//! `/v1/communication_layer` until the backend answers or the budget runs
//! out, resolves the declared wire format and version, and captures
//! `/v1/typesystem`. Documents then go to `/v1/process` through the bound
//! codec.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Transport configuration, HTTP client construction,
//! the probe loop, and request framing all live here. The pipeline runner
//! sees only [`pipeline::Driver`].
//!
//! The negotiator and transport are public so the `container` driver can
//! reuse them for the services it starts.

mod backend;
mod client;
mod config;
mod negotiator;
pub mod protocol;
pub mod transport;

pub use backend::{remote_driver, RemoteBackend, RemoteDriver, RemoteEndpoint};
pub use client::build_client;
pub use config::HttpTransportConfig;
pub use negotiator::HttpNegotiator;
