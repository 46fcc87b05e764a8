//! annopipe pipeline runner.
//!
//! A pipeline is an ordered list of components. The [`Composer`] picks a
//! driver for each one, instantiates them all before any document is touched,
//! and then pushes documents through the components in order, several
//! documents at a time.
//!
//! ## Architectural Layer
//!
//! **Orchestration.** The composer sequences calls to [`pipeline::Driver`]
//! implementations and owns no backend I/O of its own.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`config`] | [`PipelineConfig`], loaded from TOML |
//! | [`composer`] | [`Composer`] |
//! | [`report`] | [`RunReport`] |
//! | [`sink`] | [`InMemoryPerformanceSink`] and its per-component summary |

pub mod composer;
pub mod config;
pub mod report;
pub mod sink;

pub use composer::{Composer, ComposerSettings};
pub use config::{PipelineConfig, RemoteSettings};
pub use report::RunReport;
pub use sink::{ComponentSummary, InMemoryPerformanceSink};
