use std::collections::BTreeMap;

use pipeline::{Document, Typesystem};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid value for parameter '{name}': {message}")]
    InvalidParameter { name: String, message: String },

    #[error("{0}")]
    Failed(String),
}

/// A native analysis component.
///
/// One instance serves one pool handle and is never shared between
/// concurrent documents, so `process` takes `&mut self`.
pub trait AnalysisEngine: Send + 'static {
    /// Schema of the annotations this engine produces.
    fn typesystem(&self) -> Typesystem;

    /// Adds annotations to `document`.
    ///
    /// May leave `document` partially annotated on error; the driver discards
    /// the result in that case.
    fn process(
        &mut self,
        document: &mut Document,
        parameters: &BTreeMap<String, String>,
    ) -> Result<(), EngineError>;
}
