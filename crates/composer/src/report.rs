//! Outcome of one pipeline run.

use std::time::Duration;

use pipeline::{Document, PipelineError};

/// Documents that made it through every component, in input order, and the
/// failures of those that did not.
#[derive(Debug, Default)]
pub struct RunReport {
    pub documents: Vec<Document>,
    pub failures: Vec<PipelineError>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.documents.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}
