//! Pipeline configuration.
//!
//! ```toml
//! workers = 4
//! abort_on_error = false
//!
//! [retry]
//! max_attempts = 3
//!
//! [remote]
//! negotiation_timeout_ms = 30000
//!
//! [[component]]
//! driver = "remote"
//! name = "ner"
//! addresses = ["http://ner.internal:9714"]
//! scale = 2
//!
//! [[component]]
//! driver = "in_process"
//! engine = "whitespace-tokenizer"
//! ```

use std::path::Path;
use std::time::Duration;

use driver::RetryConfig;
use pipeline::{ComponentDescriptor, PipelineError};
use remote::HttpTransportConfig;
use serde::{Deserialize, Serialize};

/// Everything needed to build and run one pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Documents processed concurrently.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Skip capability negotiation and assume the default contract.
    #[serde(default)]
    pub skip_verification: bool,

    /// Stop the run at the first failed document.
    #[serde(default)]
    pub abort_on_error: bool,

    /// Retry schedule for transport failures while processing documents.
    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub remote: RemoteSettings,

    /// Components in processing order.
    #[serde(default, rename = "component")]
    pub components: Vec<ComponentDescriptor>,
}

fn default_workers() -> usize {
    1
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            skip_verification: false,
            abort_on_error: false,
            retry: RetryConfig::default(),
            remote: RemoteSettings::default(),
            components: Vec::new(),
        }
    }
}

impl PipelineConfig {
    /// Parses and validates a TOML configuration.
    pub fn from_toml_str(source: &str) -> Result<Self, PipelineError> {
        let config: Self = toml::from_str(source).map_err(|e| PipelineError::Configuration {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let source = std::fs::read_to_string(path).map_err(|e| PipelineError::Configuration {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |message: &str| {
            Err(PipelineError::Configuration {
                message: message.to_string(),
            })
        };
        if self.workers == 0 {
            return invalid("workers must be at least 1");
        }
        if self.components.is_empty() {
            return invalid("a pipeline needs at least one [[component]]");
        }
        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts must be at least 1");
        }
        Ok(())
    }
}

/// Transport settings for HTTP-speaking drivers, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteSettings {
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub negotiation_timeout_ms: u64,
    pub probe_interval_ms: u64,
    pub max_probe_interval_ms: u64,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        let defaults = HttpTransportConfig::default();
        Self {
            connect_timeout_ms: defaults.connect_timeout.as_millis() as u64,
            request_timeout_ms: defaults.request_timeout.as_millis() as u64,
            negotiation_timeout_ms: defaults.negotiation_timeout.as_millis() as u64,
            probe_interval_ms: defaults.probe_interval.as_millis() as u64,
            max_probe_interval_ms: defaults.max_probe_interval.as_millis() as u64,
        }
    }
}

impl RemoteSettings {
    pub fn transport(&self) -> HttpTransportConfig {
        HttpTransportConfig {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            negotiation_timeout: Duration::from_millis(self.negotiation_timeout_ms),
            probe_interval: Duration::from_millis(self.probe_interval_ms),
            max_probe_interval: Duration::from_millis(self.max_probe_interval_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline::DriverKind;

    const EXAMPLE: &str = r#"
        workers = 4
        abort_on_error = true

        [retry]
        max_attempts = 5
        initial_backoff_ms = 10

        [remote]
        negotiation_timeout_ms = 30000

        [[component]]
        driver = "remote"
        name = "ner"
        addresses = ["http://ner.internal:9714/"]
        scale = 2
        parameters = { model = "de_core" }

        [[component]]
        driver = "in_process"
        engine = "whitespace-tokenizer"
    "#;

    #[test]
    fn test_parses_full_configuration() {
        let config = PipelineConfig::from_toml_str(EXAMPLE).unwrap();
        assert_eq!(config.workers, 4);
        assert!(config.abort_on_error);
        assert!(!config.skip_verification);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_backoff_ms, 10);
        assert_eq!(config.retry.max_backoff_ms, RetryConfig::default().max_backoff_ms);

        let transport = config.remote.transport();
        assert_eq!(transport.negotiation_timeout, Duration::from_secs(30));
        assert_eq!(transport.connect_timeout, HttpTransportConfig::default().connect_timeout);

        let ner = &config.components[0];
        assert_eq!(ner.driver, DriverKind::Remote);
        assert_eq!(ner.addresses[0].as_str(), "http://ner.internal:9714");
        assert_eq!(ner.concurrency.get(), 2);
        assert_eq!(ner.parameters["model"], "de_core");
        assert_eq!(config.components[1].driver, DriverKind::InProcess);
    }

    #[test]
    fn test_defaults_apply_to_minimal_configuration() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [[component]]
            driver = "in_process"
            engine = "sentence-splitter"
            "#,
        )
        .unwrap();
        assert_eq!(config.workers, 1);
        assert_eq!(config.retry, RetryConfig::default());
        assert_eq!(config.remote, RemoteSettings::default());
        assert_eq!(config.components[0].concurrency.get(), 1);
    }

    #[test]
    fn test_rejects_invalid_configurations() {
        let cases = [
            ("workers = 0\n[[component]]\ndriver = \"remote\"", "workers"),
            ("workers = 2", "component"),
            ("[[component]]\ndriver = \"remote\"\nport = 80", "port"),
            ("[[component]]\ndriver = \"carrier_pigeon\"", "carrier_pigeon"),
        ];
        for (source, needle) in cases {
            let err = PipelineConfig::from_toml_str(source).unwrap_err();
            assert!(
                matches!(&err, PipelineError::Configuration { message } if message.contains(needle)),
                "{source:?} gave {err}"
            );
        }
    }

    #[test]
    fn test_load_reports_missing_file() {
        let err = PipelineConfig::load(Path::new("/nonexistent/pipeline.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/pipeline.toml"));
    }
}
