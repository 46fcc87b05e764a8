use std::time::Duration;

use driver::RetryConfig;

/// Transport settings for one HTTP-speaking driver. Fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpTransportConfig {
    /// TCP connect timeout for every request.
    pub connect_timeout: Duration,
    /// Upper bound for one document round-trip; the only timeout `run` has.
    pub request_timeout: Duration,
    /// Total budget for a backend to answer the readiness probe.
    pub negotiation_timeout: Duration,
    /// Delay after the first failed probe.
    pub probe_interval: Duration,
    /// Probe delays grow up to this cap.
    pub max_probe_interval: Duration,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(600),
            negotiation_timeout: Duration::from_secs(100),
            probe_interval: Duration::from_millis(250),
            max_probe_interval: Duration::from_secs(5),
        }
    }
}

impl HttpTransportConfig {
    /// Back-off schedule between readiness probes. Attempts are bounded by
    /// `negotiation_timeout`, not by a count.
    pub(crate) fn probe_backoff(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: u32::MAX,
            initial_backoff_ms: self.probe_interval.as_millis() as u64,
            max_backoff_ms: self.max_probe_interval.as_millis() as u64,
            backoff_multiplier: 1.5,
        }
    }
}
