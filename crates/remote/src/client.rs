use std::time::Duration;

use pipeline::DriverError;
use reqwest::{Client, ClientBuilder};
use tracing::debug;

use crate::HttpTransportConfig;

/// Builds the HTTP client shared by every handle of a driver.
pub fn build_client(config: &HttpTransportConfig) -> Result<Client, DriverError> {
    debug!(?config, "Building HTTP client");
    ClientBuilder::new()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_nodelay(true)
        .build()
        .map_err(|e| DriverError::Provisioning {
            message: format!("HTTP client build failed: {e}"),
        })
}
