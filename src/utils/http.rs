//! HTTP client utilities.

use reqwest::{Client, RequestBuilder};
use std::time::Duration;

use crate::engines::EngineError;

/// Shared HTTP client with fixed timeouts.
///
/// Every vendor call in this crate goes through one of these; the read
/// timeout is the only cancellation mechanism the layer has, so it is set
/// once at construction and never overridden per request.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a client with the default 30s read / 10s connect timeouts
    pub fn new() -> Result<Self, EngineError> {
        Self::with_timeouts(Duration::from_secs(30), Duration::from_secs(10))
    }

    /// Create a client with explicit timeouts
    pub fn with_timeouts(read: Duration, connect: Duration) -> Result<Self, EngineError> {
        let client = Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(read)
            .connect_timeout(connect)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| EngineError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Start a GET request
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    /// Start a POST request
    pub fn post(&self, url: &str) -> RequestBuilder {
        self.client.post(url)
    }
}
