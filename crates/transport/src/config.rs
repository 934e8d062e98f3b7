//! Transport Configuration

use crate::error::TransportError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tether_core::Environment;
use tether_platform::PlatformConfig;
use url::Url;

/// Root transport configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Endpoint, `ws://` or `wss://`
    pub url: String,

    /// Deadline for leaving Connecting; none means wait indefinitely
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,

    /// Environment override, applied when the process environment is
    /// resolved for the first time
    #[serde(default)]
    pub environment: Option<Environment>,
}

impl TransportConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout_ms: None,
            environment: None,
        }
    }

    /// Fail the handshake if it has not completed within `timeout`
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    /// Capability selection derived from this config
    pub fn platform(&self) -> PlatformConfig {
        PlatformConfig {
            environment: self.environment,
        }
    }

    /// Parse and validate from JSON text
    pub fn from_json(json: &str) -> Result<Self, TransportError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the endpoint is a WebSocket URL
    pub fn validate(&self) -> Result<(), TransportError> {
        let url = Url::parse(&self.url)
            .map_err(|e| TransportError::Config(format!("invalid url {:?}: {}", self.url, e)))?;
        match url.scheme() {
            "ws" | "wss" => Ok(()),
            scheme => Err(TransportError::Config(format!(
                "unsupported scheme {:?}, expected ws or wss",
                scheme
            ))),
        }
    }
}
