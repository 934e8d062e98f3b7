//! Platform Configuration

use serde::{Deserialize, Serialize};
use tether_core::Environment;

/// Capability selection settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Environment override; detected from the compilation target when absent
    #[serde(default)]
    pub environment: Option<Environment>,
}

impl PlatformConfig {
    /// Force the host bindings
    pub fn host() -> Self {
        Self {
            environment: Some(Environment::Host),
        }
    }

    /// Force the embedded bindings
    pub fn embedded() -> Self {
        Self {
            environment: Some(Environment::Embedded),
        }
    }

    /// Parse from JSON text
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
