use tether_core::{Capability, Environment};
use thiserror::Error;

/// Errors raised by environment-bound capabilities
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("{capability} is not supported here; it requires the {required} environment")]
    UnsupportedOperation {
        capability: Capability,
        required: Environment,
    },

    #[error("{0} environment is not available in this build")]
    EnvironmentUnavailable(Environment),

    #[error("IO error: {0}")]
    Io(String),

    #[error("socket error: {0}")]
    Socket(String),
}

impl CapabilityError {
    pub fn unsupported(capability: Capability) -> Self {
        CapabilityError::UnsupportedOperation {
            capability,
            required: capability.required_environment(),
        }
    }
}

impl From<std::io::Error> for CapabilityError {
    fn from(err: std::io::Error) -> Self {
        CapabilityError::Io(err.to_string())
    }
}

pub type CapabilityResult<T> = std::result::Result<T, CapabilityError>;
