//! Capability Factory
//!
//! Binds a capability set for an environment. Callers resolve it once at
//! startup and pass the resulting `Rc<dyn Capabilities>` down.

use super::config::PlatformConfig;
use super::embedded::EmbeddedCapabilities;
use std::rc::Rc;
use tether_core::Environment;
use tether_ports::{Capabilities, CapabilityResult};
use tracing::debug;

/// Factory for capability sets
pub struct CapabilityFactory;

impl CapabilityFactory {
    /// Resolve the process environment (honouring the override on first use)
    /// and bind its capability set
    pub fn from_config(config: &PlatformConfig) -> CapabilityResult<Rc<dyn Capabilities>> {
        Self::create(Environment::init(config.environment))
    }

    /// Bind the capability set of the already resolved process environment
    pub fn current() -> CapabilityResult<Rc<dyn Capabilities>> {
        Self::create(Environment::current())
    }

    /// Bind the capability set for `environment`
    pub fn create(environment: Environment) -> CapabilityResult<Rc<dyn Capabilities>> {
        debug!(%environment, "binding capabilities");
        match environment {
            Environment::Host => {
                #[cfg(not(target_arch = "wasm32"))]
                {
                    Ok(Rc::new(super::host::HostCapabilities::new()))
                }
                #[cfg(target_arch = "wasm32")]
                {
                    Err(tether_ports::CapabilityError::EnvironmentUnavailable(
                        Environment::Host,
                    ))
                }
            }
            Environment::Embedded => Ok(Rc::new(EmbeddedCapabilities::new())),
        }
    }
}
