//! Transport Factory
//!
//! Resolves the capability set named by a [`TransportConfig`] and opens a
//! transport through it.

use crate::config::TransportConfig;
use crate::connection::MessageTransport;
use crate::error::TransportError;
use tether_platform::CapabilityFactory;

/// Factory for message transports
pub struct TransportFactory;

impl TransportFactory {
    /// Bind capabilities per `config` and start connecting
    pub fn connect(config: &TransportConfig) -> Result<MessageTransport, TransportError> {
        config.validate()?;
        let runtime = CapabilityFactory::from_config(&config.platform())?;
        MessageTransport::connect(&runtime, config)
    }
}
