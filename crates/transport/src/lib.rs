//! Message Transport
//!
//! One state machine over whichever socket the active environment provides:
//! tokio-tungstenite on the host, the browser `WebSocket` when embedded.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    MessageTransport                      │
//! │   send · on_message · on_close · close · state           │
//! └─────────────────────────────────────────────────────────┘
//!         │ frames out              ▲ frames / close in
//!         ▼                         │ (Scheduler, one per turn)
//! ┌─────────────────────────────────────────────────────────┐
//! │              RawSocket + SocketEvent stream              │
//! │          (bound once by the CapabilityFactory)           │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use tether_transport::{TransportConfig, TransportFactory};
//!
//! let transport = TransportFactory::connect(&TransportConfig::new("ws://127.0.0.1:9000"))?;
//! transport.on_message(|text| println!("received {text}"));
//! transport.send("hello").await?;
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod factory;

pub use config::TransportConfig;
pub use connection::{ConnectionState, MessageTransport};
pub use error::TransportError;
pub use factory::TransportFactory;
