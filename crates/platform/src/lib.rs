//! Environment Capability Selector
//!
//! Resolves the execution environment once and binds every
//! environment-sensitive capability to a concrete implementation:
//!
//! - **Host** (native): tokio fs, tokio-tungstenite sockets, tokio local
//!   tasks for scheduling turns
//! - **Embedded** (wasm32 in a browser): `web_sys::WebSocket`, `setTimeout`
//!   macrotasks for scheduling turns, no file access
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  Rc<dyn Capabilities>                    │
//! │  files · sockets · turn driver · spawn_local · sleep     │
//! └─────────────────────────────────────────────────────────┘
//!                            ▲
//!                  CapabilityFactory (once)
//!                 ┌──────────┴──────────┐
//! ┌───────────────────────┐   ┌───────────────────────────┐
//! │   HostCapabilities    │   │   EmbeddedCapabilities    │
//! │ tokio + tungstenite   │   │ web-sys + setTimeout      │
//! └───────────────────────┘   └───────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use tether_platform::{CapabilityFactory, PlatformConfig};
//!
//! let capabilities = CapabilityFactory::from_config(&PlatformConfig::default())?;
//! let handle = capabilities.connect_socket("ws://127.0.0.1:9000")?;
//! ```

pub mod config;
pub mod embedded;
pub mod factory;
#[cfg(not(target_arch = "wasm32"))]
pub mod host;

pub use config::PlatformConfig;
pub use embedded::EmbeddedCapabilities;
pub use factory::CapabilityFactory;
#[cfg(not(target_arch = "wasm32"))]
pub use host::{HostCapabilities, LocalTaskTurns};
