//! Tether Ports
//!
//! Port definitions (traits) for the tether portability layer.
//! These define the boundary between environment-independent logic and the
//! host or embedded bindings chosen once at process start.

mod capabilities;
mod error;
mod socket;
mod turns;

pub use capabilities::Capabilities;
pub use error::{CapabilityError, CapabilityResult};
pub use socket::{RawSocket, SocketEvent, SocketHandle};
pub use turns::{TurnDriver, TurnStep};
