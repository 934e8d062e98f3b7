//! Embedded capability bindings
//!
//! On wasm32 these sit on top of the browser (`web_sys::WebSocket`,
//! `setTimeout`). A native build can still select the embedded environment,
//! e.g. to exercise the restricted capability surface in tests; it then
//! borrows tokio for scheduling and refuses raw sockets.

#[cfg(target_arch = "wasm32")]
mod browser;

#[cfg(target_arch = "wasm32")]
pub use browser::MacrotaskTurns;

use async_trait::async_trait;
use futures_util::future::LocalBoxFuture;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;
use tether_core::{ByteBuffer, Capability, Environment};
use tether_ports::{
    Capabilities, CapabilityError, CapabilityResult, SocketHandle, TurnDriver,
};
use tracing::debug;

/// Capabilities of a constrained (browser) environment
pub struct EmbeddedCapabilities {
    turns: Rc<dyn TurnDriver>,
}

impl EmbeddedCapabilities {
    pub fn new() -> Self {
        #[cfg(target_arch = "wasm32")]
        let turns: Rc<dyn TurnDriver> = Rc::new(MacrotaskTurns);
        #[cfg(not(target_arch = "wasm32"))]
        let turns: Rc<dyn TurnDriver> = Rc::new(crate::host::LocalTaskTurns);

        Self { turns }
    }
}

impl Default for EmbeddedCapabilities {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl Capabilities for EmbeddedCapabilities {
    fn environment(&self) -> Environment {
        Environment::Embedded
    }

    fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::FileAccess | Capability::ImageTranscoding => false,
            Capability::RawSocket => cfg!(target_arch = "wasm32"),
            Capability::ByteBuffer => true,
        }
    }

    async fn read_file(&self, path: &Path) -> CapabilityResult<ByteBuffer> {
        debug!(path = %path.display(), "file read refused");
        Err(CapabilityError::unsupported(Capability::FileAccess))
    }

    async fn write_file(&self, path: &Path, _contents: &ByteBuffer) -> CapabilityResult<()> {
        debug!(path = %path.display(), "file write refused");
        Err(CapabilityError::unsupported(Capability::FileAccess))
    }

    fn connect_socket(&self, url: &str) -> CapabilityResult<SocketHandle> {
        #[cfg(target_arch = "wasm32")]
        {
            browser::connect(url)
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            debug!(%url, "raw socket refused");
            Err(CapabilityError::unsupported(Capability::RawSocket))
        }
    }

    fn turn_driver(&self) -> Rc<dyn TurnDriver> {
        Rc::clone(&self.turns)
    }

    fn spawn_local(&self, task: LocalBoxFuture<'static, ()>) {
        #[cfg(target_arch = "wasm32")]
        wasm_bindgen_futures::spawn_local(task);
        #[cfg(not(target_arch = "wasm32"))]
        tokio::task::spawn_local(task);
    }

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        #[cfg(target_arch = "wasm32")]
        {
            browser::sleep(duration)
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            Box::pin(tokio::time::sleep(duration))
        }
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_access_unsupported() {
        let capabilities = EmbeddedCapabilities::new();
        let expected = Err(CapabilityError::UnsupportedOperation {
            capability: Capability::FileAccess,
            required: Environment::Host,
        });

        assert_eq!(capabilities.read_file(Path::new("a.txt")).await, expected);
        assert_eq!(
            capabilities
                .write_file(Path::new("a.txt"), &ByteBuffer::from_text("x"))
                .await,
            expected.map(|_: ByteBuffer| ())
        );
    }

    #[test]
    fn test_capability_surface() {
        let capabilities = EmbeddedCapabilities::new();
        assert!(!capabilities.supports(Capability::FileAccess));
        assert!(!capabilities.supports(Capability::ImageTranscoding));
        assert!(capabilities.supports(Capability::ByteBuffer));
        assert!(capabilities.require(Capability::ByteBuffer).is_ok());
    }

    #[test]
    fn test_raw_socket_refused_off_browser() {
        let capabilities = EmbeddedCapabilities::new();
        assert!(!capabilities.supports(Capability::RawSocket));
        let result = capabilities.connect_socket("ws://127.0.0.1:9000");
        assert!(matches!(
            result,
            Err(CapabilityError::UnsupportedOperation {
                capability: Capability::RawSocket,
                required: Environment::Host,
            })
        ));
    }
}
