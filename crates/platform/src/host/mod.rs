//! Host capability bindings (native tokio runtime)
//!
//! Local tasks and turns need a `tokio::task::LocalSet` (or a local
//! runtime) on the current thread.

mod ws_socket;

use async_trait::async_trait;
use futures_util::future::LocalBoxFuture;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;
use tether_core::{ByteBuffer, Capability, Environment};
use tether_ports::{Capabilities, CapabilityResult, SocketHandle, TurnDriver, TurnStep};

/// Turn driver backed by tokio local tasks
///
/// Each step is its own spawned task, so a LocalSet never polls two steps
/// as one unit. A panic inside a step is contained by its task.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalTaskTurns;

impl TurnDriver for LocalTaskTurns {
    fn schedule(&self, step: TurnStep) {
        tokio::task::spawn_local(async move { step() });
    }

    fn name(&self) -> &str {
        "tokio-local"
    }
}

/// Capabilities of a native process
pub struct HostCapabilities {
    turns: Rc<LocalTaskTurns>,
}

impl HostCapabilities {
    pub fn new() -> Self {
        Self {
            turns: Rc::new(LocalTaskTurns),
        }
    }
}

impl Default for HostCapabilities {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl Capabilities for HostCapabilities {
    fn environment(&self) -> Environment {
        Environment::Host
    }

    fn supports(&self, _capability: Capability) -> bool {
        true
    }

    async fn read_file(&self, path: &Path) -> CapabilityResult<ByteBuffer> {
        let bytes = tokio::fs::read(path).await?;
        Ok(ByteBuffer::from_bytes(bytes))
    }

    async fn write_file(&self, path: &Path, contents: &ByteBuffer) -> CapabilityResult<()> {
        tokio::fs::write(path, contents.as_bytes()).await?;
        Ok(())
    }

    fn connect_socket(&self, url: &str) -> CapabilityResult<SocketHandle> {
        ws_socket::connect(url)
    }

    fn turn_driver(&self) -> Rc<dyn TurnDriver> {
        self.turns.clone()
    }

    fn spawn_local(&self, task: LocalBoxFuture<'static, ()>) {
        tokio::task::spawn_local(task);
    }

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}
