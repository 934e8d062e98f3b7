use crate::error::{CapabilityError, CapabilityResult};
use crate::socket::SocketHandle;
use crate::turns::TurnDriver;
use async_trait::async_trait;
use futures_util::future::LocalBoxFuture;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;
use tether_core::{ByteBuffer, Capability, Environment};

/// Port for every environment-sensitive operation
///
/// One implementation is chosen per process and shared behind
/// `Rc<dyn Capabilities>`. Consumers depend on this trait only and never
/// inspect [`Environment`] themselves.
#[async_trait(?Send)]
pub trait Capabilities {
    /// Environment this capability set is bound to
    fn environment(&self) -> Environment;

    fn supports(&self, capability: Capability) -> bool;

    /// Fail with `UnsupportedOperation` unless `capability` is available
    fn require(&self, capability: Capability) -> CapabilityResult<()> {
        if self.supports(capability) {
            Ok(())
        } else {
            Err(CapabilityError::unsupported(capability))
        }
    }

    async fn read_file(&self, path: &Path) -> CapabilityResult<ByteBuffer>;

    async fn write_file(&self, path: &Path, contents: &ByteBuffer) -> CapabilityResult<()>;

    /// Construct a socket to `url`; the handshake completes asynchronously
    fn connect_socket(&self, url: &str) -> CapabilityResult<SocketHandle>;

    /// Scheduling primitive used by deferred-task schedulers
    fn turn_driver(&self) -> Rc<dyn TurnDriver>;

    /// Run a future on the current thread's cooperative loop
    fn spawn_local(&self, task: LocalBoxFuture<'static, ()>);

    /// Future that completes after `duration`
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;
}
