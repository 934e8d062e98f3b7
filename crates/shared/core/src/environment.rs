use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

static CURRENT: OnceLock<Environment> = OnceLock::new();

/// Execution environment the process runs in
///
/// Resolved once per process. Everything environment-sensitive is bound
/// from this value at construction time and never re-checked afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    /// Native process with a full tokio runtime, filesystem and sockets
    Host,
    /// Browser-embedded wasm32 module
    Embedded,
}

impl Environment {
    /// Environment implied by the compilation target
    pub fn detect() -> Self {
        if cfg!(target_arch = "wasm32") {
            Environment::Embedded
        } else {
            Environment::Host
        }
    }

    /// Resolve the process-wide environment
    ///
    /// The first call wins: `preferred` (or target detection when `None`)
    /// is stored and every later call returns that same value.
    pub fn init(preferred: Option<Environment>) -> Self {
        *CURRENT.get_or_init(|| preferred.unwrap_or_else(Self::detect))
    }

    /// The process-wide environment, resolving it by detection if needed
    pub fn current() -> Self {
        Self::init(None)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Host => write!(f, "host"),
            Environment::Embedded => write!(f, "embedded"),
        }
    }
}

/// Environment-gated operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    FileAccess,
    ImageTranscoding,
    RawSocket,
    ByteBuffer,
}

impl Capability {
    /// Least capable environment that provides this capability in every build
    ///
    /// Raw sockets resolve to `Host` because embedded only has them on wasm32.
    pub fn required_environment(self) -> Environment {
        match self {
            Capability::FileAccess | Capability::ImageTranscoding | Capability::RawSocket => {
                Environment::Host
            }
            Capability::ByteBuffer => Environment::Embedded,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::FileAccess => "file access",
            Capability::ImageTranscoding => "image transcoding",
            Capability::RawSocket => "raw socket",
            Capability::ByteBuffer => "byte buffer",
        };
        f.write_str(name)
    }
}
