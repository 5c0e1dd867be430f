//! Error types reported by security devices

use std::fmt;

/// Unified error type for device collaborator operations
#[derive(Debug)]
pub enum PlatformError {
    /// I/O error
    Io(std::io::Error),

    /// Session configuration rejected as malformed
    Config(String),

    /// Configuration is valid but outside the device capability set
    Unsupported(String),

    /// Unknown or already destroyed session
    NoSuchSession(u64),

    /// Device-side failure while processing
    Device(String),

    /// Other error
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl PlatformError {
    /// Whether this error reports a capability gap rather than a fault
    pub fn is_unsupported(&self) -> bool {
        matches!(self, PlatformError::Unsupported(_))
    }
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformError::Io(e) => write!(f, "IO error: {}", e),
            PlatformError::Config(msg) => write!(f, "Configuration error: {}", msg),
            PlatformError::Unsupported(msg) => write!(f, "Not supported: {}", msg),
            PlatformError::NoSuchSession(id) => write!(f, "No such session: {}", id),
            PlatformError::Device(msg) => write!(f, "Device error: {}", msg),
            PlatformError::Other(e) => write!(f, "Error: {}", e),
        }
    }
}

impl std::error::Error for PlatformError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PlatformError::Io(e) => Some(e),
            PlatformError::Other(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PlatformError {
    fn from(err: std::io::Error) -> Self {
        PlatformError::Io(err)
    }
}

/// Result type for device operations
pub type PlatformResult<T> = Result<T, PlatformError>;
