//! Error types for SA verification
//!
//! Errors fall in two classes. Skip errors ([`Error::is_skip`]) mean the
//! scenario does not apply to the device under test and must be reported as
//! skipped. Everything else is a verification failure.

use crate::capability::SaOption;
use saverify_platform::PlatformError;
use std::fmt;

/// Result type for verification operations
pub type Result<T> = std::result::Result<T, Error>;

/// Verification errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Requested SA option is not supported by the device
    UnsupportedOption(SaOption),

    /// Requested crypto transform is not supported by the device
    UnsupportedCrypto(String),

    /// Scenario cannot be evaluated for this packet or configuration
    NotApplicable(String),

    /// Transformed packet length differs from the expected length
    LengthMismatch {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// UDP encapsulation requested but the outer header carries no UDP
    UdpHeaderMissing,

    /// Outer (or transport) IP header failed validation
    InvalidOuterHeader(String),

    /// Outer DF bit does not follow the DF policy
    DfBit {
        /// Whether DF was expected to be set
        expected: bool,
    },

    /// Outer header carries fragment offset bits
    OutputFragmented,

    /// Inner IPv4 header checksum verification failed
    InnerIpChecksum,

    /// Inner TCP / UDP checksum verification failed
    InnerL4Checksum,

    /// Transformed bytes differ from the expected bytes
    OutputMismatch {
        /// First differing offset within the compared window
        offset: usize,
    },

    /// Device reused an IV within the SA
    IvRepeated,

    /// IV longer than the history slot
    IvTooLong(usize),

    /// Completion status contradicts the scenario
    Status(String),

    /// Soft expiry indication missing at the threshold packet
    SoftExpiryMissing,

    /// Per-SA counters contradict the scenario
    Stats(String),

    /// Buffer too short for operation
    BufferTooShort {
        /// Required length
        required: usize,
        /// Available length
        available: usize,
    },

    /// Cryptographic operation failed
    Crypto(String),

    /// Device collaborator failed
    Device(String),

    /// Invalid parameter
    InvalidParameter(String),
}

impl Error {
    /// Whether this error means "scenario skipped" rather than "failed"
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedOption(_) | Error::UnsupportedCrypto(_) | Error::NotApplicable(_)
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnsupportedOption(opt) => write!(f, "SA option not supported: {}", opt),
            Error::UnsupportedCrypto(msg) => write!(f, "Crypto transform not supported: {}", msg),
            Error::NotApplicable(msg) => write!(f, "Not applicable: {}", msg),
            Error::LengthMismatch { expected, actual } => {
                write!(
                    f,
                    "Output length ({}) not matching with expected ({})",
                    actual, expected
                )
            }
            Error::UdpHeaderMissing => write!(f, "UDP header is not found"),
            Error::InvalidOuterHeader(msg) => write!(f, "Invalid outer header: {}", msg),
            Error::DfBit { expected } => {
                if *expected {
                    write!(f, "DF bit is not set")
                } else {
                    write!(f, "DF bit is set")
                }
            }
            Error::OutputFragmented => write!(f, "Output packet is fragmented"),
            Error::InnerIpChecksum => write!(f, "Inner IP checksum test failed"),
            Error::InnerL4Checksum => write!(f, "Inner L4 checksum test failed"),
            Error::OutputMismatch { offset } => {
                write!(f, "Output text not as expected (first difference at {})", offset)
            }
            Error::IvRepeated => write!(f, "IV repeated"),
            Error::IvTooLong(len) => write!(f, "IV length {} greater than supported", len),
            Error::Status(msg) => write!(f, "Status check failed: {}", msg),
            Error::SoftExpiryMissing => write!(f, "SA soft expiry (pkts) test failed"),
            Error::Stats(msg) => write!(f, "Stats verification failed: {}", msg),
            Error::BufferTooShort {
                required,
                available,
            } => {
                write!(
                    f,
                    "Buffer too short: need {} bytes, have {}",
                    required, available
                )
            }
            Error::Crypto(msg) => write!(f, "Cryptographic error: {}", msg),
            Error::Device(msg) => write!(f, "Device error: {}", msg),
            Error::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// Device rejections of unsupported configurations are skips, not failures
impl From<PlatformError> for Error {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::Unsupported(msg) => Error::UnsupportedCrypto(msg),
            other => Error::Device(other.to_string()),
        }
    }
}
