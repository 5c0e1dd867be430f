//! # saverify platform
//!
//! Contract between the IPsec SA verification engine and the device under
//! test.
//!
//! This crate provides:
//! - Unified error types (`PlatformError`, `PlatformResult`)
//! - Core traits (`SecurityModule`, `SecurityDevice`)
//! - SA and crypto transform descriptors
//! - Capability advertisement types
//! - Completion status, offload flags and per-SA statistics
//!
//! # Examples
//!
//! ```
//! use saverify_platform::{ParamRange, PlatformResult};
//!
//! fn key_ok(len: u16) -> PlatformResult<bool> {
//!     Ok(ParamRange::new(16, 32, 8).contains(len))
//! }
//!
//! # fn main() -> PlatformResult<()> {
//! assert!(key_ok(24)?);
//! assert!(!key_ok(20)?);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod caps;
pub mod error;
pub mod op;
pub mod traits;
pub mod xform;

pub use caps::{CryptoCapability, ParamRange, SecurityCapability, SymCapability};
pub use error::{PlatformError, PlatformResult};
pub use op::{AuxFlags, CompletedOp, OffloadFlags, OpStatus, SaStats, SessionConf, SessionId};
pub use traits::{SecurityDevice, SecurityModule};
pub use xform::{
    AeadAlgorithm, AeadOp, AeadXform, AuthAlgorithm, AuthOp, AuthXform, CipherAlgorithm,
    CipherOp, CipherXform, CryptoXform, IpsecXform, Ipv4Tunnel, Ipv6Tunnel, SaDirection,
    SaLifetime, SaMode, SaOptions, TunnelParams, TunnelType, TunnelVerify, UdpPorts,
};

/// Platform version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
