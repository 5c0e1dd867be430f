//! Devices under test
//!
//! The verification engine only talks to the
//! [`SecurityDevice`](saverify_platform::SecurityDevice) trait. This module
//! carries the software reference implementation, so scenarios run end to
//! end without offload hardware.

pub mod soft;

pub use soft::{soft_capabilities, SoftDevice};
