//! IPsec SA test vectors and verification engine.
//!
//! This crate checks an IPsec ESP offload against known answers and against
//! itself:
//!
//! - **Known vectors** - golden records pushed through one SA, outbound and
//!   inbound
//! - **Combined scenarios** - every catalog algorithm, outbound output fed
//!   back as inbound input, with optional features switched on by
//!   [`TestFlags`] (IV generation, expiry, UDP encapsulation, checksum
//!   offload, DF policies, statistics, tunnel header verification)
//! - **Software device** - a reference [`SoftDevice`] implementing the
//!   [`SecurityDevice`](saverify_platform::SecurityDevice) contract
//!
//! # Example
//!
//! ```rust
//! use saverify_ipsec::{RunnerConfig, ScenarioRunner, SoftDevice, TestFlags};
//! use saverify_ipsec::vectors::PKT_AES_256_GCM;
//!
//! let mut runner = ScenarioRunner::new(SoftDevice::new(), RunnerConfig::default()).unwrap();
//! runner.run_known_vector(&PKT_AES_256_GCM, &TestFlags::default()).unwrap();
//! runner.run_known_vector_inbound(&PKT_AES_256_GCM, &TestFlags::default()).unwrap();
//!
//! let summary = runner.run_all(&TestFlags::default());
//! assert!(summary.is_success());
//! ```
//!
//! # Verdicts
//!
//! Every operation returns [`Result`]. Errors for which
//! [`Error::is_skip`] holds mean the scenario does not apply to the device;
//! any other error is a failure.
//!
//! # References
//!
//! - [RFC 4303](https://datatracker.ietf.org/doc/html/rfc4303) - IP Encapsulating Security Payload
//! - [RFC 4106](https://datatracker.ietf.org/doc/html/rfc4106) - AES-GCM in ESP
//! - [RFC 3686](https://datatracker.ietf.org/doc/html/rfc3686) - AES-CTR in ESP
//! - [RFC 3948](https://datatracker.ietf.org/doc/html/rfc3948) - UDP Encapsulation of ESP

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod buffer;
pub mod builder;
pub mod capability;
pub mod catalog;
pub mod checksum;
pub mod config;
pub mod crypto;
pub mod derive;
pub mod device;
pub mod error;
pub mod esp;
pub mod flags;
pub mod iv_history;
pub mod logging;
pub mod metrics;
pub mod packet;
pub mod runner;
pub mod status;
pub mod vectors;
pub mod verify;

pub use buffer::BoundedBuf;
pub use catalog::{alg_list, CryptoParam, CryptoParamCombination, IPSEC_TEST_PACKETS_MAX};
pub use config::{RunnerConfig, RunnerConfigBuilder};
pub use device::SoftDevice;
pub use error::{Error, Result};
pub use flags::{DfPolicy, TestFlags};
pub use iv_history::IvHistory;
pub use metrics::{MetricsSnapshot, RunMetrics};
pub use runner::{RunSummary, ScenarioRunner};
pub use vectors::IpsecTestData;
