//! Runner Configuration
//!
//! Provides the configuration structure and builder for [`ScenarioRunner`](crate::runner::ScenarioRunner).

use crate::catalog::IPSEC_TEST_PACKETS_MAX;
use crate::{Error, Result};

/// Default packets per scenario
pub const DEFAULT_PACKETS: usize = 1;

/// Scenario runner configuration
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunnerConfig {
    /// Packets per scenario (scenarios needing a full window always use 32)
    pub packets: usize,

    /// Suppress mismatch dumps (the verdict is unchanged)
    pub silent: bool,

    /// Log the algorithm of every scenario
    pub display_alg: bool,
}

impl RunnerConfig {
    /// Create builder for runner configuration
    pub fn builder() -> RunnerConfigBuilder {
        RunnerConfigBuilder::new()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.packets == 0 {
            return Err(Error::InvalidParameter(
                "At least one packet per scenario required".into(),
            ));
        }
        if self.packets > IPSEC_TEST_PACKETS_MAX {
            return Err(Error::InvalidParameter(format!(
                "packets cannot exceed {}",
                IPSEC_TEST_PACKETS_MAX
            )));
        }
        Ok(())
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            packets: DEFAULT_PACKETS,
            silent: false,
            display_alg: false,
        }
    }
}

/// Builder for RunnerConfig
#[derive(Default)]
pub struct RunnerConfigBuilder {
    packets: Option<usize>,
    silent: Option<bool>,
    display_alg: Option<bool>,
}

impl RunnerConfigBuilder {
    /// Create new runner config builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set packets per scenario
    pub fn with_packets(mut self, packets: usize) -> Self {
        self.packets = Some(packets);
        self
    }

    /// Set silent mode
    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = Some(silent);
        self
    }

    /// Set algorithm display
    pub fn with_display_alg(mut self, display_alg: bool) -> Self {
        self.display_alg = Some(display_alg);
        self
    }

    /// Build RunnerConfig with validation
    pub fn build(self) -> Result<RunnerConfig> {
        let config = RunnerConfig {
            packets: self.packets.unwrap_or(DEFAULT_PACKETS),
            silent: self.silent.unwrap_or(false),
            display_alg: self.display_alg.unwrap_or(false),
        };

        config.validate()?;
        Ok(config)
    }
}
