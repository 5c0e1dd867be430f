//! Core traits for devices under test

use crate::caps::SecurityCapability;
use crate::op::{CompletedOp, SaStats, SessionConf, SessionId};
use crate::PlatformResult;

/// Module interface shared by every device implementation
pub trait SecurityModule {
    /// Unique module identifier
    fn id(&self) -> &'static str;

    /// Module version
    fn version(&self) -> &'static str;

    /// Module description
    fn description(&self) -> &'static str;

    /// Initialize the module
    ///
    /// # Errors
    ///
    /// Returns an error if initialization fails
    fn init(&mut self) -> PlatformResult<()> {
        Ok(())
    }

    /// Shutdown the module
    ///
    /// # Errors
    ///
    /// Returns an error if shutdown fails
    fn shutdown(&mut self) -> PlatformResult<()> {
        Ok(())
    }
}

/// IPsec SA offload under test
///
/// The verification engine treats every implementation identically through
/// these operations; it never looks inside a session.
pub trait SecurityDevice: SecurityModule {
    /// Advertised capability set
    fn capabilities(&self) -> &SecurityCapability;

    /// Program an SA
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Unsupported`](crate::PlatformError::Unsupported)
    /// for configurations outside [`capabilities`](Self::capabilities), or a
    /// device error if programming fails
    fn create_session(&mut self, conf: &SessionConf<'_>) -> PlatformResult<SessionId>;

    /// Transform one packet with an SA
    ///
    /// Protocol-level rejections are reported through the completion status,
    /// not through `Err`.
    ///
    /// # Errors
    ///
    /// Returns an error if the session does not exist or the device failed
    fn submit(&mut self, session: SessionId, packet: &[u8]) -> PlatformResult<CompletedOp>;

    /// Tear down an SA
    ///
    /// # Errors
    ///
    /// Returns an error if the session does not exist
    fn destroy_session(&mut self, session: SessionId) -> PlatformResult<()>;

    /// Per-SA counters
    ///
    /// # Errors
    ///
    /// Returns an error if the session does not exist
    fn session_stats(&self, session: SessionId) -> PlatformResult<SaStats>;
}
