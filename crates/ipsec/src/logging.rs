//! Structured logging for SA verification
//!
//! Provides structured, contextual logging using the `tracing` framework.
//!
//! # Log Levels
//!
//! - **TRACE**: Per-packet device activity
//! - **DEBUG**: Session lifecycle
//! - **INFO**: Scenario start, algorithm under test
//! - **WARN**: Skipped scenarios
//! - **ERROR**: Verification failures, with both buffers dumped on mismatch
//!
//! # Example
//!
//! ```no_run
//! use saverify_ipsec::logging;
//!
//! // Initialize tracing subscriber (in tests or applications)
//! tracing_subscriber::fmt()
//!     .with_env_filter("saverify_ipsec=debug")
//!     .init();
//!
//! logging::log_scenario_start("combined", "aes-gcm [256]", 1);
//! ```

use tracing::{debug, error, info, trace, warn};

/// Log scenario start
///
/// # Arguments
///
/// * `scenario` - Scenario name (e.g. "known vector", "combined")
/// * `alg` - Algorithm under test
/// * `packets` - Packets in the scenario
pub fn log_scenario_start(scenario: &str, alg: &str, packets: usize) {
    info!(
        scenario = scenario,
        alg = alg,
        packets = packets,
        "Scenario started"
    );
}

/// Log the algorithm under test (display-algorithm mode)
pub fn log_alg(alg: &str) {
    info!(alg = alg, "Algorithm under test");
}

/// Log a skipped scenario
///
/// # Arguments
///
/// * `alg` - Algorithm under test
/// * `reason` - Why the scenario does not apply
pub fn log_skip(alg: &str, reason: &str) {
    warn!(alg = alg, reason = reason, "Scenario skipped");
}

/// Log a verification failure
///
/// # Arguments
///
/// * `stage` - Verification stage (e.g. "post process", "status", "stats")
/// * `pkt_num` - 1-based packet number
/// * `error` - Failure description
pub fn log_verify_failure(stage: &str, pkt_num: usize, error: &str) {
    error!(
        stage = stage,
        pkt_num = pkt_num,
        error = error,
        "Verification failed"
    );
}

/// Log an output mismatch with both buffers
pub fn log_output_mismatch(offset: usize, expected: &[u8], actual: &[u8]) {
    error!(
        offset = offset,
        expected = %hex::encode(expected),
        actual = %hex::encode(actual),
        "Output text not as expected"
    );
}

/// Log a completion status that contradicts the scenario
pub fn log_status_failure(pkt_num: usize, reason: &str) {
    error!(pkt_num = pkt_num, reason = reason, "Status check failed");
}

/// Log SA session creation
///
/// # Arguments
///
/// * `session` - Device session identifier
/// * `spi` - SA SPI
/// * `direction` - "egress" or "ingress"
pub fn log_session_created(session: u64, spi: u32, direction: &str) {
    debug!(
        session = session,
        spi = spi,
        direction = direction,
        "SA session created"
    );
}

/// Log SA session teardown
pub fn log_session_destroyed(session: u64) {
    debug!(session = session, "SA session destroyed");
}

/// Log one device transform
///
/// # Arguments
///
/// * `session` - Device session identifier
/// * `seq` - Packet number within the SA
/// * `in_len` - Input length in bytes
/// * `out_len` - Output length in bytes
/// * `success` - Completion status
pub fn log_packet_processed(session: u64, seq: u64, in_len: usize, out_len: usize, success: bool) {
    trace!(
        session = session,
        seq = seq,
        in_len = in_len,
        out_len = out_len,
        success = success,
        "Packet processed"
    );
}

/// Log an IV repetition
pub fn log_iv_repeated(spi: u32, iv: &[u8]) {
    error!(spi = spi, iv = %hex::encode(iv), "IV repeated");
}
