//! Scenario runner
//!
//! Drives a device under test through the scenarios: builds the records,
//! programs one SA per direction, submits every packet and hands each
//! completion to the status checks and the verification engine.
//!
//! # Combined scenarios
//!
//! ```text
//! prepare N outbound records
//!   -> egress SA: submit, status check, post process into inbound records
//!   -> update inbound records (expected output, ICV corruption, options)
//!   -> ingress SA: submit, status check, post process against the plaintext
//! ```
//!
//! Each SA gets its own [`IvHistory`]. Sessions are destroyed whatever the
//! verdict.

use crate::capability;
use crate::catalog::{alg_list, CryptoParamCombination, IPSEC_TEST_PACKETS_MAX};
use crate::config::RunnerConfig;
use crate::flags::TestFlags;
use crate::iv_history::IvHistory;
use crate::logging;
use crate::metrics::RunMetrics;
use crate::vectors::IpsecTestData;
use crate::{builder, derive, status, verify, Error, Result};
use saverify_platform::{
    AuthAlgorithm, CryptoXform, SaDirection, SaMode, SecurityDevice, SessionId, TunnelType,
    TunnelVerify,
};
use std::net::{Ipv4Addr, Ipv6Addr};

/// Outcome of a catalog sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Combinations that passed
    pub passed: usize,
    /// Combinations that failed
    pub failed: usize,
    /// Combinations that did not apply to the device
    pub skipped: usize,
    /// Algorithm and diagnosis of every failure
    pub failures: Vec<(String, Error)>,
}

impl RunSummary {
    /// Whether nothing failed
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Runs scenarios against one device
pub struct ScenarioRunner<D: SecurityDevice> {
    device: D,
    config: RunnerConfig,
    metrics: RunMetrics,
}

impl<D: SecurityDevice> ScenarioRunner<D> {
    /// Create a runner
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if `config` does not validate
    pub fn new(device: D, config: RunnerConfig) -> Result<Self> {
        config.validate()?;
        Ok(ScenarioRunner {
            device,
            config,
            metrics: RunMetrics::new(),
        })
    }

    /// Device under test
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Runner configuration
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run metrics
    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    /// Give the device back
    pub fn into_device(self) -> D {
        self.device
    }

    /// Outbound known-answer scenario: `td.input_text` must become `td.output_text`
    ///
    /// With `flags.udp_encap` the SA encapsulates in UDP while the expected
    /// output stays plain ESP.
    pub fn run_known_vector(&mut self, td: &IpsecTestData, flags: &TestFlags) -> Result<()> {
        let mut td = td.clone();
        if flags.udp_encap {
            td.ipsec_xform.options.udp_encap = true;
        }

        self.start("known vector", &describe(&td.xform), flags, 1);
        let mut ivs = IvHistory::new();
        let result = self.process(std::slice::from_ref(&td), None, flags, &mut ivs);
        self.record(result)
    }

    /// Inbound known-answer scenario: the inverse of an outbound record
    pub fn run_known_vector_inbound(&mut self, td: &IpsecTestData, flags: &TestFlags) -> Result<()> {
        let inb = derive::inbound_from_outbound(td);

        self.start("known vector inbound", &describe(&inb.xform), flags, 1);
        let mut ivs = IvHistory::new();
        let result = self.process(std::slice::from_ref(&inb), None, flags, &mut ivs);
        self.record(result)
    }

    /// Combined scenario for one catalog entry
    ///
    /// Scenarios needing a full window (IV generation, expiry) run
    /// [`IPSEC_TEST_PACKETS_MAX`] packets, statistics scenarios one packet,
    /// everything else the configured count.
    pub fn run_combined(&mut self, param: &CryptoParamCombination, flags: &TestFlags) -> Result<()> {
        let result = self.combined(param, flags);
        self.record(result)
    }

    /// Combined scenario for every catalog entry but NULL / NULL
    pub fn run_all(&mut self, flags: &TestFlags) -> RunSummary {
        let mut summary = RunSummary::default();

        for param in alg_list() {
            if param.is_null_null() {
                continue;
            }
            match self.run_combined(param, flags) {
                Ok(()) => summary.passed += 1,
                Err(e) if e.is_skip() => {
                    logging::log_skip(&param.to_string(), &e.to_string());
                    summary.skipped += 1;
                }
                Err(e) => {
                    summary.failed += 1;
                    summary.failures.push((param.to_string(), e));
                }
            }
        }
        summary
    }

    fn combined(&mut self, param: &CryptoParamCombination, flags: &TestFlags) -> Result<()> {
        let n = if flags.needs_full_window() {
            IPSEC_TEST_PACKETS_MAX
        } else if flags.stats_success {
            1
        } else {
            self.config.packets
        };

        let mut td_outb = builder::prepare(param, flags, n)?;
        check_applicable(&td_outb[0], flags)?;
        for td in &mut td_outb {
            if flags.udp_encap {
                td.ipsec_xform.options.udp_encap = true;
            }
        }

        self.start("combined", &param.to_string(), flags, n);

        let mut td_inb = td_outb.clone();
        let mut outb_ivs = IvHistory::new();
        self.process(&td_outb, Some(td_inb.as_mut_slice()), flags, &mut outb_ivs)?;

        derive::update_inbound(&mut td_inb, &td_outb, flags)?;
        if flags.tunnel_hdr_verify != TunnelVerify::None {
            for td in &mut td_inb {
                perturb_tunnel(td, flags.tunnel_hdr_verify);
            }
        }

        let mut inb_ivs = IvHistory::new();
        self.process(&td_inb, None, flags, &mut inb_ivs)
    }

    fn start(&self, scenario: &str, alg: &str, flags: &TestFlags, packets: usize) {
        if self.config.display_alg || flags.display_alg {
            logging::log_alg(alg);
        }
        logging::log_scenario_start(scenario, alg, packets);
    }

    fn record(&self, result: Result<()>) -> Result<()> {
        match &result {
            Ok(()) => self.metrics.record_scenario_passed(),
            Err(e) if e.is_skip() => self.metrics.record_scenario_skipped(),
            Err(_) => self.metrics.record_scenario_failed(),
        }
        result
    }

    // One SA, all records through it
    fn process(
        &mut self,
        tds: &[IpsecTestData],
        res: Option<&mut [IpsecTestData]>,
        flags: &TestFlags,
        ivs: &mut IvHistory,
    ) -> Result<()> {
        let first = tds
            .first()
            .ok_or_else(|| Error::InvalidParameter("no test records".into()))?;

        let caps = self.device.capabilities();
        capability::verify_sa_options(&first.ipsec_xform, &caps.options)?;
        capability::verify_crypto_capability(caps, &first.xform)?;

        let session = self.device.create_session(&first.session_conf())?;
        self.metrics.record_session_created();

        let result = self.process_packets(session, tds, res, flags, ivs);

        let destroyed = self.device.destroy_session(session);
        self.metrics.record_session_destroyed();
        result?;
        destroyed?;
        Ok(())
    }

    fn process_packets(
        &mut self,
        session: SessionId,
        tds: &[IpsecTestData],
        mut res: Option<&mut [IpsecTestData]>,
        flags: &TestFlags,
        ivs: &mut IvHistory,
    ) -> Result<()> {
        for (i, td) in tds.iter().enumerate() {
            let pkt_num = i + 1;
            let dir = td.ipsec_xform.direction;

            let mut input = td.input_text.as_slice().to_vec();
            if dir == SaDirection::Egress {
                verify::pkt_update(&mut input, flags).map_err(staged("pkt update", pkt_num))?;
            }

            let op = self.device.submit(session, &input)?;
            self.metrics.record_packet_submitted();

            status::status_check(&op, flags, dir, pkt_num).map_err(staged("status", pkt_num))?;

            let sink = res.as_deref_mut().and_then(|r| r.get_mut(i));
            verify::post_process(&op, td, sink, self.config.silent, flags, ivs)
                .map_err(staged("post process", pkt_num))?;

            status::stats_verify(&self.device, session, flags, dir)
                .map_err(staged("stats", pkt_num))?;
        }
        Ok(())
    }
}

fn staged(stage: &'static str, pkt_num: usize) -> impl FnOnce(Error) -> Error {
    move |e| {
        if !e.is_skip() {
            logging::log_verify_failure(stage, pkt_num, &e.to_string());
        }
        e
    }
}

fn describe(xform: &CryptoXform) -> String {
    match xform {
        CryptoXform::Aead(aead) => format!("{} [{}]", aead.algo.name(), aead.key_len * 8),
        CryptoXform::Chain { cipher, auth } => {
            format!("{} {}", cipher.algo.name(), auth.algo.name())
        }
    }
}

fn check_applicable(td: &IpsecTestData, flags: &TestFlags) -> Result<()> {
    if flags.icv_corrupt {
        if let CryptoXform::Chain { auth, .. } = td.xform {
            if auth.algo == AuthAlgorithm::Null {
                return Err(Error::NotApplicable(
                    "ICV corruption without integrity protection".into(),
                ));
            }
        }
    }
    if flags.tunnel_hdr_verify != TunnelVerify::None && td.ipsec_xform.mode == SaMode::Transport {
        return Err(Error::NotApplicable(
            "tunnel header verification in transport mode".into(),
        ));
    }
    if flags.df.is_some() && flags.ipv6 {
        return Err(Error::NotApplicable("DF bit on an IPv6 inner packet".into()));
    }
    if flags.fragment && flags.ipv6 {
        return Err(Error::NotApplicable(
            "fragment offset on an IPv6 inner packet".into(),
        ));
    }
    Ok(())
}

// Move the SA's tunnel endpoint away from what the packets carry
fn perturb_tunnel(td: &mut IpsecTestData, level: TunnelVerify) {
    let tunnel = &mut td.ipsec_xform.tunnel;
    let src = level == TunnelVerify::SrcDstAddr;
    match tunnel.tunnel_type {
        TunnelType::Ipv4 => {
            let addr = if src {
                &mut tunnel.ipv4.src
            } else {
                &mut tunnel.ipv4.dst
            };
            *addr = Ipv4Addr::from(u32::from(*addr).wrapping_add(1));
        }
        TunnelType::Ipv6 => {
            let addr = if src {
                &mut tunnel.ipv6.src
            } else {
                &mut tunnel.ipv6.dst
            };
            *addr = Ipv6Addr::from(u128::from(*addr).wrapping_add(1));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AEAD_LIST, AUTH_LIST, CIPHER_LIST};
    use crate::device::SoftDevice;
    use crate::vectors::PKT_AES_256_GCM;

    fn runner() -> ScenarioRunner<SoftDevice> {
        ScenarioRunner::new(SoftDevice::new(), RunnerConfig::default()).unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = RunnerConfig {
            packets: 0,
            ..RunnerConfig::default()
        };
        assert!(ScenarioRunner::new(SoftDevice::new(), config).is_err());
    }

    #[test]
    fn test_known_vector_round() {
        let mut runner = runner();
        runner.run_known_vector(&PKT_AES_256_GCM, &TestFlags::default()).unwrap();
        runner.run_known_vector_inbound(&PKT_AES_256_GCM, &TestFlags::default()).unwrap();

        let snapshot = runner.metrics().snapshot();
        assert_eq!(snapshot.scenarios_passed, 2);
        assert_eq!(snapshot.packets_submitted, 2);
        assert_eq!(snapshot.sessions_leaked(), 0);
        assert_eq!(runner.device().session_count(), 0);
    }

    #[test]
    fn test_combined_single() {
        let mut runner = runner();
        runner
            .run_combined(&CryptoParamCombination::Aead(AEAD_LIST[2]), &TestFlags::default())
            .unwrap();
        assert_eq!(runner.metrics().snapshot().sessions_created, 2);
    }

    #[test]
    fn test_icv_corrupt_null_auth_not_applicable() {
        let mut runner = runner();
        let param = CryptoParamCombination::Chain {
            cipher: CIPHER_LIST[1],
            auth: AUTH_LIST[0],
        };
        let flags = TestFlags {
            icv_corrupt: true,
            ..TestFlags::default()
        };
        let err = runner.run_combined(&param, &flags).unwrap_err();
        assert!(err.is_skip());
        assert_eq!(runner.metrics().snapshot().scenarios_skipped, 1);
    }

    #[test]
    fn test_fragment_ipv6_not_applicable() {
        let mut runner = runner();
        let flags = TestFlags {
            fragment: true,
            ipv6: true,
            ..TestFlags::default()
        };
        let err = runner
            .run_combined(&CryptoParamCombination::Aead(AEAD_LIST[0]), &flags)
            .unwrap_err();
        assert!(matches!(err, Error::NotApplicable(_)));
        assert_eq!(runner.metrics().snapshot().packets_submitted, 0);
    }

    #[test]
    fn test_perturb_tunnel() {
        let mut td = PKT_AES_256_GCM.clone();
        perturb_tunnel(&mut td, TunnelVerify::DstAddr);
        assert_eq!(td.ipsec_xform.tunnel.ipv4.dst, Ipv4Addr::new(10, 0, 0, 3));
        assert_eq!(td.ipsec_xform.tunnel.ipv4.src, Ipv4Addr::new(10, 0, 0, 1));

        perturb_tunnel(&mut td, TunnelVerify::SrcDstAddr);
        assert_eq!(td.ipsec_xform.tunnel.ipv4.src, Ipv4Addr::new(10, 0, 0, 2));
    }

    #[test]
    fn test_run_all_default() {
        let mut runner = runner();
        let summary = runner.run_all(&TestFlags::default());
        assert!(summary.is_success(), "{:?}", summary.failures);
        // XCBC-MAC is not advertised
        assert_eq!(summary.skipped, CIPHER_LIST.len());
        assert_eq!(
            summary.passed + summary.skipped,
            alg_list().len() - 1
        );
    }
}
