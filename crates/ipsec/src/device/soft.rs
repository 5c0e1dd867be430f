//! Software ESP device
//!
//! Runs every SA through the reference ESP transform. It advertises what the
//! reference transform can do and rejects anything else when a session is
//! created, the way an offload driver would.
//!
//! Per-packet protocol rejections (expired SA, failed ICV, tunnel header or
//! UDP port mismatch) complete with [`OpStatus::Error`] and the untouched
//! input; they are never reported through `Err`.
//!
//! [`OpStatus::Error`]: saverify_platform::OpStatus::Error

use crate::capability;
use crate::esp::{self, EspTransform};
use crate::logging;
use crate::{checksum, packet, Error, Result};
use bytes::Bytes;
use rand::RngCore;
use saverify_platform::{
    AeadAlgorithm, AuthAlgorithm, CipherAlgorithm, CompletedOp, CryptoCapability, CryptoXform,
    IpsecXform, OffloadFlags, ParamRange, PlatformError, PlatformResult, SaDirection, SaMode,
    SaOptions, SaStats, SecurityCapability, SecurityDevice, SecurityModule, SessionConf,
    SessionId, SymCapability, TunnelType, TunnelVerify,
};
use std::collections::HashMap;
use std::net::IpAddr;

/// Capability set of the software device
///
/// AES-GCM, NULL / AES-CBC / AES-CTR and NULL / HMAC-SHA2; no XCBC-MAC,
/// ESN, DSCP or flow label copy, TTL decrement or ECN.
pub fn soft_capabilities() -> SecurityCapability {
    let aes_keys = ParamRange::new(16, 32, 8);
    let sym = CryptoCapability::Symmetric;

    SecurityCapability {
        options: SaOptions {
            udp_encap: true,
            udp_ports_verify: true,
            copy_df: true,
            stats: true,
            iv_gen_disable: true,
            tunnel_hdr_verify: TunnelVerify::SrcDstAddr,
            ip_csum_enable: true,
            l4_csum_enable: true,
            ..SaOptions::default()
        },
        crypto: vec![
            sym(SymCapability::Aead {
                algo: AeadAlgorithm::AesGcm,
                key_size: aes_keys,
                digest_size: ParamRange::fixed(16),
                aad_size: ParamRange::new(0, 12, 4),
                iv_size: ParamRange::fixed(12),
            }),
            sym(SymCapability::Cipher {
                algo: CipherAlgorithm::Null,
                key_size: ParamRange::fixed(0),
                iv_size: ParamRange::fixed(0),
            }),
            sym(SymCapability::Cipher {
                algo: CipherAlgorithm::AesCbc,
                key_size: aes_keys,
                iv_size: ParamRange::fixed(16),
            }),
            sym(SymCapability::Cipher {
                algo: CipherAlgorithm::AesCtr,
                key_size: aes_keys,
                iv_size: ParamRange::fixed(16),
            }),
            sym(SymCapability::Auth {
                algo: AuthAlgorithm::Null,
                key_size: ParamRange::fixed(0),
                digest_size: ParamRange::fixed(0),
                iv_size: ParamRange::fixed(0),
            }),
            sym(SymCapability::Auth {
                algo: AuthAlgorithm::Sha256Hmac,
                key_size: ParamRange::new(1, 1024, 1),
                digest_size: ParamRange::fixed(16),
                iv_size: ParamRange::fixed(0),
            }),
            sym(SymCapability::Auth {
                algo: AuthAlgorithm::Sha384Hmac,
                key_size: ParamRange::new(1, 1024, 1),
                digest_size: ParamRange::fixed(24),
                iv_size: ParamRange::fixed(0),
            }),
            sym(SymCapability::Auth {
                algo: AuthAlgorithm::Sha512Hmac,
                key_size: ParamRange::new(1, 1024, 1),
                digest_size: ParamRange::fixed(32),
                iv_size: ParamRange::fixed(0),
            }),
            CryptoCapability::Undefined,
        ],
    }
}

struct SoftSession {
    sa: IpsecXform,
    transform: EspTransform,
    app_iv: Vec<u8>,
    packets: u64,
    stats: SaStats,
}

impl SoftSession {
    fn next_iv(&self, seq: u64) -> Vec<u8> {
        if self.sa.options.iv_gen_disable {
            return self.app_iv.clone();
        }
        let len = self.transform.iv_len();
        match self.transform.crypto() {
            // Counter based modes only need uniqueness
            CryptoXform::Aead(_) => seq.to_be_bytes()[..len].to_vec(),
            CryptoXform::Chain { cipher, .. } if cipher.algo == CipherAlgorithm::AesCtr => {
                seq.to_be_bytes()[..len].to_vec()
            }
            _ => {
                let mut iv = vec![0u8; len];
                rand::thread_rng().fill_bytes(&mut iv);
                iv
            }
        }
    }

    fn egress(&self, seq: u64, pkt: &[u8]) -> Result<Vec<u8>> {
        let mut inner = pkt.to_vec();
        if self.sa.options.ip_csum_enable && packet::is_ipv4(&inner) {
            checksum::update_ipv4_checksum(&mut inner)?;
        }
        if self.sa.options.l4_csum_enable {
            checksum::update_l4_checksum(&mut inner)?;
        }

        let seq32 = u32::try_from(seq)
            .map_err(|_| Error::InvalidParameter("sequence number overflow".into()))?;
        let iv = self.next_iv(seq);
        esp::encapsulate(&self.sa, &self.transform, seq32, &iv, &inner)
    }

    fn ingress(&self, pkt: &[u8]) -> Result<(Vec<u8>, OffloadFlags)> {
        let decap = esp::decapsulate(&self.sa, &self.transform, pkt)?;

        if self.sa.mode == SaMode::Tunnel {
            self.verify_tunnel_header(decap.outer_src, decap.outer_dst)?;
        }

        if self.sa.options.udp_encap && self.sa.options.udp_ports_verify {
            match decap.udp_ports {
                Some(ports) if ports == self.sa.udp => {}
                other => {
                    return Err(Error::InvalidOuterHeader(format!(
                        "UDP ports {:?} do not match the SA",
                        other
                    )));
                }
            }
        }

        let inner = decap.inner;
        let mut ol_flags = OffloadFlags::default();
        if self.sa.options.ip_csum_enable && packet::is_ipv4(&inner) {
            let good = checksum::verify_ipv4_checksum(&inner)?;
            ol_flags.ip_cksum_good = good;
            ol_flags.ip_cksum_bad = !good;
        }
        if self.sa.options.l4_csum_enable && checksum::l4_checksum(&inner)?.is_some() {
            let good = checksum::verify_l4_checksum(&inner)?;
            ol_flags.l4_cksum_good = good;
            ol_flags.l4_cksum_bad = !good;
        }
        Ok((inner, ol_flags))
    }

    fn verify_tunnel_header(&self, src: IpAddr, dst: IpAddr) -> Result<()> {
        let level = self.sa.options.tunnel_hdr_verify;
        if level == TunnelVerify::None {
            return Ok(());
        }

        let tunnel = &self.sa.tunnel;
        let (sa_src, sa_dst) = match tunnel.tunnel_type {
            TunnelType::Ipv4 => (IpAddr::V4(tunnel.ipv4.src), IpAddr::V4(tunnel.ipv4.dst)),
            TunnelType::Ipv6 => (IpAddr::V6(tunnel.ipv6.src), IpAddr::V6(tunnel.ipv6.dst)),
        };
        if dst != sa_dst {
            return Err(Error::InvalidOuterHeader(format!(
                "outer destination {} is not the SA's {}",
                dst, sa_dst
            )));
        }
        if level >= TunnelVerify::SrcDstAddr && src != sa_src {
            return Err(Error::InvalidOuterHeader(format!(
                "outer source {} is not the SA's {}",
                src, sa_src
            )));
        }
        Ok(())
    }
}

/// Software reference device
pub struct SoftDevice {
    caps: SecurityCapability,
    sessions: HashMap<SessionId, SoftSession>,
    next_id: u64,
}

impl SoftDevice {
    /// Device advertising [`soft_capabilities`]
    pub fn new() -> Self {
        Self::with_capabilities(soft_capabilities())
    }

    /// Device advertising a restricted capability set
    ///
    /// Useful for checking that scenarios outside the advertisement are
    /// skipped. Advertising more than [`soft_capabilities`] does not make
    /// the reference transform support it.
    pub fn with_capabilities(caps: SecurityCapability) -> Self {
        SoftDevice {
            caps,
            sessions: HashMap::new(),
            next_id: 1,
        }
    }

    /// Number of live sessions
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for SoftDevice {
    fn default() -> Self {
        Self::new()
    }
}

fn to_platform(err: Error) -> PlatformError {
    if err.is_skip() {
        PlatformError::Unsupported(err.to_string())
    } else {
        PlatformError::Config(err.to_string())
    }
}

impl SecurityModule for SoftDevice {
    fn id(&self) -> &'static str {
        "soft_esp"
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn description(&self) -> &'static str {
        "Software ESP reference device"
    }

    fn shutdown(&mut self) -> PlatformResult<()> {
        self.sessions.clear();
        Ok(())
    }
}

impl SecurityDevice for SoftDevice {
    fn capabilities(&self) -> &SecurityCapability {
        &self.caps
    }

    fn create_session(&mut self, conf: &SessionConf<'_>) -> PlatformResult<SessionId> {
        capability::verify_sa_options(&conf.ipsec, &self.caps.options).map_err(to_platform)?;
        capability::verify_crypto_capability(&self.caps, &conf.crypto).map_err(to_platform)?;

        let transform = EspTransform::new(conf.crypto, conf.key, conf.auth_key, conf.salt)
            .map_err(to_platform)?;

        let app_iv_used =
            conf.ipsec.direction == SaDirection::Egress && conf.ipsec.options.iv_gen_disable;
        let app_iv = if app_iv_used {
            if conf.iv.len() != transform.iv_len() {
                return Err(PlatformError::Config(format!(
                    "application IV length {} (expected {})",
                    conf.iv.len(),
                    transform.iv_len()
                )));
            }
            conf.iv.to_vec()
        } else {
            Vec::new()
        };

        let id = SessionId(self.next_id);
        self.next_id += 1;
        self.sessions.insert(
            id,
            SoftSession {
                sa: conf.ipsec,
                transform,
                app_iv,
                packets: 0,
                stats: SaStats::default(),
            },
        );

        let direction = match conf.ipsec.direction {
            SaDirection::Egress => "egress",
            SaDirection::Ingress => "ingress",
        };
        logging::log_session_created(id.0, conf.ipsec.spi, direction);
        Ok(id)
    }

    fn submit(&mut self, session: SessionId, pkt: &[u8]) -> PlatformResult<CompletedOp> {
        let sess = self
            .sessions
            .get_mut(&session)
            .ok_or(PlatformError::NoSuchSession(session.0))?;

        sess.packets += 1;
        let seq = sess.packets;
        let life = sess.sa.life;
        let egress = sess.sa.direction == SaDirection::Egress;

        let result = if life.packets_hard_limit != 0 && seq > life.packets_hard_limit {
            Err(Error::Status("SA hard lifetime expired".into()))
        } else if egress {
            sess.egress(seq, pkt).map(|out| (out, OffloadFlags::default()))
        } else {
            sess.ingress(pkt)
        };

        let mut op = match result {
            Ok((out, ol_flags)) => {
                let len = out.len() as u64;
                if egress {
                    sess.stats.opackets += 1;
                    sess.stats.obytes += len;
                } else {
                    sess.stats.ipackets += 1;
                    sess.stats.ibytes += len;
                }
                let mut op = CompletedOp::success(Bytes::from(out));
                op.ol_flags = ol_flags;
                op
            }
            Err(e) => {
                tracing::debug!(session = session.0, seq = seq, error = %e, "Packet rejected");
                if egress {
                    sess.stats.oerrors += 1;
                } else {
                    sess.stats.ierrors += 1;
                }
                CompletedOp::error(Bytes::copy_from_slice(pkt))
            }
        };

        if life.packets_soft_limit != 0 && seq > life.packets_soft_limit {
            op.aux_flags.soft_expiry = true;
        }

        logging::log_packet_processed(session.0, seq, pkt.len(), op.packet.len(), op.is_success());
        Ok(op)
    }

    fn destroy_session(&mut self, session: SessionId) -> PlatformResult<()> {
        self.sessions
            .remove(&session)
            .ok_or(PlatformError::NoSuchSession(session.0))?;
        logging::log_session_destroyed(session.0);
        Ok(())
    }

    fn session_stats(&self, session: SessionId) -> PlatformResult<SaStats> {
        let sess = self
            .sessions
            .get(&session)
            .ok_or(PlatformError::NoSuchSession(session.0))?;
        if !sess.sa.options.stats {
            return Err(PlatformError::Unsupported(
                "statistics not enabled on this SA".into(),
            ));
        }
        Ok(sess.stats)
    }
}
