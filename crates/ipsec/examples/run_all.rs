//! Catalog Sweep Example
//!
//! Runs the known vectors and every combined scenario against the software
//! device and prints a summary per feature.
//!
//! Usage:
//!   cargo run --example run_all [packets]
//!
//! Example:
//!   RUST_LOG=saverify_ipsec=debug cargo run --example run_all 4

use saverify_ipsec::vectors::{
    PKT_AES_128_CBC_HMAC_SHA256, PKT_AES_128_CBC_HMAC_SHA256_V6, PKT_AES_256_GCM,
    PKT_AES_256_GCM_V6,
};
use saverify_ipsec::{DfPolicy, RunnerConfig, ScenarioRunner, SoftDevice, TestFlags};
use saverify_platform::TunnelVerify;
use std::env;

fn features() -> Vec<(&'static str, TestFlags)> {
    let base = TestFlags::default();
    let mut list = vec![
        ("default", base),
        ("inner ipv6", TestFlags { ipv6: true, ..base }),
        ("tunnel ipv6", TestFlags { tunnel_ipv6: true, ..base }),
        ("transport", TestFlags { transport: true, ..base }),
        ("iv gen", TestFlags { iv_gen: true, ..base }),
        ("soft expiry", TestFlags { sa_expiry_pkts_soft: true, ..base }),
        ("hard expiry", TestFlags { sa_expiry_pkts_hard: true, ..base }),
        ("icv corrupt", TestFlags { icv_corrupt: true, ..base }),
        ("udp encap", TestFlags { udp_encap: true, udp_ports_verify: true, ..base }),
        ("ip csum", TestFlags { ip_csum: true, ..base }),
        ("l4 csum", TestFlags { l4_csum: true, ..base }),
        ("stats", TestFlags { stats_success: true, ..base }),
        ("fragment", TestFlags { fragment: true, ..base }),
        (
            "tunnel dst verify",
            TestFlags { tunnel_hdr_verify: TunnelVerify::DstAddr, ..base },
        ),
        (
            "tunnel src dst verify",
            TestFlags { tunnel_hdr_verify: TunnelVerify::SrcDstAddr, ..base },
        ),
    ];
    for policy in DfPolicy::ALL {
        list.push(("df", TestFlags { df: Some(policy), ..base }));
    }
    list
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let packets = match env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => saverify_ipsec::config::DEFAULT_PACKETS,
    };
    let config = RunnerConfig::builder().with_packets(packets).build()?;
    let mut runner = ScenarioRunner::new(SoftDevice::new(), config)?;

    println!("Known vectors");
    for td in [
        &*PKT_AES_256_GCM,
        &*PKT_AES_256_GCM_V6,
        &*PKT_AES_128_CBC_HMAC_SHA256,
        &*PKT_AES_128_CBC_HMAC_SHA256_V6,
    ] {
        let flags = TestFlags::default();
        let outb = runner.run_known_vector(td, &flags);
        let inb = runner.run_known_vector_inbound(td, &flags);
        println!(
            "  spi {:#010x}: outbound {}, inbound {}",
            td.ipsec_xform.spi,
            verdict(&outb),
            verdict(&inb)
        );
    }

    println!();
    println!("Combined");
    let mut failed = 0;
    for (name, flags) in features() {
        let summary = runner.run_all(&flags);
        let df = flags.df.map(|p| format!(" {:?}", p)).unwrap_or_default();
        println!(
            "  {:<22} passed {:>2}  skipped {:>2}  failed {:>2}",
            format!("{}{}", name, df),
            summary.passed,
            summary.skipped,
            summary.failed
        );
        for (alg, err) in &summary.failures {
            println!("    {}: {}", alg, err);
        }
        failed += summary.failed;
    }

    let snapshot = runner.metrics().snapshot();
    println!();
    println!(
        "{} scenarios, {:.1}% passed, {} packets, {} sessions leaked",
        snapshot.scenarios_run(),
        snapshot.pass_rate() * 100.0,
        snapshot.packets_submitted,
        snapshot.sessions_leaked()
    );

    if failed > 0 {
        return Err(format!("{} scenarios failed", failed).into());
    }
    Ok(())
}

fn verdict(result: &saverify_ipsec::Result<()>) -> String {
    match result {
        Ok(()) => "ok".into(),
        Err(e) if e.is_skip() => format!("skipped ({})", e),
        Err(e) => format!("FAILED ({})", e),
    }
}
