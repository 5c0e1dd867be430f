//! Verification engine benchmarks
//!
//! Reference ESP throughput, the per-packet verification path and a whole
//! combined scenario.
//!
//! Run with: `cargo bench -p saverify-ipsec --bench verify_bench`

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use saverify_ipsec::catalog::AEAD_LIST;
use saverify_ipsec::esp;
use saverify_ipsec::vectors::{PKT_AES_128_CBC_HMAC_SHA256, PKT_AES_256_GCM};
use saverify_ipsec::{
    verify, CryptoParamCombination, IvHistory, RunnerConfig, ScenarioRunner, SoftDevice,
    TestFlags,
};
use saverify_platform::{CompletedOp, SecurityDevice};

/// Benchmark reference ESP encapsulation
fn bench_esp_encapsulate(c: &mut Criterion) {
    let mut group = c.benchmark_group("esp_encapsulate");

    for (name, td) in [
        ("aes256_gcm", &*PKT_AES_256_GCM),
        ("aes128_cbc_sha256", &*PKT_AES_128_CBC_HMAC_SHA256),
    ] {
        let transform = td.transform().unwrap();
        group.throughput(Throughput::Bytes(td.input_text.len() as u64));
        group.bench_function(name, |b| {
            b.iter(|| {
                black_box(
                    esp::encapsulate(
                        &td.ipsec_xform,
                        &transform,
                        1,
                        td.iv.as_slice(),
                        td.input_text.as_slice(),
                    )
                    .unwrap(),
                )
            });
        });
    }

    group.finish();
}

/// Benchmark post processing of an egress packet
fn bench_post_process(c: &mut Criterion) {
    let mut group = c.benchmark_group("post_process");

    let td = &*PKT_AES_256_GCM;
    let mut dev = SoftDevice::new();
    let session = dev.create_session(&td.session_conf()).unwrap();
    let op: CompletedOp = dev.submit(session, td.input_text.as_slice()).unwrap();
    let flags = TestFlags::default();

    group.bench_function("td_verify", |b| {
        b.iter(|| black_box(verify::td_verify(&op, td, true, &flags)))
    });

    group.bench_function("prepare_result", |b| {
        b.iter(|| {
            let mut ivs = IvHistory::new();
            let mut res = td.clone();
            verify::post_process(&op, td, Some(&mut res), true, &flags, &mut ivs).unwrap();
            black_box(res)
        })
    });

    group.finish();
}

/// Benchmark one full combined scenario
fn bench_combined(c: &mut Criterion) {
    let mut group = c.benchmark_group("combined");
    group.sample_size(20);

    let param = CryptoParamCombination::Aead(AEAD_LIST[0]);
    group.bench_function("aes128_gcm_iv_gen", |b| {
        let flags = TestFlags {
            iv_gen: true,
            ..TestFlags::default()
        };
        let mut runner = ScenarioRunner::new(SoftDevice::new(), RunnerConfig::default()).unwrap();
        b.iter(|| runner.run_combined(&param, &flags).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_esp_encapsulate, bench_post_process, bench_combined);

criterion_main!(benches);
