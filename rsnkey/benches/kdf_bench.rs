// rsnkey key-derivation and codec benchmarks using criterion.
//
// Measures:
//   - PSK from passphrase (PBKDF2, 4096 rounds)
//   - PTK derivation: PRF-SHA1 vs KDF-SHA256 vs KDF-SHA384
//   - FT PMK-R0 -> PMK-R1 -> PTK chain
//   - EAPOL-Key MIC by descriptor version
//   - Key data wrap / unwrap and KDE parsing

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

use bytes::BytesMut;
use rsnkey::crypto::mic::compute_mic;
use rsnkey::crypto::wrap::{aes_unwrap, aes_wrap};
use rsnkey::derive::ft::{derive_pmk_r0, derive_pmk_r1, pmk_r1_to_ptk};
use rsnkey::derive::{passphrase_to_psk, pmk_to_ptk, PtkParams};
use rsnkey::kde::{self, KeyData};
use rsnkey::{Akm, Cipher, MacAddr};

const AA: MacAddr = MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
const SPA: MacAddr = MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x02]);

// ---------------------------------------------------------------------------
// Passphrase
// ---------------------------------------------------------------------------

fn bench_passphrase(c: &mut Criterion) {
    let mut group = c.benchmark_group("passphrase");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(20);
    group.bench_function("pbkdf2_4096", |b| {
        b.iter(|| black_box(passphrase_to_psk(black_box("correct horse battery"), b"bench").unwrap()));
    });
    group.finish();
}

// ---------------------------------------------------------------------------
// PTK derivation
// ---------------------------------------------------------------------------

fn bench_ptk(c: &mut Criterion) {
    let mut group = c.benchmark_group("ptk");
    let anonce = [0x11u8; 32];
    let snonce = [0x22u8; 32];
    for (name, akm, pmk_len) in [
        ("prf_sha1", Akm::Psk, 32usize),
        ("kdf_sha256", Akm::PskSha256, 32),
        ("kdf_sha384", Akm::SuiteB192, 48),
    ] {
        let pmk = vec![0x5au8; pmk_len];
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.iter(|| {
                let params = PtkParams {
                    pmk: &pmk,
                    aa: AA,
                    spa: SPA,
                    anonce: &anonce,
                    snonce: &snonce,
                    akm,
                    cipher: Cipher::Ccmp128,
                    z: None,
                    kdk_len: 0,
                };
                black_box(pmk_to_ptk(black_box(&params)).unwrap());
            });
        });
    }
    group.finish();
}

fn bench_ft_chain(c: &mut Criterion) {
    c.bench_function("ft_r0_r1_ptk", |b| {
        b.iter(|| {
            let r0 = derive_pmk_r0(Akm::FtPsk, &[0x33; 32], b"bench-ssid", [0xaa, 0xbb], b"r0kh", SPA).unwrap();
            let r1 = derive_pmk_r1(&r0, AA, SPA).unwrap();
            black_box(
                pmk_r1_to_ptk(&r1, Akm::FtPsk, Cipher::Ccmp128, &[1; 32], &[2; 32], AA, SPA, 0).unwrap(),
            );
        });
    });
}

// ---------------------------------------------------------------------------
// MIC
// ---------------------------------------------------------------------------

fn bench_mic(c: &mut Criterion) {
    let mut group = c.benchmark_group("eapol_mic");
    let kck = [0x42u8; 16];
    let frame = vec![0xabu8; 121];
    group.throughput(Throughput::Bytes(frame.len() as u64));
    for (name, version) in [("hmac_md5", 1u8), ("hmac_sha1", 2), ("aes_cmac", 3)] {
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.iter(|| black_box(compute_mic(version, Akm::Psk, &kck, black_box(&frame), 16).unwrap()));
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Key data
// ---------------------------------------------------------------------------

fn bench_key_data(c: &mut Criterion) {
    let kek = [0x17u8; 16];
    let mut buf = BytesMut::new();
    buf.extend_from_slice(&[0x30, 0x14, 0x01, 0x00, 0x00, 0x0f, 0xac, 0x04, 0x01, 0x00, 0x00, 0x0f,
        0xac, 0x04, 0x01, 0x00, 0x00, 0x0f, 0xac, 0x02, 0x00, 0x00]);
    kde::put_gtk(&mut buf, 1, false, &[0x99; 16]).unwrap();
    kde::put_igtk(&mut buf, 4, &[0; 6], &[0x98; 16]).unwrap();
    let mut plain = buf.to_vec();
    kde::pad_for_wrap(&mut plain);
    let wrapped = aes_wrap(&kek, &plain).unwrap();

    c.bench_function("key_data_unwrap_parse", |b| {
        b.iter(|| {
            let data = aes_unwrap(&kek, black_box(&wrapped)).unwrap();
            black_box(KeyData::parse(&data).unwrap());
        });
    });
}

criterion_group!(benches, bench_passphrase, bench_ptk, bench_ft_chain, bench_mic, bench_key_data);
criterion_main!(benches);
