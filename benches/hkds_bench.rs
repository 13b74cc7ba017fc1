//! Throughput comparison across the scalar, eight-way, and sixty-four
//! way token-issuance paths.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use hkds::{
    KeySerialNumber, MasterDerivationKey, Mode256, SecurityLevel, ServerState, ServerStateX64,
    ServerStateX8,
};
use rand::rngs::OsRng;

const CACHE_SIZE: u32 = 4;

/// A DID filled with `fill`, with the mode-tag byte forced to
/// `Mode256::MODE_TAG` so it passes the config check at construction.
fn test_did(fill: u8) -> [u8; 12] {
    let mut did = [fill; 12];
    did[5] = Mode256::MODE_TAG;
    did
}

fn bench_scalar_token_issuance(c: &mut Criterion) {
    let mdk = MasterDerivationKey::<Mode256>::generate(&mut OsRng, [0; 4]);
    let ksn = KeySerialNumber::new(&test_did(0), 0);
    let state = ServerState::new(ksn, &mdk, CACHE_SIZE).unwrap();

    let mut group = c.benchmark_group("token_issuance");
    group.throughput(Throughput::Elements(1));
    group.bench_function(BenchmarkId::new("scalar", "1"), |b| {
        b.iter(|| black_box(state.encrypt_token()))
    });
    group.finish();
}

fn bench_x8_token_issuance(c: &mut Criterion) {
    let mdk = MasterDerivationKey::<Mode256>::generate(&mut OsRng, [0; 4]);
    let ksns: [KeySerialNumber; 8] = std::array::from_fn(|i| KeySerialNumber::new(&test_did(i as u8), 0));
    let state = ServerStateX8::new(ksns, &mdk, CACHE_SIZE).unwrap();

    let mut group = c.benchmark_group("token_issuance");
    group.throughput(Throughput::Elements(8));
    group.bench_function(BenchmarkId::new("x8", "8"), |b| {
        b.iter(|| black_box(state.encrypt_token_x8()))
    });
    group.finish();
}

fn bench_x64_token_issuance(c: &mut Criterion) {
    let mdk = MasterDerivationKey::<Mode256>::generate(&mut OsRng, [0; 4]);
    let ksns: [KeySerialNumber; 64] =
        std::array::from_fn(|i| KeySerialNumber::new(&test_did(i as u8), 0));
    let state = ServerStateX64::new(ksns, &mdk, CACHE_SIZE).unwrap();

    let mut group = c.benchmark_group("token_issuance");
    group.throughput(Throughput::Elements(64));
    group.bench_function(BenchmarkId::new("x64", "64"), |b| {
        b.iter(|| black_box(state.encrypt_token_x64()))
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_scalar_token_issuance,
    bench_x8_token_issuance,
    bench_x64_token_issuance
);
criterion_main!(benches);
