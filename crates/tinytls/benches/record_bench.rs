//! Record layer benchmarks.
//!
//! Run with: cargo bench -p tinytls

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tinytls::record::{max_plaintext_len, ContentType, Record};
use tinytls::{ConnectionState, EngineConfig, TlsContext, TlsRole};

fn protected_state(suite_id: u8) -> ConnectionState {
    let ctx = TlsContext::new(EngineConfig::default()).unwrap();
    let suite = ctx.suites().find_by_id(suite_id).cloned().unwrap();
    let mut state = ConnectionState::new(TlsRole::Client, "bench");
    state.set_cipher_suite(suite);
    state.set_client_random(&[0x11; 32]).unwrap();
    state.set_server_random(&[0x22; 32]).unwrap();
    state.set_master_secret(vec![0x33; 48]).unwrap();
    state.set_change_cipher_spec_client(true);
    state
}

fn bench_seal_open(c: &mut Criterion) {
    let mut group = c.benchmark_group("record");

    for (suite_id, label) in [(0x20u8, "aes256-sha256"), (0x22, "aes128-sha1")] {
        let state = protected_state(suite_id);
        let limit = max_plaintext_len(&state, TlsRole::Client);
        for size in [64usize, 1024, limit] {
            let plaintext = vec![0xA5u8; size];
            group.throughput(Throughput::Bytes(size as u64));

            group.bench_with_input(
                BenchmarkId::new(format!("seal/{label}"), size),
                &plaintext,
                |bench, pt| {
                    bench.iter(|| {
                        Record::seal(&state, ContentType::ApplicationData, black_box(pt)).unwrap()
                    });
                },
            );

            let frame = Record::seal(&state, ContentType::ApplicationData, &plaintext)
                .unwrap()
                .to_bytes();
            group.bench_with_input(
                BenchmarkId::new(format!("open/{label}"), size),
                &frame,
                |bench, bytes| {
                    bench.iter(|| {
                        Record::open_from(&state, TlsRole::Client, black_box(bytes)).unwrap()
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_plaintext_frame(c: &mut Criterion) {
    let state = ConnectionState::new(TlsRole::Client, "bench");
    let plaintext = vec![0x5Au8; 4096];
    c.bench_function("record/plaintext_seal_4096", |bench| {
        bench.iter(|| Record::seal(&state, ContentType::ApplicationData, black_box(&plaintext)).unwrap())
    });
}

criterion_group!(benches, bench_seal_open, bench_plaintext_frame);
criterion_main!(benches);
