//! Benchmarks the grid-based EAP sweep at varying response-history
//! lengths, since its cost is `O(history_len * GRID_POINTS)`.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use noesis_irt::{eap_estimate, ItemParams, ScoredResponse, DEFAULT_SIGMA0, DEFAULT_THETA0};

fn history_of(len: usize) -> Vec<ScoredResponse> {
    (0..len)
        .map(|i| ScoredResponse {
            params: ItemParams::new(1.2, -1.0 + (i as f64) * 0.1, 0.25),
            correct: i % 2 == 0,
        })
        .collect()
}

fn bench_eap_estimate(c: &mut Criterion) {
    let mut group = c.benchmark_group("eap_estimate");
    for len in [0usize, 5, 20, 50] {
        let responses = history_of(len);
        group.bench_with_input(BenchmarkId::from_parameter(len), &responses, |b, responses| {
            b.iter(|| {
                black_box(eap_estimate(
                    black_box(responses),
                    DEFAULT_THETA0,
                    DEFAULT_SIGMA0,
                ))
            })
        });
    }
    group.finish();
}

fn bench_item_information(c: &mut Criterion) {
    let params = ItemParams::new(1.2, -1.5, 0.25);
    c.bench_function("item_information", |b| {
        b.iter(|| black_box(noesis_irt::item_information(black_box(-0.78), params)))
    });
}

criterion_group!(benches, bench_eap_estimate, bench_item_information);
criterion_main!(benches);
