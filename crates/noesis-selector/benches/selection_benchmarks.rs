//! Benchmarks adaptive selection across bank sizes, since production
//! quizzes may hold far more than the seeded five-question fixture.

use std::collections::HashSet;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use noesis_irt::ItemParams;
use noesis_selector::{select_next_question, Condition, SelectableItem, SelectionCriteria};

fn bank_of(size: usize) -> Vec<SelectableItem> {
    (0..size)
        .map(|i| SelectableItem {
            id: format!("q-{i:04}"),
            params: ItemParams::new(1.2, -3.0 + (i as f64 % 60.0) * 0.1, 0.25),
            bloom: (i % 3) as u8 + 1,
            order: i as u32,
        })
        .collect()
}

fn bench_select_adaptive(c: &mut Criterion) {
    let mut group = c.benchmark_group("select_next_question_adaptive");
    for size in [5usize, 100, 1000] {
        let bank = bank_of(size);
        let criteria = SelectionCriteria {
            target_theta: -0.78,
            exclude_ids: HashSet::new(),
            bloom_level: None,
        };
        group.bench_with_input(BenchmarkId::from_parameter(size), &bank, |b, bank| {
            b.iter(|| {
                black_box(select_next_question(
                    black_box(bank),
                    black_box(&criteria),
                    Condition::Adaptive,
                ))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_select_adaptive);
criterion_main!(benches);
