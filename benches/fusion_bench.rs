use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use weave_memory::cache::extract_pattern;
use weave_memory::search::{merge_and_rank, FusionWeights, MemorySource, ResultItem};

fn items(n: usize, source: MemorySource) -> Vec<ResultItem> {
    (0..n)
        .map(|i| ResultItem {
            id: format!("{}-{}", source.as_str(), i),
            raw_score: ((i * 7919) % 1000) as f64 / 1000.0,
            source,
            payload: serde_json::Value::Null,
        })
        .collect()
}

fn bench_merge_and_rank(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_and_rank");
    for n in [10, 100, 1000] {
        let contextual = items(n, MemorySource::Contextual);
        let structural = items(n, MemorySource::Structural);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                merge_and_rank(
                    black_box(&contextual),
                    black_box(&structural),
                    FusionWeights::default(),
                    20,
                )
            })
        });
    }
    group.finish();
}

fn bench_extract_pattern(c: &mut Criterion) {
    let keys = [
        "memory:search:alice:1234567890123",
        "user:550e8400-e29b-41d4-a716-446655440000:profile",
        "log:2023-11-01:errors",
        "session:1700000000000",
        "plain:key:without:ids",
    ];

    c.bench_function("extract_pattern", |b| {
        b.iter(|| {
            for key in keys {
                black_box(extract_pattern(black_box(key)));
            }
        })
    });
}

criterion_group!(benches, bench_merge_and_rank, bench_extract_pattern);
criterion_main!(benches);
