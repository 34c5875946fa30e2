//! Benchmarks for sharded nearest-neighbor search and ratio-margin mining.
//!
//! Tile size trades peak memory against per-tile overhead; these benchmarks
//! show where the overhead starts to matter.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::prelude::*;
use xmover::{knn_sharded, ratio_margin_align, EmbeddingMatrix, Similarity};

// === Generators ===

fn random_matrix(n: usize, dim: usize, seed: u64) -> EmbeddingMatrix {
    let mut rng = StdRng::seed_from_u64(seed);
    let data: Vec<f32> = (0..n * dim)
        .map(|_| rng.random::<f32>() * 2.0 - 1.0)
        .collect();
    EmbeddingMatrix::from_flat(data, dim).unwrap()
}

// === Benchmarks ===

fn bench_tile_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("knn_tile_size");
    let source = random_matrix(1000, 384, 1);
    let target = random_matrix(1000, 384, 2);
    group.throughput(Throughput::Elements((source.rows() * target.rows()) as u64));

    for tile in [64, 256, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(tile), &tile, |bench, &tile| {
            bench.iter(|| {
                knn_sharded(
                    black_box(&source),
                    black_box(&target),
                    20,
                    tile,
                    Similarity::Cosine,
                )
            });
        });
    }

    group.finish();
}

fn bench_metrics(c: &mut Criterion) {
    let mut group = c.benchmark_group("knn_metric");
    let source = random_matrix(500, 768, 3);
    let target = random_matrix(2000, 768, 4);

    for (name, metric) in [
        ("inner_product", Similarity::InnerProduct),
        ("cosine", Similarity::Cosine),
        ("negative_l2", Similarity::NegativeL2),
    ] {
        group.bench_function(name, |bench| {
            bench.iter(|| knn_sharded(black_box(&source), black_box(&target), 20, 500, metric));
        });
    }

    group.finish();
}

fn bench_ratio_margin(c: &mut Criterion) {
    let mut group = c.benchmark_group("ratio_margin");

    for n in [100, 1000] {
        let source = random_matrix(n, 384, 5);
        let target = random_matrix(n, 384, 6);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |bench, _| {
            bench.iter(|| ratio_margin_align(black_box(&source), black_box(&target), 4, 256));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_tile_sizes, bench_metrics, bench_ratio_margin);
criterion_main!(benches);
