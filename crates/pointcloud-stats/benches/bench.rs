use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use pointcloud_stats::{RunningPercentileEstimator, classify};
use rand::{Rng, SeedableRng, rngs::StdRng};

// Points per simulated chunk; matches the default client chunk size.
const CHUNK_SIZE: usize = 100;

fn bench_observe(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let values: Vec<f64> = (0..CHUNK_SIZE).map(|_| rng.random_range(-50.0..50.0)).collect();

    let mut group = c.benchmark_group("estimator/observe");
    group.throughput(Throughput::Elements(CHUNK_SIZE as u64));
    group.bench_function(format!("elems/{CHUNK_SIZE}"), |b| {
        b.iter(|| {
            let mut est = RunningPercentileEstimator::with_capacity(CHUNK_SIZE);
            for &v in &values {
                est.observe(black_box(v));
            }
            est
        });
    });
    group.finish();
}

/// One full session at a given chunk count: observe a chunk, recompute the
/// thresholds once, classify every point in the chunk.
fn bench_chunk_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("estimator/chunk_pipeline");

    for chunks in [1usize, 16, 64] {
        let total = chunks * CHUNK_SIZE;
        let mut rng = StdRng::seed_from_u64(42);
        let values: Vec<f64> = (0..total).map(|_| rng.random_range(-50.0..50.0)).collect();

        group.throughput(Throughput::Elements(total as u64));
        group.bench_function(format!("chunks/{chunks}"), |b| {
            b.iter(|| {
                let mut est = RunningPercentileEstimator::with_capacity(total);
                let mut labeled = 0usize;
                for chunk in values.chunks(CHUNK_SIZE) {
                    for &v in chunk {
                        est.observe(v);
                    }
                    let thresholds = est.thresholds(90.0, 10.0).unwrap();
                    for &v in chunk {
                        black_box(classify(v, &thresholds));
                        labeled += 1;
                    }
                }
                labeled
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_observe, bench_chunk_pipeline);
criterion_main!(benches);
