//! Benchmarks for the change / classify hot path

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use vegchange_algorithms::imagery::{band_difference, classify, normalized_difference, ClassifyParams};
use vegchange_core::{ChangeRaster, GeoTransform, Raster};

fn create_band(size: usize, base: f64) -> Raster<f64> {
    let mut r = Raster::new(size, size);
    r.set_transform(GeoTransform::new(0.0, size as f64, 1.0, -1.0));
    for row in 0..size {
        for col in 0..size {
            let v = base + ((row * 7 + col * 13) % 200) as f64 / 1000.0;
            r.set(row, col, v).unwrap();
        }
    }
    r
}

fn bench_ndre(c: &mut Criterion) {
    let mut group = c.benchmark_group("imagery/normalized_difference");
    for size in [256, 512, 1024, 2048] {
        let b8 = create_band(size, 0.30);
        let b5 = create_band(size, 0.12);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| normalized_difference(black_box(&b8), black_box(&b5)).unwrap())
        });
    }
    group.finish();
}

fn bench_change_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("imagery/change_classify");
    for size in [256, 512, 1024, 2048] {
        let before = create_band(size, 0.20);
        let after = create_band(size, 0.25);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let diff = band_difference(black_box(&before), black_box(&after)).unwrap();
                let change = ChangeRaster::new("NDRE1", diff, 30.0);
                classify(&change, ClassifyParams::default()).unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_ndre, bench_change_classify);
criterion_main!(benches);
