use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{rngs::StdRng, Rng, SeedableRng};

use imreg_geometry::{ransac, Affine2, Homography, RansacParams};

fn correspondences(n: usize, outlier_ratio: f64) -> (Vec<[f64; 2]>, Vec<[f64; 2]>) {
    let mut rng = StdRng::seed_from_u64(0);
    let affine = Affine2::new([[0.98, -0.17, 12.0], [0.17, 0.98, -6.0]]);

    (0..n)
        .map(|_| {
            let p = [rng.random_range(0.0..640.0), rng.random_range(0.0..480.0)];
            let mut q = affine.transform_point(&p);
            if rng.random_bool(outlier_ratio) {
                q[0] += rng.random_range(-100.0..100.0);
                q[1] += rng.random_range(-100.0..100.0);
            }
            (p, q)
        })
        .unzip()
}

fn bench_ransac(c: &mut Criterion) {
    let mut group = c.benchmark_group("Ransac");

    for n in [100, 1000] {
        let (src, dst) = correspondences(n, 0.3);

        group.bench_with_input(BenchmarkId::new("affine", n), &(&src, &dst), |b, i| {
            b.iter(|| {
                let mut rng = StdRng::seed_from_u64(0);
                black_box(ransac::<Affine2, _>(
                    i.0,
                    i.1,
                    &RansacParams::default(),
                    &mut rng,
                ))
            })
        });

        let params = RansacParams::default().with_threshold(3.0);
        group.bench_with_input(BenchmarkId::new("homography", n), &(&src, &dst), |b, i| {
            b.iter(|| {
                let mut rng = StdRng::seed_from_u64(0);
                black_box(ransac::<Homography, _>(i.0, i.1, &params, &mut rng))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_ransac);
criterion_main!(benches);
