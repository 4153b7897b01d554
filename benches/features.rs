use std::hint::black_box;
use criterion::{criterion_group, criterion_main, Criterion};
use exg_embed::{
    embed, feature_matrix, filter::{apply_fir_zero_phase, design_bandpass},
    AnalysisConfig, SyntheticSource, TrialSource,
};
use ndarray::Array2;

fn bench_feature_matrix(c: &mut Criterion) {
    let set = SyntheticSource { n_trials: 100, n_channels: 8, n_samples: 1000, ..Default::default() }
        .load()
        .unwrap();
    let cfg = AnalysisConfig::default();
    c.bench_function("feature_matrix [100 × 8 × 1000]", |b| {
        b.iter(|| {
            let fm = feature_matrix(black_box(&set), &cfg).unwrap();
            black_box(fm.n_features())
        })
    });
}

fn bench_embed(c: &mut Criterion) {
    let set = SyntheticSource { n_trials: 100, n_channels: 4, n_samples: 1000, ..Default::default() }
        .load()
        .unwrap();
    let cfg = AnalysisConfig { tsne_iterations: 300, ..Default::default() };
    let fm = feature_matrix(&set, &cfg).unwrap();
    c.bench_function("embed 100 trials (300 iters)", |b| {
        b.iter(|| {
            let emb = embed(black_box(&fm), &cfg).unwrap();
            black_box(emb.points[[0, 0]])
        })
    });
}

fn bench_bandpass(c: &mut Criterion) {
    let h = design_bandpass(1.0, 40.0, 250.0).unwrap();
    let data = Array2::from_shape_fn((12, 15_000), |(ch, t)| ((ch * 31 + t) as f64 * 0.01).sin());
    c.bench_function("band-pass 1–40 Hz [12 × 15000]", |b| {
        b.iter(|| {
            let mut x = data.clone();
            apply_fir_zero_phase(&mut x, black_box(&h)).unwrap();
            black_box(x[[0, 0]])
        })
    });
}

criterion_group!(benches, bench_feature_matrix, bench_embed, bench_bandpass);
criterion_main!(benches);
