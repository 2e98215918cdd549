use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use pkforecast::prelude::model::fit_robust;
use pkforecast::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::hint::black_box;

fn decay(t: f64) -> f64 {
    100.0 * t.powi(-2) - 350.0 * t.ln() + 1800.0 * (1.0 - (-t).exp())
}

/// Build a population of n patients with 6 noisy samples each
fn build_population(n: usize) -> Data {
    let mut rng = StdRng::seed_from_u64(11);
    let noise = Normal::new(0.0, 25.0).unwrap();
    let patients: Vec<Patient> = (0..n)
        .map(|i| {
            let mut builder = Patient::builder(format!("subj_{}", i)).demographics(
                (i % 2) as f64,
                25.0 + (i % 50) as f64,
                50.0 + (i % 40) as f64,
            );
            for t in [1.0, 2.0, 4.0, 8.0, 12.0, 24.0] {
                builder = builder.measurement(t, decay(t) + noise.sample(&mut rng), 400.0);
            }
            builder.build()
        })
        .collect();
    Data::new(patients)
}

fn bench_ransac(c: &mut Criterion) {
    let data = build_population(50);
    let times = data.times();
    let conc = data.concentrations();
    let options = RansacOptions::default()
        .with_threshold(100.0)
        .with_trials(10_000)
        .with_seed(1);

    c.bench_function("ransac_300_samples_10k_trials", |b| {
        b.iter(|| {
            let fit = fit_robust(black_box(&times), black_box(&conc), &options, &mut options.rng());
            black_box(fit)
        });
    });
}

fn bench_train(c: &mut Criterion) {
    let mut group = c.benchmark_group("kernel_train");
    for n in [10, 25, 50] {
        let data = build_population(n);
        let rows = data.covariate_rows();
        let targets = data.concentrations();
        group.bench_with_input(BenchmarkId::from_parameter(n * 6), &n, |b, _| {
            b.iter(|| {
                let model = RegressionModel::train(
                    black_box(&rows),
                    black_box(&targets),
                    KernelParams::default(),
                );
                black_box(model)
            });
        });
    }
    group.finish();
}

fn bench_update(c: &mut Criterion) {
    let data = build_population(50);
    let model = RegressionModel::train(
        &data.covariate_rows(),
        &data.concentrations(),
        KernelParams::default(),
    )
    .unwrap();
    let sample = Sample {
        time: 6.0,
        concentration: decay(6.0),
        dose: 500.0,
        sex: 1.0,
        age: 61.0,
        weight: 77.0,
    };

    c.bench_function("support_update_300_rows", |b| {
        b.iter_batched(
            || model.clone(),
            |mut m| black_box(m.update(black_box(&sample))),
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_ransac, bench_train, bench_update);
criterion_main!(benches);
