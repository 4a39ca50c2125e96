use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use house_rent::preprocessing::DataPreprocessor;
use house_rent::training::{
    rmse_cv_score, CrossValidator, GradientBoostingConfig, GradientBoostingRegressor, ModelPipeline,
};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;

fn create_regression_data(n_rows: usize, n_features: usize) -> (Array2<f64>, Array1<f64>) {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
    let x = Array2::from_shape_fn((n_rows, n_features), |_| rng.gen::<f64>() * 10.0);
    let y = x
        .rows()
        .into_iter()
        .map(|row| row.sum() + rng.gen::<f64>() * 0.1)
        .collect();
    (x, y)
}

fn create_listings(n_rows: usize) -> DataFrame {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(11);
    let cities = ["Kolkata", "Mumbai", "Bangalore", "Delhi", "Chennai", "Hyderabad"];

    let size: Vec<f64> = (0..n_rows).map(|_| rng.gen_range(300.0..3000.0)).collect();
    let bhk: Vec<i64> = (0..n_rows).map(|_| rng.gen_range(1..6)).collect();
    let city: Vec<&str> = (0..n_rows).map(|_| cities[rng.gen_range(0..cities.len())]).collect();

    df!("size" => size, "bhk" => bhk, "city" => city).unwrap()
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10); // Fewer samples for training benchmarks

    for n_rows in [1000, 5000].iter() {
        let (x, y) = create_regression_data(*n_rows, 10);

        group.bench_with_input(BenchmarkId::new("fit", n_rows), &(x, y), |b, (x, y)| {
            b.iter(|| {
                let config = GradientBoostingConfig::default().with_random_state(42);
                let mut model = GradientBoostingRegressor::new(config);
                model.fit(black_box(x), black_box(y)).unwrap()
            })
        });
    }

    let (x, y) = create_regression_data(2000, 10);
    let model = GradientBoostingRegressor::new(
        GradientBoostingConfig::default().with_n_estimators(50).with_random_state(42),
    );
    group.bench_function("rmse_cv_5_fold", |b| {
        b.iter(|| rmse_cv_score(&model, black_box(&x), black_box(&y), &CrossValidator::k_fold(5)).unwrap())
    });

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("prediction");

    // Train pipeline once
    let train_df = create_listings(5000);
    let target: Array1<f64> = train_df
        .column("size")
        .unwrap()
        .f64()
        .unwrap()
        .into_no_null_iter()
        .map(|s| (s * 25.0).ln_1p())
        .collect();
    let mut pipeline = ModelPipeline::new(
        DataPreprocessor::new(),
        GradientBoostingConfig::default().with_random_state(42),
    );
    pipeline.fit(&train_df, &target).unwrap();

    for n_rows in [100, 1000, 10000].iter() {
        let test_df = create_listings(*n_rows);

        group.bench_with_input(BenchmarkId::new("predict", n_rows), &test_df, |b, df| {
            b.iter(|| pipeline.predict(black_box(df)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_training, bench_prediction);
criterion_main!(benches);
