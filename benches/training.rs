use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fer_bench::data::{Dataset, Emotion, FeatureExtractor, Sample, N_PIXELS};
use fer_bench::evaluation::evaluate;
use fer_bench::training::{Classifier, GaussianNaiveBayes, LinearSvc, MlpClassifier, MlpConfig};
use ndarray::Array2;
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;

fn create_faces(n_rows: usize) -> (Array2<f64>, Vec<Emotion>) {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
    let x = Array2::from_shape_fn((n_rows, N_PIXELS), |_| rng.gen::<f64>());
    let y = (0..n_rows).map(|i| Emotion::ALL[i % Emotion::COUNT]).collect();
    (x, y)
}

fn create_dataset(n_rows: usize) -> Dataset {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
    Dataset::new(
        (0..n_rows)
            .map(|i| {
                let pixels: Vec<String> = (0..N_PIXELS).map(|_| rng.gen_range(0..256).to_string()).collect();
                Sample::new(i, Emotion::ALL[i % Emotion::COUNT], pixels.join(" "))
            })
            .collect(),
    )
}

fn bench_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("extraction");
    let extractor = FeatureExtractor::new();

    for n_rows in [100, 1000].iter() {
        let dataset = create_dataset(*n_rows);
        group.bench_with_input(BenchmarkId::new("extract_batch", n_rows), &dataset, |b, ds| {
            b.iter(|| extractor.extract_batch(black_box(ds)).unwrap())
        });
    }

    group.finish();
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10); // Fewer samples for training benchmarks

    for n_rows in [200, 500].iter() {
        let (x, y) = create_faces(*n_rows);

        group.bench_with_input(BenchmarkId::new("naive_bayes", n_rows), &(&x, &y), |b, (x, y)| {
            b.iter(|| {
                let mut model = GaussianNaiveBayes::default();
                model.fit(black_box(x), y).unwrap()
            })
        });

        group.bench_with_input(BenchmarkId::new("linear_svc", n_rows), &(&x, &y), |b, (x, y)| {
            b.iter(|| {
                let mut model = LinearSvc::default();
                model.fit(black_box(x), y).unwrap()
            })
        });

        group.bench_with_input(BenchmarkId::new("mlp", n_rows), &(&x, &y), |b, (x, y)| {
            b.iter(|| {
                let mut model = MlpClassifier::new(MlpConfig {
                    max_iter: 50,
                    ..Default::default()
                });
                model.fit(black_box(x), y).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("prediction");

    // Train model once
    let (x_train, y_train) = create_faces(500);
    let mut model = GaussianNaiveBayes::default();
    model.fit(&x_train, &y_train).unwrap();

    for n_rows in [100, 1000].iter() {
        let (x, y) = create_faces(*n_rows);
        group.bench_with_input(BenchmarkId::new("predict_and_evaluate", n_rows), &x, |b, x| {
            b.iter(|| {
                let predicted = model.predict(black_box(x)).unwrap();
                evaluate(&predicted, &y).unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_extraction, bench_training, bench_prediction);
criterion_main!(benches);
