//! Integration tests for seeded sampling and splitting

use fer_bench::data::{sample, split, take_labels, take_rows, Dataset, Emotion, Sample};
use fer_bench::FerError;
use ndarray::Array2;
use std::collections::HashSet;

fn dataset(n: usize) -> Dataset {
    Dataset::new(
        (0..n)
            .map(|i| Sample::new(i, Emotion::ALL[i % Emotion::COUNT], format!("{}", i % 256)))
            .collect(),
    )
}

fn rows(ds: &Dataset) -> Vec<usize> {
    ds.samples().iter().map(|s| s.row).collect()
}

#[test]
fn test_same_seed_same_sample() {
    let ds = dataset(500);
    let a = sample(&ds, 0.1, 46).unwrap();
    let b = sample(&ds, 0.1, 46).unwrap();
    assert_eq!(rows(&a), rows(&b));
    assert_eq!(a.len(), 50);
}

#[test]
fn test_different_seed_different_sample() {
    let ds = dataset(500);
    let a = sample(&ds, 0.1, 46).unwrap();
    let b = sample(&ds, 0.1, 47).unwrap();
    assert_ne!(rows(&a), rows(&b));
}

#[test]
fn test_sample_has_no_duplicates() {
    let ds = dataset(200);
    let picked = rows(&sample(&ds, 0.5, 3).unwrap());
    let unique: HashSet<_> = picked.iter().collect();
    assert_eq!(unique.len(), picked.len());
}

#[test]
fn test_full_fraction_keeps_every_row() {
    let ds = dataset(30);
    let mut picked = rows(&sample(&ds, 1.0, 9).unwrap());
    picked.sort();
    assert_eq!(picked, (0..30).collect::<Vec<_>>());
}

#[test]
fn test_sample_too_small() {
    let ds = dataset(3);
    assert!(matches!(sample(&ds, 0.1, 46), Err(FerError::Config(_))));
    assert!(sample(&Dataset::default(), 0.5, 46).is_err());
}

#[test]
fn test_split_partition() {
    for n in [5, 10, 37, 100] {
        let s = split(n, 0.4, 46).unwrap();
        let expected_test = (0.4 * n as f64).ceil() as usize;
        assert_eq!(s.n_test(), expected_test, "n = {}", n);
        assert_eq!(s.n_train() + s.n_test(), n);

        let train: HashSet<_> = s.train.iter().collect();
        let test: HashSet<_> = s.test.iter().collect();
        assert!(train.is_disjoint(&test));

        let mut all: Vec<usize> = s.train.iter().chain(&s.test).copied().collect();
        all.sort();
        assert_eq!(all, (0..n).collect::<Vec<_>>());
    }
}

#[test]
fn test_split_is_reproducible() {
    assert_eq!(split(60, 0.4, 46).unwrap(), split(60, 0.4, 46).unwrap());
    assert_ne!(split(60, 0.4, 46).unwrap(), split(60, 0.4, 1).unwrap());
}

#[test]
fn test_split_rejects_empty_side() {
    assert!(split(1, 0.4, 46).is_err());
    assert!(split(10, 1.0, 46).is_err());
    assert!(split(10, 0.0, 46).is_err());
}

#[test]
fn test_take_rows_and_labels_align() {
    let x = Array2::from_shape_fn((6, 2), |(i, j)| (i * 10 + j) as f64);
    let y: Vec<Emotion> = (0..6).map(|i| Emotion::ALL[i]).collect();
    let s = split(6, 0.5, 11).unwrap();

    let x_test = take_rows(&x, &s.test);
    let y_test = take_labels(&y, &s.test);
    for (k, &i) in s.test.iter().enumerate() {
        assert_eq!(x_test[[k, 0]], (i * 10) as f64);
        assert_eq!(y_test[k], Emotion::ALL[i]);
    }
}
