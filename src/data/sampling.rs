//! Seeded subsampling and train/test splitting

use ndarray::{Array2, Axis};
use rand::seq::index;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Dataset, Emotion};
use crate::error::{FerError, Result};

fn check_fraction(name: &str, fraction: f64) -> Result<()> {
    if !(fraction > 0.0 && fraction <= 1.0) {
        return Err(FerError::Config(format!(
            "{} must be in (0, 1], got {}",
            name, fraction
        )));
    }
    Ok(())
}

/// Draw `round(fraction * n)` rows without replacement, ties to even.
///
/// The same `seed` on the same input always selects the same rows in the
/// same order.
pub fn sample(dataset: &Dataset, fraction: f64, seed: u64) -> Result<Dataset> {
    check_fraction("sample fraction", fraction)?;

    let n = dataset.len();
    let n_draw = (fraction * n as f64).round_ties_even() as usize;
    if n_draw == 0 {
        return Err(FerError::Config(format!(
            "sample fraction {} of {} rows selects no rows",
            fraction, n
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let picked = index::sample(&mut rng, n, n_draw).into_vec();

    debug!(rows = n, drawn = n_draw, seed, "Sampled dataset");
    Ok(dataset.select(&picked))
}

/// Disjoint train/test row indices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl SplitIndices {
    pub fn n_train(&self) -> usize {
        self.train.len()
    }

    pub fn n_test(&self) -> usize {
        self.test.len()
    }
}

/// Shuffle `0..n` with `seed` and cut off `ceil(test_fraction * n)` test rows.
///
/// Both sides must end up non-empty.
pub fn split(n_samples: usize, test_fraction: f64, seed: u64) -> Result<SplitIndices> {
    check_fraction("test fraction", test_fraction)?;

    let n_test = (test_fraction * n_samples as f64).ceil() as usize;
    if n_test == 0 || n_test >= n_samples {
        return Err(FerError::Config(format!(
            "test fraction {} of {} rows leaves an empty train or test set",
            test_fraction, n_samples
        )));
    }

    let mut indices: Vec<usize> = (0..n_samples).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_test);
    let test = indices;

    debug!(n_train = train.len(), n_test = test.len(), seed, "Split rows");
    Ok(SplitIndices { train, test })
}

/// Copy the rows at `indices` into a new matrix
pub fn take_rows(x: &Array2<f64>, indices: &[usize]) -> Array2<f64> {
    x.select(Axis(0), indices)
}

/// Labels at `indices`
pub fn take_labels(y: &[Emotion], indices: &[usize]) -> Vec<Emotion> {
    indices.iter().map(|&i| y[i]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Sample;

    fn dataset(n: usize) -> Dataset {
        Dataset::new(
            (0..n)
                .map(|i| Sample::new(i, Emotion::ALL[i % 7], i.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_sample_size_rounds() {
        let ds = dataset(25);
        // Halves go to the even neighbour
        assert_eq!(sample(&ds, 0.1, 46).unwrap().len(), 2);
        assert_eq!(sample(&dataset(45), 0.1, 46).unwrap().len(), 4);
        assert_eq!(sample(&dataset(5), 0.5, 46).unwrap().len(), 2);
        assert_eq!(sample(&dataset(35), 0.1, 46).unwrap().len(), 4);
        assert_eq!(sample(&dataset(27), 0.1, 46).unwrap().len(), 3);
        assert_eq!(sample(&ds, 1.0, 46).unwrap().len(), 25);
    }

    #[test]
    fn test_sample_rejects_bad_fraction() {
        let ds = dataset(10);
        assert!(sample(&ds, 0.0, 1).is_err());
        assert!(sample(&ds, 1.5, 1).is_err());
        assert!(sample(&ds, 0.01, 1).is_err());
    }

    #[test]
    fn test_split_sizes() {
        let s = split(10, 0.4, 46).unwrap();
        assert_eq!(s.n_test(), 4);
        assert_eq!(s.n_train(), 6);

        let s = split(11, 0.4, 46).unwrap();
        assert_eq!(s.n_test(), 5); // ceil(4.4)
    }

    #[test]
    fn test_split_degenerate() {
        assert!(split(1, 0.4, 0).is_err());
        assert!(split(5, 1.0, 0).is_err());
    }

    #[test]
    fn test_take_rows() {
        let x = Array2::from_shape_vec((3, 2), vec![0.0, 0.1, 1.0, 1.1, 2.0, 2.1]).unwrap();
        let picked = take_rows(&x, &[2, 0]);
        assert_eq!(picked.row(0).to_vec(), vec![2.0, 2.1]);
        assert_eq!(picked.row(1).to_vec(), vec![0.0, 0.1]);
    }
}
