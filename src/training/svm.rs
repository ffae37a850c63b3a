//! Linear Support Vector Classifier
//!
//! Trained with SMO (Sequential Minimal Optimization). More than two classes
//! are handled one-vs-rest; every binary problem shares one kernel matrix.

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{argmax, validate_fit_input, validate_predict_input, Classifier};
use crate::data::Emotion;
use crate::error::{FerError, Result};

/// Maximum number of samples for eager kernel matrix computation.
/// Beyond this, training will return an error to prevent OOM.
const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

/// SVC configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SvcConfig {
    /// Regularization parameter (C)
    pub c: f64,
    /// Tolerance for the KKT check
    pub tol: f64,
    /// Consecutive sweeps without an update before stopping
    pub max_passes: usize,
    /// Maximum number of sweeps over the training set
    pub max_iter: usize,
    /// Seed for partner selection
    pub random_state: u64,
}

impl Default for SvcConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            tol: 1e-3,
            max_passes: 5,
            max_iter: 1000,
            random_state: 46,
        }
    }
}

impl SvcConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.c > 0.0) {
            return Err(FerError::Config(format!("SVC C must be positive, got {}", self.c)));
        }
        if self.max_iter == 0 || self.max_passes == 0 {
            return Err(FerError::Config(
                "SVC max_iter and max_passes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Solution of one binary problem, collapsed to a hyperplane
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Hyperplane {
    weights: Array1<f64>,
    bias: f64,
    n_support: usize,
}

impl Hyperplane {
    fn score(&self, x: &Array2<f64>) -> Array1<f64> {
        x.dot(&self.weights) + self.bias
    }
}

/// Linear-kernel Support Vector Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearSvc {
    config: SvcConfig,
    /// Unique class labels
    classes: Vec<Emotion>,
    /// One hyperplane for binary problems, one per class otherwise
    planes: Vec<Hyperplane>,
    n_features: usize,
    is_fitted: bool,
}

impl Default for LinearSvc {
    fn default() -> Self {
        Self::new(SvcConfig::default())
    }
}

impl LinearSvc {
    /// Create a new SVM classifier
    pub fn new(config: SvcConfig) -> Self {
        Self {
            config,
            classes: Vec::new(),
            planes: Vec::new(),
            n_features: 0,
            is_fitted: false,
        }
    }

    fn fit_impl(&mut self, x: &Array2<f64>, y: &[Emotion]) -> Result<()> {
        let classes = validate_fit_input(x, y)?;
        let n = x.nrows();

        if n > MAX_KERNEL_MATRIX_SAMPLES {
            return Err(FerError::Training(format!(
                "dataset has {} samples, exceeding the maximum {} for the SVC kernel matrix; \
                 use a smaller sample fraction",
                n, MAX_KERNEL_MATRIX_SAMPLES
            )));
        }

        let kernel = linear_kernel(x)?;

        // Binary problems are solved once with classes[1] as the positive side
        let positives: Vec<Emotion> = if classes.len() == 2 {
            vec![classes[1]]
        } else {
            classes.clone()
        };

        let config = &self.config;
        let planes: Vec<Hyperplane> = positives
            .par_iter()
            .enumerate()
            .map(|(k, &positive)| {
                let y_binary: Array1<f64> = y
                    .iter()
                    .map(|&label| if label == positive { 1.0 } else { -1.0 })
                    .collect();
                let seed = config.random_state.wrapping_add(k as u64);
                let (alphas, bias) = smo_train(config, &kernel, &y_binary, seed);

                let coef = &alphas * &y_binary;
                let weights = x.t().dot(&coef);
                let n_support = alphas.iter().filter(|&&a| a > 1e-8).count();
                Hyperplane { weights, bias, n_support }
            })
            .collect();

        self.classes = classes;
        self.planes = planes;
        self.n_features = x.ncols();
        self.is_fitted = true;

        debug!(
            classes = self.classes.len(),
            support_vectors = self.n_support_vectors(),
            "Linear SVC fitted"
        );
        Ok(())
    }

    /// Decision scores, one column per hyperplane.
    ///
    /// Binary models have a single column (positive = second class);
    /// one-vs-rest models have one column per class.
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        validate_predict_input(self.is_fitted, self.n_features, x)?;
        let mut scores = Array2::zeros((x.nrows(), self.planes.len()));
        for (k, plane) in self.planes.iter().enumerate() {
            scores.column_mut(k).assign(&plane.score(x));
        }
        Ok(scores)
    }

    /// Total support vectors across all binary problems
    pub fn n_support_vectors(&self) -> usize {
        self.planes.iter().map(|p| p.n_support).sum()
    }

    pub fn classes(&self) -> &[Emotion] {
        &self.classes
    }
}

impl Classifier for LinearSvc {
    fn name(&self) -> &str {
        "Linear SVC"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &[Emotion]) -> Result<()> {
        self.fit_impl(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<Emotion>> {
        let scores = self.decision_function(x)?;

        if self.classes.len() == 2 {
            Ok(scores
                .column(0)
                .iter()
                .map(|&s| if s >= 0.0 { self.classes[1] } else { self.classes[0] })
                .collect())
        } else {
            Ok(scores
                .axis_iter(Axis(0))
                .map(|row| self.classes[argmax(row.iter())])
                .collect())
        }
    }

    fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}

/// Simplified SMO on a precomputed kernel matrix.
///
/// Returns the Lagrange multipliers and the bias.
/// Gram matrix `x xᵀ`, one row per rayon task
fn linear_kernel(x: &Array2<f64>) -> Result<Array2<f64>> {
    let n = x.nrows();
    let values: Vec<f64> = (0..n)
        .into_par_iter()
        .flat_map_iter(|i| {
            let xi = x.row(i);
            (0..n).map(move |j| xi.dot(&x.row(j)))
        })
        .collect();
    Ok(Array2::from_shape_vec((n, n), values)?)
}

fn smo_train(
    config: &SvcConfig,
    kernel: &Array2<f64>,
    y: &Array1<f64>,
    seed: u64,
) -> (Array1<f64>, f64) {
    let n = y.len();
    let c = config.c;
    let mut alphas = Array1::<f64>::zeros(n);
    let mut bias = 0.0;

    if n <= 1 {
        return (alphas, bias);
    }

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);

    // f(x_i) = sum_j alpha_j y_j K(j, i) + b
    let decision = |alphas: &Array1<f64>, bias: f64, idx: usize| -> f64 {
        let coef = alphas * y;
        coef.dot(&kernel.column(idx)) + bias
    };

    let mut passes = 0;
    let mut total_iter = 0;

    while passes < config.max_passes && total_iter < config.max_iter {
        let mut num_changed = 0;

        for i in 0..n {
            let e_i = decision(&alphas, bias, i) - y[i];

            // Check KKT conditions
            if (y[i] * e_i < -config.tol && alphas[i] < c) || (y[i] * e_i > config.tol && alphas[i] > 0.0) {
                let j = loop {
                    let j = rng.gen_range(0..n);
                    if j != i {
                        break j;
                    }
                };

                let e_j = decision(&alphas, bias, j) - y[j];

                let alpha_i_old = alphas[i];
                let alpha_j_old = alphas[j];

                let (l, h) = if y[i] != y[j] {
                    ((alphas[j] - alphas[i]).max(0.0), (c + alphas[j] - alphas[i]).min(c))
                } else {
                    ((alphas[i] + alphas[j] - c).max(0.0), (alphas[i] + alphas[j]).min(c))
                };

                if (l - h).abs() < 1e-10 {
                    continue;
                }

                let eta = 2.0 * kernel[[i, j]] - kernel[[i, i]] - kernel[[j, j]];
                if eta >= 0.0 {
                    continue;
                }

                alphas[j] = (alphas[j] - y[j] * (e_i - e_j) / eta).max(l).min(h);

                if (alphas[j] - alpha_j_old).abs() < 1e-5 {
                    continue;
                }

                alphas[i] += y[i] * y[j] * (alpha_j_old - alphas[j]);

                let b1 = bias
                    - e_i
                    - y[i] * (alphas[i] - alpha_i_old) * kernel[[i, i]]
                    - y[j] * (alphas[j] - alpha_j_old) * kernel[[i, j]];
                let b2 = bias
                    - e_j
                    - y[i] * (alphas[i] - alpha_i_old) * kernel[[i, j]]
                    - y[j] * (alphas[j] - alpha_j_old) * kernel[[j, j]];

                bias = if alphas[i] > 0.0 && alphas[i] < c {
                    b1
                } else if alphas[j] > 0.0 && alphas[j] < c {
                    b2
                } else {
                    (b1 + b2) / 2.0
                };

                num_changed += 1;
            }
        }

        total_iter += 1;
        if num_changed == 0 {
            passes += 1;
        } else {
            passes = 0;
        }
    }

    if total_iter >= config.max_iter {
        warn!(sweeps = total_iter, "SMO stopped at max_iter before converging");
    }

    (alphas, bias)
}
