//! Gaussian Naive Bayes classifier

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::debug;

use super::{argmax, validate_fit_input, validate_predict_input, Classifier};
use crate::data::Emotion;
use crate::error::{FerError, Result};

/// Naive Bayes settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NaiveBayesConfig {
    /// Fraction of the largest feature variance added to every variance
    pub var_smoothing: f64,
}

impl Default for NaiveBayesConfig {
    fn default() -> Self {
        Self { var_smoothing: 1e-9 }
    }
}

impl NaiveBayesConfig {
    pub fn validate(&self) -> crate::error::Result<()> {
        if !(self.var_smoothing >= 0.0) {
            return Err(FerError::Config(format!(
                "var_smoothing must be non-negative, got {}",
                self.var_smoothing
            )));
        }
        Ok(())
    }
}

/// Gaussian Naive Bayes Classifier
///
/// Each feature is modelled as an independent class-conditional normal
/// distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianNaiveBayes {
    config: NaiveBayesConfig,
    /// Classes seen during fit, sorted
    classes: Vec<Emotion>,
    /// Per-class feature means, one row per class
    means: Array2<f64>,
    /// Per-class feature variances (smoothed), one row per class
    variances: Array2<f64>,
    /// Log prior of each class
    log_priors: Vec<f64>,
    /// Absolute amount added to every variance
    epsilon: f64,
    n_features: usize,
    is_fitted: bool,
}

impl Default for GaussianNaiveBayes {
    fn default() -> Self {
        Self::new(NaiveBayesConfig::default())
    }
}

impl GaussianNaiveBayes {
    pub fn new(config: NaiveBayesConfig) -> Self {
        Self {
            config,
            classes: Vec::new(),
            means: Array2::zeros((0, 0)),
            variances: Array2::zeros((0, 0)),
            log_priors: Vec::new(),
            epsilon: 0.0,
            n_features: 0,
            is_fitted: false,
        }
    }

    /// Set variance smoothing parameter
    pub fn with_var_smoothing(mut self, smoothing: f64) -> Self {
        self.config.var_smoothing = smoothing;
        self
    }

    /// Fit the classifier
    fn fit_impl(&mut self, x: &Array2<f64>, y: &[Emotion]) -> Result<()> {
        let classes = validate_fit_input(x, y)?;
        let n_samples = x.nrows();
        let n_features = x.ncols();

        // Smoothing scales with the widest feature so constant pixels stay finite
        let max_var = x
            .var_axis(Axis(0), 0.0)
            .iter()
            .cloned()
            .fold(0.0_f64, f64::max);
        self.epsilon = self.config.var_smoothing * max_var;

        let mut means = Array2::zeros((classes.len(), n_features));
        let mut variances = Array2::zeros((classes.len(), n_features));
        let mut log_priors = Vec::with_capacity(classes.len());

        for (c, &class) in classes.iter().enumerate() {
            // Single-pass Welford's algorithm for mean and variance
            let mut mean = Array1::<f64>::zeros(n_features);
            let mut m2 = Array1::<f64>::zeros(n_features);
            let mut count = 0usize;

            for (row, _) in x.rows().into_iter().zip(y).filter(|(_, &label)| label == class) {
                count += 1;
                for j in 0..n_features {
                    let delta = row[j] - mean[j];
                    mean[j] += delta / count as f64;
                    m2[j] += delta * (row[j] - mean[j]);
                }
            }

            means.row_mut(c).assign(&mean);
            variances
                .row_mut(c)
                .assign(&m2.mapv(|v| v / count as f64 + self.epsilon));
            log_priors.push((count as f64 / n_samples as f64).ln());
        }

        self.classes = classes;
        self.means = means;
        self.variances = variances;
        self.log_priors = log_priors;
        self.n_features = n_features;
        self.is_fitted = true;

        debug!(
            classes = self.classes.len(),
            features = n_features,
            epsilon = self.epsilon,
            "Gaussian Naive Bayes fitted"
        );
        Ok(())
    }

    /// Joint log likelihood `log P(c) + log P(x | c)`, one column per class
    fn joint_log_likelihood(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut jll = Array2::zeros((x.nrows(), self.classes.len()));
        for (i, row) in x.rows().into_iter().enumerate() {
            for c in 0..self.classes.len() {
                jll[[i, c]] = self.log_priors[c] + self.log_likelihood(row, c);
            }
        }
        jll
    }

    fn log_likelihood(&self, x: ArrayView1<f64>, class_idx: usize) -> f64 {
        let means = self.means.row(class_idx);
        let vars = self.variances.row(class_idx);

        x.iter()
            .zip(means.iter())
            .zip(vars.iter())
            .map(|((&xi, &mean), &var)| {
                // Log of Gaussian PDF
                -0.5 * ((xi - mean).powi(2) / var + var.ln() + (2.0 * PI).ln())
            })
            .sum()
    }

    /// Normalised log probabilities, columns ordered as [`Self::classes`]
    pub fn predict_log_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        validate_predict_input(self.is_fitted, self.n_features, x)?;
        let mut log_probs = self.joint_log_likelihood(x);

        // Normalize (log-sum-exp trick)
        for mut row in log_probs.rows_mut() {
            let max_val = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let log_sum: f64 = row.iter().map(|&v| (v - max_val).exp()).sum::<f64>().ln();
            for val in row.iter_mut() {
                *val = *val - max_val - log_sum;
            }
        }

        Ok(log_probs)
    }

    /// Predict probabilities
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        Ok(self.predict_log_proba(x)?.mapv(f64::exp))
    }

    /// Classes in column order of the probability outputs
    pub fn classes(&self) -> &[Emotion] {
        &self.classes
    }

    /// Get class priors
    pub fn class_priors(&self) -> Vec<(Emotion, f64)> {
        self.classes
            .iter()
            .zip(&self.log_priors)
            .map(|(&c, &lp)| (c, lp.exp()))
            .collect()
    }
}

impl Classifier for GaussianNaiveBayes {
    fn name(&self) -> &str {
        "Gaussian Naive Bayes"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &[Emotion]) -> Result<()> {
        self.fit_impl(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<Emotion>> {
        validate_predict_input(self.is_fitted, self.n_features, x)?;
        let jll = self.joint_log_likelihood(x);
        Ok(jll
            .rows()
            .into_iter()
            .map(|row| self.classes[argmax(row.iter())])
            .collect())
    }

    fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}
