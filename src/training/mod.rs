//! Model training
//!
//! Three classifiers share the [`Classifier`] contract:
//! - Gaussian Naive Bayes
//! - Linear Support Vector Classifier (SMO, one-vs-rest)
//! - Multi-Layer Perceptron trained with L-BFGS

pub mod naive_bayes;
pub mod neural_network;
pub mod svm;

pub use naive_bayes::{GaussianNaiveBayes, NaiveBayesConfig};
pub use neural_network::{MlpClassifier, MlpConfig};
pub use svm::{LinearSvc, SvcConfig};

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::ExperimentConfig;
use crate::data::Emotion;
use crate::error::{FerError, Result};

/// Trait for the benchmark's classifiers
pub trait Classifier: Send + Sync {
    /// Short human-readable name
    fn name(&self) -> &str;

    /// Fit the model to `x` (one row per sample) and labels `y`
    fn fit(&mut self, x: &Array2<f64>, y: &[Emotion]) -> Result<()>;

    /// Predict one label per row of `x`
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<Emotion>>;

    /// Whether `fit` has completed
    fn is_fitted(&self) -> bool;
}

/// Check the shared `fit` preconditions and return the sorted distinct classes.
pub fn validate_fit_input(x: &Array2<f64>, y: &[Emotion]) -> Result<Vec<Emotion>> {
    if x.nrows() != y.len() {
        return Err(FerError::Training(format!(
            "feature rows ({}) and labels ({}) differ in length",
            x.nrows(),
            y.len()
        )));
    }
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(FerError::Training(format!(
            "empty training set ({} x {})",
            x.nrows(),
            x.ncols()
        )));
    }
    let classes = distinct_classes(y);
    if classes.len() < 2 {
        return Err(FerError::Training(format!(
            "at least 2 distinct classes are required, got {}",
            classes.len()
        )));
    }
    Ok(classes)
}

/// Check a fitted model can score `x`
pub fn validate_predict_input(fitted: bool, n_features: usize, x: &Array2<f64>) -> Result<()> {
    if !fitted {
        return Err(FerError::Inference("model not fitted".to_string()));
    }
    if x.ncols() != n_features {
        return Err(FerError::Inference(format!(
            "feature dimension mismatch: model trained on {}, got {}",
            n_features,
            x.ncols()
        )));
    }
    Ok(())
}

/// Sorted distinct labels
pub fn distinct_classes(y: &[Emotion]) -> Vec<Emotion> {
    let mut classes = y.to_vec();
    classes.sort();
    classes.dedup();
    classes
}

/// Index of the largest value, first one on ties
pub(crate) fn argmax<'a>(values: impl IntoIterator<Item = &'a f64>) -> usize {
    let mut best = 0;
    let mut best_val = f64::NEG_INFINITY;
    for (i, &v) in values.into_iter().enumerate() {
        if v > best_val {
            best_val = v;
            best = i;
        }
    }
    best
}

/// The three benchmarked algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    NaiveBayes,
    LinearSvm,
    NeuralNet,
}

impl ModelKind {
    /// Report order
    pub const ALL: [ModelKind; 3] = [ModelKind::NaiveBayes, ModelKind::LinearSvm, ModelKind::NeuralNet];

    /// Heading used in the printed reports
    pub fn title(self) -> &'static str {
        match self {
            ModelKind::NaiveBayes => "GAUSSIAN BAYES",
            ModelKind::LinearSvm => "SVC",
            ModelKind::NeuralNet => "NEURAL NETWORK",
        }
    }

    /// Build an unfitted classifier from the experiment settings
    pub fn build(self, config: &ExperimentConfig) -> Box<dyn Classifier> {
        match self {
            ModelKind::NaiveBayes => Box::new(GaussianNaiveBayes::new(config.naive_bayes.clone())),
            ModelKind::LinearSvm => Box::new(LinearSvc::new(config.svc.clone())),
            ModelKind::NeuralNet => Box::new(MlpClassifier::new(config.mlp.clone())),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

impl FromStr for ModelKind {
    type Err = FerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "nb" | "naive_bayes" | "gnb" | "bayes" => Ok(ModelKind::NaiveBayes),
            "svm" | "svc" | "linear_svm" => Ok(ModelKind::LinearSvm),
            "mlp" | "nn" | "neural_net" | "neural_network" => Ok(ModelKind::NeuralNet),
            other => Err(FerError::Config(format!("unknown model: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_fit_input() {
        let x = Array2::zeros((3, 2));
        let y = vec![Emotion::Sad, Emotion::Happy, Emotion::Sad];
        assert_eq!(
            validate_fit_input(&x, &y).unwrap(),
            vec![Emotion::Happy, Emotion::Sad]
        );

        assert!(validate_fit_input(&x, &y[..2]).is_err());
        assert!(validate_fit_input(&Array2::zeros((0, 2)), &[]).is_err());
        let single = vec![Emotion::Sad; 3];
        assert!(matches!(
            validate_fit_input(&x, &single),
            Err(FerError::Training(_))
        ));
    }

    #[test]
    fn test_validate_predict_input() {
        let x = Array2::zeros((1, 4));
        assert!(validate_predict_input(true, 4, &x).is_ok());
        assert!(matches!(
            validate_predict_input(true, 3, &x),
            Err(FerError::Inference(_))
        ));
        assert!(validate_predict_input(false, 4, &x).is_err());
    }

    #[test]
    fn test_model_kind_parse() {
        assert_eq!("svm".parse::<ModelKind>().unwrap(), ModelKind::LinearSvm);
        assert_eq!("MLP".parse::<ModelKind>().unwrap(), ModelKind::NeuralNet);
        assert!("forest".parse::<ModelKind>().is_err());
    }

    #[test]
    fn test_argmax_first_on_ties() {
        assert_eq!(argmax(&[1.0, 3.0, 3.0]), 1);
        assert_eq!(argmax(&[f64::NAN, -1.0]), 1);
    }
}
