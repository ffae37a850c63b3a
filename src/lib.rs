//! fer-bench - Facial expression classification benchmark
//!
//! Trains three classic classifiers on 48x48 grayscale face images labelled
//! with one of seven emotions and reports how each performs:
//! - Gaussian Naive Bayes
//! - Linear Support Vector Classifier
//! - Multi-Layer Perceptron fitted with L-BFGS
//!
//! # Modules
//!
//! ## Data
//! - [`data`] - CSV loading, pixel feature extraction, sampling and splitting
//! - [`visualization`] - PNG preview grids of sample faces
//!
//! ## Models
//! - [`training`] - The [`training::Classifier`] trait and its implementations
//! - [`optimizer`] - L-BFGS minimiser used by the neural network
//! - [`evaluation`] - Confusion matrices and classification reports
//!
//! ## Running
//! - [`config`] - Experiment settings
//! - [`pipeline`] - End-to-end experiment runner
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;
pub mod config;

// Data
pub mod data;
pub mod visualization;

// Models
pub mod training;
pub mod optimizer;
pub mod evaluation;

// Running
pub mod pipeline;
pub mod cli;

pub use error::{FerError, Result};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::ExperimentConfig;
    pub use crate::data::{
        Dataset, DatasetLoader, Emotion, FeatureExtractor, PixelRangePolicy, Sample,
    };
    pub use crate::error::{FerError, Result};
    pub use crate::evaluation::{evaluate, evaluate_with_scope, EvaluationReport, ReportScope};
    pub use crate::pipeline::{Experiment, ExperimentSummary, ModelOutcome};
    pub use crate::training::{
        Classifier, GaussianNaiveBayes, LinearSvc, MlpClassifier, ModelKind,
    };
}
