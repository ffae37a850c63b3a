//! Experiment configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::data::PixelRangePolicy;
use crate::error::{FerError, Result};
use crate::evaluation::ReportScope;
use crate::training::{MlpConfig, ModelKind, NaiveBayesConfig, SvcConfig};

/// Configuration for one benchmark run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Training pool CSV
    pub train_path: PathBuf,

    /// Fixed external evaluation CSV
    pub eval_path: PathBuf,

    /// Fraction of the training pool kept for the run
    pub sample_fraction: f64,

    /// Fraction of the sampled pool held out as internal test set
    pub test_fraction: f64,

    /// Seed for sampling and splitting
    pub seed: u64,

    /// Handling of intensities outside 0..=255
    pub pixel_range: PixelRangePolicy,

    /// Which classes appear in classification reports
    pub report_scope: ReportScope,

    /// Models to train, in report order
    pub models: Vec<ModelKind>,

    /// Train the model pipelines concurrently
    pub parallel_models: bool,

    pub naive_bayes: NaiveBayesConfig,
    pub svc: SvcConfig,
    pub mlp: MlpConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            train_path: PathBuf::from("datasets/fer2013/train.csv"),
            eval_path: PathBuf::from("datasets/fer2013/our_test.csv"),
            sample_fraction: 0.1,
            test_fraction: 0.4,
            seed: 46,
            pixel_range: PixelRangePolicy::Reject,
            report_scope: ReportScope::PredictedLabels,
            models: ModelKind::ALL.to_vec(),
            parallel_models: false,
            naive_bayes: NaiveBayesConfig::default(),
            svc: SvcConfig::default(),
            mlp: MlpConfig::default(),
        }
    }
}

impl ExperimentConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a JSON configuration file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| FerError::data_access(path, e))?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_train_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.train_path = path.into();
        self
    }

    pub fn with_eval_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.eval_path = path.into();
        self
    }

    pub fn with_sample_fraction(mut self, fraction: f64) -> Self {
        self.sample_fraction = fraction;
        self
    }

    pub fn with_test_fraction(mut self, fraction: f64) -> Self {
        self.test_fraction = fraction;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_pixel_range(mut self, policy: PixelRangePolicy) -> Self {
        self.pixel_range = policy;
        self
    }

    pub fn with_report_scope(mut self, scope: ReportScope) -> Self {
        self.report_scope = scope;
        self
    }

    pub fn with_models(mut self, models: Vec<ModelKind>) -> Self {
        self.models = models;
        self
    }

    pub fn with_parallel_models(mut self, parallel: bool) -> Self {
        self.parallel_models = parallel;
        self
    }

    pub fn with_mlp(mut self, mlp: MlpConfig) -> Self {
        self.mlp = mlp;
        self
    }

    pub fn with_svc(mut self, svc: SvcConfig) -> Self {
        self.svc = svc;
        self
    }

    /// Reject settings no run could succeed with
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("sample_fraction", self.sample_fraction),
            ("test_fraction", self.test_fraction),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(FerError::Config(format!(
                    "{} must be in (0, 1], got {}",
                    name, value
                )));
            }
        }
        if self.models.is_empty() {
            return Err(FerError::Config("no models selected".to_string()));
        }
        self.naive_bayes.validate()?;
        self.svc.validate()?;
        self.mlp.validate()?;
        Ok(())
    }
}
