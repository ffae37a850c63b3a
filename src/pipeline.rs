//! Experiment runner
//!
//! Loads both datasets, samples and splits the training pool, then fits
//! each configured model and evaluates it on the internal test split and on
//! the external evaluation set.

use ndarray::Array2;
use rayon::prelude::*;
use serde::Serialize;
use std::time::Instant;
use tracing::{info, warn};

use crate::config::ExperimentConfig;
use crate::data::{
    sample, split, take_labels, take_rows, Dataset, DatasetLoader, DatasetSummary, Emotion,
    FeatureExtractor, SplitIndices,
};
use crate::error::Result;
use crate::evaluation::{evaluate_with_scope, EvaluationReport};
use crate::training::{Classifier, ModelKind};

/// Feature matrices ready for training and evaluation
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub train_summary: DatasetSummary,
    pub eval_summary: DatasetSummary,
    /// Sampled training pool, rows in draw order
    pub pool: Dataset,
    /// Features of `pool`
    pub x_pool: Array2<f64>,
    pub y_pool: Vec<Emotion>,
    pub split: SplitIndices,
    pub x_train: Array2<f64>,
    pub y_train: Vec<Emotion>,
    pub x_test: Array2<f64>,
    pub y_test: Vec<Emotion>,
    pub x_eval: Array2<f64>,
    pub y_eval: Vec<Emotion>,
}

impl PreparedData {
    pub fn n_features(&self) -> usize {
        self.x_pool.ncols()
    }
}

/// What happened to one model pipeline
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModelOutcome {
    Completed {
        /// Held-out split of the sampled pool
        internal: EvaluationReport,
        /// External evaluation file
        external: EvaluationReport,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelResult {
    pub kind: ModelKind,
    pub name: String,
    pub outcome: ModelOutcome,
    pub training_time_secs: f64,
}

impl ModelResult {
    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, ModelOutcome::Completed { .. })
    }
}

/// Everything a run produced, in report order
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentSummary {
    pub train: DatasetSummary,
    pub eval: DatasetSummary,
    pub n_sampled: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub n_features: usize,
    pub seed: u64,
    pub results: Vec<ModelResult>,
}

/// One benchmark run over a fixed configuration
#[derive(Debug, Clone)]
pub struct Experiment {
    config: ExperimentConfig,
}

impl Experiment {
    pub fn new(config: ExperimentConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Load, sample, extract and split
    pub fn prepare(&self) -> Result<PreparedData> {
        self.config.validate()?;
        let loader = DatasetLoader::new();
        let train = loader.load(&self.config.train_path)?;
        let eval = loader.load(&self.config.eval_path)?;
        self.prepare_from(&train, &eval)
    }

    /// Same as [`Self::prepare`] for datasets already in memory
    pub fn prepare_from(&self, train: &Dataset, eval: &Dataset) -> Result<PreparedData> {
        let extractor = FeatureExtractor::new().with_range_policy(self.config.pixel_range);

        let pool = sample(train, self.config.sample_fraction, self.config.seed)?;
        let (x_pool, y_pool) = extractor.extract_batch(&pool)?;
        let (x_eval, y_eval) = extractor.extract_batch(eval)?;

        let split = split(pool.len(), self.config.test_fraction, self.config.seed)?;
        let x_train = take_rows(&x_pool, &split.train);
        let y_train = take_labels(&y_pool, &split.train);
        let x_test = take_rows(&x_pool, &split.test);
        let y_test = take_labels(&y_pool, &split.test);

        info!(
            sampled = pool.len(),
            train = split.n_train(),
            test = split.n_test(),
            eval = eval.len(),
            features = x_pool.ncols(),
            "Data prepared"
        );

        Ok(PreparedData {
            train_summary: DatasetSummary::of(train),
            eval_summary: DatasetSummary::of(eval),
            pool,
            x_pool,
            y_pool,
            split,
            x_train,
            y_train,
            x_test,
            y_test,
            x_eval,
            y_eval,
        })
    }

    /// Full run from the configured files
    pub fn run(&self) -> Result<ExperimentSummary> {
        let data = self.prepare()?;
        let results = self.run_models(&data)?;
        Ok(self.summarize(&data, results))
    }

    pub fn summarize(&self, data: &PreparedData, results: Vec<ModelResult>) -> ExperimentSummary {
        ExperimentSummary {
            train: data.train_summary.clone(),
            eval: data.eval_summary.clone(),
            n_sampled: data.pool.len(),
            n_train: data.split.n_train(),
            n_test: data.split.n_test(),
            n_features: data.n_features(),
            seed: self.config.seed,
            results,
        }
    }

    /// Fit and evaluate every configured model, results in configured order
    pub fn run_models(&self, data: &PreparedData) -> Result<Vec<ModelResult>> {
        if self.config.parallel_models {
            self.config
                .models
                .par_iter()
                .map(|&kind| self.run_model(kind, data))
                .collect()
        } else {
            self.config
                .models
                .iter()
                .map(|&kind| self.run_model(kind, data))
                .collect()
        }
    }

    /// Fit and evaluate one model.
    ///
    /// Training and inference failures are recorded in the result; any other
    /// error aborts the run.
    pub fn run_model(&self, kind: ModelKind, data: &PreparedData) -> Result<ModelResult> {
        let start = Instant::now();
        let mut model = kind.build(&self.config);
        let name = model.name().to_string();
        info!(model = %name, rows = data.x_train.nrows(), "Training model");

        let outcome = match fit_and_predict(model.as_mut(), data) {
            Ok((internal, external)) => {
                let scope = self.config.report_scope;
                ModelOutcome::Completed {
                    internal: evaluate_with_scope(&internal, &data.y_test, scope)?,
                    external: evaluate_with_scope(&external, &data.y_eval, scope)?,
                }
            }
            Err(e) if e.is_model_scoped() => {
                warn!(model = %name, error = %e, "Model pipeline failed");
                ModelOutcome::Failed {
                    error: e.to_string(),
                }
            }
            Err(e) => return Err(e),
        };

        let training_time_secs = start.elapsed().as_secs_f64();
        info!(model = %name, secs = training_time_secs, "Model finished");

        Ok(ModelResult {
            kind,
            name,
            outcome,
            training_time_secs,
        })
    }
}

fn fit_and_predict(
    model: &mut dyn Classifier,
    data: &PreparedData,
) -> Result<(Vec<Emotion>, Vec<Emotion>)> {
    model.fit(&data.x_train, &data.y_train)?;
    let internal = model.predict(&data.x_test)?;
    let external = model.predict(&data.x_eval)?;
    Ok((internal, external))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Sample, N_PIXELS};

    /// Bright faces are Happy, dark faces are Sad
    fn synthetic(n: usize, offset: usize) -> Dataset {
        Dataset::new(
            (0..n)
                .map(|i| {
                    let happy = (i + offset) % 2 == 0;
                    let base = if happy { 200 } else { 40 };
                    let value = base + (i * 7 % 30);
                    let pixels = vec![value.to_string(); N_PIXELS].join(" ");
                    let label = if happy { Emotion::Happy } else { Emotion::Sad };
                    Sample::new(i, label, pixels)
                })
                .collect(),
        )
    }

    #[test]
    fn test_prepare_shapes() {
        let config = ExperimentConfig::new().with_sample_fraction(0.5);
        let exp = Experiment::new(config);
        let data = exp.prepare_from(&synthetic(40, 0), &synthetic(10, 1)).unwrap();

        assert_eq!(data.pool.len(), 20);
        assert_eq!(data.x_test.nrows(), 8);
        assert_eq!(data.x_train.nrows(), 12);
        assert_eq!(data.x_eval.nrows(), 10);
        assert_eq!(data.n_features(), N_PIXELS);
    }

    #[test]
    fn test_naive_bayes_run() {
        let config = ExperimentConfig::new()
            .with_sample_fraction(1.0)
            .with_models(vec![ModelKind::NaiveBayes]);
        let exp = Experiment::new(config);
        let data = exp.prepare_from(&synthetic(30, 0), &synthetic(10, 1)).unwrap();
        let results = exp.run_models(&data).unwrap();

        assert_eq!(results.len(), 1);
        match &results[0].outcome {
            ModelOutcome::Completed { internal, external } => {
                assert_eq!(internal.n_samples, data.y_test.len());
                assert!(external.overall_accuracy() > 0.9);
            }
            ModelOutcome::Failed { error } => panic!("unexpected failure: {}", error),
        }
    }

    #[test]
    fn test_single_class_training_is_isolated() {
        let mut train = synthetic(20, 0);
        train = Dataset::new(
            train
                .samples()
                .iter()
                .cloned()
                .map(|mut s| {
                    s.label = Emotion::Happy;
                    s
                })
                .collect(),
        );
        let config = ExperimentConfig::new()
            .with_sample_fraction(1.0)
            .with_models(vec![ModelKind::NaiveBayes, ModelKind::LinearSvm]);
        let exp = Experiment::new(config);
        let data = exp.prepare_from(&train, &synthetic(4, 0)).unwrap();
        let results = exp.run_models(&data).unwrap();

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| !r.is_completed()));
        assert_eq!(results[0].kind, ModelKind::NaiveBayes);
        assert_eq!(results[1].kind, ModelKind::LinearSvm);
    }
}
