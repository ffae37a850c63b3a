//! Neural Network (Multi-Layer Perceptron) classifier
//!
//! A small feedforward network with softmax output and cross-entropy loss.
//! All weights are packed into one parameter vector and fitted full-batch
//! with L-BFGS.

use ndarray::{s, Array1, Array2, ArrayView2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{argmax, validate_fit_input, validate_predict_input, Classifier};
use crate::data::Emotion;
use crate::error::{FerError, Result};
use crate::optimizer::{Lbfgs, StopReason};

/// Activation function for hidden layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// Rectified Linear Unit
    #[default]
    ReLU,
    /// Logistic sigmoid
    Logistic,
    /// Hyperbolic tangent
    Tanh,
    /// Identity
    Identity,
}

impl Activation {
    fn apply(self, z: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::ReLU => z.mapv(|v| v.max(0.0)),
            Activation::Logistic => z.mapv(|v| 1.0 / (1.0 + (-v).exp())),
            Activation::Tanh => z.mapv(f64::tanh),
            Activation::Identity => z.clone(),
        }
    }

    /// Derivative expressed through the activation output `a`
    fn derivative(self, a: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::ReLU => a.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
            Activation::Logistic => a.mapv(|v| v * (1.0 - v)),
            Activation::Tanh => a.mapv(|v| 1.0 - v * v),
            Activation::Identity => Array2::ones(a.raw_dim()),
        }
    }

    /// Glorot uniform bound factor
    fn init_factor(self) -> f64 {
        match self {
            Activation::Logistic => 2.0,
            _ => 6.0,
        }
    }
}

/// Neural Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MlpConfig {
    /// Hidden layer sizes
    pub hidden_layers: Vec<usize>,
    /// Activation function for hidden layers
    pub activation: Activation,
    /// L2 regularization
    pub alpha: f64,
    /// Maximum L-BFGS iterations
    pub max_iter: usize,
    /// Maximum loss evaluations
    pub max_fun: usize,
    /// Gradient tolerance
    pub tol: f64,
    /// Stored L-BFGS curvature pairs
    pub lbfgs_memory: usize,
    /// Weight initialisation seed
    pub random_state: u64,
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![5, 2],
            activation: Activation::ReLU,
            alpha: 1e-5,
            max_iter: 10_000,
            max_fun: 15_000,
            tol: 1e-4,
            lbfgs_memory: 10,
            random_state: 1,
        }
    }
}

impl MlpConfig {
    pub fn validate(&self) -> Result<()> {
        if self.hidden_layers.is_empty() || self.hidden_layers.contains(&0) {
            return Err(FerError::Config(format!(
                "hidden layer sizes must be non-empty and positive, got {:?}",
                self.hidden_layers
            )));
        }
        if !(self.alpha >= 0.0) {
            return Err(FerError::Config(format!("alpha must be non-negative, got {}", self.alpha)));
        }
        if self.max_iter == 0 || self.max_fun == 0 {
            return Err(FerError::Config("max_iter and max_fun must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Shapes of the packed parameter vector
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Layout {
    /// (fan_in, fan_out) per layer
    shapes: Vec<(usize, usize)>,
}

impl Layout {
    fn new(n_features: usize, hidden: &[usize], n_outputs: usize) -> Self {
        let mut sizes = vec![n_features];
        sizes.extend_from_slice(hidden);
        sizes.push(n_outputs);
        Self {
            shapes: sizes.windows(2).map(|w| (w[0], w[1])).collect(),
        }
    }

    fn n_params(&self) -> usize {
        self.shapes.iter().map(|(i, o)| i * o + o).sum()
    }

    /// Split a packed vector into (weights, biases) per layer
    fn unpack(&self, params: &Array1<f64>) -> (Vec<Array2<f64>>, Vec<Array1<f64>>) {
        let mut weights = Vec::with_capacity(self.shapes.len());
        let mut biases = Vec::with_capacity(self.shapes.len());
        let mut offset = 0;
        for &(n_in, n_out) in &self.shapes {
            let base = offset;
            weights.push(Array2::from_shape_fn((n_in, n_out), |(i, j)| {
                params[base + i * n_out + j]
            }));
            offset += n_in * n_out;
            biases.push(params.slice(s![offset..offset + n_out]).to_owned());
            offset += n_out;
        }
        (weights, biases)
    }

    fn pack(&self, weights: &[Array2<f64>], biases: &[Array1<f64>]) -> Array1<f64> {
        let mut flat = Vec::with_capacity(self.n_params());
        for (w, b) in weights.iter().zip(biases) {
            flat.extend(w.iter().copied());
            flat.extend(b.iter().copied());
        }
        Array1::from_vec(flat)
    }
}

/// Multi-Layer Perceptron Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlpClassifier {
    config: MlpConfig,
    weights: Vec<Array2<f64>>,
    biases: Vec<Array1<f64>>,
    classes: Vec<Emotion>,
    n_features: usize,
    n_iter: usize,
    loss: f64,
    converged: bool,
    is_fitted: bool,
}

impl Default for MlpClassifier {
    fn default() -> Self {
        Self::new(MlpConfig::default())
    }
}

impl MlpClassifier {
    pub fn new(config: MlpConfig) -> Self {
        Self {
            config,
            weights: Vec::new(),
            biases: Vec::new(),
            classes: Vec::new(),
            n_features: 0,
            n_iter: 0,
            loss: f64::NAN,
            converged: false,
            is_fitted: false,
        }
    }

    fn fit_impl(&mut self, x: &Array2<f64>, y: &[Emotion]) -> Result<()> {
        self.config.validate()?;
        let classes = validate_fit_input(x, y)?;
        let layout = Layout::new(x.ncols(), &self.config.hidden_layers, classes.len());

        let y_onehot = to_onehot(&classes, y);
        let x0 = self.initial_params(&layout);

        let lbfgs = Lbfgs::new()
            .with_memory(self.config.lbfgs_memory)
            .with_max_iter(self.config.max_iter)
            .with_max_evals(self.config.max_fun)
            .with_gtol(self.config.tol);

        let activation = self.config.activation;
        let alpha = self.config.alpha;
        let report = lbfgs.minimize(x0, |params| {
            loss_and_gradient(&layout, activation, alpha, params, x.view(), &y_onehot)
        })?;

        match report.stop {
            StopReason::MaxIterations | StopReason::MaxEvaluations => warn!(
                iterations = report.iterations,
                loss = report.loss,
                "MLP optimizer reached its limit without converging"
            ),
            StopReason::LineSearchFailed => warn!(
                iterations = report.iterations,
                loss = report.loss,
                "MLP line search failed; keeping last accepted weights"
            ),
            _ => {}
        }

        let (weights, biases) = layout.unpack(&report.params);
        self.weights = weights;
        self.biases = biases;
        self.classes = classes;
        self.n_features = x.ncols();
        self.n_iter = report.iterations;
        self.loss = report.loss;
        self.converged = report.converged();
        self.is_fitted = true;

        info!(
            iterations = self.n_iter,
            loss = self.loss,
            converged = self.converged,
            "MLP fitted"
        );
        Ok(())
    }

    /// Glorot-uniform weights and biases from the configured seed
    fn initial_params(&self, layout: &Layout) -> Array1<f64> {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);
        let factor = self.config.activation.init_factor();

        let mut weights = Vec::with_capacity(layout.shapes.len());
        let mut biases = Vec::with_capacity(layout.shapes.len());
        for &(n_in, n_out) in &layout.shapes {
            let bound = (factor / (n_in + n_out) as f64).sqrt();
            weights.push(Array2::from_shape_fn((n_in, n_out), |_| rng.gen_range(-bound..bound)));
            biases.push(Array1::from_shape_fn(n_out, |_| rng.gen_range(-bound..bound)));
        }
        layout.pack(&weights, &biases)
    }

    /// Predict class probabilities, columns ordered as [`Self::classes`]
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        validate_predict_input(self.is_fitted, self.n_features, x)?;
        let activations = forward(&self.weights, &self.biases, self.config.activation, x.view());
        let logits = activations.last().cloned().unwrap_or_else(|| Array2::zeros((0, 0)));
        Ok(softmax(&logits))
    }

    pub fn classes(&self) -> &[Emotion] {
        &self.classes
    }

    /// L-BFGS iterations used by the last fit
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Training loss at the end of the last fit
    pub fn loss(&self) -> f64 {
        self.loss
    }

    pub fn converged(&self) -> bool {
        self.converged
    }
}

impl Classifier for MlpClassifier {
    fn name(&self) -> &str {
        "MLP (L-BFGS)"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &[Emotion]) -> Result<()> {
        self.fit_impl(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<Emotion>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .rows()
            .into_iter()
            .map(|row| self.classes[argmax(row.iter())])
            .collect())
    }

    fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}

fn to_onehot(classes: &[Emotion], y: &[Emotion]) -> Array2<f64> {
    let mut onehot = Array2::zeros((y.len(), classes.len()));
    for (i, label) in y.iter().enumerate() {
        if let Ok(k) = classes.binary_search(label) {
            onehot[[i, k]] = 1.0;
        }
    }
    onehot
}

/// Layer outputs; the last entry holds the raw output logits
fn forward(
    weights: &[Array2<f64>],
    biases: &[Array1<f64>],
    activation: Activation,
    x: ArrayView2<f64>,
) -> Vec<Array2<f64>> {
    let mut activations = Vec::with_capacity(weights.len());
    let mut current = x.to_owned();
    for (i, (w, b)) in weights.iter().zip(biases).enumerate() {
        let z = current.dot(w) + b;
        current = if i + 1 < weights.len() { activation.apply(&z) } else { z };
        activations.push(current.clone());
    }
    activations
}

fn softmax(logits: &Array2<f64>) -> Array2<f64> {
    let mut result = logits.clone();
    for mut row in result.rows_mut() {
        let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let exp_sum: f64 = row.iter().map(|&v| (v - max).exp()).sum();
        for v in row.iter_mut() {
            *v = (*v - max).exp() / exp_sum;
        }
    }
    result
}

/// Mean cross-entropy plus `alpha / (2n) * sum(W^2)`, and its gradient
fn loss_and_gradient(
    layout: &Layout,
    activation: Activation,
    alpha: f64,
    params: &Array1<f64>,
    x: ArrayView2<f64>,
    y_onehot: &Array2<f64>,
) -> (f64, Array1<f64>) {
    let n = x.nrows() as f64;
    let (weights, biases) = layout.unpack(params);
    let activations = forward(&weights, &biases, activation, x);

    let logits = &activations[activations.len() - 1];
    let mut data_loss = 0.0;
    let mut proba = Array2::zeros(logits.raw_dim());
    for (i, row) in logits.rows().into_iter().enumerate() {
        let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let log_sum = row.iter().map(|&v| (v - max).exp()).sum::<f64>().ln();
        for (k, &z) in row.iter().enumerate() {
            let log_p = z - max - log_sum;
            proba[[i, k]] = log_p.exp();
            if y_onehot[[i, k]] > 0.0 {
                data_loss -= log_p;
            }
        }
    }

    let penalty: f64 = weights.iter().map(|w| w.iter().map(|v| v * v).sum::<f64>()).sum();
    let loss = data_loss / n + 0.5 * alpha * penalty / n;

    // Backpropagate
    let mut grad_w = vec![Array2::zeros((0, 0)); weights.len()];
    let mut grad_b = vec![Array1::zeros(0); weights.len()];
    let mut delta = (proba - y_onehot) / n;
    for l in (0..weights.len()).rev() {
        let input = if l == 0 { x.view() } else { activations[l - 1].view() };
        grad_w[l] = input.t().dot(&delta) + &weights[l] * (alpha / n);
        grad_b[l] = delta.sum_axis(Axis(0));
        if l > 0 {
            delta = delta.dot(&weights[l].t()) * activation.derivative(&activations[l - 1]);
        }
    }

    (loss, layout.pack(&grad_w, &grad_b))
}
