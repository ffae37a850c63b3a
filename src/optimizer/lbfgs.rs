//! Limited-memory BFGS
//!
//! Quasi-Newton minimisation of a smooth objective using the two-loop
//! recursion over the last `memory` curvature pairs and a backtracking
//! Armijo line search.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, trace};

use crate::error::{FerError, Result};

/// Armijo sufficient-decrease constant
const C1: f64 = 1e-4;
/// Step shrink factor during backtracking
const BACKTRACK: f64 = 0.5;
/// Trial steps per line search
const MAX_LINE_SEARCH: usize = 40;

/// Why the optimizer stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Gradient infinity norm fell below tolerance
    GradientTolerance,
    /// Relative loss reduction fell below tolerance
    LossTolerance,
    MaxIterations,
    MaxEvaluations,
    /// No step along the search direction decreased the loss
    LineSearchFailed,
}

impl StopReason {
    /// Whether the stop counts as convergence
    pub fn converged(self) -> bool {
        matches!(self, StopReason::GradientTolerance | StopReason::LossTolerance)
    }
}

/// Result of a minimisation
#[derive(Debug, Clone)]
pub struct LbfgsReport {
    pub params: Array1<f64>,
    pub loss: f64,
    pub iterations: usize,
    pub evaluations: usize,
    pub stop: StopReason,
}

impl LbfgsReport {
    pub fn converged(&self) -> bool {
        self.stop.converged()
    }
}

/// L-BFGS optimizer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lbfgs {
    /// Number of stored curvature pairs
    pub memory: usize,
    pub max_iter: usize,
    /// Maximum objective evaluations, line-search trials included
    pub max_evals: usize,
    /// Stop when the gradient infinity norm is at most this
    pub gtol: f64,
    /// Stop when the relative loss reduction is at most this
    pub ftol: f64,
}

impl Default for Lbfgs {
    fn default() -> Self {
        Self {
            memory: 10,
            max_iter: 15_000,
            max_evals: 15_000,
            gtol: 1e-5,
            ftol: 1e7 * f64::EPSILON,
        }
    }
}

impl Lbfgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_memory(mut self, memory: usize) -> Self {
        self.memory = memory.max(1);
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_max_evals(mut self, max_evals: usize) -> Self {
        self.max_evals = max_evals;
        self
    }

    pub fn with_gtol(mut self, gtol: f64) -> Self {
        self.gtol = gtol;
        self
    }

    /// Minimise `objective`, which returns the loss and its gradient.
    pub fn minimize<F>(&self, x0: Array1<f64>, mut objective: F) -> Result<LbfgsReport>
    where
        F: FnMut(&Array1<f64>) -> (f64, Array1<f64>),
    {
        let mut x = x0;
        let (mut loss, mut grad) = objective(&x);
        let mut evaluations = 1;

        if !loss.is_finite() || grad.len() != x.len() {
            return Err(FerError::Training(format!(
                "objective is not usable at the starting point (loss = {})",
                loss
            )));
        }

        let mut s_hist: VecDeque<Array1<f64>> = VecDeque::with_capacity(self.memory);
        let mut y_hist: VecDeque<Array1<f64>> = VecDeque::with_capacity(self.memory);
        let mut rho_hist: VecDeque<f64> = VecDeque::with_capacity(self.memory);

        let mut iterations = 0;
        let stop = loop {
            if inf_norm(&grad) <= self.gtol {
                break StopReason::GradientTolerance;
            }
            if iterations >= self.max_iter {
                break StopReason::MaxIterations;
            }
            if evaluations >= self.max_evals {
                break StopReason::MaxEvaluations;
            }

            let mut direction = two_loop(&grad, &s_hist, &y_hist, &rho_hist);
            let mut slope = direction.dot(&grad);
            if !(slope < 0.0) {
                // Not a descent direction: drop the curvature history
                s_hist.clear();
                y_hist.clear();
                rho_hist.clear();
                direction = two_loop(&grad, &s_hist, &y_hist, &rho_hist);
                slope = direction.dot(&grad);
            }

            let mut step = 1.0;
            let mut accepted = None;
            for _ in 0..MAX_LINE_SEARCH {
                if evaluations >= self.max_evals {
                    break;
                }
                let candidate = &x + &(&direction * step);
                let (new_loss, new_grad) = objective(&candidate);
                evaluations += 1;
                if new_loss.is_finite() && new_loss <= loss + C1 * step * slope {
                    accepted = Some((candidate, new_loss, new_grad));
                    break;
                }
                step *= BACKTRACK;
            }

            let Some((new_x, new_loss, new_grad)) = accepted else {
                break if evaluations >= self.max_evals {
                    StopReason::MaxEvaluations
                } else {
                    StopReason::LineSearchFailed
                };
            };

            let s = &new_x - &x;
            let y = &new_grad - &grad;
            let sy = s.dot(&y);
            if sy > 1e-10 * y.dot(&y).max(f64::MIN_POSITIVE) {
                if s_hist.len() == self.memory {
                    s_hist.pop_front();
                    y_hist.pop_front();
                    rho_hist.pop_front();
                }
                s_hist.push_back(s);
                y_hist.push_back(y);
                rho_hist.push_back(1.0 / sy);
            }

            let reduction = (loss - new_loss) / loss.abs().max(new_loss.abs()).max(1.0);
            x = new_x;
            loss = new_loss;
            grad = new_grad;
            iterations += 1;

            trace!(iteration = iterations, loss, step, "L-BFGS step");

            if reduction <= self.ftol {
                break StopReason::LossTolerance;
            }
        };

        debug!(iterations, evaluations, loss, ?stop, "L-BFGS finished");

        Ok(LbfgsReport {
            params: x,
            loss,
            iterations,
            evaluations,
            stop,
        })
    }
}

fn inf_norm(v: &Array1<f64>) -> f64 {
    v.iter().fold(0.0, |m, &x| m.max(x.abs()))
}

/// Search direction `-H g` from the stored curvature pairs
fn two_loop(
    grad: &Array1<f64>,
    s_hist: &VecDeque<Array1<f64>>,
    y_hist: &VecDeque<Array1<f64>>,
    rho_hist: &VecDeque<f64>,
) -> Array1<f64> {
    let k = s_hist.len();
    if k == 0 {
        // Scaled steepest descent keeps the first trial step bounded
        let norm = grad.dot(grad).sqrt();
        return grad.mapv(|g| -g / norm.max(1.0));
    }

    let mut q = grad.clone();
    let mut alphas = vec![0.0; k];
    for i in (0..k).rev() {
        alphas[i] = rho_hist[i] * s_hist[i].dot(&q);
        q.scaled_add(-alphas[i], &y_hist[i]);
    }

    let gamma = s_hist[k - 1].dot(&y_hist[k - 1]) / y_hist[k - 1].dot(&y_hist[k - 1]);
    let mut r = q * gamma;
    for i in 0..k {
        let beta = rho_hist[i] * y_hist[i].dot(&r);
        r.scaled_add(alphas[i] - beta, &s_hist[i]);
    }

    -r
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn rosenbrock(p: &Array1<f64>) -> (f64, Array1<f64>) {
        let (x, y) = (p[0], p[1]);
        let loss = (1.0 - x).powi(2) + 100.0 * (y - x * x).powi(2);
        let grad = array![
            -2.0 * (1.0 - x) - 400.0 * x * (y - x * x),
            200.0 * (y - x * x)
        ];
        (loss, grad)
    }

    #[test]
    fn test_quadratic() {
        let target = array![3.0, -2.0, 0.5];
        let report = Lbfgs::new()
            .minimize(Array1::zeros(3), |p| {
                let d = p - &target;
                (d.dot(&d), &d * 2.0)
            })
            .unwrap();

        assert!(report.converged(), "{:?}", report.stop);
        for (a, b) in report.params.iter().zip(target.iter()) {
            assert!((a - b).abs() < 1e-4, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_rosenbrock() {
        let report = Lbfgs::new()
            .with_gtol(1e-8)
            .minimize(array![-1.2, 1.0], rosenbrock)
            .unwrap();

        assert!(report.loss < 1e-4, "loss {}", report.loss);
        assert!((report.params[0] - 1.0).abs() < 0.05);
    }

    #[test]
    fn test_iteration_cap() {
        let report = Lbfgs::new()
            .with_max_iter(2)
            .minimize(array![-1.2, 1.0], rosenbrock)
            .unwrap();
        assert_eq!(report.iterations, 2);
        assert_eq!(report.stop, StopReason::MaxIterations);
        assert!(!report.converged());
    }

    #[test]
    fn test_non_finite_start() {
        let result = Lbfgs::new().minimize(array![0.0], |_| (f64::NAN, array![0.0]));
        assert!(matches!(result, Err(FerError::Training(_))));
    }
}
