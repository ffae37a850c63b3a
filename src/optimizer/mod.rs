//! Numerical optimizers used to fit model parameters

pub mod lbfgs;

pub use lbfgs::{Lbfgs, LbfgsReport, StopReason};
