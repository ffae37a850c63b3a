//! Error types for the FER benchmark

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for benchmark operations
pub type Result<T> = std::result::Result<T, FerError>;

/// Main error type for the benchmark
#[derive(Error, Debug)]
pub enum FerError {
    /// Input file missing, unreadable, or without the required columns
    #[error("Data access error for {}: {reason}", path.display())]
    DataAccess { path: PathBuf, reason: String },

    /// A row whose label or pixel string cannot be used
    #[error("Malformed sample at row {row}{}: {reason}", in_file(.path))]
    MalformedSample {
        row: usize,
        reason: String,
        path: Option<PathBuf>,
    },

    #[error("Training error: {0}")]
    Training(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    Shape { expected: String, actual: String },
}

impl FerError {
    /// Build a `DataAccess` error for `path`
    pub fn data_access(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        FerError::DataAccess {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Build a `MalformedSample` error for the zero-based `row`
    pub fn malformed(row: usize, reason: impl ToString) -> Self {
        FerError::MalformedSample {
            row,
            reason: reason.to_string(),
            path: None,
        }
    }

    /// Attach the source file to a `MalformedSample` that has none yet
    pub fn with_path(self, source: Option<&Path>) -> Self {
        match (self, source) {
            (FerError::MalformedSample { row, reason, path: None }, Some(source)) => {
                FerError::MalformedSample {
                    row,
                    reason,
                    path: Some(source.to_path_buf()),
                }
            }
            (err, _) => err,
        }
    }

    /// Whether the error only invalidates a single model's pipeline.
    pub fn is_model_scoped(&self) -> bool {
        matches!(self, FerError::Training(_) | FerError::Inference(_))
    }
}

fn in_file(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" in {}", path.display()),
        None => String::new(),
    }
}

impl From<polars::error::PolarsError> for FerError {
    fn from(err: polars::error::PolarsError) -> Self {
        FerError::DataAccess {
            path: PathBuf::new(),
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for FerError {
    fn from(err: serde_json::Error) -> Self {
        FerError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for FerError {
    fn from(err: ndarray::ShapeError) -> Self {
        FerError::Shape {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

impl From<image::ImageError> for FerError {
    fn from(err: image::ImageError) -> Self {
        FerError::Image(err.to_string())
    }
}
