//! CSV dataset loading

use polars::prelude::*;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

use super::{Dataset, Emotion, Sample};
use crate::error::{FerError, Result};

/// Column holding the integer label
pub const LABEL_COLUMN: &str = "emotion";
/// Column holding the space-separated pixel string
pub const PIXELS_COLUMN: &str = "pixels";
/// Optional column naming the original partition of each row
pub const USAGE_COLUMN: &str = "Usage";

/// Loader for FER2013-style CSV files
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    /// Rows used for schema inference
    infer_schema_length: usize,
}

impl Default for DatasetLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetLoader {
    pub fn new() -> Self {
        Self {
            infer_schema_length: 100,
        }
    }

    /// Load a dataset, preserving file row order.
    ///
    /// Pixel strings are not validated here; see [`super::FeatureExtractor`].
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Dataset> {
        let path = path.as_ref();
        let start = Instant::now();

        let file = File::open(path).map_err(|e| FerError::data_access(path, e))?;

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| FerError::data_access(path, e))?;

        debug!(rows = df.height(), cols = df.width(), path = %path.display(), "CSV parsed");

        let labels = required_column(&df, LABEL_COLUMN, path)?
            .cast(&DataType::Int64)
            .map_err(|e| FerError::data_access(path, e))?;
        let labels = labels.i64().map_err(|e| FerError::data_access(path, e))?;

        let pixels = required_column(&df, PIXELS_COLUMN, path)?
            .cast(&DataType::String)
            .map_err(|e| FerError::data_access(path, e))?;
        let pixels = pixels.str().map_err(|e| FerError::data_access(path, e))?;

        let usage = match df.column(USAGE_COLUMN) {
            Ok(col) => Some(
                col.cast(&DataType::String)
                    .map_err(|e| FerError::data_access(path, e))?,
            ),
            Err(_) => None,
        };
        let usage = match usage.as_ref() {
            Some(col) => Some(col.str().map_err(|e| FerError::data_access(path, e))?),
            None => None,
        };

        let mut samples = Vec::with_capacity(df.height());
        for (row, (label, pix)) in labels.into_iter().zip(pixels.into_iter()).enumerate() {
            let malformed = |reason: String| FerError::malformed(row, reason).with_path(Some(path));
            let label = label.ok_or_else(|| malformed("missing emotion label".to_string()))?;
            let label = Emotion::from_index(label).ok_or_else(|| {
                malformed(format!("emotion label must be in 0..=6, got {}", label))
            })?;
            let pix = pix.ok_or_else(|| malformed("missing pixel string".to_string()))?;

            let mut sample = Sample::new(row, label, pix);
            sample.usage = usage.and_then(|u| u.get(row)).map(str::to_string);
            samples.push(sample);
        }

        info!(
            rows = samples.len(),
            path = %path.display(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Dataset loaded"
        );

        Ok(Dataset::new(samples).with_source(path))
    }
}

fn required_column<'a>(
    df: &'a DataFrame,
    name: &str,
    path: &Path,
) -> Result<&'a Series> {
    df.column(name).map_err(|_| {
        FerError::data_access(path, format!("missing required column '{}'", name))
    })
}

/// Row and class counts of a dataset
#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub path: Option<PathBuf>,
    pub n_rows: usize,
    /// (class, count) for every class, in label order
    pub class_counts: Vec<(Emotion, usize)>,
}

impl DatasetSummary {
    pub fn of(dataset: &Dataset) -> Self {
        let counts = dataset.class_counts();
        Self {
            path: dataset.source().map(Path::to_path_buf),
            n_rows: dataset.len(),
            class_counts: Emotion::ALL.iter().map(|&e| (e, counts[e.index()])).collect(),
        }
    }
}
