//! Pixel-string feature extraction

use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{Dataset, Emotion, Sample, N_PIXELS};
use crate::error::{FerError, Result};

/// A normalised image: one value per pixel, intensity / 255
pub type FeatureVector = Array1<f64>;

const MAX_INTENSITY: f64 = 255.0;

/// What to do with integer intensities outside 0..=255
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelRangePolicy {
    /// Treat the sample as malformed
    #[default]
    Reject,
    /// Clamp to 0..=255 before scaling
    Clamp,
    /// Divide by 255 unchanged; values may fall outside [0, 1]
    Passthrough,
}

/// Converts pixel strings into fixed-length normalised feature vectors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureExtractor {
    n_pixels: usize,
    range_policy: PixelRangePolicy,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureExtractor {
    /// Extractor for 48x48 images
    pub fn new() -> Self {
        Self {
            n_pixels: N_PIXELS,
            range_policy: PixelRangePolicy::default(),
        }
    }

    /// Override the expected number of pixels per image
    pub fn with_n_pixels(mut self, n_pixels: usize) -> Self {
        self.n_pixels = n_pixels;
        self
    }

    pub fn with_range_policy(mut self, policy: PixelRangePolicy) -> Self {
        self.range_policy = policy;
        self
    }

    pub fn n_pixels(&self) -> usize {
        self.n_pixels
    }

    /// Parse and normalise one sample
    pub fn extract(&self, sample: &Sample) -> Result<FeatureVector> {
        self.extract_str(sample.row, &sample.pixels)
    }

    /// Parse and normalise a raw pixel string; `row` is only used in errors.
    pub fn extract_str(&self, row: usize, pixels: &str) -> Result<FeatureVector> {
        let mut values = Vec::with_capacity(self.n_pixels);
        let mut n_tokens = 0usize;

        for token in pixels.split(' ') {
            n_tokens += 1;
            if n_tokens > self.n_pixels {
                // keep counting so the error reports the real length
                continue;
            }
            let intensity: i64 = token.parse().map_err(|_| {
                FerError::malformed(
                    row,
                    format!("pixel {} is not an integer: {:?}", n_tokens - 1, token),
                )
            })?;
            values.push(self.scale(row, n_tokens - 1, intensity)?);
        }

        if n_tokens != self.n_pixels {
            return Err(FerError::malformed(
                row,
                format!("expected {} pixels, got {}", self.n_pixels, n_tokens),
            ));
        }

        Ok(Array1::from_vec(values))
    }

    fn scale(&self, row: usize, index: usize, intensity: i64) -> Result<f64> {
        let value = match self.range_policy {
            PixelRangePolicy::Reject => {
                if !(0..=255).contains(&intensity) {
                    return Err(FerError::malformed(
                        row,
                        format!("pixel {} intensity {} outside 0..=255", index, intensity),
                    ));
                }
                intensity
            }
            PixelRangePolicy::Clamp => intensity.clamp(0, 255),
            PixelRangePolicy::Passthrough => intensity,
        };
        Ok(value as f64 / MAX_INTENSITY)
    }

    /// Extract every row into an `n_rows x n_pixels` matrix plus labels.
    ///
    /// Rows are parsed in parallel; output keeps dataset order and the first
    /// malformed row (by index) is reported, tagged with the dataset's source
    /// file.
    pub fn extract_batch(&self, dataset: &Dataset) -> Result<(Array2<f64>, Vec<Emotion>)> {
        let parsed: Vec<Result<FeatureVector>> = dataset
            .samples()
            .par_iter()
            .map(|s| self.extract(s))
            .collect();
        let rows = parsed
            .into_iter()
            .collect::<Result<Vec<_>>>()
            .map_err(|e| e.with_path(dataset.source()))?;

        let mut flat = Vec::with_capacity(rows.len() * self.n_pixels);
        for r in &rows {
            flat.extend(r.iter().copied());
        }
        let x = Array2::from_shape_vec((rows.len(), self.n_pixels), flat)?;

        Ok((x, dataset.labels()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel_string(n: usize, value: i64) -> String {
        vec![value.to_string(); n].join(" ")
    }

    #[test]
    fn test_extract_scales_into_unit_interval() {
        let ex = FeatureExtractor::new().with_n_pixels(4);
        let v = ex.extract_str(0, "0 51 255 128").unwrap();
        assert_eq!(v.len(), 4);
        assert_eq!(v[0], 0.0);
        assert!((v[1] - 0.2).abs() < 1e-12);
        assert_eq!(v[2], 1.0);
    }

    #[test]
    fn test_extract_full_image() {
        let ex = FeatureExtractor::new();
        let s = Sample::new(3, Emotion::Fear, pixel_string(N_PIXELS, 200));
        let v = ex.extract(&s).unwrap();
        assert_eq!(v.len(), N_PIXELS);
        assert!(v.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_wrong_length_reports_counts() {
        let ex = FeatureExtractor::new();
        let err = ex.extract_str(7, &pixel_string(N_PIXELS + 1, 1)).unwrap_err();
        match err {
            FerError::MalformedSample { row, reason, path } => {
                assert!(path.is_none());
                assert_eq!(row, 7);
                assert!(reason.contains("2305"), "{}", reason);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_double_space_is_malformed() {
        let ex = FeatureExtractor::new().with_n_pixels(2);
        assert!(ex.extract_str(0, "1  2").is_err());
    }

    #[test]
    fn test_range_policies() {
        let reject = FeatureExtractor::new().with_n_pixels(2);
        assert!(reject.extract_str(0, "300 0").is_err());

        let clamp = reject.clone().with_range_policy(PixelRangePolicy::Clamp);
        let v = clamp.extract_str(0, "300 -4").unwrap();
        assert_eq!(v.to_vec(), vec![1.0, 0.0]);

        let pass = reject.with_range_policy(PixelRangePolicy::Passthrough);
        let v = pass.extract_str(0, "510 0").unwrap();
        assert_eq!(v[0], 2.0);
    }

    #[test]
    fn test_extract_batch_keeps_order() {
        let ex = FeatureExtractor::new().with_n_pixels(2);
        let ds = Dataset::new(vec![
            Sample::new(0, Emotion::Angry, "0 0"),
            Sample::new(1, Emotion::Happy, "255 255"),
        ]);
        let (x, y) = ex.extract_batch(&ds).unwrap();
        assert_eq!(x.dim(), (2, 2));
        assert_eq!(x[[1, 0]], 1.0);
        assert_eq!(y, vec![Emotion::Angry, Emotion::Happy]);
    }
}
