//! Dataset types, loading, feature extraction and sampling
//!
//! The data consists of 48x48 grayscale face images, each labelled with one
//! of seven emotions. Faces are registered so that they are roughly centred
//! and occupy about the same area of every image.

pub mod features;
pub mod loader;
pub mod sampling;

pub use features::{FeatureExtractor, FeatureVector, PixelRangePolicy};
pub use loader::{DatasetLoader, DatasetSummary};
pub use sampling::{sample, split, take_labels, take_rows, SplitIndices};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Image width in pixels
pub const WIDTH: usize = 48;
/// Image height in pixels
pub const HEIGHT: usize = 48;
/// Number of pixels (and features) per image
pub const N_PIXELS: usize = WIDTH * HEIGHT;

/// The seven emotion classes, in label-index order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Emotion {
    Angry,
    Disgust,
    Fear,
    Happy,
    Sad,
    Surprise,
    Neutral,
}

impl Emotion {
    /// All classes ordered by label index
    pub const ALL: [Emotion; 7] = [
        Emotion::Angry,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Surprise,
        Emotion::Neutral,
    ];

    /// Number of classes
    pub const COUNT: usize = 7;

    /// Map a label index (0-6) to its class
    pub fn from_index(index: i64) -> Option<Emotion> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// Label index of this class
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Emotion::Angry => "Angry",
            Emotion::Disgust => "Disgust",
            Emotion::Fear => "Fear",
            Emotion::Happy => "Happy",
            Emotion::Sad => "Sad",
            Emotion::Surprise => "Surprise",
            Emotion::Neutral => "Neutral",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single labelled row as read from disk.
///
/// The pixel string is kept verbatim; it is only validated when a
/// [`FeatureExtractor`] turns it into a feature vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Space-separated pixel intensities
    pub pixels: String,
    pub label: Emotion,
    /// `Usage` column (e.g. "Training", "PublicTest") when present
    pub usage: Option<String>,
    /// Zero-based row index in the source file
    pub row: usize,
}

impl Sample {
    pub fn new(row: usize, label: Emotion, pixels: impl Into<String>) -> Self {
        Self {
            pixels: pixels.into(),
            label,
            usage: None,
            row,
        }
    }
}

/// An ordered collection of samples sharing one schema
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    samples: Vec<Sample>,
    source: Option<PathBuf>,
}

impl Dataset {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self {
            samples,
            source: None,
        }
    }

    /// Attach the file this dataset was read from
    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Labels in row order
    pub fn labels(&self) -> Vec<Emotion> {
        self.samples.iter().map(|s| s.label).collect()
    }

    /// Per-class row counts, indexed by label index
    pub fn class_counts(&self) -> [usize; Emotion::COUNT] {
        let mut counts = [0usize; Emotion::COUNT];
        for s in &self.samples {
            counts[s.label.index()] += 1;
        }
        counts
    }

    /// New dataset holding the rows at `indices`, in that order
    pub fn select(&self, indices: &[usize]) -> Dataset {
        Dataset {
            samples: indices.iter().map(|&i| self.samples[i].clone()).collect(),
            source: self.source.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emotion_index_roundtrip() {
        for (i, e) in Emotion::ALL.iter().enumerate() {
            assert_eq!(e.index(), i);
            assert_eq!(Emotion::from_index(i as i64), Some(*e));
        }
        assert_eq!(Emotion::from_index(7), None);
        assert_eq!(Emotion::from_index(-1), None);
    }

    #[test]
    fn test_emotion_names() {
        assert_eq!(Emotion::Angry.to_string(), "Angry");
        assert_eq!(Emotion::Neutral.name(), "Neutral");
    }

    #[test]
    fn test_dataset_select_and_counts() {
        let ds = Dataset::new(vec![
            Sample::new(0, Emotion::Happy, "1 2"),
            Sample::new(1, Emotion::Sad, "3 4"),
            Sample::new(2, Emotion::Happy, "5 6"),
        ]);

        let counts = ds.class_counts();
        assert_eq!(counts[Emotion::Happy.index()], 2);
        assert_eq!(counts[Emotion::Sad.index()], 1);

        let picked = ds.select(&[2, 0]);
        assert_eq!(picked.len(), 2);
        assert_eq!(picked.samples()[0].row, 2);
        assert_eq!(picked.samples()[1].row, 0);
    }
}
