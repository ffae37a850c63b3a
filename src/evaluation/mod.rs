//! Model evaluation
//!
//! Confusion matrix and per-class precision / recall / F1 / support, with
//! the summary rows of a classic classification report.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::data::Emotion;
use crate::error::{FerError, Result};

/// Which classes get a row in the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportScope {
    /// Only the labels the model actually predicted
    #[default]
    PredictedLabels,
    /// Every label seen in either the predictions or the ground truth
    AllObserved,
}

/// Square count matrix, rows = actual, columns = predicted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// Sorted union of actual and predicted labels
    labels: Vec<Emotion>,
    counts: Array2<usize>,
}

impl ConfusionMatrix {
    pub fn from_predictions(predicted: &[Emotion], actual: &[Emotion]) -> Result<Self> {
        check_lengths(predicted, actual)?;

        let mut labels: Vec<Emotion> = predicted.iter().chain(actual).copied().collect();
        labels.sort();
        labels.dedup();

        let mut counts = Array2::zeros((labels.len(), labels.len()));
        for (p, a) in predicted.iter().zip(actual) {
            let (Ok(row), Ok(col)) = (labels.binary_search(a), labels.binary_search(p)) else {
                continue;
            };
            counts[[row, col]] += 1;
        }

        Ok(Self { labels, counts })
    }

    pub fn labels(&self) -> &[Emotion] {
        &self.labels
    }

    pub fn counts(&self) -> &Array2<usize> {
        &self.counts
    }

    /// Count of samples labelled `actual` and predicted as `predicted`
    pub fn get(&self, actual: Emotion, predicted: Emotion) -> usize {
        match (self.index_of(actual), self.index_of(predicted)) {
            (Some(r), Some(c)) => self.counts[[r, c]],
            _ => 0,
        }
    }

    pub fn total(&self) -> usize {
        self.counts.sum()
    }

    /// Diagonal sum
    pub fn correct(&self) -> usize {
        self.counts.diag().sum()
    }

    pub fn true_positives(&self, label: Emotion) -> usize {
        self.get(label, label)
    }

    /// Samples whose actual label is `label`
    pub fn support(&self, label: Emotion) -> usize {
        self.index_of(label)
            .map(|r| self.counts.row(r).sum())
            .unwrap_or(0)
    }

    /// Samples predicted as `label`
    pub fn predicted_count(&self, label: Emotion) -> usize {
        self.index_of(label)
            .map(|c| self.counts.column(c).sum())
            .unwrap_or(0)
    }

    fn index_of(&self, label: Emotion) -> Option<usize> {
        self.labels.binary_search(&label).ok()
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name_width = self
            .labels
            .iter()
            .map(|l| l.name().len())
            .max()
            .unwrap_or(0)
            .max("actual \\ pred".len());
        let count_width = self
            .labels
            .iter()
            .map(|l| l.name().len())
            .chain(self.counts.iter().map(|c| c.to_string().len()))
            .max()
            .unwrap_or(1);

        write!(f, "{:>w$}", "actual \\ pred", w = name_width)?;
        for label in &self.labels {
            write!(f, " {:>w$}", label.name(), w = count_width)?;
        }
        writeln!(f)?;

        for (label, row) in self.labels.iter().zip(self.counts.rows()) {
            write!(f, "{:>w$}", label.name(), w = name_width)?;
            for count in row {
                write!(f, " {:>w$}", count, w = count_width)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Scores for one class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: Emotion,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
    /// False when the class was never predicted and precision fell back to 0
    pub precision_defined: bool,
}

impl ClassMetrics {
    fn from_matrix(matrix: &ConfusionMatrix, label: Emotion) -> Self {
        let tp = matrix.true_positives(label);
        let predicted = matrix.predicted_count(label);
        let support = matrix.support(label);

        let precision = ratio(tp, predicted);
        let recall = ratio(tp, support);

        Self {
            label,
            precision,
            recall,
            f1: f1_score(precision, recall),
            support,
            precision_defined: predicted > 0,
        }
    }
}

/// A summary row such as `macro avg`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AverageMetrics {
    pub name: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Confusion matrix plus classification report for one prediction set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub scope: ReportScope,
    pub confusion: ConfusionMatrix,
    /// One entry per reported class, sorted by label
    pub classes: Vec<ClassMetrics>,
    /// Set when the reported classes cover every observed label
    pub accuracy: Option<f64>,
    /// `micro avg` (only without accuracy), `macro avg`, `weighted avg`
    pub averages: Vec<AverageMetrics>,
    pub n_samples: usize,
}

/// Evaluate with the default [`ReportScope`]
pub fn evaluate(predicted: &[Emotion], actual: &[Emotion]) -> Result<EvaluationReport> {
    evaluate_with_scope(predicted, actual, ReportScope::default())
}

pub fn evaluate_with_scope(
    predicted: &[Emotion],
    actual: &[Emotion],
    scope: ReportScope,
) -> Result<EvaluationReport> {
    let confusion = ConfusionMatrix::from_predictions(predicted, actual)?;

    let mut reported: Vec<Emotion> = match scope {
        ReportScope::PredictedLabels => predicted.to_vec(),
        ReportScope::AllObserved => confusion.labels().to_vec(),
    };
    reported.sort();
    reported.dedup();

    let classes: Vec<ClassMetrics> = reported
        .iter()
        .map(|&label| ClassMetrics::from_matrix(&confusion, label))
        .collect();

    let covers_all = reported.len() == confusion.labels().len();
    let total_support: usize = classes.iter().map(|c| c.support).sum();

    let mut averages = Vec::with_capacity(3);
    let accuracy = if covers_all {
        Some(ratio(confusion.correct(), confusion.total()))
    } else {
        let tp: usize = reported.iter().map(|&l| confusion.true_positives(l)).sum();
        let predicted_total: usize = reported.iter().map(|&l| confusion.predicted_count(l)).sum();
        let precision = ratio(tp, predicted_total);
        let recall = ratio(tp, total_support);
        averages.push(AverageMetrics {
            name: "micro avg".to_string(),
            precision,
            recall,
            f1: f1_score(precision, recall),
            support: total_support,
        });
        None
    };

    let n_classes = classes.len().max(1) as f64;
    averages.push(AverageMetrics {
        name: "macro avg".to_string(),
        precision: classes.iter().map(|c| c.precision).sum::<f64>() / n_classes,
        recall: classes.iter().map(|c| c.recall).sum::<f64>() / n_classes,
        f1: classes.iter().map(|c| c.f1).sum::<f64>() / n_classes,
        support: total_support,
    });

    let weighted = |value: fn(&ClassMetrics) -> f64| {
        if total_support == 0 {
            0.0
        } else {
            classes
                .iter()
                .map(|c| value(c) * c.support as f64)
                .sum::<f64>()
                / total_support as f64
        }
    };
    averages.push(AverageMetrics {
        name: "weighted avg".to_string(),
        precision: weighted(|c| c.precision),
        recall: weighted(|c| c.recall),
        f1: weighted(|c| c.f1),
        support: total_support,
    });

    Ok(EvaluationReport {
        scope,
        n_samples: confusion.total(),
        confusion,
        classes,
        accuracy,
        averages,
    })
}

impl EvaluationReport {
    pub fn class(&self, label: Emotion) -> Option<&ClassMetrics> {
        self.classes.iter().find(|c| c.label == label)
    }

    pub fn average(&self, name: &str) -> Option<&AverageMetrics> {
        self.averages.iter().find(|a| a.name == name)
    }

    /// Fraction of correct predictions over all samples
    pub fn overall_accuracy(&self) -> f64 {
        ratio(self.confusion.correct(), self.confusion.total())
    }

    /// Reported classes that were never predicted
    pub fn undefined_precision(&self) -> Vec<Emotion> {
        self.classes
            .iter()
            .filter(|c| !c.precision_defined)
            .map(|c| c.label)
            .collect()
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .classes
            .iter()
            .map(|c| c.label.name().len())
            .chain(self.averages.iter().map(|a| a.name.len()))
            .max()
            .unwrap_or(0);

        writeln!(
            f,
            "{:>w$} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support",
            w = width
        )?;
        writeln!(f)?;
        for c in &self.classes {
            writeln!(
                f,
                "{:>w$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                c.label.name(), c.precision, c.recall, c.f1, c.support,
                w = width
            )?;
        }
        writeln!(f)?;
        if let Some(acc) = self.accuracy {
            writeln!(
                f,
                "{:>w$} {:>9} {:>9} {:>9.2} {:>9}",
                "accuracy", "", "", acc, self.n_samples,
                w = width
            )?;
        }
        for a in &self.averages {
            writeln!(
                f,
                "{:>w$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                a.name, a.precision, a.recall, a.f1, a.support,
                w = width
            )?;
        }
        Ok(())
    }
}

fn check_lengths(predicted: &[Emotion], actual: &[Emotion]) -> Result<()> {
    if predicted.len() != actual.len() {
        return Err(FerError::Evaluation(format!(
            "predicted ({}) and actual ({}) differ in length",
            predicted.len(),
            actual.len()
        )));
    }
    if predicted.is_empty() {
        return Err(FerError::Evaluation("nothing to evaluate".to_string()));
    }
    Ok(())
}

fn ratio(num: usize, den: usize) -> f64 {
    if den > 0 {
        num as f64 / den as f64
    } else {
        0.0
    }
}

fn f1_score(precision: f64, recall: f64) -> f64 {
    if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Emotion::*;

    #[test]
    fn test_confusion_matrix_counts() {
        let cm = ConfusionMatrix::from_predictions(&[Angry, Angry, Disgust], &[Angry, Disgust, Disgust]).unwrap();
        assert_eq!(cm.labels(), &[Angry, Disgust]);
        assert_eq!(cm.get(Angry, Angry), 1);
        assert_eq!(cm.get(Angry, Disgust), 0);
        assert_eq!(cm.get(Disgust, Angry), 1);
        assert_eq!(cm.get(Disgust, Disgust), 1);
        assert_eq!(cm.total(), 3);
        assert_eq!(cm.correct(), 2);
    }

    #[test]
    fn test_precision_recall() {
        let report = evaluate(&[Angry, Angry, Disgust], &[Angry, Disgust, Disgust]).unwrap();

        let angry = report.class(Angry).unwrap();
        assert!((angry.precision - 0.5).abs() < 1e-12);
        assert!((angry.recall - 1.0).abs() < 1e-12);
        assert_eq!(angry.support, 1);

        let disgust = report.class(Disgust).unwrap();
        assert!((disgust.precision - 1.0).abs() < 1e-12);
        assert!((disgust.recall - 0.5).abs() < 1e-12);
        assert_eq!(disgust.support, 2);

        assert!((report.accuracy.unwrap() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_predicted_scope_hides_unpredicted_class() {
        // Fear is never predicted
        let predicted = [Happy, Happy, Sad, Sad];
        let actual = [Happy, Fear, Sad, Fear];

        let report = evaluate(&predicted, &actual).unwrap();
        assert_eq!(report.classes.len(), 2);
        assert!(report.class(Fear).is_none());
        assert!(report.accuracy.is_none());

        let micro = report.average("micro avg").unwrap();
        assert!((micro.precision - 0.5).abs() < 1e-12);
        assert!((micro.recall - 1.0).abs() < 1e-12);
        assert_eq!(micro.support, 2);

        let full = evaluate_with_scope(&predicted, &actual, ReportScope::AllObserved).unwrap();
        assert_eq!(full.classes.len(), 3);
        let fear = full.class(Fear).unwrap();
        assert_eq!(fear.precision, 0.0);
        assert!(!fear.precision_defined);
        assert_eq!(full.undefined_precision(), vec![Fear]);
        assert!((full.accuracy.unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_weighted_average() {
        let report = evaluate(&[Angry, Angry, Disgust], &[Angry, Disgust, Disgust]).unwrap();
        let weighted = report.average("weighted avg").unwrap();
        // (0.5 * 1 + 1.0 * 2) / 3
        assert!((weighted.precision - 2.5 / 3.0).abs() < 1e-12);
        let macro_avg = report.average("macro avg").unwrap();
        assert!((macro_avg.recall - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(matches!(evaluate(&[Angry], &[]), Err(FerError::Evaluation(_))));
        assert!(matches!(evaluate(&[], &[]), Err(FerError::Evaluation(_))));
    }

    #[test]
    fn test_display() {
        let report = evaluate(&[Happy, Sad], &[Happy, Happy]).unwrap();
        let text = report.to_string();
        assert!(text.contains("precision"));
        assert!(text.contains("Happy"));
        assert!(text.contains("weighted avg"));

        let matrix = report.confusion.to_string();
        assert_eq!(matrix.lines().count(), 3);
    }
}
