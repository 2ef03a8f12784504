//! Held-out evaluation: confusion matrix, ROC curve and classification report

use crate::error::ChurnError;
use std::fmt;

/// 2x2 count matrix indexed `[true_label][predicted_label]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfusionMatrix {
    pub counts: [[usize; 2]; 2],
}

impl ConfusionMatrix {
    pub fn true_negatives(&self) -> usize {
        self.counts[0][0]
    }

    pub fn false_positives(&self) -> usize {
        self.counts[0][1]
    }

    pub fn false_negatives(&self) -> usize {
        self.counts[1][0]
    }

    pub fn true_positives(&self) -> usize {
        self.counts[1][1]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_negatives() + self.true_positives(), self.total())
    }
}

/// Count predictions against ground truth
pub fn confusion_matrix(
    true_labels: &[usize],
    predicted_labels: &[usize],
) -> crate::Result<ConfusionMatrix> {
    check_lengths(true_labels.len(), predicted_labels.len())?;

    let mut counts = [[0usize; 2]; 2];
    for (&actual, &predicted) in true_labels.iter().zip(predicted_labels) {
        if actual > 1 || predicted > 1 {
            return Err(ChurnError::Evaluation(format!(
                "labels must be 0 or 1, got true={actual} predicted={predicted}"
            )));
        }
        counts[actual][predicted] += 1;
    }

    Ok(ConfusionMatrix { counts })
}

/// ROC curve points and the area under them
#[derive(Debug, Clone, PartialEq)]
pub struct RocCurve {
    /// (false positive rate, true positive rate), from (0, 0) to (1, 1)
    pub points: Vec<(f64, f64)>,
    /// Score threshold for each point; the first is `+inf`
    pub thresholds: Vec<f64>,
    /// Trapezoidal AUC; `NaN` when only one class is present
    pub auc: f64,
}

/// Compute the ROC curve from labels and churn scores
///
/// Thresholds are the distinct scores in descending order. A point is
/// emitted after all samples sharing a score have been counted.
pub fn roc_curve(true_labels: &[usize], scores: &[f64]) -> crate::Result<RocCurve> {
    check_lengths(true_labels.len(), scores.len())?;
    if let Some(bad) = scores.iter().find(|s| !s.is_finite()) {
        return Err(ChurnError::Evaluation(format!("score {bad} is not finite")));
    }
    if let Some(bad) = true_labels.iter().find(|&&l| l > 1) {
        return Err(ChurnError::Evaluation(format!("label {bad} is not 0 or 1")));
    }

    let positives = true_labels.iter().filter(|&&l| l == 1).count();
    let negatives = true_labels.len() - positives;

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut points = vec![(0.0, 0.0)];
    let mut thresholds = vec![f64::INFINITY];
    let (mut tp, mut fp) = (0usize, 0usize);

    for (pos, &idx) in order.iter().enumerate() {
        if true_labels[idx] == 1 {
            tp += 1;
        } else {
            fp += 1;
        }

        let last_of_score = order
            .get(pos + 1)
            .map_or(true, |&next| scores[next] != scores[idx]);
        if last_of_score {
            points.push((ratio(fp, negatives), ratio(tp, positives)));
            thresholds.push(scores[idx]);
        }
    }

    let auc = if positives == 0 || negatives == 0 {
        f64::NAN
    } else {
        trapezoid_area(&points)
    };

    Ok(RocCurve {
        points,
        thresholds,
        auc,
    })
}

fn trapezoid_area(points: &[(f64, f64)]) -> f64 {
    points
        .windows(2)
        .map(|w| (w[1].0 - w[0].0) * (w[1].1 + w[0].1) / 2.0)
        .sum()
}

/// Precision, recall and F1 for one class
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

impl ClassMetrics {
    fn new(true_hits: usize, predicted: usize, support: usize) -> Self {
        let precision = ratio(true_hits, predicted);
        let recall = ratio(true_hits, support);
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };
        Self {
            precision,
            recall,
            f1,
            support,
        }
    }
}

/// Per-class and averaged metrics for the binary classifier
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    pub retained: ClassMetrics,
    pub churned: ClassMetrics,
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

/// Summarise predictions the way a classification report table does
pub fn classification_report(
    true_labels: &[usize],
    predicted_labels: &[usize],
) -> crate::Result<ClassificationReport> {
    let cm = confusion_matrix(true_labels, predicted_labels)?;
    Ok(ClassificationReport::from_confusion_matrix(&cm))
}

impl ClassificationReport {
    pub fn from_confusion_matrix(cm: &ConfusionMatrix) -> Self {
        let retained = ClassMetrics::new(
            cm.true_negatives(),
            cm.true_negatives() + cm.false_negatives(),
            cm.true_negatives() + cm.false_positives(),
        );
        let churned = ClassMetrics::new(
            cm.true_positives(),
            cm.true_positives() + cm.false_positives(),
            cm.true_positives() + cm.false_negatives(),
        );
        let total = cm.total();

        let macro_avg = ClassMetrics {
            precision: (retained.precision + churned.precision) / 2.0,
            recall: (retained.recall + churned.recall) / 2.0,
            f1: (retained.f1 + churned.f1) / 2.0,
            support: total,
        };

        let weight = |a: f64, b: f64| {
            if total == 0 {
                0.0
            } else {
                (a * retained.support as f64 + b * churned.support as f64) / total as f64
            }
        };
        let weighted_avg = ClassMetrics {
            precision: weight(retained.precision, churned.precision),
            recall: weight(retained.recall, churned.recall),
            f1: weight(retained.f1, churned.f1),
            support: total,
        };

        Self {
            retained,
            churned,
            accuracy: cm.accuracy(),
            macro_avg,
            weighted_avg,
        }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>14} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        for (name, m) in [("0", &self.retained), ("1", &self.churned)] {
            writeln!(
                f,
                "{:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, m.precision, m.recall, m.f1, m.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>14} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        for (name, m) in [
            ("macro avg", &self.macro_avg),
            ("weighted avg", &self.weighted_avg),
        ] {
            writeln!(
                f,
                "{:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, m.precision, m.recall, m.f1, m.support
            )?;
        }
        Ok(())
    }
}

fn check_lengths(expected: usize, actual: usize) -> crate::Result<()> {
    if expected != actual {
        return Err(ChurnError::Evaluation(format!(
            "label and prediction lengths differ ({expected} vs {actual})"
        )));
    }
    Ok(())
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
