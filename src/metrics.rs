//src/metrics.rs

use crate::types::{ConfusionCounts, Prf};

/// Precision, recall and F-measure from confusion counts.
///
/// A sample without true positives scores zero on all three, whatever its
/// false positive and false negative counts.
pub fn compute_prf(counts: &ConfusionCounts) -> Prf {
    if counts.true_positives == 0 {
        return Prf::default();
    }

    let tp = counts.true_positives as f64;
    let precision = tp / (tp + counts.false_positives as f64);
    let recall = tp / (tp + counts.false_negatives as f64);
    let f_measure = 2.0 * precision * recall / (precision + recall);

    Prf {
        precision,
        recall,
        f_measure,
    }
}
