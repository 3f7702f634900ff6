//src/types.rs

/// Per-sample confusion counters for one (dataset, method, level) pass.
///
/// `false_negatives` is signed: it starts at the expected-set size and every
/// matched row with abundance retires one unit, so duplicate matching rows
/// can push it below zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfusionCounts {
    pub true_positives: u64,
    pub false_positives: u64,
    pub false_negatives: i64,
}

/// Precision, recall and F-measure for one sample.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Prf {
    pub precision: f64,
    pub recall: f64,
    pub f_measure: f64,
}

/// One output row of the scored metrics table.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    pub level: usize,
    pub method: String,
    pub dataset: String,
    pub sample: String,
    pub prf: Prf,
    pub counts: ConfusionCounts,
}

impl MetricRecord {
    pub fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Precision => self.prf.precision,
            Metric::Recall => self.prf.recall,
            Metric::FMeasure => self.prf.f_measure,
        }
    }
}

/// Which score to rank methods by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Precision,
    Recall,
    FMeasure,
}

impl Metric {
    pub fn column_name(&self) -> &'static str {
        match self {
            Metric::Precision => "Precision",
            Metric::Recall => "Recall",
            Metric::FMeasure => "F-measure",
        }
    }
}

/// Row-counting rules used by the confusion accumulator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScoringMode {
    /// Unexpected taxa are false positives in every sample, and expected taxa
    /// with zero abundance add a false negative on top of the baseline.
    #[default]
    Reference,
    /// Set comparison per sample: the taxa observed with non-zero abundance
    /// against the taxa with non-zero expected abundance in the same sample
    /// column. Repeated rows count once and whitespace is ignored.
    PresenceAbsence,
}

/// Correlation coefficient and its two-sided p-value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correlation {
    pub r: f64,
    pub p: f64,
}

impl Correlation {
    pub const UNDEFINED: Correlation = Correlation {
        r: f64::NAN,
        p: f64::NAN,
    };
}

/// Agreement between observed and expected abundances in one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationRecord {
    pub level: usize,
    pub method: String,
    pub dataset: String,
    pub sample: String,
    pub pearson: Correlation,
    pub spearman: Correlation,
}
