//src/report.rs

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{EvalError, Result};
use crate::metrics::compute_prf;
use crate::types::{ConfusionCounts, CorrelationRecord, MetricRecord};

pub const METRICS_HEADER: &str =
    "Level\tMethod\tDataset\tSampleID\tPrecision\tRecall\tF-measure\tTP\tFP\tFN";

pub const CORRELATIONS_HEADER: &str =
    "Level\tMethod\tDataset\tSampleID\tPearson r\tPearson p\tSpearman r\tSpearman p";

/// Identifies one (level, dataset, method) scoring pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitKey {
    pub level: usize,
    pub dataset: String,
    pub method: String,
}

/// Collects metric records for a whole run and renders them once at the end.
/// Correlation records are kept alongside when they were computed.
#[derive(Debug, Clone, Default)]
pub struct ReportAggregator {
    records: Vec<MetricRecord>,
    correlations: Vec<CorrelationRecord>,
}

impl ReportAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[MetricRecord] {
        &self.records
    }

    pub fn correlations(&self) -> &[CorrelationRecord] {
        &self.correlations
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Turn one pass's counters into records, one per sample in header order.
    pub fn push_unit(&mut self, key: &UnitKey, sample_ids: &[String], counts: &[ConfusionCounts]) {
        self.records.extend(unit_records(key, sample_ids, counts));
    }

    pub fn extend<I: IntoIterator<Item = MetricRecord>>(&mut self, records: I) {
        self.records.extend(records);
    }

    pub fn extend_correlations<I: IntoIterator<Item = CorrelationRecord>>(&mut self, records: I) {
        self.correlations.extend(records);
    }

    /// Write the header and every record as tab-separated text.
    pub fn write_tsv<W: Write>(&self, writer: &mut W) -> Result<()> {
        writeln!(writer, "{METRICS_HEADER}")?;
        for r in &self.records {
            writeln!(writer, "{}", metric_line(r))?;
        }
        Ok(())
    }

    pub fn write_tsv_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_file(path.as_ref(), |w| self.write_tsv(w))
    }

    /// Generate the metrics table text on demand.
    pub fn to_tsv_string(&self) -> String {
        let mut output = String::new();
        output.push_str(METRICS_HEADER);
        output.push('\n');
        for r in &self.records {
            output.push_str(&metric_line(r));
            output.push('\n');
        }
        output
    }

    pub fn write_correlations_tsv<W: Write>(&self, writer: &mut W) -> Result<()> {
        writeln!(writer, "{CORRELATIONS_HEADER}")?;
        for c in &self.correlations {
            writeln!(
                writer,
                "{}\t{}\t{}\t{}\t{:?}\t{:?}\t{:?}\t{:?}",
                c.level, c.method, c.dataset, c.sample, c.pearson.r, c.pearson.p, c.spearman.r, c.spearman.p
            )?;
        }
        Ok(())
    }

    pub fn write_correlations_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_file(path.as_ref(), |w| self.write_correlations_tsv(w))
    }
}

fn metric_line(r: &MetricRecord) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{:?}\t{:?}\t{:?}\t{}\t{}\t{}",
        r.level,
        r.method,
        r.dataset,
        r.sample,
        r.prf.precision,
        r.prf.recall,
        r.prf.f_measure,
        r.counts.true_positives,
        r.counts.false_positives,
        r.counts.false_negatives
    )
}

fn write_file<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    let file = File::create(path).map_err(|e| EvalError::from(e).in_file(path))?;
    let mut writer = BufWriter::new(file);
    write(&mut writer)?;
    writer.flush()?;
    Ok(())
}

pub fn unit_records(key: &UnitKey, sample_ids: &[String], counts: &[ConfusionCounts]) -> Vec<MetricRecord> {
    sample_ids
        .iter()
        .zip(counts)
        .map(|(sample, c)| MetricRecord {
            level: key.level,
            method: key.method.clone(),
            dataset: key.dataset.clone(),
            sample: sample.clone(),
            prf: compute_prf(c),
            counts: *c,
        })
        .collect()
}
