//src/summary.rs

use std::io::Write;

use ahash::AHashMap;

use crate::error::Result;
use crate::types::{Metric, MetricRecord};

/// Best-performing method labels for one (level, dataset, sample).
#[derive(Debug, Clone, PartialEq)]
pub struct TopScore {
    pub level: usize,
    pub dataset: String,
    pub sample: String,
    /// Highest metric value in the group.
    pub top_value: f64,
    /// Mean absolute deviation of the group's values.
    pub mad: f64,
    /// Labels scoring within `mad` of `top_value`, in record order.
    pub methods: Vec<String>,
}

/// Mean absolute deviation around the mean.
fn mean_absolute_deviation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).abs()).sum::<f64>() / n
}

/// For every (level, dataset, sample), list the method labels whose `metric`
/// is at least `max - MAD` of that group. Groups appear in first-seen order.
pub fn top_methods(records: &[MetricRecord], metric: Metric) -> Vec<TopScore> {
    let mut index: AHashMap<(usize, &str, &str), usize> = AHashMap::new();
    let mut groups: Vec<Vec<&MetricRecord>> = Vec::new();

    for record in records {
        let key = (record.level, record.dataset.as_str(), record.sample.as_str());
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(record);
    }

    groups
        .into_iter()
        .map(|group| {
            let values: Vec<f64> = group.iter().map(|r| r.metric(metric)).collect();
            let top_value = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let mad = mean_absolute_deviation(&values);
            let threshold = top_value - mad;

            let methods = group
                .iter()
                .zip(&values)
                .filter(|(_, &v)| v >= threshold)
                .map(|(r, _)| r.method.clone())
                .collect();

            let first = group[0];
            TopScore {
                level: first.level,
                dataset: first.dataset.clone(),
                sample: first.sample.clone(),
                top_value,
                mad,
                methods,
            }
        })
        .collect()
}

/// How often each method label is among the top performers, most wins
/// first, ties broken by label.
pub fn method_win_counts(top: &[TopScore]) -> Vec<(String, usize)> {
    let mut wins: AHashMap<&str, usize> = AHashMap::new();
    for score in top {
        for method in &score.methods {
            *wins.entry(method.as_str()).or_insert(0) += 1;
        }
    }

    let mut counts: Vec<(String, usize)> = wins
        .into_iter()
        .map(|(method, n)| (method.to_string(), n))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

pub fn write_top_scores_tsv<W: Write>(writer: &mut W, top: &[TopScore], metric: Metric) -> Result<()> {
    writeln!(writer, "Level\tDataset\tSampleID\tTop {}\tMAD\tMethods", metric.column_name())?;
    for s in top {
        writeln!(
            writer,
            "{}\t{}\t{}\t{:?}\t{:?}\t{}",
            s.level,
            s.dataset,
            s.sample,
            s.top_value,
            s.mad,
            s.methods.join(",")
        )?;
    }
    Ok(())
}

pub fn write_win_counts_tsv<W: Write>(writer: &mut W, counts: &[(String, usize)]) -> Result<()> {
    writeln!(writer, "Method\tWins")?;
    for (method, n) in counts {
        writeln!(writer, "{method}\t{n}")?;
    }
    Ok(())
}
