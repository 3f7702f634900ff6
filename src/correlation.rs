//src/correlation.rs

use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::abundance_table::{collapse_profiles, AbundanceRow, TaxonProfile};
use crate::confusion::AccumulateOptions;
use crate::error::Result;
use crate::expected::ExpectedLevel;
use crate::report::UnitKey;
use crate::types::{Correlation, CorrelationRecord};

/// Pearson product-moment correlation with a two-sided t-test p-value.
///
/// Fewer than two points or a constant input give `Correlation::UNDEFINED`.
pub fn pearson(x: &[f64], y: &[f64]) -> Correlation {
    let n = x.len().min(y.len());
    if n < 2 {
        return Correlation::UNDEFINED;
    }
    let (x, y) = (&x[..n], &y[..n]);
    let mean_x = x.iter().sum::<f64>() / n as f64;
    let mean_y = y.iter().sum::<f64>() / n as f64;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return Correlation::UNDEFINED;
    }

    let r = (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0);
    Correlation {
        r,
        p: two_sided_p(r, n),
    }
}

/// Spearman rank correlation: Pearson over average ranks.
pub fn spearman(x: &[f64], y: &[f64]) -> Correlation {
    pearson(&average_ranks(x), &average_ranks(y))
}

/// 1-based ranks; tied values share the mean of their positions.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // positions start..end hold ranks start+1..=end
        let rank = (start + end + 1) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        start = end;
    }
    ranks
}

fn two_sided_p(r: f64, n: usize) -> f64 {
    if n == 2 {
        return 1.0;
    }
    let denom = 1.0 - r * r;
    if denom <= 0.0 {
        return 0.0;
    }
    let df = (n - 2) as f64;
    let t = r * (df / denom).sqrt();
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => 2.0 * dist.sf(t.abs()),
        Err(_) => f64::NAN,
    }
}

/// Pair observed and expected abundances over every taxon with a non-zero
/// value on either side. A taxon missing from one side counts as 0. Taxa are
/// visited in sorted order.
pub fn paired_abundances(observed: &TaxonProfile, expected: &TaxonProfile) -> (Vec<f64>, Vec<f64>) {
    let mut taxa: Vec<&String> = observed
        .iter()
        .chain(expected.iter())
        .filter(|&(_, &abundance)| abundance > 0.0)
        .map(|(taxon, _)| taxon)
        .collect();
    taxa.sort_unstable();
    taxa.dedup();

    let lookup = |profile: &TaxonProfile, taxon: &String| profile.get(taxon).copied().unwrap_or(0.0);
    taxa.into_iter()
        .map(|taxon| (lookup(observed, taxon), lookup(expected, taxon)))
        .unzip()
}

/// Correlate each observed sample with the expected sample of the same id.
///
/// `rows` pass through the same filters as the confusion counts.
pub fn correlation_records(
    key: &UnitKey,
    expected: &ExpectedLevel,
    sample_ids: &[String],
    rows: &[AbundanceRow],
    options: &AccumulateOptions,
) -> Result<Vec<CorrelationRecord>> {
    let observed = collapse_profiles(sample_ids.len(), rows.iter().filter(|row| options.keeps(row)));

    sample_ids
        .iter()
        .zip(&observed)
        .map(|(sample, profile)| {
            let (actual, wanted) = paired_abundances(profile, expected.profile(sample)?);
            Ok(CorrelationRecord {
                level: key.level,
                method: key.method.clone(),
                dataset: key.dataset.clone(),
                sample: sample.clone(),
                pearson: pearson(&actual, &wanted),
                spearman: spearman(&actual, &wanted),
            })
        })
        .collect()
}
