//src/confusion.rs

use crate::abundance_table::AbundanceRow;
use crate::error::Result;
use crate::expected::{ExpectedLevel, ExpectedTaxaSet};
use crate::taxonomy::strip_whitespace;
use crate::types::{ConfusionCounts, ScoringMode};

/// Options for one accumulation pass.
#[derive(Debug, Clone, Default)]
pub struct AccumulateOptions {
    pub scoring: ScoringMode,
    /// Rows whose total abundance across samples is below this are skipped
    /// before matching.
    pub min_count: f64,
    /// When set, only rows whose taxonomy starts with this prefix are kept.
    pub taxa_to_keep: Option<String>,
}

impl AccumulateOptions {
    /// Whether `row` survives the `min_count` and `taxa_to_keep` filters.
    pub fn keeps(&self, row: &AbundanceRow) -> bool {
        let allowed = self
            .taxa_to_keep
            .as_deref()
            .map_or(true, |prefix| row.taxonomy.starts_with(prefix));
        allowed && row.total() >= self.min_count
    }
}

/// Count one observed table with the rules selected by `options.scoring`.
///
/// `sample_ids` is the observed header; in presence/absence mode each one
/// must also be a column of the expected table.
pub fn score_samples<I>(
    expected: &ExpectedLevel,
    sample_ids: &[String],
    rows: I,
    options: &AccumulateOptions,
) -> Result<Vec<ConfusionCounts>>
where
    I: IntoIterator<Item = Result<AbundanceRow>>,
{
    match options.scoring {
        ScoringMode::Reference => accumulate_confusion(&expected.taxa, sample_ids.len(), rows, options),
        ScoringMode::PresenceAbsence => {
            let per_sample = sample_ids
                .iter()
                .map(|sample| expected.present_taxa(sample))
                .collect::<Result<Vec<_>>>()?;
            accumulate_presence_absence(&per_sample, rows, options)
        }
    }
}

/// Walk observed rows against the expected taxa and return one
/// `ConfusionCounts` per sample, in header order.
///
/// Every sample starts with `false_negatives = |expected|`. Rows are counted
/// independently, even when several share a taxonomy string. A matched row
/// retires one false negative where its abundance is non-zero and adds one
/// where it is zero; an unmatched row is a false positive in every sample.
pub fn accumulate_confusion<I>(
    expected: &ExpectedTaxaSet,
    n_samples: usize,
    rows: I,
    options: &AccumulateOptions,
) -> Result<Vec<ConfusionCounts>>
where
    I: IntoIterator<Item = Result<AbundanceRow>>,
{
    let baseline = ConfusionCounts {
        true_positives: 0,
        false_positives: 0,
        false_negatives: expected.len() as i64,
    };
    let mut counts = vec![baseline; n_samples];
    let mut skipped = 0usize;

    for row in rows {
        let row = row?;
        if !options.keeps(&row) {
            skipped += 1;
            continue;
        }

        if expected.contains(row.taxonomy.as_str()) {
            for (sample, &abundance) in counts.iter_mut().zip(&row.abundances) {
                if abundance == 0.0 {
                    sample.false_negatives += 1;
                } else {
                    sample.true_positives += 1;
                    sample.false_negatives -= 1;
                }
            }
        } else {
            for sample in counts.iter_mut() {
                sample.false_positives += 1;
            }
        }
    }

    log_skipped(skipped, options);
    Ok(counts)
}

/// Set-based counting against a separate expected set per sample.
///
/// A taxon is observed in a sample when any of its rows has a non-zero
/// abundance there; repeated rows count once. Taxa are compared with all
/// whitespace removed. Then `TP = |A ∩ E|`, `FP = |A - E|`, `FN = |E - A|`.
pub fn accumulate_presence_absence<I>(
    expected: &[ExpectedTaxaSet],
    rows: I,
    options: &AccumulateOptions,
) -> Result<Vec<ConfusionCounts>>
where
    I: IntoIterator<Item = Result<AbundanceRow>>,
{
    let mut observed = vec![ExpectedTaxaSet::new(); expected.len()];
    let mut skipped = 0usize;

    for row in rows {
        let row = row?;
        if !options.keeps(&row) {
            skipped += 1;
            continue;
        }

        let taxon = strip_whitespace(&row.taxonomy);
        for (seen, &abundance) in observed.iter_mut().zip(&row.abundances) {
            if abundance > 0.0 {
                seen.insert(taxon.clone());
            }
        }
    }

    log_skipped(skipped, options);
    Ok(observed
        .iter()
        .zip(expected)
        .map(|(actual, expected)| ConfusionCounts {
            true_positives: actual.intersection(expected).count() as u64,
            false_positives: actual.difference(expected).count() as u64,
            false_negatives: expected.difference(actual).count() as i64,
        })
        .collect())
}

fn log_skipped(skipped: usize, options: &AccumulateOptions) {
    if skipped > 0 {
        log::debug!(
            "Skipped {skipped} rows (min_count {}, taxa_to_keep {:?})",
            options.min_count,
            options.taxa_to_keep
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expected(taxa: &[&str]) -> ExpectedTaxaSet {
        taxa.iter().map(|t| t.to_string()).collect()
    }

    fn row(taxonomy: &str, abundances: &[f64]) -> Result<AbundanceRow> {
        Ok(AbundanceRow {
            taxonomy: taxonomy.to_string(),
            abundances: abundances.to_vec(),
        })
    }

    fn counts(tp: u64, fp: u64, fn_: i64) -> ConfusionCounts {
        ConfusionCounts {
            true_positives: tp,
            false_positives: fp,
            false_negatives: fn_,
        }
    }

    #[test]
    fn test_matched_present_taxon() {
        let exp = expected(&["k__Bacteria;p__Firmicutes"]);
        let out = accumulate_confusion(
            &exp,
            1,
            vec![row("k__Bacteria;p__Firmicutes", &[5.0])],
            &AccumulateOptions::default(),
        )
        .unwrap();
        assert_eq!(out, vec![counts(1, 0, 0)]);
    }

    #[test]
    fn test_matched_zero_abundance_adds_false_negative() {
        let exp = expected(&["k__Bacteria;p__Firmicutes"]);
        let out = accumulate_confusion(
            &exp,
            1,
            vec![row("k__Bacteria;p__Firmicutes", &[0.0])],
            &AccumulateOptions::default(),
        )
        .unwrap();
        assert_eq!(out, vec![counts(0, 0, 2)]);
    }

    #[test]
    fn test_unmatched_taxon_with_empty_expected_set() {
        let out = accumulate_confusion(
            &expected(&[]),
            1,
            vec![row("k__Bacteria;p__Bacteroidetes", &[3.0])],
            &AccumulateOptions::default(),
        )
        .unwrap();
        assert_eq!(out, vec![counts(0, 1, 0)]);
    }

    #[test]
    fn test_unmatched_taxon_charged_to_every_sample() {
        let out = accumulate_confusion(
            &expected(&["X"]),
            2,
            vec![row("X", &[2.0, 0.0]), row("Y", &[1.0, 1.0])],
            &AccumulateOptions::default(),
        )
        .unwrap();
        assert_eq!(out, vec![counts(1, 1, 0), counts(0, 1, 2)]);

        // zero-abundance unexpected rows still count
        let out = accumulate_confusion(
            &expected(&["X"]),
            2,
            vec![row("Y", &[0.0, 0.0])],
            &AccumulateOptions::default(),
        )
        .unwrap();
        assert_eq!(out, vec![counts(0, 1, 1), counts(0, 1, 1)]);
    }

    #[test]
    fn test_duplicate_rows_counted_independently() {
        let out = accumulate_confusion(
            &expected(&["X"]),
            1,
            vec![row("X", &[1.0]), row("X", &[4.0])],
            &AccumulateOptions::default(),
        )
        .unwrap();
        assert_eq!(out, vec![counts(2, 0, -1)]);
    }

    #[test]
    fn test_counts_follow_closed_form() {
        let exp = expected(&["A", "B", "C"]);
        let rows = vec![
            row("A", &[1.0, 0.0, 2.0]),
            row("B", &[0.0, 0.0, 3.0]),
            row("Z", &[0.0, 7.0, 0.0]),
            row("W", &[1.0, 0.0, 0.0]),
        ];
        let out = accumulate_confusion(&exp, 3, rows, &AccumulateOptions::default()).unwrap();

        // FN = |E| - matched_nonzero + matched_zero, FP = unmatched rows
        assert_eq!(out[0], counts(1, 2, 3 - 1 + 1));
        assert_eq!(out[1], counts(0, 2, 3 + 2));
        assert_eq!(out[2], counts(2, 2, 3 - 2));
    }

    #[test]
    fn test_no_rows_leaves_baseline() {
        let out = accumulate_confusion(
            &expected(&["A", "B"]),
            2,
            Vec::<Result<AbundanceRow>>::new(),
            &AccumulateOptions::default(),
        )
        .unwrap();
        assert_eq!(out, vec![counts(0, 0, 2); 2]);
    }

    fn presence_level(text: &str) -> ExpectedLevel {
        crate::expected::ExpectedComposition::from_reader(std::io::Cursor::new(text))
            .unwrap()
            .at_depth(1, None, true)
            .unwrap()
    }

    fn presence_options() -> AccumulateOptions {
        AccumulateOptions {
            scoring: ScoringMode::PresenceAbsence,
            ..Default::default()
        }
    }

    #[test]
    fn test_presence_absence_uses_each_samples_expected_taxa() {
        let level = presence_level("Taxonomy\tS1\tS2\nF\t1\t0\nP\t0\t1\n");
        let samples = vec!["S1".to_string(), "S2".to_string()];
        let rows = vec![row("F", &[5.0, 5.0]), row("F", &[5.0, 5.0])];

        let out = score_samples(&level, &samples, rows, &presence_options()).unwrap();
        assert_eq!(out, vec![counts(1, 0, 0), counts(0, 1, 1)]);
    }

    #[test]
    fn test_presence_absence_counts_sets() {
        let expected = vec![expected(&["A", "B"]), expected(&["A"])];
        let rows = vec![
            row("A", &[1.0, 0.0]),
            row(" A ", &[2.0, 0.0]),
            row("C", &[1.0, 0.0]),
            row("D", &[0.0, 0.0]),
        ];
        let out = accumulate_presence_absence(&expected, rows, &presence_options()).unwrap();
        assert_eq!(out, vec![counts(1, 1, 1), counts(0, 0, 1)]);
    }

    #[test]
    fn test_presence_absence_matches_samples_by_id() {
        let level = presence_level("Taxonomy\tS1\tS2\nF\t1\t0\nP\t0\t1\n");
        let samples = vec!["S2".to_string()];
        let out = score_samples(&level, &samples, vec![row("P", &[3.0])], &presence_options()).unwrap();
        assert_eq!(out, vec![counts(1, 0, 0)]);

        let samples = vec!["S3".to_string()];
        let err = score_samples(&level, &samples, vec![row("P", &[3.0])], &presence_options()).unwrap_err();
        assert!(matches!(err, crate::error::EvalError::UnknownSample(s) if s == "S3"));
    }

    #[test]
    fn test_reference_mode_ignores_sample_ids() {
        let level = ExpectedLevel::from_taxa(expected(&["X"]));
        let samples = vec!["anything".to_string()];
        let out = score_samples(&level, &samples, vec![row("X", &[0.0])], &AccumulateOptions::default()).unwrap();
        assert_eq!(out, vec![counts(0, 0, 2)]);
    }

    #[test]
    fn test_taxa_to_keep_filters_by_prefix() {
        let options = AccumulateOptions {
            taxa_to_keep: Some("k__Bacteria;p__Firmicutes".to_string()),
            ..Default::default()
        };
        let out = accumulate_confusion(
            &expected(&["k__Bacteria;p__Firmicutes;c__Bacilli"]),
            1,
            vec![
                row("k__Bacteria;p__Firmicutes;c__Bacilli", &[2.0]),
                row("k__Bacteria;p__Proteobacteria;c__Gammaproteobacteria", &[9.0]),
                row("k__Archaea;p__Euryarchaeota;c__Methanobacteria", &[9.0]),
            ],
            &options,
        )
        .unwrap();
        assert_eq!(out, vec![counts(1, 0, 0)]);
    }

    #[test]
    fn test_min_count_skips_low_rows() {
        let options = AccumulateOptions {
            min_count: 10.0,
            ..Default::default()
        };
        let out = accumulate_confusion(
            &expected(&["X"]),
            2,
            vec![row("X", &[6.0, 4.0]), row("Y", &[1.0, 2.0])],
            &options,
        )
        .unwrap();
        assert_eq!(out, vec![counts(1, 0, 0), counts(1, 0, 0)]);
    }

    #[test]
    fn test_row_error_propagates() {
        let rows = vec![
            row("X", &[1.0]),
            Err(crate::error::EvalError::InvalidAbundance {
                value: "x".into(),
                line: 3,
                column: 2,
            }),
        ];
        assert!(accumulate_confusion(&expected(&["X"]), 1, rows, &AccumulateOptions::default()).is_err());
    }
}
