//src/expected.rs

use std::io::BufRead;
use std::path::Path;

use ahash::{AHashMap, AHashSet};

use crate::abundance_table::{open_table, parse_abundance, TableLines, TaxonProfile};
use crate::error::{EvalError, Result};
use crate::taxonomy::{rank_count, strip_whitespace, truncate_taxonomy};

/// Taxonomy strings considered present in the mock community at one depth.
pub type ExpectedTaxaSet = AHashSet<String>;

/// One data line of an expected table. Cells stay as text until a
/// per-sample view is requested.
#[derive(Debug, Clone)]
struct ExpectedRow {
    line: usize,
    taxonomy: String,
    cells: Vec<String>,
}

/// An expected composition table, kept at full depth.
///
/// The expected set for a depth depends only on which taxa are listed, so
/// abundance cells are parsed only when per-sample profiles are built.
#[derive(Debug, Clone, Default)]
pub struct ExpectedComposition {
    pub sample_ids: Vec<String>,
    rows: Vec<ExpectedRow>,
}

impl ExpectedComposition {
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut lines = TableLines::new(reader);
        let sample_ids = lines.read_header()?;

        let mut rows = Vec::new();
        for line in lines {
            let (line_no, line) = line?;
            let mut fields = line.split('\t');
            let taxonomy = fields.next().unwrap_or_default().trim().to_string();
            rows.push(ExpectedRow {
                line: line_no,
                taxonomy,
                cells: fields.map(String::from).collect(),
            });
        }
        Ok(Self { sample_ids, rows })
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = open_table(path).map_err(|e| e.in_file(path))?;
        let composition = Self::from_reader(reader).map_err(|e| e.in_file(path))?;
        log::debug!(
            "Loaded {} expected taxa over {} sample(s) from {}",
            composition.rows.len(),
            composition.sample_ids.len(),
            path.display()
        );
        Ok(composition)
    }

    /// Rank count of the shallowest listed taxonomy, i.e. the deepest level
    /// every row can be truncated to.
    pub fn min_depth(&self) -> Option<usize> {
        self.rows.iter().map(|r| rank_count(&r.taxonomy)).min()
    }

    /// Distinct taxonomy strings truncated to `depth`.
    pub fn taxa_at_depth(&self, depth: usize) -> Result<ExpectedTaxaSet> {
        self.taxa_with_prefix(depth, None)
    }

    fn taxa_with_prefix(&self, depth: usize, prefix: Option<&str>) -> Result<ExpectedTaxaSet> {
        let mut taxa = ExpectedTaxaSet::with_capacity(self.rows.len());
        for row in self.kept_rows(prefix) {
            taxa.insert(truncate_taxonomy(&row.taxonomy, depth)?);
        }
        Ok(taxa)
    }

    fn kept_rows<'a>(&'a self, prefix: Option<&'a str>) -> impl Iterator<Item = &'a ExpectedRow> + 'a {
        self.rows
            .iter()
            .filter(move |row| prefix.map_or(true, |p| row.taxonomy.starts_with(p)))
    }

    /// Abundance of every truncated taxon, one profile per sample column.
    pub fn profiles_at_depth(&self, depth: usize, prefix: Option<&str>) -> Result<AHashMap<String, TaxonProfile>> {
        let mut profiles: Vec<TaxonProfile> = vec![TaxonProfile::new(); self.sample_ids.len()];
        for row in self.kept_rows(prefix) {
            if row.cells.len() != self.sample_ids.len() {
                return Err(EvalError::RowWidthMismatch {
                    line: row.line,
                    expected: self.sample_ids.len(),
                    found: row.cells.len(),
                });
            }
            let taxon = truncate_taxonomy(&row.taxonomy, depth)?;
            for (col_idx, (profile, cell)) in profiles.iter_mut().zip(&row.cells).enumerate() {
                let abundance = parse_abundance(cell, row.line, col_idx + 2)?;
                *profile.entry(taxon.clone()).or_insert(0.0) += abundance;
            }
        }
        Ok(self.sample_ids.iter().cloned().zip(profiles).collect())
    }

    /// Expected taxa at `depth`, optionally restricted to taxonomies starting
    /// with `prefix`. Per-sample profiles are only built when asked for.
    pub fn at_depth(&self, depth: usize, prefix: Option<&str>, with_profiles: bool) -> Result<ExpectedLevel> {
        let taxa = self.taxa_with_prefix(depth, prefix)?;
        let profiles = if with_profiles {
            self.profiles_at_depth(depth, prefix)?
        } else {
            AHashMap::new()
        };
        Ok(ExpectedLevel { taxa, profiles })
    }
}

/// Expected taxa of one dataset at one depth, plus the per-sample
/// abundances when they were requested.
#[derive(Debug, Clone, Default)]
pub struct ExpectedLevel {
    pub taxa: ExpectedTaxaSet,
    profiles: AHashMap<String, TaxonProfile>,
}

impl ExpectedLevel {
    pub fn from_taxa(taxa: ExpectedTaxaSet) -> Self {
        Self {
            taxa,
            profiles: AHashMap::new(),
        }
    }

    /// Expected abundances for the sample with this identifier.
    pub fn profile(&self, sample: &str) -> Result<&TaxonProfile> {
        self.profiles
            .get(sample)
            .ok_or_else(|| EvalError::UnknownSample(sample.to_string()))
    }

    /// Taxa with a non-zero expected abundance in `sample`, whitespace removed.
    pub fn present_taxa(&self, sample: &str) -> Result<ExpectedTaxaSet> {
        Ok(self
            .profile(sample)?
            .iter()
            .filter(|&(_, &abundance)| abundance > 0.0)
            .map(|(taxon, _)| strip_whitespace(taxon))
            .collect())
    }
}

/// Read an expected composition table and return its taxa at `depth`.
pub fn build_expected_taxa_set<R: BufRead>(reader: R, depth: usize) -> Result<ExpectedTaxaSet> {
    ExpectedComposition::from_reader(reader)?.taxa_at_depth(depth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const EXPECTED: &str = "Taxonomy\tS1\tS2\n\
        k__Bacteria;p__Firmicutes;c__Bacilli\t0.5\t0\n\
        k__Bacteria;p__Firmicutes;c__Clostridia\t0.25\t0.5\n\
        k__Bacteria;p__Proteobacteria;c__Gammaproteobacteria\t0.25\t0\n";

    fn composition(text: &str) -> ExpectedComposition {
        ExpectedComposition::from_reader(Cursor::new(text)).unwrap()
    }

    #[test]
    fn test_duplicate_truncations_collapse() {
        let taxa = build_expected_taxa_set(Cursor::new(EXPECTED), 2).unwrap();
        assert_eq!(taxa.len(), 2);
        assert!(taxa.contains("k__Bacteria;p__Firmicutes"));
        assert!(taxa.contains("k__Bacteria;p__Proteobacteria"));
    }

    #[test]
    fn test_every_member_has_requested_depth() {
        let composition = composition(EXPECTED);
        for depth in 1..=3 {
            let taxa = composition.taxa_at_depth(depth).unwrap();
            assert!(taxa.iter().all(|t| rank_count(t) == depth));
        }
        assert_eq!(composition.taxa_at_depth(3).unwrap().len(), 3);
        assert_eq!(composition.taxa_at_depth(1).unwrap().len(), 1);
    }

    #[test]
    fn test_zero_abundance_rows_are_still_expected() {
        let text = "Taxonomy\tS1\nk__Bacteria;p__Firmicutes\t0\n";
        let taxa = build_expected_taxa_set(Cursor::new(text), 2).unwrap();
        assert!(taxa.contains("k__Bacteria;p__Firmicutes"));
    }

    #[test]
    fn test_taxa_set_ignores_abundance_cells() {
        let text = "Taxonomy\tS1\nk__Bacteria;p__Firmicutes\tn/a\n";
        assert_eq!(build_expected_taxa_set(Cursor::new(text), 1).unwrap().len(), 1);

        // profiles do parse them
        assert!(matches!(
            composition(text).profiles_at_depth(1, None),
            Err(EvalError::InvalidAbundance { line: 2, column: 2, .. })
        ));
    }

    #[test]
    fn test_depth_beyond_shallowest_row_fails() {
        let text = "Taxonomy\tS1\nk__Bacteria;p__Firmicutes;c__Bacilli\t1\nk__Bacteria\t1\n";
        let composition = composition(text);
        assert_eq!(composition.min_depth(), Some(1));
        assert!(matches!(
            composition.taxa_at_depth(2),
            Err(EvalError::TaxonomyTooShallow { depth: 2, .. })
        ));
    }

    #[test]
    fn test_header_only_table_is_empty_set() {
        let composition = composition("Taxonomy\tS1\n");
        assert_eq!(composition.sample_ids, vec!["S1".to_string()]);
        assert!(composition.taxa_at_depth(2).unwrap().is_empty());
        assert_eq!(composition.min_depth(), None);
    }

    #[test]
    fn test_profiles_sum_truncated_rows_per_sample() {
        let level = composition(EXPECTED).at_depth(2, None, true).unwrap();
        let s1 = level.profile("S1").unwrap();
        assert_eq!(s1["k__Bacteria;p__Firmicutes"], 0.75);
        assert_eq!(s1["k__Bacteria;p__Proteobacteria"], 0.25);

        let s2 = level.profile("S2").unwrap();
        assert_eq!(s2["k__Bacteria;p__Firmicutes"], 0.5);
        assert_eq!(s2["k__Bacteria;p__Proteobacteria"], 0.0);
    }

    #[test]
    fn test_present_taxa_follow_each_sample_column() {
        let level = composition(EXPECTED).at_depth(2, None, true).unwrap();
        assert_eq!(level.present_taxa("S1").unwrap().len(), 2);

        let s2 = level.present_taxa("S2").unwrap();
        assert_eq!(s2.len(), 1);
        assert!(s2.contains("k__Bacteria;p__Firmicutes"));

        assert!(matches!(level.present_taxa("S9"), Err(EvalError::UnknownSample(s)) if s == "S9"));
    }

    #[test]
    fn test_present_taxa_strip_whitespace() {
        let text = "Taxonomy\tS1\nk__Bacteria; p__Firmicutes\t1\n";
        let level = composition(text).at_depth(2, None, true).unwrap();
        assert!(level.present_taxa("S1").unwrap().contains("k__Bacteria;p__Firmicutes"));
    }

    #[test]
    fn test_prefix_restricts_expected_rows() {
        let level = composition(EXPECTED)
            .at_depth(2, Some("k__Bacteria;p__Firmicutes"), true)
            .unwrap();
        assert_eq!(level.taxa.len(), 1);
        assert!(!level.profile("S1").unwrap().contains_key("k__Bacteria;p__Proteobacteria"));
    }

    #[test]
    fn test_short_expected_row_is_fatal_for_profiles() {
        let text = "Taxonomy\tS1\tS2\nk__Bacteria\t1\n";
        assert!(composition(text).at_depth(1, None, false).is_ok());
        assert!(matches!(
            composition(text).at_depth(1, None, true),
            Err(EvalError::RowWidthMismatch { line: 2, expected: 2, found: 1 })
        ));
    }
}
