//src/abundance_table.rs

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use ahash::AHashMap;
use flate2::read::MultiGzDecoder;

use crate::error::{EvalError, Result};

/// One observed row: a taxonomy string and its abundance in every sample,
/// indexed in header order.
#[derive(Debug, Clone, PartialEq)]
pub struct AbundanceRow {
    pub taxonomy: String,
    pub abundances: Vec<f64>,
}

impl AbundanceRow {
    /// Total abundance across all samples.
    pub fn total(&self) -> f64 {
        self.abundances.iter().sum()
    }
}

/// Abundance per taxonomy string for one sample. Rows sharing a taxonomy
/// are summed.
pub type TaxonProfile = AHashMap<String, f64>;

/// Parse one abundance cell. `column` is 1-based and counts the taxonomy
/// column.
pub(crate) fn parse_abundance(value_str: &str, line: usize, column: usize) -> Result<f64> {
    let invalid = || EvalError::InvalidAbundance {
        value: value_str.to_string(),
        line,
        column,
    };
    let value: f64 = value_str.trim().parse().map_err(|_| invalid())?;
    if !value.is_finite() || value < 0.0 {
        return Err(invalid());
    }
    Ok(value)
}

/// Sum rows into one profile per sample, in header order.
pub fn collapse_profiles<'a, I>(n_samples: usize, rows: I) -> Vec<TaxonProfile>
where
    I: IntoIterator<Item = &'a AbundanceRow>,
{
    let mut profiles = vec![TaxonProfile::new(); n_samples];
    for row in rows {
        for (profile, &abundance) in profiles.iter_mut().zip(&row.abundances) {
            *profile.entry(row.taxonomy.clone()).or_insert(0.0) += abundance;
        }
    }
    profiles
}

/// Open a table for reading, transparently decompressing `.gz` files.
pub fn open_table<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let f = File::open(path)?;

    let is_gz = path
        .extension()
        .map(|ext| ext == "gz")
        .unwrap_or(false);

    let reader: Box<dyn BufRead> = if is_gz {
        Box::new(BufReader::new(MultiGzDecoder::new(f)))
    } else {
        Box::new(BufReader::new(f))
    };
    Ok(reader)
}

/// Line source shared by the expected and observed readers.
///
/// Yields `(line_number, line)` with line endings stripped, skipping blank
/// lines and `# ` comment lines (QIIME prefixes converted tables with
/// `# Constructed from biom file`). A header such as `#OTU ID` has no space
/// after the hash and is kept.
pub(crate) struct TableLines<R: BufRead> {
    lines: Lines<R>,
    line_no: usize,
}

impl<R: BufRead> TableLines<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }

    /// Read the header line and return the sample identifiers after the
    /// first (taxonomy label) column.
    pub(crate) fn read_header(&mut self) -> Result<Vec<String>> {
        let (_, header) = self.next().ok_or(EvalError::EmptyTable)??;
        Ok(header
            .split('\t')
            .skip(1)
            .map(|s| s.trim().to_string())
            .collect())
    }
}

impl<R: BufRead> Iterator for TableLines<R> {
    type Item = Result<(usize, String)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_no += 1;

            let line = line.trim_end_matches(['\r', '\n']);
            if line.trim().is_empty() || line.starts_with("# ") {
                continue;
            }
            return Some(Ok((self.line_no, line.to_string())));
        }
    }
}

/// Streaming reader over a taxa × samples abundance table.
///
/// The header is parsed eagerly; data rows are parsed one at a time as the
/// iterator is advanced, so a table is never fully materialized.
pub struct AbundanceTable<R: BufRead> {
    sample_ids: Vec<String>,
    lines: TableLines<R>,
}

impl<R: BufRead> AbundanceTable<R> {
    pub fn from_reader(reader: R) -> Result<Self> {
        let mut lines = TableLines::new(reader);
        let sample_ids = lines.read_header()?;
        Ok(Self { sample_ids, lines })
    }

    /// Sample identifiers in header order.
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    fn parse_row(&self, line_no: usize, line: &str) -> Result<AbundanceRow> {
        let mut fields = line.split('\t');
        let taxonomy = fields.next().unwrap_or_default().trim().to_string();

        let mut abundances = Vec::with_capacity(self.sample_ids.len());
        for (col_idx, value_str) in fields.enumerate() {
            abundances.push(parse_abundance(value_str, line_no, col_idx + 2)?);
        }

        if abundances.len() != self.sample_ids.len() {
            return Err(EvalError::RowWidthMismatch {
                line: line_no,
                expected: self.sample_ids.len(),
                found: abundances.len(),
            });
        }

        Ok(AbundanceRow {
            taxonomy,
            abundances,
        })
    }
}

impl<R: BufRead> Iterator for AbundanceTable<R> {
    type Item = Result<AbundanceRow>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self
            .lines
            .next()?
            .and_then(|(line_no, line)| self.parse_row(line_no, &line));
        Some(item)
    }
}

/// Open `path` and parse its header, ready to stream rows.
pub fn read_abundance_table<P: AsRef<Path>>(path: P) -> Result<AbundanceTable<Box<dyn BufRead>>> {
    let path = path.as_ref();
    let reader = open_table(path).map_err(|e| e.in_file(path))?;
    AbundanceTable::from_reader(reader).map_err(|e| e.in_file(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    const TABLE: &str = "Taxonomy\tS1\tS2\n\
                         k__Bacteria;p__Firmicutes\t5\t0\n\
                         k__Bacteria;p__Bacteroidetes\t0.25\t3\n";

    #[test]
    fn test_header_and_rows_in_file_order() {
        let table = AbundanceTable::from_reader(Cursor::new(TABLE)).unwrap();
        assert_eq!(table.sample_ids(), &["S1", "S2"]);

        let rows: Vec<AbundanceRow> = table.collect::<Result<_>>().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].taxonomy, "k__Bacteria;p__Firmicutes");
        assert_eq!(rows[0].abundances, vec![5.0, 0.0]);
        assert_eq!(rows[1].abundances, vec![0.25, 3.0]);
        assert_eq!(rows[1].total(), 3.25);
    }

    #[test]
    fn test_repeated_taxa_are_not_merged() {
        let text = "Taxonomy\tS1\nX\t1\nX\t2\n";
        let rows: Vec<AbundanceRow> = AbundanceTable::from_reader(Cursor::new(text))
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_collapse_profiles_sums_repeated_taxa() {
        let rows: Vec<AbundanceRow> = AbundanceTable::from_reader(Cursor::new("Taxonomy\tS1\tS2\nX\t1\t0\nY\t2\t2\nX\t3\t0\n"))
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        let profiles = collapse_profiles(2, &rows);
        assert_eq!(profiles[0]["X"], 4.0);
        assert_eq!(profiles[0]["Y"], 2.0);
        assert_eq!(profiles[1]["X"], 0.0);
        assert_eq!(profiles[1].len(), 2);
    }

    #[test]
    fn test_skips_comment_and_blank_lines() {
        let text = "# Constructed from biom file\n#OTU ID\tS1\r\n\nX\t1\r\n";
        let mut table = AbundanceTable::from_reader(Cursor::new(text)).unwrap();
        assert_eq!(table.sample_ids(), &["S1"]);
        let row = table.next().unwrap().unwrap();
        assert_eq!(row.taxonomy, "X");
        assert!(table.next().is_none());
    }

    #[test]
    fn test_non_numeric_cell_is_fatal() {
        let text = "Taxonomy\tS1\tS2\nX\t1\tabc\n";
        let mut table = AbundanceTable::from_reader(Cursor::new(text)).unwrap();
        match table.next().unwrap() {
            Err(EvalError::InvalidAbundance { value, line, column }) => {
                assert_eq!(value, "abc");
                assert_eq!(line, 2);
                assert_eq!(column, 3);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_negative_cell_is_fatal() {
        let text = "Taxonomy\tS1\nX\t-1\n";
        let mut table = AbundanceTable::from_reader(Cursor::new(text)).unwrap();
        assert!(matches!(table.next(), Some(Err(EvalError::InvalidAbundance { .. }))));
    }

    #[test]
    fn test_short_row_is_fatal() {
        let text = "Taxonomy\tS1\tS2\nX\t1\n";
        let mut table = AbundanceTable::from_reader(Cursor::new(text)).unwrap();
        assert!(matches!(
            table.next(),
            Some(Err(EvalError::RowWidthMismatch { expected: 2, found: 1, .. }))
        ));
    }

    #[test]
    fn test_empty_input_has_no_header() {
        assert!(matches!(
            AbundanceTable::from_reader(Cursor::new("")),
            Err(EvalError::EmptyTable)
        ));
    }

    #[test]
    fn test_reads_gzipped_table() {
        let file = tempfile::Builder::new().suffix(".txt.gz").tempfile().unwrap();
        let mut encoder = GzEncoder::new(File::create(file.path()).unwrap(), Compression::default());
        encoder.write_all(TABLE.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let table = read_abundance_table(file.path()).unwrap();
        assert_eq!(table.sample_ids(), &["S1", "S2"]);
        assert_eq!(table.count(), 2);
    }

    #[test]
    fn test_error_names_the_file() {
        let file = NamedTempFile::new().unwrap();
        let err = read_abundance_table(file.path()).err().unwrap();
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }
}
