//src/layout.rs

use std::path::{Path, PathBuf};

use crate::error::{EvalError, Result};

pub const DEFAULT_PRIMARY_NAME: &str = "otu_table_L{level}.txt";
pub const DEFAULT_FALLBACK_NAME: &str = "table_L{level}.txt";
pub const DEFAULT_EXPECTED_DIR: &str = "expected";

/// Where tables live under a stem directory:
///
/// ```text
/// <stem>/<dataset>/<expected_dir>/<candidate at top level>
/// <stem>/<dataset>/<method>/<candidate at level>
/// ```
///
/// Candidates are filename templates in preference order; `{level}` is
/// replaced by the level number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLayout {
    pub expected_dir: String,
    pub candidates: [String; 2],
}

impl Default for TableLayout {
    fn default() -> Self {
        Self {
            expected_dir: DEFAULT_EXPECTED_DIR.to_string(),
            candidates: [
                DEFAULT_PRIMARY_NAME.to_string(),
                DEFAULT_FALLBACK_NAME.to_string(),
            ],
        }
    }
}

impl TableLayout {
    fn candidate_paths(&self, dir: &Path, level: usize) -> Vec<PathBuf> {
        self.candidates
            .iter()
            .map(|template| dir.join(template.replace("{level}", &level.to_string())))
            .collect()
    }

    fn first_existing(&self, dir: &Path, level: usize, what: String) -> Result<PathBuf> {
        let candidates = self.candidate_paths(dir, level);
        match candidates.iter().find(|p| p.is_file()) {
            Some(path) => Ok(path.clone()),
            None => Err(EvalError::MissingTable { what, candidates }),
        }
    }

    /// Expected composition table for `dataset`, at the top level.
    pub fn resolve_expected(&self, stem: &Path, dataset: &str, top_level: usize) -> Result<PathBuf> {
        let dir = stem.join(dataset).join(&self.expected_dir);
        self.first_existing(&dir, top_level, format!("expected table for {dataset}"))
    }

    /// Observed table for one (dataset, method, level).
    pub fn resolve_observed(&self, stem: &Path, dataset: &str, method: &str, level: usize) -> Result<PathBuf> {
        let dir = stem.join(dataset).join(method);
        self.first_existing(
            &dir,
            level,
            format!("observed table for {dataset}/{method} at level {level}"),
        )
    }
}
