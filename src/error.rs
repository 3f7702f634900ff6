//src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Every way a scoring run can fail. None of these are retried: the first
/// error aborts the run so no partial metrics table is ever written.
#[derive(Error, Debug)]
pub enum EvalError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot open {what}: none of {} exist", format_candidates(.candidates))]
    MissingTable {
        what: String,
        candidates: Vec<PathBuf>,
    },

    #[error("{}: {source}", .path.display())]
    InFile {
        path: PathBuf,
        #[source]
        source: Box<EvalError>,
    },

    #[error("table has no header line")]
    EmptyTable,

    #[error("invalid abundance '{value}' at line {line}, column {column}")]
    InvalidAbundance {
        value: String,
        line: usize,
        column: usize,
    },

    #[error("line {line} has {found} abundance columns, header declares {expected}")]
    RowWidthMismatch {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("taxonomy '{taxonomy}' has fewer than {depth} ranks")]
    TaxonomyTooShallow { taxonomy: String, depth: usize },

    #[error("sample '{0}' is not a column of the expected table")]
    UnknownSample(String),

    #[error("invalid taxonomy level '{0}'")]
    InvalidLevel(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl EvalError {
    /// Attach the path of the file being read. Already-wrapped errors and
    /// lookup failures carry their own paths and are returned untouched.
    pub fn in_file<P: Into<PathBuf>>(self, path: P) -> Self {
        match self {
            EvalError::InFile { .. } | EvalError::MissingTable { .. } => self,
            other => EvalError::InFile {
                path: path.into(),
                source: Box::new(other),
            },
        }
    }
}

fn format_candidates(candidates: &[PathBuf]) -> String {
    candidates
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, EvalError>;
