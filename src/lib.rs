// src/lib.rs
pub mod types;
pub mod error;
pub mod taxonomy;
pub mod abundance_table;
pub mod expected;
pub mod confusion;
pub mod metrics;
pub mod correlation;
pub mod report;
pub mod layout;
pub mod summary;
pub mod evaluate;

pub use crate::error::{EvalError, Result};
pub use crate::evaluate::{evaluate_mock_results, EvalConfig};
pub use crate::layout::TableLayout;
pub use crate::report::ReportAggregator;
pub use crate::types::{
    ConfusionCounts, Correlation, CorrelationRecord, Metric, MetricRecord, Prf, ScoringMode,
};

use std::io::BufRead;

use crate::abundance_table::AbundanceTable;
use crate::confusion::{score_samples, AccumulateOptions};
use crate::expected::ExpectedComposition;
use crate::report::{unit_records, UnitKey};

/// Score a single observed table against an expected composition, both
/// given as already-opened streams.
///
/// The expected table is truncated to `level`; the observed table must
/// already be summarized at that level.
pub fn score_tables<E: BufRead, O: BufRead>(
    expected: E,
    observed: O,
    key: &UnitKey,
    options: AccumulateOptions,
) -> Result<Vec<MetricRecord>> {
    let with_profiles = options.scoring == ScoringMode::PresenceAbsence;
    let expected = ExpectedComposition::from_reader(expected)?.at_depth(
        key.level,
        options.taxa_to_keep.as_deref(),
        with_profiles,
    )?;
    let table = AbundanceTable::from_reader(observed)?;
    let sample_ids = table.sample_ids().to_vec();
    let counts = score_samples(&expected, &sample_ids, table, &options)?;
    Ok(unit_records(key, &sample_ids, &counts))
}
