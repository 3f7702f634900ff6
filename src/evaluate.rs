//src/evaluate.rs

use std::path::PathBuf;
use std::sync::Arc;

use ahash::AHashMap;
use rayon::prelude::*;

use crate::abundance_table::{read_abundance_table, AbundanceRow};
use crate::confusion::{score_samples, AccumulateOptions};
use crate::correlation::correlation_records;
use crate::error::{EvalError, Result};
use crate::expected::{ExpectedComposition, ExpectedLevel};
use crate::layout::TableLayout;
use crate::report::{ReportAggregator, UnitKey};
use crate::types::{ConfusionCounts, CorrelationRecord, ScoringMode};

/// Everything needed to score a rank × dataset × method grid.
#[derive(Debug, Clone)]
pub struct EvalConfig {
    pub stem_dir: PathBuf,
    pub datasets: Vec<String>,
    /// Method labels; may contain `/` to address nested result directories.
    pub methods: Vec<String>,
    /// Levels to report, followed by the top level the expected tables are
    /// stored at.
    pub levels: Vec<usize>,
    pub layout: TableLayout,
    pub scoring: ScoringMode,
    pub min_count: f64,
    /// Taxonomy prefix; rows of either table not starting with it are dropped.
    pub taxa_to_keep: Option<String>,
    /// Also correlate observed with expected abundances per sample.
    pub correlations: bool,
    pub parallel: bool,
}

impl EvalConfig {
    pub fn new(stem_dir: PathBuf, datasets: Vec<String>, methods: Vec<String>, levels: Vec<usize>) -> Self {
        Self {
            stem_dir,
            datasets,
            methods,
            levels,
            layout: TableLayout::default(),
            scoring: ScoringMode::default(),
            min_count: 0.0,
            taxa_to_keep: None,
            correlations: false,
            parallel: false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.datasets.is_empty() {
            return Err(EvalError::InvalidConfig("no datasets given".to_string()));
        }
        if self.methods.is_empty() {
            return Err(EvalError::InvalidConfig("no methods given".to_string()));
        }
        if self.levels.len() < 2 {
            return Err(EvalError::InvalidConfig(
                "need at least one level to evaluate plus the top level".to_string(),
            ));
        }
        if !self.min_count.is_finite() || self.min_count < 0.0 {
            return Err(EvalError::InvalidConfig(format!("min_count {} must be >= 0", self.min_count)));
        }
        Ok(())
    }

    /// Deepest level; expected tables are read here and truncated from it.
    pub fn top_level(&self) -> usize {
        self.levels.last().copied().unwrap_or_default()
    }

    /// Levels that produce metric records.
    pub fn eval_levels(&self) -> &[usize] {
        match self.levels.split_last() {
            Some((_, rest)) => rest,
            None => &[],
        }
    }

    /// Per-sample expected abundances are only read when something uses them.
    fn needs_profiles(&self) -> bool {
        self.correlations || self.scoring == ScoringMode::PresenceAbsence
    }

    fn accumulate_options(&self) -> AccumulateOptions {
        AccumulateOptions {
            scoring: self.scoring,
            min_count: self.min_count,
            taxa_to_keep: self.taxa_to_keep.clone(),
        }
    }
}

/// Expected taxa per (dataset, level), shared read-only by every method.
pub type ExpectedLookup = AHashMap<(String, usize), Arc<ExpectedLevel>>;

/// Read each dataset's expected table once at the top level and truncate it
/// to every evaluated level.
pub fn build_expected_lookup(config: &EvalConfig) -> Result<ExpectedLookup> {
    let top_level = config.top_level();
    let mut lookup = ExpectedLookup::new();

    for dataset in &config.datasets {
        let path = config.layout.resolve_expected(&config.stem_dir, dataset, top_level)?;
        let composition = ExpectedComposition::from_path(&path)?;

        for &level in config.eval_levels() {
            let expected = composition
                .at_depth(level, config.taxa_to_keep.as_deref(), config.needs_profiles())
                .map_err(|e| e.in_file(&path))?;
            log::debug!(
                "{dataset} L{level}: {} expected taxa over {} sample(s)",
                expected.taxa.len(),
                composition.sample_ids.len()
            );
            lookup.insert((dataset.clone(), level), Arc::new(expected));
        }
    }
    Ok(lookup)
}

/// Units in output order: level, then dataset, then method.
pub fn plan_units(config: &EvalConfig) -> Vec<UnitKey> {
    let mut units = Vec::new();
    for &level in config.eval_levels() {
        for dataset in &config.datasets {
            for method in &config.methods {
                units.push(UnitKey {
                    level,
                    dataset: dataset.clone(),
                    method: method.clone(),
                });
            }
        }
    }
    units
}

/// Everything one (level, dataset, method) pass produced.
#[derive(Debug, Clone, Default)]
pub struct UnitScores {
    pub sample_ids: Vec<String>,
    pub counts: Vec<ConfusionCounts>,
    pub correlations: Vec<CorrelationRecord>,
}

/// Score one (level, dataset, method): locate its table, run the rows
/// through the accumulator and, when asked, correlate abundances.
///
/// Rows are streamed unless correlations need a second look at them.
pub fn score_unit(config: &EvalConfig, expected: &ExpectedLevel, key: &UnitKey) -> Result<UnitScores> {
    let path = config
        .layout
        .resolve_observed(&config.stem_dir, &key.dataset, &key.method, key.level)?;
    let table = read_abundance_table(&path)?;
    let sample_ids = table.sample_ids().to_vec();
    let options = config.accumulate_options();

    let scored = if config.correlations {
        table.collect::<Result<Vec<AbundanceRow>>>().and_then(|rows| {
            let counts = score_samples(expected, &sample_ids, rows.iter().cloned().map(Ok), &options)?;
            let correlations = correlation_records(key, expected, &sample_ids, &rows, &options)?;
            Ok((counts, correlations))
        })
    } else {
        score_samples(expected, &sample_ids, table, &options).map(|counts| (counts, Vec::new()))
    };
    let (counts, correlations) = scored.map_err(|e| e.in_file(&path))?;

    log::debug!(
        "Scored {} ({} samples) from {}",
        format_unit(key),
        sample_ids.len(),
        path.display()
    );
    Ok(UnitScores {
        sample_ids,
        counts,
        correlations,
    })
}

fn format_unit(key: &UnitKey) -> String {
    format!("L{} {}/{}", key.level, key.dataset, key.method)
}

/// Run the full evaluation grid. The first error aborts the run; on success
/// the aggregator holds every record in level → dataset → method → sample
/// order, whether or not units were scored in parallel.
pub fn evaluate_mock_results(config: &EvalConfig) -> Result<ReportAggregator> {
    config.validate()?;

    log::info!(
        "Building expected taxa for {} dataset(s) at top level {}",
        config.datasets.len(),
        config.top_level()
    );
    let lookup = build_expected_lookup(config)?;

    let units = plan_units(config);
    log::info!(
        "Scoring {} unit(s) ({} level(s) x {} dataset(s) x {} method(s))",
        units.len(),
        config.eval_levels().len(),
        config.datasets.len(),
        config.methods.len()
    );

    let run_unit = |key: &UnitKey| -> Result<UnitScores> {
        let expected = lookup
            .get(&(key.dataset.clone(), key.level))
            .ok_or_else(|| EvalError::InvalidConfig(format!("no expected taxa for {}", format_unit(key))))?;
        score_unit(config, expected, key)
    };

    // collect() keeps input order for both iterators
    let per_unit: Vec<UnitScores> = if config.parallel {
        units.par_iter().map(run_unit).collect::<Result<_>>()?
    } else {
        units.iter().map(run_unit).collect::<Result<_>>()?
    };

    let mut report = ReportAggregator::new();
    for (key, scores) in units.iter().zip(per_unit) {
        report.push_unit(key, &scores.sample_ids, &scores.counts);
        report.extend_correlations(scores.correlations);
    }
    log::info!("Produced {} metric record(s)", report.len());
    Ok(report)
}
