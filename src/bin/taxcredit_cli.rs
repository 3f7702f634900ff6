use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};

use taxcredit_rs::summary::{method_win_counts, top_methods, write_top_scores_tsv, write_win_counts_tsv};
use taxcredit_rs::taxonomy::parse_level;
use taxcredit_rs::{evaluate_mock_results, EvalConfig, EvalError, Metric, Result, ScoringMode, TableLayout};

/// CLI-friendly scoring mode
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliScoring {
    /// Unexpected taxa penalize every sample; zero-abundance expected taxa add a false negative
    Reference,
    /// Per-sample set comparison against the taxa expected in that sample
    PresenceAbsence,
}

impl From<CliScoring> for ScoringMode {
    fn from(mode: CliScoring) -> Self {
        match mode {
            CliScoring::Reference => ScoringMode::Reference,
            CliScoring::PresenceAbsence => ScoringMode::PresenceAbsence,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliMetric {
    Precision,
    Recall,
    FMeasure,
}

impl From<CliMetric> for Metric {
    fn from(metric: CliMetric) -> Self {
        match metric {
            CliMetric::Precision => Metric::Precision,
            CliMetric::Recall => Metric::Recall,
            CliMetric::FMeasure => Metric::FMeasure,
        }
    }
}

/// Score taxonomic classifier results against mock community compositions
#[derive(Parser)]
#[command(name = "taxcredit-rs")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding one sub-directory per dataset
    stem_dir: PathBuf,

    /// Comma-separated dataset directory names
    datasets: String,

    /// Comma-separated method labels (paths below each dataset directory)
    methods: String,

    /// Comma-separated levels; the last one is the top level of the expected tables
    levels: String,

    /// Output path for the metrics table
    #[arg(short, long, default_value = "mock_results.tsv")]
    output: PathBuf,

    /// Row-counting rules
    #[arg(long, value_enum, default_value = "reference")]
    scoring: CliScoring,

    /// Skip observed rows whose total abundance is below this value
    #[arg(long, default_value = "0")]
    min_count: f64,

    /// Comma-separated leading ranks; only taxa under this lineage are scored
    #[arg(long)]
    taxa_to_keep: Option<String>,

    /// Also write per-sample Pearson and Spearman correlations here
    #[arg(long)]
    correlations: Option<PathBuf>,

    /// Score units concurrently
    #[arg(long)]
    parallel: bool,

    /// Preferred table filename template ({level} is substituted)
    #[arg(long, default_value = taxcredit_rs::layout::DEFAULT_PRIMARY_NAME)]
    primary_name: String,

    /// Fallback table filename template
    #[arg(long, default_value = taxcredit_rs::layout::DEFAULT_FALLBACK_NAME)]
    fallback_name: String,

    /// Directory name holding each dataset's expected table
    #[arg(long, default_value = taxcredit_rs::layout::DEFAULT_EXPECTED_DIR)]
    expected_dir: String,

    /// Also write the top-performing methods per sample here
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Also write how often each method is a top performer here
    #[arg(long)]
    win_counts: Option<PathBuf>,

    /// Metric used to rank methods in the summaries
    #[arg(long, value_enum, default_value = "f-measure")]
    summary_metric: CliMetric,
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn spinner(color: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let template = format!("{{spinner:.{color}}} {{msg}}");
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
        .template(&template)
    {
        spinner.set_style(style);
    }
    spinner
}

fn build_config(cli: &Cli) -> Result<EvalConfig> {
    let levels = split_list(&cli.levels)
        .iter()
        .map(|l| parse_level(l))
        .collect::<Result<Vec<usize>>>()?;

    let mut config = EvalConfig::new(
        cli.stem_dir.clone(),
        split_list(&cli.datasets),
        split_list(&cli.methods),
        levels,
    );
    config.layout = TableLayout {
        expected_dir: cli.expected_dir.clone(),
        candidates: [cli.primary_name.clone(), cli.fallback_name.clone()],
    };
    config.scoring = cli.scoring.into();
    config.min_count = cli.min_count;
    config.taxa_to_keep = cli
        .taxa_to_keep
        .as_deref()
        .map(|ranks| split_list(ranks).join(";"))
        .filter(|prefix| !prefix.is_empty());
    config.correlations = cli.correlations.is_some();
    config.parallel = cli.parallel;
    Ok(config)
}

fn write_with<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    let file = File::create(path).map_err(|e| EvalError::from(e).in_file(path))?;
    let mut writer = BufWriter::new(file);
    write(&mut writer)?;
    writer.flush()?;
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = build_config(&cli)?;

    let scoring = spinner("green");
    scoring.set_message("Scoring classifier results...");
    let report = evaluate_mock_results(&config);
    let report = match report {
        Ok(report) => {
            scoring.finish_with_message(format!("Scored {} sample record(s).", report.len()));
            report
        }
        Err(e) => {
            scoring.finish_and_clear();
            return Err(e);
        }
    };

    let writing = spinner("yellow");
    writing.set_message("Writing output files...");
    report.write_tsv_file(&cli.output)?;
    if let Some(path) = &cli.correlations {
        report.write_correlations_file(path)?;
    }

    if cli.summary.is_some() || cli.win_counts.is_some() {
        let metric: Metric = cli.summary_metric.into();
        let top = top_methods(report.records(), metric);
        if let Some(path) = &cli.summary {
            write_with(path, |w| write_top_scores_tsv(w, &top, metric))?;
        }
        if let Some(path) = &cli.win_counts {
            let counts = method_win_counts(&top);
            write_with(path, |w| write_win_counts_tsv(w, &counts))?;
        }
    }
    writing.finish_with_message(format!("Wrote {}", cli.output.display()));
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
