//! fer-bench CLI Module
//!
//! Command-line interface for running the benchmark and inspecting data.

use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::ExperimentConfig;
use crate::data::{DatasetLoader, DatasetSummary, FeatureExtractor};
use crate::evaluation::{EvaluationReport, ReportScope};
use crate::pipeline::{Experiment, ModelOutcome, ModelResult, PreparedData};
use crate::training::ModelKind;
use crate::visualization::PreviewGrid;

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim(&format!("┌{}┐", "─".repeat(W - 1)))); }
fn line_box_bottom() { println!("  {}", dim(&format!("└{}┘", "─".repeat(W - 1)))); }

fn line_box_center(content: &str) {
    let visible_len = content.chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    println!(
        "  {}  {}{}{} {}",
        dim("│"),
        " ".repeat(left),
        content.white().bold(),
        " ".repeat(total_pad - left),
        dim("│")
    );
}

fn kv(key: &str, val: &str) {
    println!("  {:<14} {}", muted(key), val.white());
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "fer-bench")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Facial expression classification benchmark")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train and evaluate the classifiers
    Run(RunArgs),

    /// Show row and class counts of a dataset file
    Info {
        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,
    },

    /// Render the first faces of a dataset file to a PNG grid
    Preview {
        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,

        /// Output PNG file
        #[arg(short, long)]
        output: PathBuf,

        /// Number of faces to render
        #[arg(short, long, default_value = "30")]
        count: usize,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Training pool CSV
    #[arg(long)]
    pub train: Option<PathBuf>,

    /// External evaluation CSV
    #[arg(long)]
    pub test: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Fraction of the training pool to sample
    #[arg(long)]
    pub sample_fraction: Option<f64>,

    /// Fraction of the sample held out for testing
    #[arg(long)]
    pub test_fraction: Option<f64>,

    /// Seed for sampling and splitting
    #[arg(long)]
    pub seed: Option<u64>,

    /// Models to run (nb, svm, mlp)
    #[arg(short, long, value_delimiter = ',')]
    pub models: Vec<String>,

    /// Report every observed class instead of only predicted ones
    #[arg(long)]
    pub report_all_classes: bool,

    /// Train the models concurrently
    #[arg(long)]
    pub parallel: bool,

    /// Write a preview grid of sampled faces to this PNG
    #[arg(long)]
    pub preview: Option<PathBuf>,

    /// Write all reports as JSON to this file
    #[arg(long)]
    pub json_out: Option<PathBuf>,
}

impl RunArgs {
    /// Configuration file (or defaults) with command-line overrides applied
    pub fn to_config(&self) -> anyhow::Result<ExperimentConfig> {
        let mut config = match &self.config {
            Some(path) => ExperimentConfig::from_json_file(path)?,
            None => ExperimentConfig::default(),
        };

        if let Some(path) = &self.train {
            config = config.with_train_path(path);
        }
        if let Some(path) = &self.test {
            config = config.with_eval_path(path);
        }
        if let Some(f) = self.sample_fraction {
            config = config.with_sample_fraction(f);
        }
        if let Some(f) = self.test_fraction {
            config = config.with_test_fraction(f);
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        if !self.models.is_empty() {
            let models = self
                .models
                .iter()
                .map(|m| m.parse::<ModelKind>())
                .collect::<Result<Vec<_>, _>>()?;
            config = config.with_models(models);
        }
        if self.report_all_classes {
            config = config.with_report_scope(ReportScope::AllObserved);
        }
        if self.parallel {
            config = config.with_parallel_models(true);
        }

        config.validate()?;
        Ok(config)
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_run(args: &RunArgs) -> anyhow::Result<()> {
    let config = args.to_config()?;
    let experiment = Experiment::new(config.clone());

    println!();
    line_box_top();
    line_box_center("FER2013 Emotion Benchmark");
    line_box_bottom();

    section("Data");
    step_run("Loading and extracting features");
    let start = Instant::now();
    let data = experiment.prepare()?;
    step_done(&format!("{:.2?}", start.elapsed()));

    print_summary("Training pool", &data.train_summary);
    print_summary("Evaluation set", &data.eval_summary);
    kv("Sampled", &format!("{} rows ({:.0}%, seed {})", data.pool.len(), config.sample_fraction * 100.0, config.seed));
    kv("Train split", &format!("{} × {}", data.x_train.nrows(), data.x_train.ncols()));
    kv("Test split", &format!("{} × {}", data.x_test.nrows(), data.x_test.ncols()));

    if let Some(path) = &args.preview {
        write_preview(&data, path)?;
    }

    section("Models");
    let results = if config.parallel_models {
        step_run(&format!("Training {} models in parallel", config.models.len()));
        let start = Instant::now();
        let results = experiment.run_models(&data)?;
        step_done(&format!("{:.2?}", start.elapsed()));
        results
    } else {
        let mut results = Vec::with_capacity(config.models.len());
        for &kind in &config.models {
            step_run(&format!("Training {}", kind.title().cyan()));
            let result = experiment.run_model(kind, &data)?;
            step_done(&format!("{:.2}s", result.training_time_secs));
            results.push(result);
        }
        results
    };

    for result in &results {
        print_model_result(result);
    }
    print_comparison(&results);

    if let Some(path) = &args.json_out {
        let summary = experiment.summarize(&data, results);
        std::fs::write(path, serde_json::to_string_pretty(&summary)?)?;
        println!("  {} {}", ok("saved"), dim(&path.display().to_string()));
    }

    println!();
    Ok(())
}

fn print_summary(title: &str, summary: &DatasetSummary) {
    let path = summary
        .path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    kv(title, &format!("{} rows  {}", summary.n_rows, dim(&path)));
}

fn print_class_counts(summary: &DatasetSummary) {
    let max = summary.class_counts.iter().map(|(_, n)| *n).max().unwrap_or(0).max(1);
    for (emotion, count) in &summary.class_counts {
        let bar = "█".repeat(count * 30 / max);
        println!("  {:<10} {:>7} {}", muted(emotion.name()), count, accent(&bar));
    }
}

fn write_preview(data: &PreparedData, path: &Path) -> anyhow::Result<()> {
    let grid = PreviewGrid::default();
    let n = data.x_pool.nrows().min(grid.capacity());
    let rows: Vec<usize> = (0..n).collect();
    let x = data.x_pool.select(ndarray::Axis(0), &rows);

    step_run(&format!("Writing preview → {}", path.display()));
    grid.save(&x, path)?;
    step_done(&format!("{} faces", n));
    print!("{}", grid.legend(&data.y_pool[..n]));
    Ok(())
}

fn print_report(heading: &str, report: &EvaluationReport) {
    println!();
    println!("{}", heading.white().bold());
    print!("{}", report.confusion);
    println!();
    print!("{}", report);
    let undefined = report.undefined_precision();
    if !undefined.is_empty() {
        let names: Vec<&str> = undefined.iter().map(|e| e.name()).collect();
        println!("{}", dim(&format!("precision set to 0.0 for never-predicted: {}", names.join(", "))));
    }
}

fn print_model_result(result: &ModelResult) {
    let title = result.kind.title();
    match &result.outcome {
        ModelOutcome::Completed { internal, external } => {
            print_report(&format!("-----{} CONFUSION MATRIX AND CLASSIFICATION REPORT-----", title), internal);
            print_report(&format!("-----{} OUR TEST-----", title), external);
        }
        ModelOutcome::Failed { error } => {
            println!();
            println!("{}", format!("-----{} FAILED-----", title).red().bold());
            println!("  {}", error.red());
        }
    }
}

fn print_comparison(results: &[ModelResult]) {
    section("Summary");
    println!(
        "  {:<24} {:>10} {:>10} {:>10}",
        muted("Model"), muted("Test acc"), muted("Our test"), muted("Time")
    );
    println!("  {}", dim(&"─".repeat(58)));
    for result in results {
        match &result.outcome {
            ModelOutcome::Completed { internal, external } => println!(
                "  {:<24} {:>10.4} {:>10.4} {:>9.2}s",
                result.name,
                internal.overall_accuracy(),
                external.overall_accuracy(),
                result.training_time_secs
            ),
            ModelOutcome::Failed { .. } => {
                println!("  {:<24} {:>10}", result.name, "failed".red())
            }
        }
    }
}

pub fn cmd_info(data_path: &Path) -> anyhow::Result<()> {
    section("Data Info");

    let dataset = DatasetLoader::new().load(data_path)?;
    let summary = DatasetSummary::of(&dataset);

    kv("File", &data_path.display().to_string());
    kv("Rows", &summary.n_rows.to_string());
    if let Some(first) = dataset.samples().first() {
        let check = match FeatureExtractor::new().extract(first) {
            Ok(v) => format!("{} features", v.len()),
            Err(e) => format!("{}", e.to_string().red()),
        };
        kv("First row", &check);
    }
    println!();
    print_class_counts(&summary);

    let mut usages: Vec<(&str, usize)> = Vec::new();
    for usage in dataset.samples().iter().filter_map(|s| s.usage.as_deref()) {
        match usages.iter_mut().find(|(u, _)| *u == usage) {
            Some((_, n)) => *n += 1,
            None => usages.push((usage, 1)),
        }
    }
    if !usages.is_empty() {
        println!();
        for (usage, n) in usages {
            kv(usage, &n.to_string());
        }
    }

    println!();
    Ok(())
}

pub fn cmd_preview(data_path: &Path, output: &Path, count: usize) -> anyhow::Result<()> {
    section("Preview");

    step_run("Loading data");
    let dataset = DatasetLoader::new().load(data_path)?;
    step_done(&format!("{} rows", dataset.len()));

    let n = count.min(dataset.len());
    if n == 0 {
        anyhow::bail!("nothing to preview in {}", data_path.display());
    }
    let rows: Vec<usize> = (0..n).collect();
    let head = dataset.select(&rows);
    let (x, labels) = FeatureExtractor::new().extract_batch(&head)?;

    let grid = PreviewGrid::for_count(n);
    step_run(&format!("Writing {}", output.display()));
    grid.save(&x, output)?;
    step_done(&format!("{} × {} grid", grid.rows, grid.cols));

    println!();
    print!("{}", grid.legend(&labels));
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_overrides() {
        let cli = Cli::parse_from([
            "fer-bench", "run", "--seed", "7", "--models", "nb,mlp", "--report-all-classes",
        ]);
        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run");
        };
        let config = args.to_config().unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.models, vec![ModelKind::NaiveBayes, ModelKind::NeuralNet]);
        assert_eq!(config.report_scope, ReportScope::AllObserved);
        assert_eq!(config.test_fraction, 0.4);
    }

    #[test]
    fn test_unknown_model_rejected() {
        let args = RunArgs {
            models: vec!["forest".to_string()],
            ..Default::default()
        };
        assert!(args.to_config().is_err());
    }

    #[test]
    fn test_no_subcommand() {
        let cli = Cli::parse_from(["fer-bench"]);
        assert!(cli.command.is_none());
    }
}
