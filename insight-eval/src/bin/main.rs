//! Evaluation CLI for key-insight extraction.
//!
//! Runs the fixture dataset against the selected models, prints a report,
//! saves raw responses, and keeps a cross-run leaderboard.

use anyhow::{bail, Context};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use insight_core::{ChatClient, LlmConfig, ModelLister};
use insight_eval::{
    append_history, build_leaderboard, filter_history, load_history, render, render_leaderboard,
    select_models, write_leaderboard_template, write_response_artifacts, Case, ConfigLoader,
    Dataset, EvalConfig, EvalHarness, EvalProgress, FileConfig, FixtureDir, LeaderboardRow,
    LeaderboardWrite, Report, ReportFormat,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

const MODEL_LIST_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit code when the run succeeded but saving its results did not.
const EXIT_PERSISTENCE_FAILED: u8 = 2;

/// Evaluation CLI for key-insight extraction.
#[derive(Parser, Debug)]
#[command(name = "insight-eval")]
#[command(about = "Evaluate model key-insight extraction against a fixture dataset")]
#[command(version)]
struct Args {
    /// Dataset directory containing source_*.txt and gold_*.json
    #[arg(long, default_value = "testdata/eval/walter_lewin")]
    dataset: PathBuf,

    /// Write the report to this file as well as stdout
    #[arg(long)]
    out: Option<PathBuf>,

    /// Output format: md or json
    #[arg(long, default_value = "md")]
    format: ReportFormat,

    /// Comma-separated model ids or aliases (default: every listed model)
    #[arg(long, default_value = "")]
    models: String,

    /// Max dataset cases to evaluate (0 = all)
    #[arg(long, default_value_t = 0)]
    limit: usize,

    /// Minimum recall required for a pass [default: 0.90]
    #[arg(long)]
    recall_threshold: Option<f64>,

    /// JSONL file for appending run scores [default: analysis-results/eval-history.jsonl]
    #[arg(long)]
    history: Option<PathBuf>,

    /// Leaderboard markdown path, empty disables it [default: analysis-results/eval-leaderboard.md]
    #[arg(long)]
    leaderboard_out: Option<PathBuf>,

    /// Number of leaderboard rows to print
    #[arg(long, default_value_t = 10)]
    leaderboard_top: usize,

    /// Disable history append and leaderboard updates
    #[arg(long)]
    no_history: bool,

    /// Base directory for saved responses, empty disables it [default: analysis-results/eval-responses]
    #[arg(long)]
    responses_dir: Option<PathBuf>,

    /// API key (can also use SYN_API_KEY env var)
    #[arg(long, env = "SYN_API_KEY", hide_env_values = true, default_value = "")]
    api_key: String,

    /// API base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Per-call deadline in seconds [default: 120]
    #[arg(long)]
    call_timeout: Option<u64>,

    /// Cases evaluated at once per model [default: 1]
    #[arg(long)]
    concurrency: Option<usize>,

    /// Config file to use instead of the standard locations
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the leaderboard from history and exit
    #[arg(long)]
    leaderboard_only: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Validate CLI arguments.
    fn validate(&self) -> Result<(), String> {
        if let Some(threshold) = self.recall_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(format!(
                    "recall-threshold ({}) must be between 0.0 and 1.0",
                    threshold
                ));
            }
        }

        if self.concurrency == Some(0) {
            return Err("concurrency must be greater than 0".to_string());
        }

        if self.call_timeout == Some(0) {
            return Err("call-timeout must be greater than 0".to_string());
        }

        if !self.leaderboard_only && self.api_key.trim().is_empty() {
            return Err("API key not configured (set SYN_API_KEY or pass --api-key)".to_string());
        }

        Ok(())
    }

    fn load_file_config(&self) -> FileConfig {
        let loader = match &self.config {
            Some(path) => ConfigLoader::with_file(path),
            None => ConfigLoader::new(),
        };
        let (config, loaded) = loader.load();
        for path in loaded {
            log::info!("Loaded config from {}", path.display());
        }
        config
    }

    /// Build EvalConfig: file values first, flags on top.
    fn eval_config(&self, file: &FileConfig) -> EvalConfig {
        let mut config = file
            .apply_eval(EvalConfig::default())
            .with_limit(self.limit)
            .with_leaderboard_top(self.leaderboard_top)
            .with_history_enabled(!self.no_history);

        if let Some(v) = self.recall_threshold {
            config = config.with_recall_threshold(v);
        }
        if let Some(v) = self.call_timeout {
            config = config.with_call_timeout(Duration::from_secs(v));
        }
        if let Some(v) = self.concurrency {
            config = config.with_concurrency(v);
        }
        if let Some(v) = &self.history {
            config = config.with_history_path(v);
        }
        if let Some(v) = &self.leaderboard_out {
            config = config.with_leaderboard_path(v);
        }
        if let Some(v) = &self.responses_dir {
            config = config.with_responses_dir(v);
        }
        config
    }

    /// Build LlmConfig. The HTTP timeout matches the per-call deadline.
    fn llm_config(&self, file: &FileConfig, eval: &EvalConfig) -> LlmConfig {
        let mut config = file
            .apply_llm(LlmConfig::default())
            .with_timeout(eval.call_timeout);
        if let Some(url) = &self.base_url {
            config = config.with_base_url(url.as_str());
        }
        config
    }

    fn dataset_path(&self) -> String {
        self.dataset.to_string_lossy().into_owned()
    }
}

fn is_disabled(path: &Path) -> bool {
    path.as_os_str().to_string_lossy().trim().is_empty()
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {prefix} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    bar
}

/// Run every selected model, showing progress in human mode.
async fn evaluate(
    config: &EvalConfig,
    client: &ChatClient,
    dataset_path: &str,
    cases: &[Case],
    models: &[String],
    human: bool,
) -> Report {
    let harness = EvalHarness::new(config.clone());
    if !human {
        return harness.evaluate(client, dataset_path, cases, models).await;
    }

    eprintln!();
    eprintln!("Running eval ({} models, {} cases)", models.len(), cases.len());
    eprintln!("{}", "-".repeat(60));

    let bar = progress_bar();
    let report = harness
        .evaluate_with_progress(client, dataset_path, cases, models, |progress| {
            match progress {
                EvalProgress::ModelStarted {
                    model_id,
                    index,
                    total_models,
                    total_cases,
                } => {
                    bar.reset();
                    bar.set_length(total_cases as u64);
                    bar.set_prefix(format!("[{}/{}] {}", index, total_models, model_id));
                    bar.set_message("");
                }
                EvalProgress::CaseCompleted {
                    completed, success, ..
                } => {
                    bar.set_position(completed as u64);
                    if !success {
                        bar.set_message("(some failures)");
                    }
                }
                EvalProgress::ModelCompleted { result_summary } => {
                    bar.println(format!(
                        "  {} recall={:.2} errors={} pass={}",
                        result_summary.model_id,
                        result_summary.average_recall,
                        result_summary.errors,
                        if result_summary.overall_pass { "yes" } else { "no" }
                    ));
                }
                _ => {} // Handle future variants gracefully
            }
        })
        .await;
    bar.finish_and_clear();

    report
}

fn write_report_file(path: &Path, rendered: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to prepare output dir {}", parent.display()))?;
    }
    std::fs::write(path, rendered)
        .with_context(|| format!("failed to write report to {}", path.display()))
}

/// Append the report to history and rank the matching runs.
fn update_history(config: &EvalConfig, report: &Report) -> anyhow::Result<Vec<LeaderboardRow>> {
    append_history(&config.history_path, report)?;
    let records = load_history(&config.history_path)?;
    let matching = filter_history(&records, &report.dataset_path, report.recall_threshold);
    Ok(build_leaderboard(&matching))
}

fn top_rows(rows: &[LeaderboardRow], top: usize) -> &[LeaderboardRow] {
    &rows[..rows.len().min(top)]
}

/// Print the leaderboard for the dataset and threshold straight from history.
fn print_leaderboard_only(
    config: &EvalConfig,
    dataset_path: &str,
    format: ReportFormat,
) -> anyhow::Result<()> {
    let records = load_history(&config.history_path)?;
    let matching = filter_history(&records, dataset_path, config.recall_threshold);
    let rows = build_leaderboard(&matching);
    let shown = top_rows(&rows, config.leaderboard_top);

    match format {
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(shown)?),
        ReportFormat::Markdown => {
            if rows.is_empty() {
                eprintln!(
                    "No history for {} at threshold {:.2} in {}",
                    dataset_path,
                    config.recall_threshold,
                    config.history_path.display()
                );
            }
            print!("{}", render_leaderboard(shown));
        }
    }
    Ok(())
}

/// Print the report and persist everything around it.
///
/// Failures to persist are reported but never hide the report itself.
fn finalize(args: &Args, config: &EvalConfig, report: &Report, human: bool) -> anyhow::Result<ExitCode> {
    let rendered = render(report, args.format).context("failed to render report")?;
    if human {
        println!();
    }
    println!("{}", rendered);

    let mut persistence_failed = false;

    if let Some(out) = &args.out {
        match write_report_file(out, &rendered) {
            Ok(()) if human => println!("Saved report to {}", out.display()),
            Ok(()) => {}
            Err(e) => {
                eprintln!("Warning: run completed, but report was not saved: {:#}", e);
                persistence_failed = true;
            }
        }
    }

    let responses_path = if is_disabled(&config.responses_dir) {
        None
    } else {
        match write_response_artifacts(&config.responses_dir, report) {
            Ok(path) => {
                if human {
                    println!("Saved responses to {}", path.display());
                }
                Some(path)
            }
            Err(e) => {
                eprintln!("Warning: run completed, but responses were not saved: {}", e);
                persistence_failed = true;
                None
            }
        }
    };

    if human {
        println!("Case errors: {}", report.error_count());
    }

    if !config.history_enabled {
        return Ok(exit_code(persistence_failed));
    }

    match update_history(config, report) {
        Ok(rows) => {
            if human && config.leaderboard_top > 0 && !rows.is_empty() {
                println!();
                print!("{}", render_leaderboard(top_rows(&rows, config.leaderboard_top)));
            }
        }
        Err(e) => {
            eprintln!("Warning: run completed, but history was not updated: {:#}", e);
            persistence_failed = true;
        }
    }

    if !is_disabled(&config.leaderboard_path) {
        let path = &config.leaderboard_path;
        match write_leaderboard_template(path, report, responses_path.as_deref()) {
            Ok(LeaderboardWrite::Created) if human => {
                println!("Created manual leaderboard template at {}", path.display());
            }
            Ok(LeaderboardWrite::KeptExisting) if human => {
                println!("Left existing manual leaderboard unchanged at {}", path.display());
            }
            Ok(_) => {}
            Err(e) => {
                eprintln!("Warning: run completed, but leaderboard was not written: {}", e);
                persistence_failed = true;
            }
        }
    }

    Ok(exit_code(persistence_failed))
}

fn exit_code(persistence_failed: bool) -> ExitCode {
    if persistence_failed {
        ExitCode::from(EXIT_PERSISTENCE_FAILED)
    } else {
        ExitCode::SUCCESS
    }
}

async fn run(args: &Args) -> anyhow::Result<ExitCode> {
    let file_config = args.load_file_config();
    let config = args.eval_config(&file_config);

    if args.leaderboard_only {
        print_leaderboard_only(&config, &args.dataset_path(), args.format)?;
        return Ok(ExitCode::SUCCESS);
    }

    let human = args.format == ReportFormat::Markdown;

    // Fail on a broken dataset before touching the network.
    let dataset = FixtureDir::new(&args.dataset);
    let limit = (config.limit > 0).then_some(config.limit);
    let cases = dataset
        .load(limit)
        .await
        .with_context(|| format!("failed to load dataset {}", args.dataset.display()))?;

    let client = ChatClient::new(args.api_key.clone(), args.llm_config(&file_config, &config))
        .context("failed to create API client")?;
    let available = tokio::time::timeout(MODEL_LIST_TIMEOUT, client.list_models())
        .await
        .context("timed out listing models")?
        .context("failed to list models")?;

    let models: Vec<String> = select_models(&available, &args.models)
        .into_iter()
        .map(|m| m.id)
        .collect();
    if models.is_empty() {
        bail!("no models selected");
    }

    let report = evaluate(&config, &client, dataset.name(), &cases, &models, human).await;
    finalize(args, &config, &report, human)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    let default_filter = if args.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(&args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
