//! # insight-eval
//!
//! Benchmark for how well chat models extract the key insights of a text.
//!
//! ## Overview
//!
//! - **Dataset**: paired `source_*.txt` / `gold_*.json` fixtures
//! - **Prompt + parser**: one fixed extraction prompt, and a lenient parser
//!   for the JSON the model sends back
//! - **Scorer**: fuzzy recall against gold insights, verbatim quote
//!   coverage, and negation-aware contradiction counting
//! - **Harness**: runs every case against every model and builds a report
//! - **History + leaderboard**: an append-only JSONL log of runs, ranked
//!   across runs per dataset and threshold
//!
//! ## Architecture
//!
//! ```text
//! insight-core (chat streaming, mock client)
//!     ↓
//! insight-eval (dataset, scorer, harness, history)  ← this crate
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use insight_core::{ChatClient, LlmConfig};
//! use insight_eval::{
//!     append_history, build_leaderboard, filter_history, load_history, render_leaderboard,
//!     render_markdown, EvalConfig, EvalHarness, FixtureDir,
//! };
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ChatClient::new(std::env::var("SYN_API_KEY")?, LlmConfig::default())?;
//! let harness = EvalHarness::new(EvalConfig::default());
//!
//! let dataset = FixtureDir::new("testdata/eval/walter_lewin");
//! let models = vec!["hf:deepseek-ai/DeepSeek-V3.2".to_string()];
//! let report = harness.run(&client, &dataset, &models).await?;
//! println!("{}", render_markdown(&report));
//!
//! let history = Path::new("analysis-results/eval-history.jsonl");
//! append_history(history, &report)?;
//! let records = filter_history(&load_history(history)?, &report.dataset_path, 0.9);
//! println!("{}", render_leaderboard(&build_leaderboard(&records)));
//! # Ok(())
//! # }
//! ```
//!
//! ## Scoring a single case
//!
//! ```
//! use insight_eval::{parse_output, score_case, Case};
//!
//! let case = Case {
//!     id: "01".to_string(),
//!     title: String::new(),
//!     source: "Physics requires assumptions.".to_string(),
//!     gold_insights: vec!["Physics requires assumptions.".to_string()],
//! };
//! let parsed = parse_output(
//!     r#"{"tldr": "t", "key_insights": ["Physics requires no assumptions."], "evidence_quotes": ["Physics"]}"#,
//! )
//! .unwrap();
//!
//! let score = score_case(&case, &parsed, 0.9);
//! assert_eq!(score.contradictions, 1);
//! assert!(!score.pass);
//! ```

pub mod artifacts;
pub mod config;
pub mod dataset;
pub mod harness;
pub mod history;
pub mod leaderboard;
pub mod models;
pub mod parse;
pub mod prompt;
pub mod report;
pub mod results;
pub mod scorer;

// Re-export public API
pub use artifacts::{
    sanitize_file_part, write_leaderboard_template, write_response_artifacts, ArtifactError,
    LeaderboardWrite, MANUAL_LEADERBOARD_TITLE,
};
pub use config::{ConfigError, ConfigLoader, EvalConfig, FileConfig};
pub use dataset::{limit_cases, load_dataset, Dataset, DatasetError, FixtureDir};
pub use harness::{EvalError, EvalHarness, EvalProgress, ModelProgressSummary};
pub use history::{
    append_history, filter_history, load_history, normalize_dataset_path, HistoryError, RunRecord,
    THRESHOLD_EPSILON,
};
pub use leaderboard::{build_leaderboard, LeaderboardRow};
pub use models::{resolve_model, select_models, EVAL_MODEL_DENYLIST};
pub use parse::{parse_output, ParseError};
pub use prompt::build_prompt;
pub use report::{
    render, render_json, render_leaderboard, render_markdown, sort_by_recall_desc, ReportFormat,
    LEADERBOARD_TITLE,
};
pub use results::{Case, CaseResult, ModelResult, ModelSummary, ParsedOutput, Report, Score};
pub use scorer::{
    score_case, score_case_with, ScoringPolicy, CONTRADICTION_OVERLAP_THRESHOLD,
    MATCH_OVERLAP_THRESHOLD,
};
