//! Evaluation harness for batch execution.
//!
//! The [`EvalHarness`] runs every case against every model, one model at a
//! time, and folds the outcomes into a [`Report`]. A call that fails or
//! times out becomes a zero-score [`CaseResult`]; the run carries on.

use crate::config::EvalConfig;
use crate::dataset::{Dataset, DatasetError};
use crate::parse::parse_output;
use crate::prompt::build_prompt;
use crate::results::{Case, CaseResult, ModelResult, Report};
use crate::scorer::score_case_with;
use futures_util::stream::{self, StreamExt};
use insight_core::{ChatOptions, ChatStreamer, LlmError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use thiserror::Error;

/// Errors that abort a run before any model is called.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EvalError {
    /// Failed to load dataset
    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    /// Nothing to evaluate
    #[error("no models selected")]
    NoModels,
}

/// Progress events emitted during evaluation.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum EvalProgress {
    /// A model is about to be evaluated.
    ModelStarted {
        model_id: String,
        /// Position of this model in the run (1-based).
        index: usize,
        /// Number of models in the run.
        total_models: usize,
        /// Number of cases per model.
        total_cases: usize,
    },
    /// A case finished (success or failure).
    CaseCompleted {
        model_id: String,
        /// Cases completed so far for this model.
        completed: usize,
        total: usize,
        success: bool,
    },
    /// A model finished all its cases.
    ModelCompleted { result_summary: ModelProgressSummary },
}

/// Headline numbers for a finished model.
#[derive(Debug, Clone)]
pub struct ModelProgressSummary {
    pub model_id: String,
    pub average_recall: f64,
    pub errors: usize,
    pub overall_pass: bool,
}

/// Evaluation harness for benchmarking models.
///
/// # Example
///
/// ```no_run
/// use insight_core::{ChatClient, LlmConfig};
/// use insight_eval::{EvalConfig, EvalHarness, FixtureDir};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ChatClient::new(std::env::var("SYN_API_KEY")?, LlmConfig::default())?;
/// let harness = EvalHarness::new(EvalConfig::default());
/// let dataset = FixtureDir::new("testdata/eval/walter_lewin");
///
/// let models = vec!["hf:deepseek-ai/DeepSeek-V3.2".to_string()];
/// let report = harness.run(&client, &dataset, &models).await?;
/// println!("{}", insight_eval::render_markdown(&report));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct EvalHarness {
    config: EvalConfig,
}

impl EvalHarness {
    pub fn new(config: EvalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Load `dataset` and evaluate every model on it.
    pub async fn run<D>(
        &self,
        client: &dyn ChatStreamer,
        dataset: &D,
        models: &[String],
    ) -> Result<Report, EvalError>
    where
        D: Dataset,
    {
        self.run_with_progress(client, dataset, models, |_| {}).await
    }

    /// Same as [`run`](Self::run), reporting progress through `on_progress`.
    ///
    /// The dataset is loaded before any model is called, so a broken dataset
    /// never costs an API call.
    pub async fn run_with_progress<D, F>(
        &self,
        client: &dyn ChatStreamer,
        dataset: &D,
        models: &[String],
        on_progress: F,
    ) -> Result<Report, EvalError>
    where
        D: Dataset,
        F: Fn(EvalProgress) + Send + Sync,
    {
        if models.is_empty() {
            return Err(EvalError::NoModels);
        }
        let limit = (self.config.limit > 0).then_some(self.config.limit);
        let cases = dataset.load(limit).await?;

        Ok(self
            .evaluate_with_progress(client, dataset.name(), &cases, models, on_progress)
            .await)
    }

    /// Evaluate already-loaded cases.
    pub async fn evaluate(
        &self,
        client: &dyn ChatStreamer,
        dataset_path: &str,
        cases: &[Case],
        models: &[String],
    ) -> Report {
        self.evaluate_with_progress(client, dataset_path, cases, models, |_| {})
            .await
    }

    /// Evaluate already-loaded cases with progress callbacks.
    pub async fn evaluate_with_progress<F>(
        &self,
        client: &dyn ChatStreamer,
        dataset_path: &str,
        cases: &[Case],
        models: &[String],
        on_progress: F,
    ) -> Report
    where
        F: Fn(EvalProgress) + Send + Sync,
    {
        let mut report = Report::new(dataset_path, self.config.recall_threshold);

        for (index, model_id) in models.iter().enumerate() {
            on_progress(EvalProgress::ModelStarted {
                model_id: model_id.clone(),
                index: index + 1,
                total_models: models.len(),
                total_cases: cases.len(),
            });

            let result = self
                .evaluate_model(client, model_id, cases, &on_progress)
                .await;

            on_progress(EvalProgress::ModelCompleted {
                result_summary: ModelProgressSummary {
                    model_id: result.model_id.clone(),
                    average_recall: result.summary.average_recall,
                    errors: result.case_stats().1,
                    overall_pass: result.summary.overall_pass,
                },
            });
            report.models.push(result);
        }

        report
    }

    /// Run every case against one model.
    ///
    /// Cases run with bounded concurrency; results keep dataset order.
    pub async fn evaluate_model<F>(
        &self,
        client: &dyn ChatStreamer,
        model_id: &str,
        cases: &[Case],
        on_progress: &F,
    ) -> ModelResult
    where
        F: Fn(EvalProgress) + Send + Sync,
    {
        log::info!(
            "Evaluating {} cases on {} with concurrency {}",
            cases.len(),
            model_id,
            self.config.concurrency
        );

        let started = Instant::now();
        let completed = AtomicUsize::new(0);
        let total = cases.len();

        let outcomes: Vec<CaseOutcome> = stream::iter(cases)
            .map(|case| {
                let completed = &completed;
                async move {
                    let outcome = self.evaluate_case(client, model_id, case).await;
                    let count = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    on_progress(EvalProgress::CaseCompleted {
                        model_id: model_id.to_string(),
                        completed: count,
                        total,
                        success: outcome.result.is_success(),
                    });
                    outcome
                }
            })
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await;

        let completion_tokens = outcomes.iter().map(|o| o.completion_tokens).sum();
        let results = outcomes.into_iter().map(|o| o.result).collect();

        ModelResult::from_cases(
            model_id,
            results,
            self.config.recall_threshold,
            started.elapsed(),
            completion_tokens,
        )
    }

    async fn evaluate_case(
        &self,
        client: &dyn ChatStreamer,
        model_id: &str,
        case: &Case,
    ) -> CaseOutcome {
        let prompt = build_prompt(&case.source);
        let options = ChatOptions::for_model(model_id).with_top_p(self.config.top_p);
        let timeout = self.config.call_timeout;

        let call = client.chat_stream(&prompt, &options);
        let streamed = match tokio::time::timeout(timeout, call).await {
            Ok(Ok(streamed)) => streamed,
            Ok(Err(e)) => return CaseOutcome::failed(model_id, case, e),
            Err(_) => {
                let error = LlmError::Timeout(timeout.as_millis() as u64);
                return CaseOutcome::failed(model_id, case, error);
            }
        };

        let completion_tokens = u64::from(streamed.usage.completion_tokens);
        let ttft_ms = streamed.ttft.map(|d| d.as_millis() as u64);

        let result = match parse_output(&streamed.content) {
            Ok(parsed) => {
                let score = score_case_with(
                    &self.config.scoring,
                    case,
                    &parsed,
                    self.config.recall_threshold,
                );
                log::debug!(
                    "{} case {}: recall {:.2}, contradictions {}",
                    model_id,
                    case.id,
                    score.recall,
                    score.contradictions
                );
                CaseResult::success(&case.id, streamed.content, parsed, score, ttft_ms)
            }
            Err(e) => {
                log::warn!("{} case {}: {}", model_id, case.id, e);
                CaseResult::failure(&case.id, streamed.content, e.to_string(), ttft_ms)
            }
        };

        CaseOutcome {
            result,
            completion_tokens,
        }
    }
}

struct CaseOutcome {
    result: CaseResult,
    completion_tokens: u64,
}

impl CaseOutcome {
    fn failed(model_id: &str, case: &Case, error: LlmError) -> Self {
        log::warn!("{} case {} failed: {}", model_id, case.id, error);
        Self {
            result: CaseResult::failure(&case.id, String::new(), error.to_string(), None),
            completion_tokens: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insight_core::{MockChatClient, MockReply};
    use std::sync::Mutex;
    use std::time::Duration;

    const GOOD: &str = r#"{"tldr":"t","key_insights":["Check units."],"evidence_quotes":["Check units"]}"#;

    fn case(id: &str) -> Case {
        Case {
            id: id.to_string(),
            title: String::new(),
            source: "Check units before anything else.".to_string(),
            gold_insights: vec!["Check units.".to_string()],
        }
    }

    #[test]
    fn test_harness_default() {
        let harness = EvalHarness::default();
        assert_eq!(harness.config().recall_threshold, 0.90);
    }

    #[tokio::test]
    async fn test_scores_successful_case() {
        let mock = MockChatClient::new().with_reply(
            "m1",
            MockReply::text_with_stats(GOOD, 30, Duration::from_millis(40)),
        );
        let report = EvalHarness::default()
            .evaluate(&mock, "d", &[case("01")], &["m1".to_string()])
            .await;

        let model = &report.models[0];
        let result = &model.cases[0];
        assert!(result.is_success());
        assert_eq!(result.score.recall, 1.0);
        assert!(result.score.pass);
        assert_eq!(result.ttft_ms, Some(40));
        assert_eq!(model.completion_tokens, 30);
        assert_eq!(model.avg_ttft_ms, 40);
        assert!(model.summary.overall_pass);
    }

    #[tokio::test]
    async fn test_call_sends_source_prompt_to_model() {
        let mock = MockChatClient::new().with_fallback(MockReply::text(GOOD));
        EvalHarness::default()
            .evaluate(&mock, "d", &[case("01")], &["m1".to_string()])
            .await;

        let prompts = mock.prompts();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].0, "m1");
        assert!(prompts[0].1.ends_with("Check units before anything else."));
    }

    #[tokio::test]
    async fn test_unparseable_output_keeps_raw_text() {
        let mock = MockChatClient::new().with_reply("m1", MockReply::text("no json here"));
        let report = EvalHarness::default()
            .evaluate(&mock, "d", &[case("01")], &["m1".to_string()])
            .await;

        let result = &report.models[0].cases[0];
        assert!(result.has_error());
        assert_eq!(result.raw_output, "no json here");
        assert!(result.parsed.is_none());
        assert_eq!(result.score.recall, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_call_times_out() {
        let mock = MockChatClient::new()
            .with_reply("m1", MockReply::Stall)
            .with_reply("m1", MockReply::text(GOOD));
        let harness =
            EvalHarness::new(EvalConfig::default().with_call_timeout(Duration::from_secs(5)));

        let report = harness
            .evaluate(&mock, "d", &[case("01"), case("02")], &["m1".to_string()])
            .await;

        let cases = &report.models[0].cases;
        assert_eq!(cases[0].error.as_deref(), Some("Request timed out after 5000ms"));
        assert!(cases[1].is_success());
    }

    #[tokio::test]
    async fn test_progress_events() {
        let mock = MockChatClient::new()
            .with_reply("m1", MockReply::text(GOOD))
            .with_reply("m1", MockReply::error("502"));
        let events = Mutex::new(Vec::new());

        EvalHarness::default()
            .evaluate_with_progress(
                &mock,
                "d",
                &[case("01"), case("02")],
                &["m1".to_string()],
                |e| events.lock().unwrap().push(e),
            )
            .await;

        let events = events.into_inner().unwrap();
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], EvalProgress::ModelStarted { total_cases: 2, .. }));
        assert!(matches!(events[1], EvalProgress::CaseCompleted { completed: 1, success: true, .. }));
        assert!(matches!(events[2], EvalProgress::CaseCompleted { completed: 2, success: false, .. }));
        let EvalProgress::ModelCompleted { result_summary } = &events[3] else {
            panic!("expected ModelCompleted");
        };
        assert_eq!(result_summary.errors, 1);
        assert!(!result_summary.overall_pass);
    }
}
