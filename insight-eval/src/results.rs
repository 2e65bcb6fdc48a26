//! Evaluation results and summary types.
//!
//! This module contains the entities produced by an evaluation run, from a
//! single fixture up to the full [`Report`]. Everything here serializes to
//! JSON with the same field names the history file and saved responses use.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A single evaluation fixture: a source text and its gold insights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    /// Unique identifier (gold `id`, or the file suffix when that is empty)
    pub id: String,
    /// Human-readable title from the gold file
    pub title: String,
    /// Source text the model is asked to distill
    pub source: String,
    /// Ground-truth insights; order is irrelevant
    pub gold_insights: Vec<String>,
}

/// Normalized model output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedOutput {
    pub tldr: String,
    pub key_insights: Vec<String>,
    pub evidence_quotes: Vec<String>,
}

/// Scoring metrics for one case.
///
/// The default value is the zero score attached to failed cases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Score {
    /// Fraction of gold insights matched, in `[0, 1]`
    pub recall: f64,
    /// Gold insights with no matching prediction
    pub missing_insights: usize,
    /// Negated predictions that conflict with a non-negated gold insight
    pub contradictions: usize,
    /// Fraction of evidence quotes found verbatim in the source, in `[0, 1]`
    pub quote_coverage: f64,
    /// TL;DR, insights and quotes are all present
    pub format_compliant: bool,
    /// Recall meets the threshold, no contradictions, format compliant
    pub pass: bool,
    /// Number of gold insights matched
    pub matched_gold_count: usize,
}

/// Result of evaluating one case against one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseResult {
    /// Case identifier
    pub case_id: String,

    /// Raw model text (empty if the call itself failed)
    pub raw_output: String,

    /// Parsed output, when the raw text was parseable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed: Option<ParsedOutput>,

    /// Metrics; the zero value when `error` is set
    pub score: Score,

    /// Time to first token, in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttft_ms: Option<u64>,

    /// Transport or parse error, if the case failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CaseResult {
    /// Create a scored result.
    pub fn success(
        case_id: impl Into<String>,
        raw_output: String,
        parsed: ParsedOutput,
        score: Score,
        ttft_ms: Option<u64>,
    ) -> Self {
        Self {
            case_id: case_id.into(),
            raw_output,
            parsed: Some(parsed),
            score,
            ttft_ms,
            error: None,
        }
    }

    /// Create a failed result with a zero score.
    pub fn failure(
        case_id: impl Into<String>,
        raw_output: String,
        error: String,
        ttft_ms: Option<u64>,
    ) -> Self {
        Self {
            case_id: case_id.into(),
            raw_output,
            parsed: None,
            score: Score::default(),
            ttft_ms,
            error: Some(error),
        }
    }

    /// Whether this case carries an error. Whitespace-only errors do not count.
    pub fn has_error(&self) -> bool {
        self.error.as_deref().is_some_and(|e| !e.trim().is_empty())
    }

    /// Whether the score on this result is real.
    pub fn is_success(&self) -> bool {
        !self.has_error()
    }
}

/// Aggregate of one model's case scores for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub average_recall: f64,
    pub average_quote_coverage: f64,
    pub total_contradictions: usize,
    pub format_pass_rate: f64,
    pub overall_pass: bool,
}

impl ModelSummary {
    /// Fold case results into a summary.
    ///
    /// Recall and coverage are plain means over every case, failed ones
    /// included (they contribute zero). `overall_pass` needs the average
    /// recall to meet `recall_threshold`, zero contradictions in total, and
    /// every single case to have passed.
    ///
    /// An empty slice yields the zero summary.
    pub fn from_cases(cases: &[CaseResult], recall_threshold: f64) -> Self {
        if cases.is_empty() {
            return Self::default();
        }

        let mut total_recall = 0.0;
        let mut total_coverage = 0.0;
        let mut total_contradictions = 0;
        let mut format_passes = 0usize;
        let mut pass_count = 0usize;

        for case in cases {
            total_recall += case.score.recall;
            total_coverage += case.score.quote_coverage;
            total_contradictions += case.score.contradictions;
            if case.score.format_compliant {
                format_passes += 1;
            }
            if case.score.pass {
                pass_count += 1;
            }
        }

        let case_count = cases.len() as f64;
        let average_recall = total_recall / case_count;

        Self {
            average_recall,
            average_quote_coverage: total_coverage / case_count,
            total_contradictions,
            format_pass_rate: format_passes as f64 / case_count,
            overall_pass: average_recall >= recall_threshold
                && total_contradictions == 0
                && pass_count == cases.len(),
        }
    }
}

/// One model's full run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResult {
    pub model_id: String,
    pub cases: Vec<CaseResult>,
    pub summary: ModelSummary,
    /// Wall time across all cases
    pub elapsed_ms: u64,
    /// Completion tokens summed over every call that returned usage
    pub completion_tokens: u64,
    pub tokens_per_sec: f64,
    /// Mean TTFT over cases that produced at least one token (0 if none did)
    pub avg_ttft_ms: u64,
}

impl ModelResult {
    /// Build a model result, deriving the summary, throughput and mean TTFT.
    pub fn from_cases(
        model_id: impl Into<String>,
        cases: Vec<CaseResult>,
        recall_threshold: f64,
        elapsed: Duration,
        completion_tokens: u64,
    ) -> Self {
        let summary = ModelSummary::from_cases(&cases, recall_threshold);
        let elapsed_ms = elapsed.as_millis() as u64;

        let tokens_per_sec = if elapsed_ms > 0 {
            completion_tokens as f64 / (elapsed_ms as f64 / 1000.0)
        } else {
            0.0
        };

        let ttfts: Vec<u64> = cases
            .iter()
            .filter_map(|c| c.ttft_ms)
            .filter(|ms| *ms > 0)
            .collect();
        let avg_ttft_ms = if ttfts.is_empty() {
            0
        } else {
            ttfts.iter().sum::<u64>() / ttfts.len() as u64
        };

        Self {
            model_id: model_id.into(),
            cases,
            summary,
            elapsed_ms,
            completion_tokens,
            tokens_per_sec,
            avg_ttft_ms,
        }
    }

    /// `(parsed, errors)` counts, decided only by each case's error field.
    pub fn case_stats(&self) -> (usize, usize) {
        let errors = self.cases.iter().filter(|c| c.has_error()).count();
        (self.cases.len() - errors, errors)
    }
}

/// One full evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub dataset_path: String,
    pub recall_threshold: f64,
    pub models: Vec<ModelResult>,
}

impl Report {
    /// Create an empty report stamped with the current time.
    pub fn new(dataset_path: impl Into<String>, recall_threshold: f64) -> Self {
        Self {
            generated_at: Utc::now(),
            dataset_path: dataset_path.into(),
            recall_threshold,
            models: Vec::new(),
        }
    }

    /// Override the generation timestamp.
    #[must_use]
    pub fn with_generated_at(mut self, generated_at: DateTime<Utc>) -> Self {
        self.generated_at = generated_at;
        self
    }

    /// Total failed cases across every model.
    pub fn error_count(&self) -> usize {
        self.models.iter().map(|m| m.case_stats().1).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(recall: f64, coverage: f64, contradictions: usize, format: bool, pass: bool) -> CaseResult {
        CaseResult::success(
            "c",
            String::new(),
            ParsedOutput::default(),
            Score {
                recall,
                quote_coverage: coverage,
                contradictions,
                format_compliant: format,
                pass,
                ..Default::default()
            },
            None,
        )
    }

    #[test]
    fn test_summary_mixed_cases() {
        let cases = vec![
            scored(1.0, 1.0, 0, true, true),
            scored(0.5, 0.5, 1, false, false),
        ];

        let summary = ModelSummary::from_cases(&cases, 0.9);
        assert_eq!(summary.average_recall, 0.75);
        assert_eq!(summary.average_quote_coverage, 0.75);
        assert_eq!(summary.total_contradictions, 1);
        assert_eq!(summary.format_pass_rate, 0.5);
        assert!(!summary.overall_pass);
    }

    #[test]
    fn test_summary_empty_is_zero() {
        assert_eq!(ModelSummary::from_cases(&[], 0.9), ModelSummary::default());
    }

    #[test]
    fn test_summary_all_pass() {
        let cases = vec![scored(1.0, 1.0, 0, true, true), scored(0.95, 1.0, 0, true, true)];
        assert!(ModelSummary::from_cases(&cases, 0.9).overall_pass);
    }

    #[test]
    fn test_summary_cannot_average_past_a_failed_case() {
        // Mean recall is 0.9 and there are no contradictions, but one case failed outright.
        let cases = vec![
            scored(1.0, 1.0, 0, true, true),
            scored(1.0, 1.0, 0, true, true),
            scored(0.7, 1.0, 0, true, false),
        ];
        let summary = ModelSummary::from_cases(&cases, 0.9);
        assert!(summary.average_recall >= 0.9);
        assert_eq!(summary.total_contradictions, 0);
        assert!(!summary.overall_pass);
    }

    #[test]
    fn test_failure_has_zero_score() {
        let result = CaseResult::failure("01", String::new(), "timeout".to_string(), None);
        assert!(result.has_error());
        assert!(!result.is_success());
        assert!(result.parsed.is_none());
        assert_eq!(result.score, Score::default());
    }

    #[test]
    fn test_whitespace_error_is_not_an_error() {
        let mut result = scored(1.0, 1.0, 0, true, true);
        result.error = Some("   ".to_string());
        assert!(!result.has_error());
    }

    #[test]
    fn test_model_result_derived_fields() {
        let mut a = scored(1.0, 1.0, 0, true, true);
        a.ttft_ms = Some(100);
        let mut b = CaseResult::failure("02", String::new(), "bad json".to_string(), Some(300));
        b.raw_output = "oops".to_string();
        let c = CaseResult::failure("03", String::new(), "timeout".to_string(), None);

        let result = ModelResult::from_cases("m1", vec![a, b, c], 0.9, Duration::from_millis(2000), 500);
        assert_eq!(result.elapsed_ms, 2000);
        assert_eq!(result.tokens_per_sec, 250.0);
        assert_eq!(result.avg_ttft_ms, 200);
        assert_eq!(result.case_stats(), (1, 2));
        assert!(!result.summary.overall_pass);
    }

    #[test]
    fn test_model_result_zero_elapsed() {
        let result = ModelResult::from_cases("m", vec![], 0.9, Duration::ZERO, 10);
        assert_eq!(result.tokens_per_sec, 0.0);
        assert_eq!(result.avg_ttft_ms, 0);
    }

    #[test]
    fn test_report_serialization_roundtrip() {
        let mut report = Report::new("testdata/eval/walter_lewin", 0.9);
        report.models.push(ModelResult::from_cases(
            "m1",
            vec![CaseResult::failure("01", String::new(), "err".to_string(), None)],
            0.9,
            Duration::from_secs(1),
            0,
        ));

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"average_quote_coverage\""));
        assert!(!json.contains("\"parsed\""));

        let parsed: Report = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report);
        assert_eq!(parsed.error_count(), 1);
    }
}
