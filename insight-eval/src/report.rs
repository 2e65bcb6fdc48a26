//! Rendering of run reports and leaderboards.

use crate::leaderboard::LeaderboardRow;
use crate::results::{ModelResult, Report};
use chrono::SecondsFormat;
use std::fmt::Write;
use std::str::FromStr;

/// Title line of a generated leaderboard.
pub const LEADERBOARD_TITLE: &str = "# insight-eval leaderboard";

const REPORT_TITLE: &str = "# insight-eval report";

const LEADERBOARD_LEGEND: &str = "fields: rank, model, runs, average_recall, best_recall, \
                                  average_coverage, total_contradictions, pass_rate, last_seen";

/// Output format for a [`Report`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    #[default]
    Markdown,
    Json,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "md" | "markdown" => Ok(ReportFormat::Markdown),
            "json" => Ok(ReportFormat::Json),
            other => Err(format!("unsupported format '{}' (expected md or json)", other)),
        }
    }
}

/// Render a report in the requested format.
pub fn render(report: &Report, format: ReportFormat) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Markdown => Ok(render_markdown(report)),
        ReportFormat::Json => render_json(report),
    }
}

/// Pretty-printed JSON.
pub fn render_json(report: &Report) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}

/// Markdown summary with one row per model.
///
/// Parsed and error counts are decided only by each case's error field.
pub fn render_markdown(report: &Report) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", REPORT_TITLE);
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "- Generated: {}",
        report.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    let _ = writeln!(out, "- Dataset: `{}`", report.dataset_path);
    let _ = writeln!(out, "- Recall threshold: {:.2}", report.recall_threshold);
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "| Model | Parsed | Errors | Elapsed (s) | Tokens | Tok/s | TTFT (ms) |"
    );
    let _ = writeln!(out, "|---|---:|---:|---:|---:|---:|---:|");
    for model in &report.models {
        let (parsed, errors) = model.case_stats();
        let _ = writeln!(
            out,
            "| `{}` | {} | {} | {:.2} | {} | {:.1} | {} |",
            model.model_id,
            parsed,
            errors,
            model.elapsed_ms as f64 / 1000.0,
            model.completion_tokens,
            model.tokens_per_sec,
            model.avg_ttft_ms
        );
    }

    if !report.models.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "## Scores");
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "| Model | Recall | Coverage | Contradictions | Format | Pass |"
        );
        let _ = writeln!(out, "|---|---:|---:|---:|---:|:---:|");
        for model in &report.models {
            let s = &model.summary;
            let _ = writeln!(
                out,
                "| `{}` | {:.2} | {:.2} | {} | {:.2} | {} |",
                model.model_id,
                s.average_recall,
                s.average_quote_coverage,
                s.total_contradictions,
                s.format_pass_rate,
                if s.overall_pass { "yes" } else { "no" }
            );
        }
    }

    out
}

/// Ranked leaderboard, one block per model.
pub fn render_leaderboard(rows: &[LeaderboardRow]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", LEADERBOARD_TITLE);
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", LEADERBOARD_LEGEND);

    for (index, row) in rows.iter().enumerate() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}) `{}`", index + 1, row.model_id);
        let _ = writeln!(out, "- runs: {}", row.runs);
        let _ = writeln!(out, "- average_recall: {:.2}", row.average_recall);
        let _ = writeln!(out, "- best_recall: {:.2}", row.best_recall);
        let _ = writeln!(out, "- average_coverage: {:.2}", row.average_coverage);
        let _ = writeln!(out, "- total_contradictions: {}", row.total_contradictions);
        let _ = writeln!(out, "- pass_rate: {:.2}", row.overall_pass_rate);
        let _ = writeln!(
            out,
            "- last_seen: {}",
            row.last_seen.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
    }

    out
}

/// Order models by average recall, best first. Ties keep their order.
pub fn sort_by_recall_desc(models: &mut [ModelResult]) {
    models.sort_by(|a, b| b.summary.average_recall.total_cmp(&a.summary.average_recall));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::{CaseResult, ParsedOutput, Score};
    use chrono::{TimeZone, Utc};
    use rstest::rstest;
    use std::time::Duration;

    fn sample_report() -> Report {
        let ok = CaseResult::success(
            "01",
            "{}".to_string(),
            ParsedOutput::default(),
            Score {
                recall: 1.0,
                ..Default::default()
            },
            Some(120),
        );
        let failed = CaseResult::failure("02", String::new(), "timeout".to_string(), None);
        let mut blank = ok.clone();
        blank.case_id = "03".to_string();
        blank.error = Some("  ".to_string());

        let mut report = Report::new("testdata/eval/walter_lewin", 0.9)
            .with_generated_at(Utc.with_ymd_and_hms(2026, 2, 7, 9, 30, 0).unwrap());
        report.models.push(ModelResult::from_cases(
            "hf:org/model-a",
            vec![ok, failed, blank],
            0.9,
            Duration::from_millis(2500),
            400,
        ));
        report
    }

    #[rstest]
    #[case::md("md", ReportFormat::Markdown)]
    #[case::markdown(" Markdown ", ReportFormat::Markdown)]
    #[case::json("JSON", ReportFormat::Json)]
    fn test_format_from_str(#[case] input: &str, #[case] expected: ReportFormat) {
        assert_eq!(input.parse::<ReportFormat>().unwrap(), expected);
    }

    #[test]
    fn test_format_rejects_unknown() {
        let err = "html".parse::<ReportFormat>().unwrap_err();
        assert!(err.contains("html"));
    }

    #[test]
    fn test_markdown_table() {
        let md = render_markdown(&sample_report());
        assert!(md.starts_with("# insight-eval report\n"));
        assert!(md.contains("- Generated: 2026-02-07T09:30:00Z"));
        assert!(md.contains("- Dataset: `testdata/eval/walter_lewin`"));
        assert!(md.contains("| Model | Parsed | Errors | Elapsed (s) | Tokens | Tok/s | TTFT (ms) |"));
        assert!(md.contains("|---|---:|---:|---:|---:|---:|---:|"));
        // Whitespace-only errors count as parsed.
        assert!(md.contains("| `hf:org/model-a` | 2 | 1 | 2.50 | 400 | 160.0 | 120 |"));
        assert!(md.contains("## Scores"));
    }

    #[test]
    fn test_markdown_without_models_has_no_score_table() {
        let report = Report::new("d", 0.9);
        let md = render_markdown(&report);
        assert!(md.contains("| Model | Parsed |"));
        assert!(!md.contains("## Scores"));
    }

    #[test]
    fn test_json_roundtrip() {
        let report = sample_report();
        let json = render(&report, ReportFormat::Json).unwrap();
        let parsed: Report = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report);
    }

    #[test]
    fn test_leaderboard_blocks() {
        let rows = vec![LeaderboardRow {
            model_id: "m1".to_string(),
            runs: 3,
            average_recall: 0.8333,
            best_recall: 1.0,
            average_coverage: 0.5,
            total_contradictions: 2,
            overall_pass_rate: 0.6667,
            last_seen: Utc.with_ymd_and_hms(2026, 2, 7, 10, 0, 0).unwrap(),
        }];

        let text = render_leaderboard(&rows);
        let expected = "# insight-eval leaderboard\n\n\
            fields: rank, model, runs, average_recall, best_recall, average_coverage, total_contradictions, pass_rate, last_seen\n\n\
            1) `m1`\n\
            - runs: 3\n\
            - average_recall: 0.83\n\
            - best_recall: 1.00\n\
            - average_coverage: 0.50\n\
            - total_contradictions: 2\n\
            - pass_rate: 0.67\n\
            - last_seen: 2026-02-07T10:00:00Z\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_sort_by_recall_desc() {
        let mut models: Vec<ModelResult> = [("low", 0.2), ("high", 0.9), ("mid", 0.5)]
            .into_iter()
            .map(|(id, recall)| {
                let mut m = ModelResult::from_cases(id, vec![], 0.9, Duration::ZERO, 0);
                m.summary.average_recall = recall;
                m
            })
            .collect();
        sort_by_recall_desc(&mut models);
        let ids: Vec<_> = models.iter().map(|m| m.model_id.as_str()).collect();
        assert_eq!(ids, vec!["high", "mid", "low"]);
    }
}
