//! Cross-run leaderboard built from history records.

use crate::history::RunRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// One model's aggregate over every run in a filtered history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub model_id: String,
    pub runs: usize,
    pub average_recall: f64,
    pub best_recall: f64,
    pub average_coverage: f64,
    pub total_contradictions: usize,
    /// Fraction of runs with `overall_pass`
    pub overall_pass_rate: f64,
    pub last_seen: DateTime<Utc>,
}

/// Group records by model and rank the models.
///
/// Rows are ordered by average recall, then best recall, then run count
/// (all descending), then model id ascending, so the order is total.
///
/// # Example
///
/// ```
/// use insight_eval::{build_leaderboard, RunRecord};
///
/// let record = |model: &str, recall: f64| RunRecord {
///     generated_at: chrono::Utc::now(),
///     dataset_path: "testdata/eval/walter_lewin".to_string(),
///     recall_threshold: 0.9,
///     model_id: model.to_string(),
///     case_count: 3,
///     average_recall: recall,
///     average_quote_coverage: 1.0,
///     total_contradictions: 0,
///     format_pass_rate: 1.0,
///     overall_pass: recall >= 0.9,
/// };
///
/// let rows = build_leaderboard(&[record("a", 0.5), record("b", 0.95), record("a", 0.7)]);
/// assert_eq!(rows[0].model_id, "b");
/// assert_eq!(rows[1].runs, 2);
/// assert!((rows[1].average_recall - 0.6).abs() < 1e-9);
/// ```
pub fn build_leaderboard(records: &[RunRecord]) -> Vec<LeaderboardRow> {
    let mut grouped: BTreeMap<&str, Vec<&RunRecord>> = BTreeMap::new();
    for record in records {
        grouped.entry(record.model_id.as_str()).or_default().push(record);
    }

    let mut rows: Vec<LeaderboardRow> = grouped
        .into_iter()
        .filter_map(|(model_id, runs)| aggregate(model_id, &runs))
        .collect();

    rows.sort_by(rank_order);
    rows
}

fn aggregate(model_id: &str, runs: &[&RunRecord]) -> Option<LeaderboardRow> {
    let first = runs.first()?;
    let count = runs.len() as f64;

    let mut recall_sum = 0.0;
    let mut best_recall: f64 = 0.0;
    let mut coverage_sum = 0.0;
    let mut total_contradictions = 0;
    let mut passes = 0usize;
    let mut last_seen = first.generated_at;

    for run in runs {
        recall_sum += run.average_recall;
        best_recall = best_recall.max(run.average_recall);
        coverage_sum += run.average_quote_coverage;
        total_contradictions += run.total_contradictions;
        if run.overall_pass {
            passes += 1;
        }
        last_seen = last_seen.max(run.generated_at);
    }

    Some(LeaderboardRow {
        model_id: model_id.to_string(),
        runs: runs.len(),
        average_recall: recall_sum / count,
        best_recall,
        average_coverage: coverage_sum / count,
        total_contradictions,
        overall_pass_rate: passes as f64 / count,
        last_seen,
    })
}

fn rank_order(a: &LeaderboardRow, b: &LeaderboardRow) -> Ordering {
    b.average_recall
        .total_cmp(&a.average_recall)
        .then_with(|| b.best_recall.total_cmp(&a.best_recall))
        .then_with(|| b.runs.cmp(&a.runs))
        .then_with(|| a.model_id.cmp(&b.model_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(model: &str, recall: f64, pass: bool, day: u32) -> RunRecord {
        RunRecord {
            generated_at: Utc.with_ymd_and_hms(2026, 2, day, 12, 0, 0).unwrap(),
            dataset_path: "d".to_string(),
            recall_threshold: 0.9,
            model_id: model.to_string(),
            case_count: 2,
            average_recall: recall,
            average_quote_coverage: recall / 2.0,
            total_contradictions: usize::from(!pass),
            format_pass_rate: 1.0,
            overall_pass: pass,
        }
    }

    #[test]
    fn test_aggregates_per_model() {
        let rows = build_leaderboard(&[
            record("m1", 1.0, true, 3),
            record("m1", 0.5, false, 5),
            record("m1", 0.75, true, 4),
        ]);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.runs, 3);
        assert_eq!(row.average_recall, 0.75);
        assert_eq!(row.best_recall, 1.0);
        assert_eq!(row.average_coverage, 0.375);
        assert_eq!(row.total_contradictions, 1);
        assert!((row.overall_pass_rate - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(row.last_seen, Utc.with_ymd_and_hms(2026, 2, 5, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_tiebreaks() {
        // Same average; "b" has a better best run.
        // "c" and "d" tie on average and best; "d" has more runs.
        // "e" and "f" tie completely and fall back to id order.
        let rows = build_leaderboard(&[
            record("a", 0.8, true, 1),
            record("a", 0.8, true, 1),
            record("b", 1.0, true, 1),
            record("b", 0.6, true, 1),
            record("c", 0.5, true, 1),
            record("d", 0.5, true, 1),
            record("d", 0.5, true, 1),
            record("f", 0.1, true, 1),
            record("e", 0.1, true, 1),
        ]);
        let order: Vec<_> = rows.iter().map(|r| r.model_id.as_str()).collect();
        assert_eq!(order, vec!["b", "a", "d", "c", "e", "f"]);
    }

    #[test]
    fn test_empty_history() {
        assert!(build_leaderboard(&[]).is_empty());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn rows_are_in_rank_order(
                entries in prop::collection::vec(("[a-e]", 0u8..=10, any::<bool>()), 0..40)
            ) {
                let records: Vec<RunRecord> = entries
                    .iter()
                    .map(|(model, tenths, pass)| record(model, f64::from(*tenths) / 10.0, *pass, 1))
                    .collect();
                let rows = build_leaderboard(&records);

                for pair in rows.windows(2) {
                    let (prev, next) = (&pair[0], &pair[1]);
                    let prev_key = (prev.average_recall, prev.best_recall, prev.runs);
                    let next_key = (next.average_recall, next.best_recall, next.runs);
                    prop_assert!(
                        next_key.partial_cmp(&prev_key) != Some(Ordering::Greater),
                        "{:?} ranked above {:?}", prev_key, next_key
                    );
                }

                let total_runs: usize = rows.iter().map(|r| r.runs).sum();
                prop_assert_eq!(total_runs, records.len());
            }
        }
    }
}
