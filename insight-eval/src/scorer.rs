//! Scoring of parsed model output against gold insights.
//!
//! Matching is deliberately shallow: normalized substring containment and
//! token-set overlap, plus a negation-marker heuristic for contradictions.
//!
//! # Example
//!
//! ```
//! use insight_eval::{score_case, Case, ParsedOutput};
//!
//! let case = Case {
//!     id: "01".to_string(),
//!     title: "Units".to_string(),
//!     source: "Always check units before trusting a result.".to_string(),
//!     gold_insights: vec!["Check units.".to_string()],
//! };
//! let parsed = ParsedOutput {
//!     tldr: "Units matter".to_string(),
//!     key_insights: vec!["Check units in calculations.".to_string()],
//!     evidence_quotes: vec!["check units".to_string()],
//! };
//!
//! let score = score_case(&case, &parsed, 0.9);
//! assert_eq!(score.recall, 1.0);
//! assert_eq!(score.quote_coverage, 1.0);
//! assert!(score.pass);
//! ```

use crate::results::{Case, ParsedOutput, Score};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Token overlap at or above which a prediction matches a gold insight.
pub const MATCH_OVERLAP_THRESHOLD: f64 = 0.55;

/// Token overlap at or above which a negated prediction is linked to a gold
/// insight for contradiction checking.
pub const CONTRADICTION_OVERLAP_THRESHOLD: f64 = 0.45;

/// Words that flip the polarity of an insight.
pub const NEGATION_MARKERS: &[&str] = &["not", "no", "never", "cannot", "can't", "without"];

/// Tokens shorter than this (in bytes) are ignored for overlap.
const MIN_TOKEN_LEN: usize = 3;

/// Overlap thresholds used by the scorer.
///
/// These are empirical; the defaults are [`MATCH_OVERLAP_THRESHOLD`] and
/// [`CONTRADICTION_OVERLAP_THRESHOLD`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[non_exhaustive]
pub struct ScoringPolicy {
    /// Minimum overlap for a prediction to match a gold insight
    pub match_overlap: f64,

    /// Minimum overlap for a negated prediction to contradict a gold insight
    pub contradiction_overlap: f64,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            match_overlap: MATCH_OVERLAP_THRESHOLD,
            contradiction_overlap: CONTRADICTION_OVERLAP_THRESHOLD,
        }
    }
}

impl ScoringPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_match_overlap(mut self, threshold: f64) -> Self {
        self.match_overlap = threshold;
        self
    }

    #[must_use]
    pub fn with_contradiction_overlap(mut self, threshold: f64) -> Self {
        self.contradiction_overlap = threshold;
        self
    }
}

/// Score a case with the default [`ScoringPolicy`].
pub fn score_case(case: &Case, parsed: &ParsedOutput, recall_threshold: f64) -> Score {
    score_case_with(&ScoringPolicy::default(), case, parsed, recall_threshold)
}

/// Score a case with an explicit policy.
pub fn score_case_with(
    policy: &ScoringPolicy,
    case: &Case,
    parsed: &ParsedOutput,
    recall_threshold: f64,
) -> Score {
    let predictions: Vec<String> = parsed
        .key_insights
        .iter()
        .map(|p| normalize_text(p))
        .collect();

    let gold: Vec<&str> = case
        .gold_insights
        .iter()
        .map(|g| g.trim())
        .filter(|g| !g.is_empty())
        .collect();

    let matched_gold_count = gold
        .iter()
        .filter(|g| has_insight_match(policy, g, &predictions))
        .count();

    let recall = if gold.is_empty() {
        0.0
    } else {
        matched_gold_count as f64 / gold.len() as f64
    };

    let quote_coverage = quote_coverage(&case.source, &parsed.evidence_quotes);
    let contradictions = estimate_contradictions(policy, &predictions, &gold);

    let format_compliant = !parsed.tldr.trim().is_empty()
        && !parsed.key_insights.is_empty()
        && !parsed.evidence_quotes.is_empty();

    Score {
        recall,
        missing_insights: gold.len().saturating_sub(matched_gold_count),
        contradictions,
        quote_coverage,
        format_compliant,
        pass: recall >= recall_threshold && contradictions == 0 && format_compliant,
        matched_gold_count,
    }
}

/// Lowercase, replace runs of anything that is not `[a-z0-9]` or whitespace
/// with a space, and collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    static NON_WORD: OnceLock<Regex> = OnceLock::new();
    let re = NON_WORD.get_or_init(|| Regex::new(r"[^a-z0-9\s]+").expect("static pattern is valid"));

    let lowered = s.trim().to_lowercase();
    re.replace_all(&lowered, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Set of normalized words of at least three bytes.
pub fn token_set(s: &str) -> HashSet<String> {
    normalize_text(s)
        .split_whitespace()
        .filter(|word| word.len() >= MIN_TOKEN_LEN)
        .map(str::to_string)
        .collect()
}

/// `|A ∩ B| / max(|A|, |B|)` over token sets; 0 if either side is empty.
pub fn token_overlap(a: &str, b: &str) -> f64 {
    let left = token_set(a);
    let right = token_set(b);
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let shared = left.intersection(&right).count();
    shared as f64 / left.len().max(right.len()) as f64
}

/// Whether `s` contains a negation marker as a whole word.
///
/// Both sides are normalized first, so `can't` is matched as `can t`.
pub fn contains_negation(s: &str) -> bool {
    static MARKERS: OnceLock<Vec<String>> = OnceLock::new();
    let markers = MARKERS.get_or_init(|| {
        NEGATION_MARKERS
            .iter()
            .map(|m| format!(" {} ", normalize_text(m)))
            .collect()
    });

    let padded = format!(" {} ", normalize_text(s));
    markers.iter().any(|m| padded.contains(m.as_str()))
}

/// `predictions` must already be normalized.
fn has_insight_match(policy: &ScoringPolicy, gold: &str, predictions: &[String]) -> bool {
    let gold = normalize_text(gold);
    if gold.is_empty() {
        return false;
    }
    predictions
        .iter()
        .filter(|p| !p.is_empty())
        .any(|p| {
            p.contains(gold.as_str())
                || gold.contains(p.as_str())
                || token_overlap(&gold, p) >= policy.match_overlap
        })
}

fn quote_coverage(source: &str, quotes: &[String]) -> f64 {
    if quotes.is_empty() {
        return 0.0;
    }
    let source = source.to_lowercase();
    let hits = quotes
        .iter()
        .filter(|q| source.contains(q.trim().to_lowercase().as_str()))
        .count();
    hits as f64 / quotes.len() as f64
}

/// Count negated predictions whose closest gold insight is not negated.
///
/// The closest gold is the one with strictly highest overlap; the first wins
/// on ties.
fn estimate_contradictions(policy: &ScoringPolicy, predictions: &[String], gold: &[&str]) -> usize {
    predictions
        .iter()
        .filter(|p| !p.is_empty() && contains_negation(p))
        .filter(|p| {
            let mut best = 0.0;
            let mut closest: Option<&str> = None;
            for &g in gold {
                let overlap = token_overlap(p, g);
                if overlap > best {
                    best = overlap;
                    closest = Some(g);
                }
            }
            best >= policy.contradiction_overlap
                && closest.is_some_and(|g| !contains_negation(g))
        })
        .count()
}
