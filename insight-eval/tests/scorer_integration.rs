//! End-to-end scoring: raw model text through the parser and scorer.

use insight_eval::{parse_output, score_case, Case};

fn case(source: &str, gold: &[&str]) -> Case {
    Case {
        id: "01".to_string(),
        title: String::new(),
        source: source.to_string(),
        gold_insights: gold.iter().map(|s| s.to_string()).collect(),
    }
}

#[test]
fn test_paraphrased_insights_reach_full_recall() {
    let case = case(
        "Lectures cover assumptions, units, and experiments.",
        &["Assumptions must be explicit.", "Check units."],
    );
    let raw = r#"Here you go:
```json
{"tldr": "Be explicit.", "key_insights": ["Make assumptions explicit.", "Check units in calculations."], "evidence_quotes": ["assumptions, units, and experiments"]}
```"#;

    let parsed = parse_output(raw).unwrap();
    let score = score_case(&case, &parsed, 0.9);

    assert!(score.recall >= 0.9, "recall was {}", score.recall);
    assert_eq!(score.quote_coverage, 1.0);
    assert_eq!(score.contradictions, 0);
    assert!(score.format_compliant);
    assert!(score.pass);
}

#[test]
fn test_negated_insight_is_flagged_and_fails() {
    let case = case("Physics requires assumptions.", &["Physics requires assumptions."]);
    let raw = r#"{"tldr": "x", "key_insights": ["Physics requires no assumptions."], "evidence_quotes": ["Physics requires"]}"#;

    let parsed = parse_output(raw).unwrap();
    let score = score_case(&case, &parsed, 0.9);

    assert!(score.contradictions >= 1);
    assert!(!score.pass);
}

#[test]
fn test_quotes_not_in_source_lower_coverage() {
    let case = case("Energy is conserved.", &["Energy is conserved."]);
    let raw = r#"{"tldr": "x", "key_insights": ["Energy is conserved."], "evidence_quotes": ["energy is conserved", "momentum too"]}"#;

    let score = score_case(&case, &parse_output(raw).unwrap(), 0.9);

    assert_eq!(score.recall, 1.0);
    assert_eq!(score.quote_coverage, 0.5);
}

#[test]
fn test_unparseable_reply_is_an_error() {
    assert!(parse_output("I could not find any insights.").is_err());
}
