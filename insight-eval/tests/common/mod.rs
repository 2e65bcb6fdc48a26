//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::path::Path;

pub const LECTURE_SOURCE: &str = "In physics we rely on assumptions, units, and experiments. \
Every calculation should state its assumptions.";

/// Write a `source_<suffix>.txt` / `gold_<suffix>.json` pair.
pub fn write_pair(dir: &Path, suffix: &str, source: &str, insights: &[&str]) {
    write_source(dir, suffix, source);
    write_gold(dir, suffix, insights);
}

pub fn write_source(dir: &Path, suffix: &str, source: &str) {
    std::fs::write(dir.join(format!("source_{suffix}.txt")), source).unwrap();
}

pub fn write_gold(dir: &Path, suffix: &str, insights: &[&str]) {
    let gold = serde_json::json!({
        "id": suffix,
        "title": format!("Lecture {suffix}"),
        "key_insights": insights,
    });
    std::fs::write(dir.join(format!("gold_{suffix}.json")), gold.to_string()).unwrap();
}

/// A well-formed model reply.
pub fn reply_json(tldr: &str, insights: &[&str], quotes: &[&str]) -> String {
    serde_json::json!({
        "tldr": tldr,
        "key_insights": insights,
        "evidence_quotes": quotes,
    })
    .to_string()
}

/// The reply that fully covers the lecture fixture.
pub fn good_reply() -> String {
    reply_json(
        "State assumptions and units.",
        &["Make assumptions explicit.", "Check units in calculations."],
        &["assumptions, units, and experiments"],
    )
}
