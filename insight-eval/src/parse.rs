//! Parsing of raw model text into a [`ParsedOutput`].
//!
//! Models often wrap their JSON in markdown fences or chatter around it.
//! The parser strips one layer of fences, slices from the first `{` to the
//! last `}`, and decodes leniently: missing keys become empty values.

use crate::results::ParsedOutput;
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when parsing model output.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The extracted payload is not valid JSON for the output schema
    #[error("invalid JSON output: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Debug, Default, Deserialize)]
struct RawOutput {
    #[serde(default)]
    tldr: Option<String>,
    #[serde(default)]
    key_insights: Option<Vec<String>>,
    #[serde(default)]
    evidence_quotes: Option<Vec<String>>,
}

/// Parse raw model text.
///
/// # Example
///
/// ```
/// use insight_eval::parse_output;
///
/// let raw = "Sure! Here it is:\n```json\n{\"tldr\": \" Short \", \"key_insights\": [\"a\", \"\"]}\n```";
/// let parsed = parse_output(raw).unwrap();
/// assert_eq!(parsed.tldr, "Short");
/// assert_eq!(parsed.key_insights, vec!["a"]);
/// assert!(parsed.evidence_quotes.is_empty());
/// ```
pub fn parse_output(raw: &str) -> Result<ParsedOutput, ParseError> {
    let payload = extract_payload(raw);
    let decoded: RawOutput = serde_json::from_str(payload)?;

    Ok(ParsedOutput {
        tldr: decoded.tldr.unwrap_or_default().trim().to_string(),
        key_insights: clean_lines(decoded.key_insights.unwrap_or_default()),
        evidence_quotes: clean_lines(decoded.evidence_quotes.unwrap_or_default()),
    })
}

fn extract_payload(raw: &str) -> &str {
    let mut text = raw.trim();
    text = text.strip_prefix("```json").unwrap_or(text);
    text = text.strip_prefix("```").unwrap_or(text);
    text = text.strip_suffix("```").unwrap_or(text);
    text = text.trim();

    if let Some(start) = text.find('{') {
        text = &text[start..];
    }
    if let Some(end) = text.rfind('}') {
        text = &text[..=end];
    }
    text
}

/// Trim each entry and drop empties.
fn clean_lines(lines: Vec<String>) -> Vec<String> {
    lines
        .into_iter()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}
