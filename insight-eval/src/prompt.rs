//! Extraction prompt sent to every model.

const PROMPT_HEADER: &str = r#"You are evaluating key-insight extraction quality.

Task:
1) Produce a short TL;DR.
2) Extract key insights from the source without losing critical meaning.
3) Provide direct evidence quotes copied verbatim from the source.

Rules:
- Return JSON only.
- Do not include markdown fences.
- Keep claims faithful to the source.
- Include the most important concepts and caveats.

Return schema:
{
  "tldr": "string",
  "key_insights": ["string"],
  "evidence_quotes": ["string"]
}

Source:
"#;

/// Build the extraction prompt for `source`.
///
/// The output is a pure function of the input; the source is embedded
/// verbatim at the end.
pub fn build_prompt(source: &str) -> String {
    let mut prompt = String::with_capacity(PROMPT_HEADER.len() + source.len());
    prompt.push_str(PROMPT_HEADER);
    prompt.push_str(source);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_ends_with_source_verbatim() {
        let source = "Line one.\n  Line two with {braces} and \"quotes\".";
        let prompt = build_prompt(source);
        assert!(prompt.ends_with(source));
        assert!(prompt.contains("\nSource:\n"));
    }

    #[test]
    fn test_prompt_declares_schema_and_rules() {
        let prompt = build_prompt("x");
        for needle in [
            "TL;DR",
            "evidence quotes",
            "Return JSON only.",
            "Do not include markdown fences.",
            "\"tldr\": \"string\"",
            "\"key_insights\": [\"string\"]",
            "\"evidence_quotes\": [\"string\"]",
        ] {
            assert!(prompt.contains(needle), "missing {needle:?}");
        }
    }

    #[test]
    fn test_prompt_is_deterministic() {
        assert_eq!(build_prompt("same"), build_prompt("same"));
        assert_ne!(build_prompt("a"), build_prompt("b"));
    }
}
