//! Files written alongside a run: saved responses and the leaderboard file.

use crate::report::LEADERBOARD_TITLE;
use crate::results::Report;
use chrono::SecondsFormat;
use regex::Regex;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

/// Title line of a hand-curated leaderboard. Files carrying it are never
/// rewritten.
pub const MANUAL_LEADERBOARD_TITLE: &str = "# insight-eval manual leaderboard";

/// Errors that can occur when writing run artifacts.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ArtifactError {
    #[error("failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize artifact: {0}")]
    Serialize(#[from] serde_json::Error),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ArtifactError + '_ {
    move |source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Outcome of [`write_leaderboard_template`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderboardWrite {
    /// The template was written (new file, or a generated one refreshed)
    Created,
    /// An existing file was left untouched
    KeptExisting,
}

/// Make `value` safe to use as a single path component.
///
/// # Example
///
/// ```
/// use insight_eval::sanitize_file_part;
///
/// assert_eq!(sanitize_file_part("hf:deepseek-ai/DeepSeek-V3.2"), "hf_deepseek-ai_DeepSeek-V3.2");
/// assert_eq!(sanitize_file_part("  "), "unknown");
/// ```
pub fn sanitize_file_part(value: &str) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    let re = UNSAFE.get_or_init(|| Regex::new(r"[^a-zA-Z0-9._-]+").expect("static pattern is valid"));

    let value = value.trim();
    if value.is_empty() {
        return "unknown".to_string();
    }
    let replaced = value.replace(['/', ':'], "_");
    let cleaned = re.replace_all(&replaced, "_");
    let cleaned = cleaned.trim_matches('_');
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Save the full report and every case result under a timestamped run
/// directory in `base_dir`.
///
/// Layout: `<base>/<YYYYmmdd-HHMMSS>/report.json` and
/// `<base>/<run>/<model>/case_<id>.json`. Returns the run directory.
pub fn write_response_artifacts(base_dir: &Path, report: &Report) -> Result<PathBuf, ArtifactError> {
    let run_dir = base_dir.join(report.generated_at.format("%Y%m%d-%H%M%S").to_string());
    fs::create_dir_all(&run_dir).map_err(io_err(&run_dir))?;

    let report_path = run_dir.join("report.json");
    let json = serde_json::to_vec_pretty(report)?;
    fs::write(&report_path, json).map_err(io_err(&report_path))?;

    for model in &report.models {
        let model_dir = run_dir.join(sanitize_file_part(&model.model_id));
        fs::create_dir_all(&model_dir).map_err(io_err(&model_dir))?;

        for case in &model.cases {
            let case_path = model_dir.join(format!("case_{}.json", sanitize_file_part(&case.case_id)));
            let json = serde_json::to_vec_pretty(case)?;
            fs::write(&case_path, json).map_err(io_err(&case_path))?;
        }
    }

    log::info!("Saved model responses to {}", run_dir.display());
    Ok(run_dir)
}

/// Whether an existing leaderboard file must be left alone.
///
/// Files that are manually curated, or that were not produced by this tool,
/// are kept. Unreadable files are kept too.
fn should_keep_existing(path: &Path) -> bool {
    match fs::read_to_string(path) {
        Ok(content) => {
            content.contains(MANUAL_LEADERBOARD_TITLE) || !content.contains(LEADERBOARD_TITLE)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            log::warn!("Leaving unreadable leaderboard {} untouched: {}", path.display(), e);
            true
        }
    }
}

/// Write a manual-ranking template to `path` unless a curated file is there.
pub fn write_leaderboard_template(
    path: &Path,
    report: &Report,
    responses_path: Option<&Path>,
) -> Result<LeaderboardWrite, ArtifactError> {
    if should_keep_existing(path) {
        return Ok(LeaderboardWrite::KeptExisting);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    fs::write(path, leaderboard_template(report, responses_path)).map_err(io_err(path))?;
    Ok(LeaderboardWrite::Created)
}

fn leaderboard_template(report: &Report, responses_path: Option<&Path>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", MANUAL_LEADERBOARD_TITLE);
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "- generated_at: {}",
        report.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    let _ = writeln!(out, "- dataset: `{}`", report.dataset_path);
    if let Some(responses) = responses_path {
        let _ = writeln!(out, "- responses_path: `{}`", responses.display());
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Update ranks manually after reviewing the saved responses.");
    let _ = writeln!(out);
    let _ = writeln!(out, "| Rank | Model | Notes |");
    let _ = writeln!(out, "|---:|---|---|");
    for model in &report.models {
        let _ = writeln!(out, "|  | `{}` |  |", model.model_id);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::{CaseResult, ModelResult};
    use chrono::{TimeZone, Utc};
    use rstest::rstest;
    use std::time::Duration;
    use tempfile::TempDir;

    fn report() -> Report {
        let mut report = Report::new("testdata/eval/walter_lewin", 0.9)
            .with_generated_at(Utc.with_ymd_and_hms(2026, 2, 7, 10, 4, 5).unwrap());
        report.models.push(ModelResult::from_cases(
            "hf:org/model-a",
            vec![
                CaseResult::failure("01", "raw".to_string(), "bad".to_string(), None),
                CaseResult::failure("a/b", String::new(), "bad".to_string(), None),
            ],
            0.9,
            Duration::from_secs(1),
            0,
        ));
        report
    }

    #[rstest]
    #[case::model_id("hf:deepseek-ai/DeepSeek-V3.2", "hf_deepseek-ai_DeepSeek-V3.2")]
    #[case::spaces("my model (beta)", "my_model_beta")]
    #[case::edges("__x__", "x")]
    #[case::blank("   ", "unknown")]
    #[case::all_unsafe("///", "unknown")]
    #[case::unicode("modèle", "mod_le")]
    fn test_sanitize_file_part(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(sanitize_file_part(input), expected);
    }

    #[test]
    fn test_response_artifacts_layout() {
        let dir = TempDir::new().unwrap();
        let run_dir = write_response_artifacts(dir.path(), &report()).unwrap();

        assert_eq!(run_dir, dir.path().join("20260207-100405"));
        assert!(run_dir.join("report.json").is_file());
        let case = run_dir.join("hf_org_model-a").join("case_01.json");
        let saved: CaseResult =
            serde_json::from_str(&std::fs::read_to_string(case).unwrap()).unwrap();
        assert_eq!(saved.raw_output, "raw");
        assert!(run_dir.join("hf_org_model-a").join("case_a_b.json").is_file());
    }

    #[test]
    fn test_template_created_when_absent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("leaderboard.md");

        let outcome =
            write_leaderboard_template(&path, &report(), Some(Path::new("responses/run"))).unwrap();
        assert_eq!(outcome, LeaderboardWrite::Created);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(MANUAL_LEADERBOARD_TITLE));
        assert!(content.contains("- responses_path: `responses/run`"));
        assert!(content.contains("| Rank | Model | Notes |"));
        assert!(content.contains("|  | `hf:org/model-a` |  |"));
    }

    #[test]
    fn test_manual_file_is_never_overwritten() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("leaderboard.md");
        write_leaderboard_template(&path, &report(), None).unwrap();
        std::fs::write(&path, format!("{MANUAL_LEADERBOARD_TITLE}\n\n| 1 | `m` | great |\n")).unwrap();

        let outcome = write_leaderboard_template(&path, &report(), None).unwrap();
        assert_eq!(outcome, LeaderboardWrite::KeptExisting);
        assert!(std::fs::read_to_string(&path).unwrap().contains("great"));
    }

    #[test]
    fn test_foreign_file_is_kept() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("leaderboard.md");
        std::fs::write(&path, "my own notes").unwrap();

        let outcome = write_leaderboard_template(&path, &report(), None).unwrap();
        assert_eq!(outcome, LeaderboardWrite::KeptExisting);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "my own notes");
    }

    #[test]
    fn test_generated_file_is_replaced() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("leaderboard.md");
        std::fs::write(&path, format!("{LEADERBOARD_TITLE}\n\nold\n")).unwrap();

        let outcome = write_leaderboard_template(&path, &report(), None).unwrap();
        assert_eq!(outcome, LeaderboardWrite::Created);
        assert!(std::fs::read_to_string(&path)
            .unwrap()
            .starts_with(MANUAL_LEADERBOARD_TITLE));
    }

    #[test]
    fn test_unreadable_file_is_kept() {
        let dir = TempDir::new().unwrap();
        // A directory in place of the file cannot be read as text.
        let path = dir.path().join("leaderboard.md");
        std::fs::create_dir(&path).unwrap();

        let outcome = write_leaderboard_template(&path, &report(), None).unwrap();
        assert_eq!(outcome, LeaderboardWrite::KeptExisting);
    }
}
