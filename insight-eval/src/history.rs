//! Append-only run history.
//!
//! Each evaluated model in a run becomes one [`RunRecord`], stored as one
//! JSON line. Loading is forgiving: blank or corrupt lines are skipped so a
//! half-written tail never blocks the leaderboard.

use crate::results::{ModelResult, Report};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Thresholds closer than this are treated as the same run configuration.
pub const THRESHOLD_EPSILON: f64 = 1e-9;

/// Errors that can occur when reading or writing history.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HistoryError {
    /// History file could not be opened, read or written
    #[error("history I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A record could not be serialized
    #[error("failed to serialize history record: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl HistoryError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        HistoryError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// One model's summary from one run, as stored in history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub generated_at: DateTime<Utc>,
    pub dataset_path: String,
    pub recall_threshold: f64,
    pub model_id: String,
    pub case_count: usize,
    pub average_recall: f64,
    pub average_quote_coverage: f64,
    pub total_contradictions: usize,
    pub format_pass_rate: f64,
    pub overall_pass: bool,
}

impl RunRecord {
    /// Project one model of a report onto a history record.
    pub fn from_model(report: &Report, model: &ModelResult) -> Self {
        Self {
            generated_at: report.generated_at,
            dataset_path: report.dataset_path.clone(),
            recall_threshold: report.recall_threshold,
            model_id: model.model_id.clone(),
            case_count: model.cases.len(),
            average_recall: model.summary.average_recall,
            average_quote_coverage: model.summary.average_quote_coverage,
            total_contradictions: model.summary.total_contradictions,
            format_pass_rate: model.summary.format_pass_rate,
            overall_pass: model.summary.overall_pass,
        }
    }
}

/// Append one record per model in `report` to the history file at `path`.
///
/// The file and its parent directory are created if missing. Every line is
/// written with a single `write_all` on an append-mode handle, so concurrent
/// appenders never interleave within a line.
pub fn append_history(path: &Path, report: &Report) -> Result<(), HistoryError> {
    if report.models.is_empty() {
        return Ok(());
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| HistoryError::io(parent, e))?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| HistoryError::io(path, e))?;

    for model in &report.models {
        let mut line = serde_json::to_vec(&RunRecord::from_model(report, model))?;
        line.push(b'\n');
        file.write_all(&line).map_err(|e| HistoryError::io(path, e))?;
    }

    log::info!(
        "Appended {} run records to {}",
        report.models.len(),
        path.display()
    );
    Ok(())
}

/// Read every parseable record from the history file.
///
/// A missing file yields an empty history.
pub fn load_history(path: &Path) -> Result<Vec<RunRecord>, HistoryError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(HistoryError::io(path, e)),
    };

    let mut records = Vec::new();
    for (index, line) in BufReader::new(file).split(b'\n').enumerate() {
        let line = line.map_err(|e| HistoryError::io(path, e))?;
        let Ok(text) = std::str::from_utf8(&line) else {
            log::debug!("Skipping non-UTF-8 history line {}", index + 1);
            continue;
        };
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        match serde_json::from_str::<RunRecord>(text) {
            Ok(record) => records.push(record),
            Err(e) => log::debug!("Skipping corrupt history line {}: {}", index + 1, e),
        }
    }
    Ok(records)
}

/// Keep records from the same dataset and threshold.
///
/// Dataset paths are compared after trimming and lexical normalization.
pub fn filter_history(
    records: &[RunRecord],
    dataset_path: &str,
    recall_threshold: f64,
) -> Vec<RunRecord> {
    let wanted = normalize_dataset_path(dataset_path);
    records
        .iter()
        .filter(|r| normalize_dataset_path(&r.dataset_path) == wanted)
        .filter(|r| (r.recall_threshold - recall_threshold).abs() <= THRESHOLD_EPSILON)
        .cloned()
        .collect()
}

/// Lexically clean a path: drop `.` components, fold `dir/..`, and drop
/// trailing separators. The filesystem is never consulted.
pub fn normalize_dataset_path(path: &str) -> String {
    let path = path.trim();
    if path.is_empty() {
        return ".".to_string();
    }

    let mut cleaned = PathBuf::new();
    let mut depth = 0usize;
    let mut rooted = false;
    for component in Path::new(path).components() {
        match component {
            Component::Prefix(prefix) => cleaned.push(prefix.as_os_str()),
            Component::RootDir => {
                rooted = true;
                cleaned.push(component.as_os_str());
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth > 0 {
                    cleaned.pop();
                    depth -= 1;
                } else if !rooted {
                    cleaned.push("..");
                }
            }
            Component::Normal(part) => {
                cleaned.push(part);
                depth += 1;
            }
        }
    }

    if cleaned.as_os_str().is_empty() {
        ".".to_string()
    } else {
        cleaned.to_string_lossy().into_owned()
    }
}
