//! Dataset loading for evaluation.
//!
//! A dataset is a flat directory of paired fixtures:
//!
//! ```text
//! walter_lewin/
//! ├── source_01.txt   # text the model distills
//! ├── gold_01.json    # {"id": "...", "title": "...", "key_insights": [...]}
//! ├── source_02.txt
//! └── gold_02.json
//! ```
//!
//! Every `source_<suffix>.txt` must have a `gold_<suffix>.json` and vice
//! versa. Any other file is ignored.

use crate::results::Case;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

const SOURCE_PREFIX: &str = "source_";
const SOURCE_SUFFIX: &str = ".txt";
const GOLD_PREFIX: &str = "gold_";
const GOLD_SUFFIX: &str = ".json";

/// Errors that can occur when loading datasets.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DatasetError {
    /// Failed to list the dataset directory
    #[error("Failed to read dataset: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to read a fixture file
    #[error("Failed to read {}: {source}", .path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A gold file is not valid JSON
    #[error("parse {file}: {source}")]
    Parse {
        file: String,
        #[source]
        source: serde_json::Error,
    },

    /// Some suffixes have only one side of the pair
    #[error(
        "dataset has unmatched files (missing gold for: {}; missing source for: {})",
        list_or_none(.missing_gold),
        list_or_none(.missing_source)
    )]
    Unmatched {
        /// Suffixes with a source file but no gold file
        missing_gold: Vec<String>,
        /// Suffixes with a gold file but no source file
        missing_source: Vec<String>,
    },

    /// No usable case was found
    #[error("no valid source_/gold_ pairs found in {}", .dir.display())]
    Empty { dir: PathBuf },
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

/// Trait for evaluation datasets.
///
/// Implement this trait to feed cases from somewhere other than a fixture
/// directory.
pub trait Dataset: Send + Sync {
    /// The name of this dataset (used in reports and history).
    fn name(&self) -> &str;

    /// Load cases, sorted by id.
    ///
    /// If `sample_size` is specified, return at most that many cases.
    fn load(
        &self,
        sample_size: Option<usize>,
    ) -> impl std::future::Future<Output = Result<Vec<Case>, DatasetError>> + Send;
}

/// A dataset backed by a fixture directory.
///
/// # Example
///
/// ```no_run
/// use insight_eval::{Dataset, FixtureDir};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let dataset = FixtureDir::new("testdata/eval/walter_lewin");
/// let cases = dataset.load(Some(3)).await?;
/// println!("Loaded {} cases from {}", cases.len(), dataset.name());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FixtureDir {
    dir: PathBuf,
    name: String,
}

impl FixtureDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let name = dir.to_string_lossy().into_owned();
        Self { dir, name }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }
}

impl Dataset for FixtureDir {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self, sample_size: Option<usize>) -> Result<Vec<Case>, DatasetError> {
        let cases = load_dataset(&self.dir).await?;
        Ok(limit_cases(cases, sample_size.unwrap_or(0)))
    }
}

#[derive(Debug, Default, Deserialize)]
struct GoldFile {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    key_insights: Vec<String>,
}

#[derive(Debug, Default)]
struct Pair {
    source: Option<String>,
    gold: Option<GoldFile>,
}

/// Load and pair every fixture in `dir`.
///
/// Fails on the first unreadable file or malformed gold JSON, and when any
/// file lacks its counterpart. Pairs with an empty source or no gold
/// insights are skipped.
pub async fn load_dataset(dir: &Path) -> Result<Vec<Case>, DatasetError> {
    let mut pairs: BTreeMap<String, Pair> = BTreeMap::new();

    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            continue;
        }
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            log::debug!("Skipping non-UTF-8 file name in {}", dir.display());
            continue;
        };

        if let Some(suffix) = fixture_suffix(name, SOURCE_PREFIX, SOURCE_SUFFIX) {
            let text = read_file(&entry.path()).await?;
            pairs.entry(suffix.to_string()).or_default().source = Some(text.trim().to_string());
        } else if let Some(suffix) = fixture_suffix(name, GOLD_PREFIX, GOLD_SUFFIX) {
            let text = read_file(&entry.path()).await?;
            let gold: GoldFile =
                serde_json::from_str(&text).map_err(|source| DatasetError::Parse {
                    file: name.to_string(),
                    source,
                })?;
            pairs.entry(suffix.to_string()).or_default().gold = Some(gold);
        }
    }

    let mut missing_gold = Vec::new();
    let mut missing_source = Vec::new();
    for (suffix, pair) in &pairs {
        match (&pair.source, &pair.gold) {
            (Some(_), None) => missing_gold.push(suffix.clone()),
            (None, Some(_)) => missing_source.push(suffix.clone()),
            _ => {}
        }
    }
    if !missing_gold.is_empty() || !missing_source.is_empty() {
        return Err(DatasetError::Unmatched {
            missing_gold,
            missing_source,
        });
    }

    let mut cases: Vec<Case> = pairs
        .into_iter()
        .filter_map(|(suffix, pair)| {
            let (Some(source), Some(gold)) = (pair.source, pair.gold) else {
                return None;
            };
            let gold_insights: Vec<String> = gold
                .key_insights
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if source.is_empty() || gold_insights.is_empty() {
                log::debug!("Skipping fixture '{}': empty source or gold", suffix);
                return None;
            }

            let id = if gold.id.trim().is_empty() {
                suffix
            } else {
                gold.id.trim().to_string()
            };
            Some(Case {
                id,
                title: gold.title.trim().to_string(),
                source,
                gold_insights,
            })
        })
        .collect();

    if cases.is_empty() {
        return Err(DatasetError::Empty {
            dir: dir.to_path_buf(),
        });
    }

    cases.sort_by(|a, b| a.id.cmp(&b.id));
    log::info!("Loaded {} cases from {}", cases.len(), dir.display());
    Ok(cases)
}

/// Keep the first `limit` cases; 0 keeps all.
pub fn limit_cases(mut cases: Vec<Case>, limit: usize) -> Vec<Case> {
    if limit > 0 {
        cases.truncate(limit);
    }
    cases
}

fn fixture_suffix<'a>(name: &'a str, prefix: &str, suffix: &str) -> Option<&'a str> {
    name.strip_prefix(prefix)?.strip_suffix(suffix)
}

async fn read_file(path: &Path) -> Result<String, DatasetError> {
    fs::read_to_string(path)
        .await
        .map_err(|source| DatasetError::ReadFile {
            path: path.to_path_buf(),
            source,
        })
}
