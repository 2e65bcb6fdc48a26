//! Evaluation settings and TOML config file discovery.
//!
//! Settings are layered: built-in defaults, then the user-global file
//! (`~/.config/insight-eval/config.toml`), then the project-local file
//! (`./insight-eval.toml`), then command-line flags.
//!
//! ```toml
//! [api]
//! base_url = "https://api.synthetic.new/openai/v1"
//! model = "hf:deepseek-ai/DeepSeek-V3.2"
//!
//! [eval]
//! recall_threshold = 0.85
//! call_timeout_secs = 90
//! history = "analysis-results/eval-history.jsonl"
//! match_overlap = 0.6
//! ```

use crate::scorer::ScoringPolicy;
use insight_core::LlmConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_RECALL_THRESHOLD: f64 = 0.90;
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_HISTORY_PATH: &str = "analysis-results/eval-history.jsonl";
pub const DEFAULT_LEADERBOARD_PATH: &str = "analysis-results/eval-leaderboard.md";
pub const DEFAULT_RESPONSES_DIR: &str = "analysis-results/eval-responses";
pub const DEFAULT_LEADERBOARD_TOP: usize = 10;

/// Configuration for an evaluation run.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct EvalConfig {
    /// Minimum recall for a case to pass (default: 0.90)
    pub recall_threshold: f64,

    /// Deadline for a single model call (default: 120s)
    pub call_timeout: Duration,

    /// top_p sent with every evaluation call (default: 1.0)
    pub top_p: f32,

    /// Cases evaluated at once per model (default: 1)
    pub concurrency: usize,

    /// Evaluate only the first N cases; 0 means all
    pub limit: usize,

    /// Overlap thresholds for matching and contradictions
    pub scoring: ScoringPolicy,

    /// JSONL run history (default: `analysis-results/eval-history.jsonl`)
    pub history_path: PathBuf,

    /// Leaderboard file (default: `analysis-results/eval-leaderboard.md`)
    pub leaderboard_path: PathBuf,

    /// Saved responses directory (default: `analysis-results/eval-responses`)
    pub responses_dir: PathBuf,

    /// Leaderboard rows to print (default: 10)
    pub leaderboard_top: usize,

    /// Whether to append to history and refresh the leaderboard
    pub history_enabled: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            recall_threshold: DEFAULT_RECALL_THRESHOLD,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            top_p: 1.0,
            concurrency: 1,
            limit: 0,
            scoring: ScoringPolicy::default(),
            history_path: PathBuf::from(DEFAULT_HISTORY_PATH),
            leaderboard_path: PathBuf::from(DEFAULT_LEADERBOARD_PATH),
            responses_dir: PathBuf::from(DEFAULT_RESPONSES_DIR),
            leaderboard_top: DEFAULT_LEADERBOARD_TOP,
            history_enabled: true,
        }
    }
}

impl EvalConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_recall_threshold(mut self, threshold: f64) -> Self {
        self.recall_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = top_p;
        self
    }

    /// Set the per-model concurrency limit.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1); // At least 1
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn with_scoring(mut self, scoring: ScoringPolicy) -> Self {
        self.scoring = scoring;
        self
    }

    #[must_use]
    pub fn with_history_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.history_path = path.into();
        self
    }

    #[must_use]
    pub fn with_leaderboard_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.leaderboard_path = path.into();
        self
    }

    #[must_use]
    pub fn with_responses_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.responses_dir = path.into();
        self
    }

    #[must_use]
    pub fn with_leaderboard_top(mut self, top: usize) -> Self {
        self.leaderboard_top = top;
        self
    }

    #[must_use]
    pub fn with_history_enabled(mut self, enabled: bool) -> Self {
        self.history_enabled = enabled;
        self
    }
}

/// Root of an `insight-eval.toml` file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
#[non_exhaustive]
pub struct FileConfig {
    pub api: Option<ApiToml>,
    pub eval: Option<EvalToml>,
}

impl FileConfig {
    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: FileConfig) {
        if let Some(api) = other.api {
            match &mut self.api {
                Some(existing) => existing.merge(api),
                None => self.api = Some(api),
            }
        }
        if let Some(eval) = other.eval {
            match &mut self.eval {
                Some(existing) => existing.merge(eval),
                None => self.eval = Some(eval),
            }
        }
    }

    /// Apply the `[api]` section to a client config.
    pub fn apply_llm(&self, mut config: LlmConfig) -> LlmConfig {
        if let Some(api) = &self.api {
            if let Some(url) = &api.base_url {
                config = config.with_base_url(url.as_str());
            }
            if let Some(model) = &api.model {
                config = config.with_model(model.as_str());
            }
        }
        config
    }

    /// Apply the `[eval]` section to an evaluation config.
    pub fn apply_eval(&self, mut config: EvalConfig) -> EvalConfig {
        let Some(eval) = &self.eval else {
            return config;
        };

        if let Some(v) = eval.recall_threshold {
            config = config.with_recall_threshold(v);
        }
        if let Some(v) = eval.call_timeout_secs {
            config = config.with_call_timeout(Duration::from_secs(v));
        }
        if let Some(v) = eval.concurrency {
            config = config.with_concurrency(v);
        }
        if let Some(v) = &eval.history {
            config = config.with_history_path(v);
        }
        if let Some(v) = &eval.leaderboard_out {
            config = config.with_leaderboard_path(v);
        }
        if let Some(v) = &eval.responses_dir {
            config = config.with_responses_dir(v);
        }
        if let Some(v) = eval.match_overlap {
            config.scoring = config.scoring.with_match_overlap(v);
        }
        if let Some(v) = eval.contradiction_overlap {
            config.scoring = config.scoring.with_contradiction_overlap(v);
        }
        config
    }
}

/// `[api]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
#[non_exhaustive]
pub struct ApiToml {
    pub base_url: Option<String>,
    pub model: Option<String>,
}

impl ApiToml {
    pub fn merge(&mut self, other: ApiToml) {
        if other.base_url.is_some() {
            self.base_url = other.base_url;
        }
        if other.model.is_some() {
            self.model = other.model;
        }
    }
}

/// `[eval]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
#[non_exhaustive]
pub struct EvalToml {
    pub recall_threshold: Option<f64>,
    pub call_timeout_secs: Option<u64>,
    pub concurrency: Option<usize>,
    pub history: Option<PathBuf>,
    pub leaderboard_out: Option<PathBuf>,
    pub responses_dir: Option<PathBuf>,
    pub match_overlap: Option<f64>,
    pub contradiction_overlap: Option<f64>,
}

impl EvalToml {
    pub fn merge(&mut self, other: EvalToml) {
        if other.recall_threshold.is_some() {
            self.recall_threshold = other.recall_threshold;
        }
        if other.call_timeout_secs.is_some() {
            self.call_timeout_secs = other.call_timeout_secs;
        }
        if other.concurrency.is_some() {
            self.concurrency = other.concurrency;
        }
        if other.history.is_some() {
            self.history = other.history;
        }
        if other.leaderboard_out.is_some() {
            self.leaderboard_out = other.leaderboard_out;
        }
        if other.responses_dir.is_some() {
            self.responses_dir = other.responses_dir;
        }
        if other.match_overlap.is_some() {
            self.match_overlap = other.match_overlap;
        }
        if other.contradiction_overlap.is_some() {
            self.contradiction_overlap = other.contradiction_overlap;
        }
    }
}

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Discovers and merges config files.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    global_path: Option<PathBuf>,
    local_path: PathBuf,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Loader for the standard locations:
    /// - `~/.config/insight-eval/config.toml` (user-global)
    /// - `./insight-eval.toml` (project-local)
    pub fn new() -> Self {
        Self {
            global_path: Self::global_config_path(),
            local_path: PathBuf::from("insight-eval.toml"),
        }
    }

    /// Loader reading only `path`.
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        Self {
            global_path: None,
            local_path: path.into(),
        }
    }

    /// Loader with explicit global and local paths.
    pub fn with_paths(global: Option<PathBuf>, local: PathBuf) -> Self {
        Self {
            global_path: global,
            local_path: local,
        }
    }

    /// The user-global config path, if a config directory exists.
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("insight-eval").join("config.toml"))
    }

    /// Load and merge every existing file.
    ///
    /// A file that fails to load is logged and skipped. Returns the merged
    /// config and the files that were applied.
    pub fn load(&self) -> (FileConfig, Vec<PathBuf>) {
        let mut config = FileConfig::default();
        let mut loaded = Vec::new();

        let candidates = self.global_path.iter().chain(std::iter::once(&self.local_path));
        for path in candidates {
            if !path.exists() {
                continue;
            }
            match Self::load_file(path) {
                Ok(file_config) => {
                    config.merge(file_config);
                    loaded.push(path.clone());
                }
                Err(e) => log::warn!("Ignoring config file: {}", e),
            }
        }

        (config, loaded)
    }

    /// Load a single config file.
    pub fn load_file(path: &Path) -> Result<FileConfig, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_eval_config_default() {
        let config = EvalConfig::default();
        assert_eq!(config.recall_threshold, 0.90);
        assert_eq!(config.call_timeout, Duration::from_secs(120));
        assert_eq!(config.top_p, 1.0);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.limit, 0);
        assert_eq!(config.leaderboard_top, 10);
        assert!(config.history_enabled);
        assert_eq!(config.history_path, PathBuf::from("analysis-results/eval-history.jsonl"));
    }

    #[test]
    fn test_eval_config_builder() {
        let config = EvalConfig::new()
            .with_recall_threshold(0.8)
            .with_concurrency(0)
            .with_limit(5)
            .with_history_enabled(false);
        assert_eq!(config.recall_threshold, 0.8);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.limit, 5);
        assert!(!config.history_enabled);
    }

    #[test]
    fn test_file_config_parse_and_apply() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[api]
model = "hf:openai/gpt-oss-120b"

[eval]
recall_threshold = 0.75
call_timeout_secs = 30
match_overlap = 0.6
history = "runs/history.jsonl"
"#
        )
        .unwrap();

        let config = ConfigLoader::load_file(file.path()).unwrap();
        let eval = config.apply_eval(EvalConfig::default());
        assert_eq!(eval.recall_threshold, 0.75);
        assert_eq!(eval.call_timeout, Duration::from_secs(30));
        assert_eq!(eval.scoring.match_overlap, 0.6);
        assert_eq!(eval.scoring.contradiction_overlap, 0.45);
        assert_eq!(eval.history_path, PathBuf::from("runs/history.jsonl"));

        let llm = config.apply_llm(LlmConfig::default());
        assert_eq!(llm.model, "hf:openai/gpt-oss-120b");
    }

    #[test]
    fn test_local_overrides_global() {
        let dir = TempDir::new().unwrap();
        let global = dir.path().join("global.toml");
        let local = dir.path().join("local.toml");
        std::fs::write(&global, "[eval]\nrecall_threshold = 0.5\nconcurrency = 4\n").unwrap();
        std::fs::write(&local, "[eval]\nrecall_threshold = 0.95\n").unwrap();

        let (config, loaded) = ConfigLoader::with_paths(Some(global), local).load();
        assert_eq!(loaded.len(), 2);
        let eval = config.eval.unwrap();
        assert_eq!(eval.recall_threshold, Some(0.95));
        assert_eq!(eval.concurrency, Some(4));
    }

    #[test]
    fn test_invalid_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("local.toml");
        std::fs::write(&local, "[eval\nbroken").unwrap();

        let (config, loaded) = ConfigLoader::with_file(&local).load();
        assert!(loaded.is_empty());
        assert_eq!(config, FileConfig::default());
        assert!(matches!(
            ConfigLoader::load_file(&local),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_missing_files_yield_defaults() {
        let dir = TempDir::new().unwrap();
        let (config, loaded) =
            ConfigLoader::with_paths(None, dir.path().join("absent.toml")).load();
        assert!(loaded.is_empty());
        assert_eq!(config.apply_eval(EvalConfig::default()), EvalConfig::default());
    }
}
