//! Model selection for a run.

use insight_core::ModelInfo;
use std::collections::HashSet;

/// Models never evaluated, even when requested explicitly.
pub static EVAL_MODEL_DENYLIST: &[&str] = &[
    "hf:deepseek-ai/DeepSeek-R1-0528",
    "hf:deepseek-ai/DeepSeek-V3",
    "hf:deepseek-ai/DeepSeek-V3-0324",
    "hf:MiniMaxAI/MiniMax-M2",
    "hf:Qwen/Qwen3-235B-A22B-Thinking-2507",
    "hf:zai-org/GLM-4.6",
    "hf:moonshotai/Kimi-K2-Instruct-0905",
    "hf:meta-llama/Llama-3.3-70B-Instruct",
];

/// Short names accepted in place of full model ids.
pub static MODEL_ALIASES: &[(&str, &str)] = &[
    ("gptoss", "hf:openai/gpt-oss-120b"),
    ("gpt", "hf:openai/gpt-oss-120b"),
    ("kimi", "hf:moonshotai/Kimi-K2-Thinking"),
    ("qwen", "hf:Qwen/Qwen3-VL-235B-A22B-Instruct"),
    ("glm", "hf:zai-org/GLM-4.7"),
    ("zai", "hf:zai-org/GLM-4.7"),
    ("deepseek", "hf:deepseek-ai/DeepSeek-V3.2"),
    ("ds", "hf:deepseek-ai/DeepSeek-V3.2"),
];

/// Resolve an alias to its full id; anything else is returned unchanged.
pub fn resolve_model(name: &str) -> &str {
    MODEL_ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map_or(name, |(_, id)| *id)
}

pub fn is_denied(model_id: &str) -> bool {
    EVAL_MODEL_DENYLIST.contains(&model_id)
}

/// Pick the models to evaluate from those the API advertises.
///
/// A blank `csv` selects every advertised model; otherwise only the listed
/// ids (or aliases) are kept. Denied models are always dropped, and the
/// advertised order is preserved.
///
/// # Example
///
/// ```
/// use insight_core::ModelInfo;
/// use insight_eval::select_models;
///
/// let available = vec![
///     ModelInfo::new("hf:deepseek-ai/DeepSeek-V3.2"),
///     ModelInfo::new("hf:zai-org/GLM-4.6"),
///     ModelInfo::new("hf:openai/gpt-oss-120b"),
/// ];
/// let all: Vec<_> = select_models(&available, "").into_iter().map(|m| m.id).collect();
/// assert_eq!(all, vec!["hf:deepseek-ai/DeepSeek-V3.2", "hf:openai/gpt-oss-120b"]);
///
/// let picked = select_models(&available, "ds");
/// assert_eq!(picked.len(), 1);
/// ```
pub fn select_models(available: &[ModelInfo], csv: &str) -> Vec<ModelInfo> {
    let allowed: HashSet<&str> = csv
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(resolve_model)
        .collect();

    available
        .iter()
        .filter(|m| !is_denied(&m.id))
        .filter(|m| allowed.is_empty() || allowed.contains(m.id.as_str()))
        .cloned()
        .collect()
}
