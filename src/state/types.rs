//! Data model for `inputs.json` and `state.json` (spec §3).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedTtsConfig {
    pub tts_provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tts_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tts_voice: Option<String>,
    #[serde(default)]
    pub tts_arguments: BTreeMap<String, serde_json::Value>,
}

/// Immutable record of launch parameters, written once at run init.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inputs {
    pub app: String,
    pub seed: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beats: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_count: Option<u32>,
    pub run_id: String,
    pub timestamp: String,
    pub context_dir: String,
    pub prompts_dir: String,
    pub model: String,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_tts_config: Option<ResolvedTtsConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectedContext {
    pub location: Option<String>,
    pub characters: Vec<String>,
    pub world_files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlineBeat {
    pub beat_id: u32,
    pub title: String,
    pub summary: String,
}

/// Section metadata: the YAML frontmatter of a generated section, as a
/// flexible JSON map so unknown/app-specific frontmatter keys survive.
pub type SectionRecord = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub section_id: u32,
    pub summary: String,
    pub continuity_updates: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsageRecord {
    pub step: String,
    pub provider: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsTokenUsageRecord {
    pub step: String,
    pub provider: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<i64>,
    pub input_characters: usize,
}

/// Mutable progress record, read-modify-written atomically by the state store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    pub app: String,
    pub seed: String,
    #[serde(default)]
    pub selected_context: SelectedContext,
    #[serde(default)]
    pub outline: Vec<OutlineBeat>,
    #[serde(default)]
    pub sections: Vec<SectionRecord>,
    #[serde(default)]
    pub summaries: Vec<SummaryRecord>,
    #[serde(default)]
    pub continuity_ledger: BTreeMap<String, String>,
    #[serde(default)]
    pub token_usage: Vec<TokenUsageRecord>,
    #[serde(default)]
    pub tts_token_usage: Vec<TtsTokenUsageRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tts_config: Option<ResolvedTtsConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_script_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editor_report_path: Option<String>,
}

impl State {
    pub fn new(app: impl Into<String>, seed: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            seed: seed.into(),
            selected_context: SelectedContext::default(),
            outline: Vec::new(),
            sections: Vec::new(),
            summaries: Vec::new(),
            continuity_ledger: BTreeMap::new(),
            token_usage: Vec::new(),
            tts_token_usage: Vec::new(),
            tts_config: None,
            final_script_path: None,
            editor_report_path: None,
        }
    }
}

/// `total = prompt + completion` when derivable (spec §4.6).
pub fn derive_total_tokens(prompt: Option<i64>, completion: Option<i64>, total: Option<i64>) -> Option<i64> {
    total.or_else(|| match (prompt, completion) {
        (Some(p), Some(c)) => Some(p + c),
        _ => None,
    })
}
