//! Cost estimation seam (spec §1 excludes the pricing table itself; the
//! orchestrator's end-of-run summary still needs an interface to consume
//! it from, per `original_source/llm/pricing.py` and
//! `pipeline/runner.py`'s summary line).

use crate::state::{TokenUsageRecord, TtsTokenUsageRecord};

/// An external collaborator mapping model + usage to an estimated cost.
/// Returns `None` when the model is not present in the (out-of-scope)
/// pricing table, matching the original's "N/A" degradation.
pub trait CostEstimator: Send + Sync {
    fn estimate_chat_cost(&self, usage: &[TokenUsageRecord]) -> Option<f64>;
    fn estimate_tts_cost(&self, usage: &[TtsTokenUsageRecord]) -> Option<f64>;
}

/// Default estimator: always `None`. A real pricing table is an external
/// collaborator outside this crate's scope.
pub struct NullCostEstimator;

impl CostEstimator for NullCostEstimator {
    fn estimate_chat_cost(&self, _usage: &[TokenUsageRecord]) -> Option<f64> {
        None
    }

    fn estimate_tts_cost(&self, _usage: &[TtsTokenUsageRecord]) -> Option<f64> {
        None
    }
}

/// Aggregates raw usage totals the orchestrator prints regardless of
/// whether a cost can be derived (`original_source/pipeline/runner.py`
/// prints tokens/characters even when cost is "N/A").
pub struct UsageTotals {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub tts_characters: usize,
}

pub fn sum_usage(usage: &[TokenUsageRecord], tts_usage: &[TtsTokenUsageRecord]) -> UsageTotals {
    let prompt_tokens = usage.iter().filter_map(|u| u.prompt_tokens).sum();
    let completion_tokens = usage.iter().filter_map(|u| u.completion_tokens).sum();
    let total_tokens = usage.iter().filter_map(|u| u.total_tokens).sum();
    let tts_characters = tts_usage.iter().map(|u| u.input_characters).sum();
    UsageTotals {
        prompt_tokens,
        completion_tokens,
        total_tokens,
        tts_characters,
    }
}
