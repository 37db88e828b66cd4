//! Vendor-neutral provider adapters (spec §4.6): `TextGenerator` and
//! `SpeechSynthesizer` with per-call retry policy and usage extraction.
//! The orchestrator never touches a vendor SDK directly.

mod retry;
pub mod openai_http;
pub mod pricing;

pub use retry::{RetryingGenerator, RetryingSynthesizer};

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ProviderError;
use crate::state::derive_total_tokens;

/// Typed options struct replacing the Python `**kwargs` pattern (spec §9).
/// Vendor-specific knobs ride in `extras`.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout: Option<Duration>,
    pub extras: BTreeMap<String, Value>,
}

impl GenerateOptions {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Merges `self` (defaults) with `overrides`, call wins.
    pub fn merged_with(&self, overrides: &GenerateOptions) -> GenerateOptions {
        let mut extras = self.extras.clone();
        extras.extend(overrides.extras.clone());
        GenerateOptions {
            temperature: overrides.temperature.or(self.temperature),
            max_tokens: overrides.max_tokens.or(self.max_tokens),
            timeout: overrides.timeout.or(self.timeout),
            extras,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextResult {
    pub content: String,
    pub provider: String,
    pub model: String,
    pub prompt_tokens: Option<i64>,
    pub completion_tokens: Option<i64>,
    pub total_tokens: Option<i64>,
    pub raw: Value,
}

impl TextResult {
    pub fn total_tokens_derived(&self) -> Option<i64> {
        derive_total_tokens(self.prompt_tokens, self.completion_tokens, self.total_tokens)
    }
}

#[derive(Debug, Clone)]
pub struct SpeechResult {
    pub audio_bytes: Vec<u8>,
    pub provider: String,
    pub model: String,
    pub voice: String,
    pub prompt_tokens: Option<i64>,
    pub completion_tokens: Option<i64>,
    pub total_tokens: Option<i64>,
    pub raw: Value,
}

impl SpeechResult {
    pub fn total_tokens_derived(&self) -> Option<i64> {
        derive_total_tokens(self.prompt_tokens, self.completion_tokens, self.total_tokens)
    }
}

/// Vendor-neutral text generation. `step` names the calling stage, for
/// provider-side tagging/telemetry; it carries no behavior here.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        step: &str,
        model: Option<&str>,
        options: &GenerateOptions,
    ) -> Result<TextResult, ProviderError>;
}

/// Vendor-neutral text-to-speech.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        text: &str,
        model: Option<&str>,
        voice: Option<&str>,
        options: &GenerateOptions,
    ) -> Result<SpeechResult, ProviderError>;
}

/// Validates response content per spec §4.6: non-empty after trimming.
pub fn validate_text_content(content: Option<&str>) -> Result<String, ProviderError> {
    match content {
        None => Err(ProviderError::MissingAssistantContent),
        Some(c) if c.trim().is_empty() => Err(ProviderError::EmptyAssistantContent),
        Some(c) => Ok(c.to_string()),
    }
}

pub fn validate_audio_bytes(bytes: Vec<u8>) -> Result<Vec<u8>, ProviderError> {
    if bytes.is_empty() {
        Err(ProviderError::EmptyAudio)
    } else {
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_whitespace_content() {
        assert!(matches!(
            validate_text_content(None),
            Err(ProviderError::MissingAssistantContent)
        ));
        assert!(matches!(
            validate_text_content(Some("   ")),
            Err(ProviderError::EmptyAssistantContent)
        ));
        assert!(validate_text_content(Some("hello")).is_ok());
    }

    #[test]
    fn options_merge_call_wins() {
        let defaults = GenerateOptions::default().with_temperature(0.7);
        let overrides = GenerateOptions {
            temperature: Some(0.2),
            ..Default::default()
        };
        let merged = defaults.merged_with(&overrides);
        assert_eq!(merged.temperature, Some(0.2));
    }

    #[test]
    fn options_merge_falls_back_to_defaults() {
        let defaults = GenerateOptions::default().with_temperature(0.7);
        let overrides = GenerateOptions::default();
        let merged = defaults.merged_with(&overrides);
        assert_eq!(merged.temperature, Some(0.7));
    }
}
