//! Default concrete provider adapter: plain HTTP against any
//! OpenAI-Chat-Completions/TTS-compatible endpoint.
//!
//! The library core (`providers::{TextGenerator,SpeechSynthesizer}`) is
//! vendor-neutral per spec §4.6/§9; binding to a specific vendor SDK is
//! explicitly out of scope (spec §1). This adapter exists only so the
//! binary in `main.rs` is a runnable CLI out of the box: it speaks the
//! widely-mirrored OpenAI-compatible wire format over `reqwest` rather than
//! importing a vendor SDK crate, and any compatible endpoint (OpenAI
//! itself, Azure's OpenAI-compatible surface, a local proxy) can be pointed
//! at via `base_url`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{GenerateOptions, SpeechResult, SpeechSynthesizer, TextGenerator, TextResult};
use crate::error::ProviderError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiHttpConfig {
    pub api_key: String,
    pub base_url: String,
    pub default_model: String,
}

impl OpenAiHttpConfig {
    pub fn new(api_key: impl Into<String>, default_model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            default_model: default_model.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

pub struct OpenAiHttpGenerator {
    client: reqwest::Client,
    config: OpenAiHttpConfig,
}

impl OpenAiHttpGenerator {
    pub fn new(config: OpenAiHttpConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

/// Vendor message substrings recognized as "model not recognized" (spec
/// §4.6: not retried). OpenAI-compatible backends report this as a 4xx
/// with a message mentioning the model id; a dedicated error code is not
/// universally available across compatible backends, so a message-pattern
/// match is used, as spec §4.6 allows ("recognizable by a vendor message
/// pattern or a dedicated error variant").
fn looks_like_model_not_recognized(status: reqwest::StatusCode, body: &str) -> bool {
    status.as_u16() == 404
        || (status.is_client_error()
            && (body.contains("model") && (body.contains("does not exist") || body.contains("not found"))))
}

#[async_trait]
impl TextGenerator for OpenAiHttpGenerator {
    async fn generate(
        &self,
        prompt: &str,
        _step: &str,
        model: Option<&str>,
        options: &GenerateOptions,
    ) -> Result<TextResult, ProviderError> {
        let model = model.unwrap_or(&self.config.default_model).to_string();
        let mut body = json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
        });
        if let Some(temperature) = options.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = options.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Value::Object(ref mut map) = body {
            for (k, v) in &options.extras {
                map.insert(k.clone(), v.clone());
            }
        }

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&body);
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Other(format!("request failed: {e}")))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Other(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            if looks_like_model_not_recognized(status, &text) {
                return Err(ProviderError::ModelNotRecognized(model));
            }
            return Err(ProviderError::Other(format!(
                "provider returned status {status}: {text}"
            )));
        }

        let parsed: Value = serde_json::from_str(&text)
            .map_err(|e| ProviderError::Other(format!("could not parse response JSON: {e}")))?;

        let content = parsed
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|c| c.first())
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str);
        let content = super::validate_text_content(content)?;

        let usage = parsed.get("usage");
        let prompt_tokens = usage.and_then(|u| u.get("prompt_tokens")).and_then(Value::as_i64);
        let completion_tokens = usage.and_then(|u| u.get("completion_tokens")).and_then(Value::as_i64);
        let total_tokens = usage.and_then(|u| u.get("total_tokens")).and_then(Value::as_i64);

        Ok(TextResult {
            content,
            provider: "openai-compatible".to_string(),
            model: parsed
                .get("model")
                .and_then(Value::as_str)
                .unwrap_or(&model)
                .to_string(),
            prompt_tokens,
            completion_tokens,
            total_tokens,
            raw: parsed,
        })
    }
}

pub struct OpenAiHttpSynthesizer {
    client: reqwest::Client,
    config: OpenAiHttpConfig,
    default_voice: String,
}

impl OpenAiHttpSynthesizer {
    pub fn new(config: OpenAiHttpConfig, default_voice: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            default_voice: default_voice.into(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiHttpSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        model: Option<&str>,
        voice: Option<&str>,
        options: &GenerateOptions,
    ) -> Result<SpeechResult, ProviderError> {
        let model = model.unwrap_or(&self.config.default_model).to_string();
        let voice = voice.unwrap_or(&self.default_voice).to_string();

        let mut body = json!({
            "model": model,
            "voice": voice,
            "input": text,
        });
        if let Value::Object(ref mut map) = body {
            for (k, v) in &options.extras {
                map.insert(k.clone(), v.clone());
            }
        }

        let mut request = self
            .client
            .post(format!("{}/audio/speech", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&body);
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Other(format!("request failed: {e}")))?;
        let status = response.status();

        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            if looks_like_model_not_recognized(status, &body_text) {
                return Err(ProviderError::ModelNotRecognized(model));
            }
            return Err(ProviderError::Other(format!(
                "tts provider returned status {status}: {body_text}"
            )));
        }

        let audio_bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Other(format!("failed to read audio body: {e}")))?
            .to_vec();
        let audio_bytes = super::validate_audio_bytes(audio_bytes)?;

        Ok(SpeechResult {
            audio_bytes,
            provider: "openai-compatible".to_string(),
            model,
            voice,
            prompt_tokens: None,
            completion_tokens: None,
            total_tokens: None,
            raw: Value::Object(serde_json::Map::new()),
        })
    }
}

/// Credential loading (spec §1: explicitly an external collaborator, not
/// part of the library core). Reads `config/creds.json`, accepting any of
/// the key names the original accepted: `openai_api_key`, `OPENAI_KEY`,
/// `OPEN_AI`, `OPENAI_API_KEY`.
pub fn load_api_key_from_creds(config_dir: &std::path::Path) -> Option<String> {
    let path = config_dir.join("creds.json");
    let text = std::fs::read_to_string(path).ok()?;
    let creds: BTreeMap<String, Value> = serde_json::from_str(&text).ok()?;
    for key in ["openai_api_key", "OPENAI_KEY", "OPEN_AI", "OPENAI_API_KEY"] {
        if let Some(value) = creds.get(key).and_then(Value::as_str) {
            return Some(value.to_string());
        }
    }
    None
}
