//! Retry policy as a decorator around `TextGenerator`/`SpeechSynthesizer`
//! (spec §4.6, §9): `max_retries + 1` attempts; a model-not-recognized
//! error bypasses retry entirely.

use async_trait::async_trait;

use super::{GenerateOptions, SpeechSynthesizer, SpeechResult, TextGenerator, TextResult};
use crate::error::ProviderError;

pub struct RetryingGenerator<G> {
    inner: G,
    max_retries: u32,
}

impl<G: TextGenerator> RetryingGenerator<G> {
    pub fn new(inner: G, max_retries: u32) -> Self {
        Self { inner, max_retries }
    }
}

#[async_trait]
impl<G: TextGenerator> TextGenerator for RetryingGenerator<G> {
    async fn generate(
        &self,
        prompt: &str,
        step: &str,
        model: Option<&str>,
        options: &GenerateOptions,
    ) -> Result<TextResult, ProviderError> {
        let attempts = self.max_retries + 1;
        let mut last_err: Option<ProviderError> = None;

        for _attempt in 0..attempts {
            match self.inner.generate(prompt, step, model, options).await {
                Ok(result) => return Ok(result),
                Err(ProviderError::ModelNotRecognized(m)) => {
                    return Err(ProviderError::ModelNotRecognized(m));
                }
                Err(e) => {
                    last_err = Some(e);
                }
            }
        }

        Err(ProviderError::Exhausted {
            attempts,
            source: Box::new(std::io::Error::other(
                last_err.map(|e| e.to_string()).unwrap_or_default(),
            )),
        })
    }
}

/// Same retry/backoff policy as [`RetryingGenerator`], for a
/// `SpeechSynthesizer`. Kept as a separate wrapper rather than a shared
/// generic over both traits: the traits have unrelated call signatures, so
/// a single blanket impl would need an intermediate abstraction the spec
/// does not call for.
pub struct RetryingSynthesizer<S> {
    inner: S,
    max_retries: u32,
}

impl<S: SpeechSynthesizer> RetryingSynthesizer<S> {
    pub fn new(inner: S, max_retries: u32) -> Self {
        Self { inner, max_retries }
    }
}

#[async_trait]
impl<S: SpeechSynthesizer> SpeechSynthesizer for RetryingSynthesizer<S> {
    async fn synthesize(
        &self,
        text: &str,
        model: Option<&str>,
        voice: Option<&str>,
        options: &GenerateOptions,
    ) -> Result<SpeechResult, ProviderError> {
        let attempts = self.max_retries + 1;
        let mut last_err: Option<ProviderError> = None;

        for _attempt in 0..attempts {
            match self.inner.synthesize(text, model, voice, options).await {
                Ok(result) => return Ok(result),
                Err(ProviderError::ModelNotRecognized(m)) => {
                    return Err(ProviderError::ModelNotRecognized(m));
                }
                Err(e) => {
                    last_err = Some(e);
                }
            }
        }

        Err(ProviderError::Exhausted {
            attempts,
            source: Box::new(std::io::Error::other(
                last_err.map(|e| e.to_string()).unwrap_or_default(),
            )),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct FlakyGenerator {
        fail_times: u32,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl TextGenerator for FlakyGenerator {
        async fn generate(
            &self,
            _prompt: &str,
            _step: &str,
            _model: Option<&str>,
            _options: &GenerateOptions,
        ) -> Result<TextResult, ProviderError> {
            let call_number = self.calls.fetch_add(1, Ordering::SeqCst);
            if call_number < self.fail_times {
                return Err(ProviderError::Other("transient".to_string()));
            }
            Ok(TextResult {
                content: "ok".to_string(),
                provider: "test".to_string(),
                model: "test-model".to_string(),
                prompt_tokens: None,
                completion_tokens: None,
                total_tokens: None,
                raw: serde_json::Value::Null,
            })
        }
    }

    struct UnrecognizedModelGenerator;

    #[async_trait]
    impl TextGenerator for UnrecognizedModelGenerator {
        async fn generate(
            &self,
            _prompt: &str,
            _step: &str,
            _model: Option<&str>,
            _options: &GenerateOptions,
        ) -> Result<TextResult, ProviderError> {
            Err(ProviderError::ModelNotRecognized("ghost-model".to_string()))
        }
    }

    #[tokio::test]
    async fn retries_transient_failures_up_to_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let generator = RetryingGenerator::new(
            FlakyGenerator {
                fail_times: 2,
                calls: calls.clone(),
            },
            3,
        );
        let result = generator
            .generate("prompt", "step", None, &GenerateOptions::default())
            .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_after_max_retries_plus_one_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let generator = RetryingGenerator::new(
            FlakyGenerator {
                fail_times: 100,
                calls: calls.clone(),
            },
            2,
        );
        let result = generator
            .generate("prompt", "step", None, &GenerateOptions::default())
            .await;
        assert!(matches!(result, Err(ProviderError::Exhausted { attempts: 3, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn model_not_recognized_is_not_retried() {
        let generator = RetryingGenerator::new(UnrecognizedModelGenerator, 5);
        let result = generator
            .generate("prompt", "step", None, &GenerateOptions::default())
            .await;
        assert!(matches!(result, Err(ProviderError::ModelNotRecognized(_))));
    }

    struct FlakySynthesizer {
        fail_times: u32,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl SpeechSynthesizer for FlakySynthesizer {
        async fn synthesize(
            &self,
            _text: &str,
            _model: Option<&str>,
            _voice: Option<&str>,
            _options: &GenerateOptions,
        ) -> Result<SpeechResult, ProviderError> {
            let call_number = self.calls.fetch_add(1, Ordering::SeqCst);
            if call_number < self.fail_times {
                return Err(ProviderError::Other("transient".to_string()));
            }
            Ok(SpeechResult {
                audio_bytes: vec![1, 2, 3],
                provider: "test".to_string(),
                model: "test-model".to_string(),
                voice: "test-voice".to_string(),
                prompt_tokens: None,
                completion_tokens: None,
                total_tokens: None,
                raw: serde_json::Value::Null,
            })
        }
    }

    #[tokio::test]
    async fn synthesizer_retries_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let synthesizer = RetryingSynthesizer::new(
            FlakySynthesizer {
                fail_times: 1,
                calls: calls.clone(),
            },
            2,
        );
        let result = synthesizer
            .synthesize("hello", None, None, &GenerateOptions::default())
            .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
