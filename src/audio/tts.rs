//! Per-chunk TTS driver (spec §4.12.2): chunks the final script, synthesizes
//! each chunk independently, and writes prompts/outputs under `tts/`.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::error::{ProviderError, StateIOError};
use crate::logging::RunLogger;
use crate::providers::{GenerateOptions, SpeechSynthesizer};
use crate::state::{self, TtsTokenUsageRecord};
use crate::steps::write_artifact_atomic;

use super::chunker::{chunk_text, Chunk};

#[derive(Debug, Error)]
pub enum AudioPrepStepError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    State(#[from] StateIOError),
    #[error("io error writing tts segment: {0}")]
    Io(#[from] std::io::Error),
}

pub struct TtsSegment {
    pub segment_id: u32,
    pub output_path: PathBuf,
    pub clean: bool,
}

/// Synthesizes `final_script` chunk by chunk, writing
/// `tts/prompts/segment_NN.txt` and `tts/outputs/segment_NN.<ext>` for
/// each. Records one `tts_token_usage` entry (atomic state update) per
/// segment. Logs a warning for any chunk whose cut was forced at the
/// word-count ceiling without finding a clean newline boundary.
pub async fn run_tts_pipeline(
    run_dir: &Path,
    final_script: &str,
    output_extension: &str,
    synthesizer: &dyn SpeechSynthesizer,
    model: Option<&str>,
    voice: Option<&str>,
    logger: &RunLogger,
) -> Result<Vec<TtsSegment>, AudioPrepStepError> {
    let chunks: Vec<Chunk> = chunk_text(final_script);
    let tts_dir = run_dir.join("tts");
    let prompts_dir = tts_dir.join("prompts");
    let outputs_dir = tts_dir.join("outputs");

    let mut segments = Vec::with_capacity(chunks.len());
    let mut cumulative_chars = 0usize;

    for (index, chunk) in chunks.iter().enumerate() {
        let segment_id = (index + 1) as u32;

        if !chunk.clean {
            logger.warn(format!(
                "segment {segment_id:02}: chunked at maximum without newline"
            ));
        }

        let prompt_path = prompts_dir.join(format!("segment_{segment_id:02}.txt"));
        write_artifact_atomic(&prompt_path, chunk.text.as_bytes())?;

        let options = GenerateOptions::default();
        let result = synthesizer
            .synthesize(&chunk.text, model, voice, &options)
            .await?;

        let output_path = outputs_dir.join(format!("segment_{segment_id:02}.{output_extension}"));
        write_artifact_atomic(&output_path, &result.audio_bytes)?;

        let input_characters = chunk.text.len();
        cumulative_chars += input_characters;
        logger.log_tts_character_usage(segment_id, input_characters);
        logger.log_tts_cumulative(cumulative_chars);

        let usage = TtsTokenUsageRecord {
            step: "tts".to_string(),
            provider: result.provider.clone(),
            model: result.model.clone(),
            prompt_tokens: result.prompt_tokens,
            completion_tokens: result.completion_tokens,
            total_tokens: result.total_tokens_derived(),
            input_characters,
        };
        state::update_state(run_dir, move |s| {
            s.tts_token_usage.push(usage);
        })?;

        segments.push(TtsSegment {
            segment_id,
            output_path,
            clean: chunk.clean,
        });
    }

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;
    use tempfile::tempdir;

    struct EchoSynthesizer;

    #[async_trait]
    impl SpeechSynthesizer for EchoSynthesizer {
        async fn synthesize(
            &self,
            text: &str,
            _model: Option<&str>,
            _voice: Option<&str>,
            _options: &GenerateOptions,
        ) -> Result<crate::providers::SpeechResult, ProviderError> {
            Ok(crate::providers::SpeechResult {
                audio_bytes: text.as_bytes().to_vec(),
                provider: "test".to_string(),
                model: "test-voice-model".to_string(),
                voice: "test-voice".to_string(),
                prompt_tokens: None,
                completion_tokens: None,
                total_tokens: None,
                raw: Value::Null,
            })
        }
    }

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    #[tokio::test]
    async fn writes_one_segment_pair_per_chunk() {
        let dir = tempdir().unwrap();
        state::write_initial_state(dir.path(), &state::State::new("app", "seed")).unwrap();
        let logger = RunLogger::open(dir.path()).unwrap();

        let script = words(500);
        let segments = run_tts_pipeline(dir.path(), &script, "wav", &EchoSynthesizer, None, None, &logger)
            .await
            .unwrap();

        assert_eq!(segments.len(), 1);
        assert!(dir.path().join("tts/prompts/segment_01.txt").exists());
        assert!(dir.path().join("tts/outputs/segment_01.wav").exists());

        let state = state::load_state(dir.path()).unwrap();
        assert_eq!(state.tts_token_usage.len(), 1);
        assert_eq!(state.tts_token_usage[0].input_characters, script.len());
    }

    #[tokio::test]
    async fn empty_script_yields_no_segments() {
        let dir = tempdir().unwrap();
        state::write_initial_state(dir.path(), &state::State::new("app", "seed")).unwrap();
        let logger = RunLogger::open(dir.path()).unwrap();

        let segments = run_tts_pipeline(dir.path(), "", "wav", &EchoSynthesizer, None, None, &logger)
            .await
            .unwrap();
        assert!(segments.is_empty());
    }
}
