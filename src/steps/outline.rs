//! Outline stage (spec §4.8).

use serde_json::Value;
use thiserror::Error;

use crate::context::ContextSelection;
use crate::error::{ProviderError, RenderError, SchemaValidationError, StateIOError};
use crate::json_extract;
use crate::logging::RunLogger;
use crate::providers::{GenerateOptions, TextGenerator};
use crate::state::{self, OutlineBeat, TokenUsageRecord};

use super::{StagePaths, value_vars, write_artifact_atomic};

#[derive(Debug, Error)]
pub enum OutlineStepError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("outline response could not be parsed as JSON: {0}")]
    Json(String),
    #[error(transparent)]
    Schema(#[from] SchemaValidationError),
    #[error("outline produced {got} beats but {expected} were requested")]
    BeatCountMismatch { got: usize, expected: u32 },
    #[error("outline beat {index} is missing required fields beat_id/title/summary")]
    MalformedBeat { index: usize },
    #[error(transparent)]
    State(#[from] StateIOError),
    #[error("io error writing outline artifact: {0}")]
    Io(#[from] std::io::Error),
}

pub async fn execute_outline_step(
    paths: &StagePaths,
    context: &ContextSelection,
    seed: &str,
    beats_requested: u32,
    generator: &dyn TextGenerator,
    logger: &RunLogger,
) -> Result<Vec<OutlineBeat>, OutlineStepError> {
    let template_path = paths.prompt_path("10_outline.md");
    let mut vars = Vec::new();
    vars.push(("seed", Value::String(seed.to_string())));
    vars.push(("beats_count", Value::Number(beats_requested.into())));
    vars.push(("lore_bible", Value::String(context.lore_bible().to_string())));
    vars.push(("style_rules", Value::String(context.style_rules())));
    vars.push(("location_context", Value::String(context.location_context().to_string())));
    vars.push(("character_context", Value::String(context.character_context())));
    let rendered = crate::prompt::render_prompt(&template_path, &value_vars(vars))?;

    let options = GenerateOptions::default().with_temperature(0.7);
    let result = generator.generate(&rendered, "outline", None, &options).await?;

    let (parsed, repaired) =
        json_extract::extract_json_object_reporting(&result.content).map_err(OutlineStepError::Json)?;
    if repaired {
        logger.log_json_repair("outline");
    }

    let schema_path = paths.schema_path("outline.schema.json");
    crate::schema::validate_json_schema(&parsed, &schema_path, "outline", Some(logger))?;

    let beats_value = parsed
        .get("beats")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    if beats_value.len() != beats_requested as usize {
        return Err(OutlineStepError::BeatCountMismatch {
            got: beats_value.len(),
            expected: beats_requested,
        });
    }

    let mut beats = Vec::with_capacity(beats_value.len());
    for (index, beat) in beats_value.iter().enumerate() {
        let beat_id = beat.get("beat_id").and_then(Value::as_u64);
        let title = beat.get("title").and_then(Value::as_str);
        let summary = beat.get("summary").and_then(Value::as_str);
        match (beat_id, title, summary) {
            (Some(beat_id), Some(title), Some(summary)) => beats.push(OutlineBeat {
                beat_id: beat_id as u32,
                title: title.to_string(),
                summary: summary.to_string(),
            }),
            _ => return Err(OutlineStepError::MalformedBeat { index }),
        }
    }

    let artifact_path = paths.artifacts_dir().join("10_outline.json");
    let document = serde_json::json!({ "beats": beats });
    write_artifact_atomic(
        &artifact_path,
        serde_json::to_string_pretty(&document).unwrap().as_bytes(),
    )?;
    logger.log_artifact_write("artifacts/10_outline.json");

    let usage = TokenUsageRecord {
        step: "outline".to_string(),
        provider: result.provider.clone(),
        model: result.model.clone(),
        prompt_tokens: result.prompt_tokens,
        completion_tokens: result.completion_tokens,
        total_tokens: result.total_tokens_derived(),
    };
    logger.log_token_usage(
        "outline",
        usage.prompt_tokens.unwrap_or(0),
        usage.completion_tokens.unwrap_or(0),
        usage.total_tokens.unwrap_or(0),
    );

    let beats_for_state = beats.clone();
    state::update_state(&paths.run_dir, move |s| {
        s.outline = beats_for_state;
        s.token_usage.push(usage);
    })?;

    Ok(beats)
}
