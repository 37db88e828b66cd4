//! Summarize stage (spec §4.10), paired with Section.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

use crate::continuity::merge_continuity_updates;
use crate::error::{ProviderError, RenderError, SchemaValidationError, StateIOError};
use crate::json_extract;
use crate::logging::RunLogger;
use crate::providers::{GenerateOptions, TextGenerator};
use crate::state::{self, SummaryRecord, TokenUsageRecord};

use super::{value_vars, StagePaths};

#[derive(Debug, Error)]
pub enum SummarizeStepError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("summarize response could not be parsed as JSON: {0}")]
    Json(String),
    #[error(transparent)]
    Schema(#[from] SchemaValidationError),
    #[error("summarize response's continuity_updates is not a mapping")]
    ContinuityUpdatesNotMapping,
    #[error(transparent)]
    State(#[from] StateIOError),
}

pub async fn execute_summarize_step(
    paths: &StagePaths,
    section_id: u32,
    section_content: &str,
    generator: &dyn TextGenerator,
    logger: &RunLogger,
) -> Result<SummaryRecord, SummarizeStepError> {
    let template_path = paths.prompt_path("21_summarize.md");
    let mut vars = Vec::new();
    vars.push(("section_id", Value::Number(section_id.into())));
    vars.push(("section_content", Value::String(section_content.to_string())));
    let rendered = crate::prompt::render_prompt(&template_path, &value_vars(vars))?;

    let options = GenerateOptions::default().with_temperature(0.5);
    let result = generator.generate(&rendered, "summarize", None, &options).await?;

    let (mut parsed, repaired) =
        json_extract::extract_json_object_reporting(&result.content).map_err(SummarizeStepError::Json)?;
    if repaired {
        logger.log_json_repair("summarize");
    }

    if let Some(obj) = parsed.as_object_mut() {
        obj.insert("section_id".to_string(), Value::Number(section_id.into()));
    }

    let schema_path = paths.schema_path("summary.schema.json");
    crate::schema::validate_json_schema(&parsed, &schema_path, "summarize", Some(logger))?;

    let continuity_updates: BTreeMap<String, String> = parsed
        .get("continuity_updates")
        .and_then(Value::as_object)
        .ok_or(SummarizeStepError::ContinuityUpdatesNotMapping)?
        .iter()
        .map(|(k, v)| (k.clone(), value_to_text(v)))
        .collect();

    let summary_text = parsed
        .get("summary")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let record = SummaryRecord {
        section_id,
        summary: summary_text,
        continuity_updates,
    };

    let usage = TokenUsageRecord {
        step: "summarize".to_string(),
        provider: result.provider.clone(),
        model: result.model.clone(),
        prompt_tokens: result.prompt_tokens,
        completion_tokens: result.completion_tokens,
        total_tokens: result.total_tokens_derived(),
    };
    logger.log_token_usage(
        "summarize",
        usage.prompt_tokens.unwrap_or(0),
        usage.completion_tokens.unwrap_or(0),
        usage.total_tokens.unwrap_or(0),
    );

    let record_for_state = record.clone();
    state::update_state(&paths.run_dir, move |s| {
        let merged = merge_continuity_updates(&s.continuity_ledger, &record_for_state.continuity_updates);
        s.summaries.push(record_for_state);
        s.continuity_ledger = merged;
        s.token_usage.push(usage);
    })?;

    Ok(record)
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
