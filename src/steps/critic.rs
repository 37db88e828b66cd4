//! Critic stage (spec §4.11), runs once at the end of text generation.

use std::collections::BTreeSet;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::context::ContextSelection;
use crate::error::{ProviderError, RenderError, SchemaValidationError, StateIOError};
use crate::json_extract;
use crate::logging::RunLogger;
use crate::providers::{GenerateOptions, TextGenerator};
use crate::state::{self, OutlineBeat, TokenUsageRecord};

use super::{split_frontmatter, value_vars, write_artifact_atomic, StagePaths};

const CRITIC_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum CriticStepError {
    #[error("section {0:02} is missing from artifacts (gap in 1..N)")]
    SectionGap(u32),
    #[error("io error reading section artifact: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("critic response could not be parsed as JSON: {0}")]
    Json(String),
    #[error("critic response must contain exactly final_script and editor_report; found extra keys: {0:?}")]
    ExtraKeys(Vec<String>),
    #[error("critic response is missing required key: {0}")]
    MissingKey(&'static str),
    #[error(transparent)]
    Schema(#[from] SchemaValidationError),
    #[error(transparent)]
    State(#[from] StateIOError),
}

fn load_sorted_sections(
    artifacts_dir: &std::path::Path,
    expected_count: usize,
) -> Result<Vec<(u32, String)>, CriticStepError> {
    let mut found: BTreeSet<u32> = BTreeSet::new();
    let mut sections = Vec::new();

    if artifacts_dir.is_dir() {
        for entry in std::fs::read_dir(artifacts_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(rest) = name.strip_prefix("20_section_") {
                if let Some(num_str) = rest.strip_suffix(".md") {
                    if let Ok(num) = num_str.parse::<u32>() {
                        found.insert(num);
                        let content = std::fs::read_to_string(entry.path())?;
                        sections.push((num, content));
                    }
                }
            }
        }
    }

    for i in 1..=(expected_count as u32) {
        if !found.contains(&i) {
            return Err(CriticStepError::SectionGap(i));
        }
    }

    sections.sort_by_key(|(num, _)| *num);
    Ok(sections)
}

fn strip_all_frontmatter(sections: &[(u32, String)]) -> String {
    sections
        .iter()
        .map(|(_, content)| {
            split_frontmatter(content)
                .map(|(_, body)| body.trim())
                .unwrap_or(content.trim())
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub async fn execute_critic_step(
    paths: &StagePaths,
    context: &ContextSelection,
    seed: &str,
    outline: &[OutlineBeat],
    generator: &dyn TextGenerator,
    logger: &RunLogger,
) -> Result<(String, Value), CriticStepError> {
    let sections = load_sorted_sections(&paths.artifacts_dir(), outline.len())?;
    let full_draft = strip_all_frontmatter(&sections);

    let template_path = paths.prompt_path("30_critic.md");
    let outline_json =
        serde_json::to_string_pretty(outline).expect("OutlineBeat vec always serializes");
    let mut vars = Vec::new();
    vars.push(("seed", Value::String(seed.to_string())));
    vars.push(("full_draft", Value::String(full_draft)));
    vars.push(("lore_bible", Value::String(context.lore_bible().to_string())));
    vars.push(("style_rules", Value::String(context.style_rules())));
    vars.push(("outline", Value::String(outline_json)));
    vars.push(("location_context", Value::String(context.location_context().to_string())));
    vars.push(("character_context", Value::String(context.character_context())));
    let rendered = crate::prompt::render_prompt(&template_path, &value_vars(vars))?;

    let options = GenerateOptions::default().with_timeout(CRITIC_TIMEOUT);
    let result = generator.generate(&rendered, "critic", None, &options).await?;

    let (parsed, repaired) =
        json_extract::extract_json_object_reporting(&result.content).map_err(CriticStepError::Json)?;
    if repaired {
        logger.log_json_repair("critic");
    }

    let obj = parsed.as_object().cloned().unwrap_or_default();
    let expected_keys: BTreeSet<&str> = ["final_script", "editor_report"].into_iter().collect();
    let actual_keys: BTreeSet<&str> = obj.keys().map(String::as_str).collect();
    let extra: Vec<String> = actual_keys
        .difference(&expected_keys)
        .map(|s| s.to_string())
        .collect();
    if !extra.is_empty() {
        return Err(CriticStepError::ExtraKeys(extra));
    }

    let final_script = obj
        .get("final_script")
        .and_then(Value::as_str)
        .ok_or(CriticStepError::MissingKey("final_script"))?
        .to_string();
    let editor_report = obj
        .get("editor_report")
        .cloned()
        .ok_or(CriticStepError::MissingKey("editor_report"))?;
    if !editor_report.is_object() {
        return Err(CriticStepError::MissingKey("editor_report"));
    }

    let schema_path = paths.schema_path("critic_report.schema.json");
    crate::schema::validate_json_schema(&editor_report, &schema_path, "critic", Some(logger))?;

    let final_script_path = paths.artifacts_dir().join("final_script.md");
    write_artifact_atomic(&final_script_path, final_script.as_bytes())?;
    logger.log_artifact_write("artifacts/final_script.md");

    let editor_report_path = paths.artifacts_dir().join("editor_report.json");
    write_artifact_atomic(
        &editor_report_path,
        serde_json::to_string_pretty(&editor_report).unwrap().as_bytes(),
    )?;
    logger.log_artifact_write("artifacts/editor_report.json");

    let usage = TokenUsageRecord {
        step: "critic".to_string(),
        provider: result.provider.clone(),
        model: result.model.clone(),
        prompt_tokens: result.prompt_tokens,
        completion_tokens: result.completion_tokens,
        total_tokens: result.total_tokens_derived(),
    };
    logger.log_token_usage(
        "critic",
        usage.prompt_tokens.unwrap_or(0),
        usage.completion_tokens.unwrap_or(0),
        usage.total_tokens.unwrap_or(0),
    );

    state::update_state(&paths.run_dir, move |s| {
        s.final_script_path = Some("artifacts/final_script.md".to_string());
        s.editor_report_path = Some("artifacts/editor_report.json".to_string());
        s.token_usage.push(usage);
    })?;

    Ok((final_script, editor_report))
}
