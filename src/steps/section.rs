//! Section stage (spec §4.9), executed once per outline beat.

use serde_json::Value;
use thiserror::Error;

use crate::context::ContextSelection;
use crate::continuity::{build_rolling_summary, get_continuity_context, ROLLING_SUMMARY_MIN_TOKENS};
use crate::error::{ProviderError, RenderError, SchemaValidationError, StateIOError};
use crate::logging::RunLogger;
use crate::providers::{GenerateOptions, TextGenerator};
use crate::state::{self, OutlineBeat, SectionRecord, TokenUsageRecord};

use super::{split_frontmatter, value_vars, write_artifact_atomic, StagePaths};

#[derive(Debug, Error)]
pub enum SectionStepError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("section response is missing valid YAML frontmatter")]
    MissingFrontmatter,
    #[error("section frontmatter is not a YAML mapping")]
    FrontmatterNotMapping,
    #[error("invalid YAML frontmatter: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Schema(#[from] SchemaValidationError),
    #[error(transparent)]
    State(#[from] StateIOError),
    #[error("io error writing section artifact: {0}")]
    Io(#[from] std::io::Error),
}

#[allow(clippy::too_many_arguments)]
pub async fn execute_section_step(
    paths: &StagePaths,
    context: &ContextSelection,
    seed: &str,
    section_index: usize,
    outline_beat: &OutlineBeat,
    section_length: (u32, u32),
    generator: &dyn TextGenerator,
    logger: &RunLogger,
) -> Result<SectionRecord, SectionStepError> {
    let section_id = (section_index + 1) as u32;

    let state = state::load_state(&paths.run_dir)?;
    let rolling_summary = build_rolling_summary(&state.summaries, ROLLING_SUMMARY_MIN_TOKENS);
    let continuity_context = get_continuity_context(&state.continuity_ledger);

    let template_path = paths.prompt_path("20_section.md");
    let section_length_text = format!("{}-{}", section_length.0, section_length.1);
    let mut vars = Vec::new();
    vars.push(("section_id", Value::Number(section_id.into())));
    vars.push(("section_index", Value::Number((section_index as u64).into())));
    vars.push(("seed", Value::String(seed.to_string())));
    vars.push(("outline_beat", Value::String(format!(
        "{}: {}",
        outline_beat.title, outline_beat.summary
    ))));
    vars.push(("rolling_summary", Value::String(rolling_summary)));
    vars.push(("continuity_context", Value::String(continuity_context)));
    vars.push(("lore_bible", Value::String(context.lore_bible().to_string())));
    vars.push(("style_rules", Value::String(context.style_rules())));
    vars.push(("location_context", Value::String(context.location_context().to_string())));
    vars.push(("character_context", Value::String(context.character_context())));
    vars.push(("section_length", Value::String(section_length_text)));
    let rendered = crate::prompt::render_prompt(&template_path, &value_vars(vars))?;

    let options = GenerateOptions::default().with_temperature(0.7);
    let result = generator.generate(&rendered, "section", None, &options).await?;

    let (yaml_text, body) =
        split_frontmatter(&result.content).ok_or(SectionStepError::MissingFrontmatter)?;

    let mut frontmatter: serde_yaml::Value = serde_yaml::from_str(yaml_text)?;
    let mapping = frontmatter
        .as_mapping_mut()
        .ok_or(SectionStepError::FrontmatterNotMapping)?;
    mapping.insert(
        serde_yaml::Value::String("section_id".to_string()),
        serde_yaml::Value::Number(section_id.into()),
    );

    let frontmatter_json: Value =
        serde_json::to_value(&frontmatter).expect("YAML mapping converts to JSON");

    let schema_path = paths.schema_path("section.schema.json");
    crate::schema::validate_json_schema(&frontmatter_json, &schema_path, "section", Some(logger))?;

    let canonical_yaml = serde_yaml::to_string(&frontmatter)?;
    let reconstructed = format!("---\n{canonical_yaml}---\n{body}");

    let filename = format!("20_section_{section_id:02}.md");
    let artifact_path = paths.artifacts_dir().join(&filename);
    write_artifact_atomic(&artifact_path, reconstructed.as_bytes())?;
    logger.log_artifact_write(&format!("artifacts/{filename}"));

    let usage = TokenUsageRecord {
        step: "section".to_string(),
        provider: result.provider.clone(),
        model: result.model.clone(),
        prompt_tokens: result.prompt_tokens,
        completion_tokens: result.completion_tokens,
        total_tokens: result.total_tokens_derived(),
    };
    logger.log_token_usage(
        "section",
        usage.prompt_tokens.unwrap_or(0),
        usage.completion_tokens.unwrap_or(0),
        usage.total_tokens.unwrap_or(0),
    );

    let record: SectionRecord = frontmatter_json
        .as_object()
        .cloned()
        .expect("frontmatter validated as a mapping above");

    let record_for_state = record.clone();
    state::update_state(&paths.run_dir, move |s| {
        s.sections.push(record_for_state);
        s.token_usage.push(usage);
    })?;

    Ok(record)
}
