//! End-to-end pipeline tests against a scripted `TextGenerator` double.
//!
//! These drive `orchestrator::run_pipeline` directly over a fixture
//! directory tree (context, prompts, schemas) rather than through the CLI,
//! so no network access or subprocess tooling is required.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use narrative_forge::error::ProviderError;
use narrative_forge::orchestrator::{run_pipeline, RunRequest};
use narrative_forge::providers::pricing::NullCostEstimator;
use narrative_forge::providers::{GenerateOptions, TextGenerator, TextResult};
use narrative_forge::state;
use tempfile::TempDir;

fn write(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// Lays out a minimal app fixture: context (lore bible + two characters),
/// prompt templates referencing only the variables each stage supplies,
/// and permissive JSON schemas. Returns (base_dir, context_dir, prompts_dir,
/// schema_base).
fn fixture() -> (TempDir, PathBuf, PathBuf, PathBuf) {
    let base = tempfile::tempdir().unwrap();
    let root = base.path();

    write(root, "context/lore_bible.md", "A decaying industrial city.");
    write(root, "context/characters/a.md", "Worker A.");
    write(root, "context/characters/b.md", "Worker B.");
    write(root, "context/characters/c.md", "Worker C.");

    write(
        root,
        "prompts/10_outline.md",
        "Seed: {seed}\nBeats requested: {beats_count}\n",
    );
    write(
        root,
        "prompts/20_section.md",
        "Beat: {outline_beat}\nLength: {section_length}\n",
    );
    write(
        root,
        "prompts/21_summarize.md",
        "Section {section_id}:\n{section_content}\n",
    );
    write(root, "prompts/30_critic.md", "Draft:\n{full_draft}\n");

    let permissive_schema = r#"{"type":"object"}"#;
    write(root, "schemas/outline.schema.json", permissive_schema);
    write(root, "schemas/section.schema.json", permissive_schema);
    write(root, "schemas/summary.schema.json", permissive_schema);
    write(root, "schemas/critic_report.schema.json", permissive_schema);

    let context_dir = root.join("context");
    let prompts_dir = root.join("prompts");
    let schema_base = root.join("schemas");
    (base, context_dir, prompts_dir, schema_base)
}

#[derive(Default)]
struct ScriptedGenerator {
    outline_beats_override: Option<u32>,
    section_missing_frontmatter: bool,
    critic_extra_key: bool,
}

fn extract_beats_requested(prompt: &str) -> u32 {
    prompt
        .lines()
        .find_map(|line| line.strip_prefix("Beats requested: "))
        .and_then(|n| n.trim().parse().ok())
        .expect("fixture template always emits 'Beats requested: N'")
}

fn text_result(content: String) -> TextResult {
    TextResult {
        content,
        provider: "scripted".to_string(),
        model: "scripted-model".to_string(),
        prompt_tokens: Some(12),
        completion_tokens: Some(8),
        total_tokens: Some(20),
        raw: serde_json::json!({}),
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        prompt: &str,
        step: &str,
        _model: Option<&str>,
        _options: &GenerateOptions,
    ) -> Result<TextResult, ProviderError> {
        let content = match step {
            "outline" => {
                let requested = extract_beats_requested(prompt);
                let count = self.outline_beats_override.unwrap_or(requested);
                let beats: Vec<String> = (1..=count)
                    .map(|i| {
                        format!(
                            r#"{{"beat_id":{i},"title":"Beat {i}","summary":"Summary for beat {i}."}}"#
                        )
                    })
                    .collect();
                format!(r#"{{"beats":[{}]}}"#, beats.join(","))
            }
            "section" => {
                if self.section_missing_frontmatter {
                    "Just a body with no frontmatter block at all.".to_string()
                } else {
                    "---\ntitle: A Section\n---\nThe gates rusted shut as the morning shift filed past them in silence.\n"
                        .to_string()
                }
            }
            "summarize" => {
                r#"{"summary":"A brief recap of the section.","continuity_updates":{"weather":"overcast"}}"#
                    .to_string()
            }
            "critic" => {
                if self.critic_extra_key {
                    r#"{"final_script":"Final narrative.","editor_report":{"notes":"ok"},"bonus":"not allowed"}"#
                        .to_string()
                } else {
                    r#"{"final_script":"Final narrative text stitched from all sections.","editor_report":{"notes":"consistent"}}"#
                        .to_string()
                }
            }
            other => panic!("unexpected step in scripted generator: {other}"),
        };
        Ok(text_result(content))
    }
}

fn make_request<'a>(
    context_dir: &'a Path,
    prompts_dir: &'a Path,
    schema_base: &'a Path,
    base_dir: &'a Path,
    seed: &'a str,
    beats: u32,
    run_id: &'a str,
) -> RunRequest<'a> {
    RunRequest {
        app: "test-app",
        seed,
        beats: Some(beats),
        word_count: None,
        run_id: Some(run_id.to_string()),
        model: "gpt-4.1-mini",
        language: "en",
        base_dir,
        context_dir,
        prompts_dir,
        schema_base,
        section_length_midpoint: 500,
        fold_world_files: false,
        book_dir: None,
        tts: None,
    }
}

#[tokio::test]
async fn minimal_three_beat_run_produces_all_artifacts() {
    let (base, context_dir, prompts_dir, schema_base) = fixture();
    let request = make_request(
        &context_dir,
        &prompts_dir,
        &schema_base,
        base.path(),
        "A worker describes a day in a decaying city.",
        3,
        "test-run-001",
    );

    let generator = ScriptedGenerator::default();
    let summary = run_pipeline(request, &generator, &NullCostEstimator)
        .await
        .expect("pipeline should complete successfully");

    let run_dir = &summary.run_dir;
    assert!(run_dir.join("artifacts/10_outline.json").exists());
    for i in 1..=3 {
        assert!(run_dir.join(format!("artifacts/20_section_0{i}.md")).exists());
    }
    assert!(run_dir.join("artifacts/final_script.md").exists());
    assert!(run_dir.join("artifacts/editor_report.json").exists());

    let state = state::load_state(run_dir).unwrap();
    assert_eq!(state.outline.len(), 3);
    assert_eq!(state.sections.len(), 3);
    assert_eq!(state.summaries.len(), 3);
    assert!(state.token_usage.len() >= 8);
}

#[tokio::test]
async fn duplicate_run_id_is_rejected() {
    let (base, context_dir, prompts_dir, schema_base) = fixture();
    let generator = ScriptedGenerator::default();

    let first = make_request(
        &context_dir,
        &prompts_dir,
        &schema_base,
        base.path(),
        "A seed.",
        2,
        "test-run-dup",
    );
    run_pipeline(first, &generator, &NullCostEstimator).await.unwrap();

    let second = make_request(
        &context_dir,
        &prompts_dir,
        &schema_base,
        base.path(),
        "A seed.",
        2,
        "test-run-dup",
    );
    let err = run_pipeline(second, &generator, &NullCostEstimator).await.unwrap_err();
    assert!(format!("{err:#}").contains("already exists"));
}

#[tokio::test]
async fn outline_beat_count_mismatch_fails_stage() {
    let (base, context_dir, prompts_dir, schema_base) = fixture();
    let generator = ScriptedGenerator {
        outline_beats_override: Some(3),
        ..Default::default()
    };

    let request = make_request(
        &context_dir,
        &prompts_dir,
        &schema_base,
        base.path(),
        "A seed.",
        5,
        "test-run-mismatch",
    );
    let err = run_pipeline(request, &generator, &NullCostEstimator).await.unwrap_err();
    assert!(format!("{err:#}").contains("but 5 were requested"));

    let run_dir = base.path().join("runs/test-run-mismatch");
    let state = state::load_state(&run_dir).unwrap();
    assert!(state.outline.is_empty());
}

#[tokio::test]
async fn missing_section_frontmatter_fails_stage() {
    let (base, context_dir, prompts_dir, schema_base) = fixture();
    let generator = ScriptedGenerator {
        section_missing_frontmatter: true,
        ..Default::default()
    };

    let request = make_request(
        &context_dir,
        &prompts_dir,
        &schema_base,
        base.path(),
        "A seed.",
        1,
        "test-run-nofm",
    );
    let err = run_pipeline(request, &generator, &NullCostEstimator).await.unwrap_err();
    assert!(format!("{err:#}").contains("frontmatter"));
}

#[tokio::test]
async fn critic_extra_key_fails_stage() {
    let (base, context_dir, prompts_dir, schema_base) = fixture();
    let generator = ScriptedGenerator {
        critic_extra_key: true,
        ..Default::default()
    };

    let request = make_request(
        &context_dir,
        &prompts_dir,
        &schema_base,
        base.path(),
        "A seed.",
        1,
        "test-run-critic-extra",
    );
    let err = run_pipeline(request, &generator, &NullCostEstimator).await.unwrap_err();
    assert!(format!("{err:#}").contains("extra keys"));
}
