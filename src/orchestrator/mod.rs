//! Run orchestrator (spec §4.13): top-level sequencer. Advances
//! run-init -> context -> outline -> {section, summarize}* -> critic ->
//! (optional) audio pipeline, surfacing stage failures and emitting a
//! final usage/cost summary. Grounded in the original's
//! `pipeline/runner.py::run_pipeline` for stage sequencing and log
//! markers; state is reloaded from disk between stages (never threaded as
//! a live reference) per spec §4.13.

pub mod deliverable;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::audio::{self, background, ffmpeg, mix, stitch};
use crate::context::ContextLoader;
use crate::launch::{resolve_launch_params, validate_language_code};
use crate::logging::RunLogger;
use crate::providers::pricing::{sum_usage, CostEstimator, UsageTotals};
use crate::providers::{SpeechSynthesizer, TextGenerator};
use crate::run_dir::{self, InitializeRunParams};
use crate::state::{self, ResolvedTtsConfig};
use crate::steps::{self, StagePaths};

/// TTS-specific launch configuration. Absent entirely when TTS is disabled
/// for this run.
pub struct TtsRunConfig<'a> {
    pub provider_name: String,
    pub model: Option<&'a str>,
    pub voice: Option<&'a str>,
    pub output_extension: String,
    pub apps_root: &'a Path,
    pub default_assets_dir: &'a Path,
    pub synthesizer: &'a dyn SpeechSynthesizer,
}

/// Everything the orchestrator needs to drive one run, independent of how
/// the caller obtained it (CLI flags, a config file, or a test fixture).
pub struct RunRequest<'a> {
    pub app: &'a str,
    pub seed: &'a str,
    pub beats: Option<u32>,
    pub word_count: Option<u32>,
    pub run_id: Option<String>,
    pub model: &'a str,
    pub language: &'a str,
    pub base_dir: &'a Path,
    pub context_dir: &'a Path,
    pub prompts_dir: &'a Path,
    pub schema_base: &'a Path,
    pub section_length_midpoint: u32,
    pub fold_world_files: bool,
    pub book_dir: Option<&'a Path>,
    pub tts: Option<TtsRunConfig<'a>>,
}

pub struct RunSummary {
    pub run_dir: PathBuf,
    pub usage: UsageTotals,
    pub chat_cost: Option<f64>,
    pub tts_cost: Option<f64>,
}

/// Runs the pipeline to completion (or to the first fatal stage error).
/// Returns `Ok(RunSummary)` only on full success; any stage failure
/// surfaces as `Err`, leaving the partial workspace in place for
/// inspection (spec §4.13, §7).
pub async fn run_pipeline(
    request: RunRequest<'_>,
    generator: &dyn TextGenerator,
    cost_estimator: &dyn CostEstimator,
) -> Result<RunSummary> {
    validate_language_code(request.language)?;

    let launch_params = resolve_launch_params(
        request.beats,
        request.word_count,
        request.section_length_midpoint,
    )?;

    let resolved_tts_config = request.tts.as_ref().map(|tts| ResolvedTtsConfig {
        tts_provider: tts.provider_name.clone(),
        tts_model: tts.model.map(str::to_string),
        tts_voice: tts.voice.map(str::to_string),
        tts_arguments: Default::default(),
    });

    let run_dir = run_dir::initialize_run(InitializeRunParams {
        app: request.app,
        seed: request.seed,
        context_dir: request.context_dir,
        prompts_dir: request.prompts_dir,
        beats: request.beats,
        run_id: request.run_id.clone(),
        base_dir: request.base_dir,
        word_count: request.word_count,
        resolved_tts_config,
        model: request.model,
        language: request.language,
    })
    .context("failed to initialize run directory")?;

    let run_id = run_dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    let logger = run_dir::get_run_logger(&run_dir).context("failed to open run log")?;
    let paths = StagePaths {
        run_dir: run_dir.clone(),
        context_dir: request.context_dir.to_path_buf(),
        prompts_dir: request.prompts_dir.to_path_buf(),
        schema_base: request.schema_base.to_path_buf(),
    };

    let result = run_stages(&request, &paths, &run_id, &launch_params, generator, &logger).await;

    match result {
        Ok(()) => {
            let state = state::load_state(&run_dir)?;
            let usage = sum_usage(&state.token_usage, &state.tts_token_usage);
            let chat_cost = cost_estimator.estimate_chat_cost(&state.token_usage);
            let tts_cost = cost_estimator.estimate_tts_cost(&state.tts_token_usage);
            logger.info(format!(
                "run complete: prompt_tokens={} completion_tokens={} total_tokens={} tts_characters={} chat_cost={} tts_cost={}",
                usage.prompt_tokens,
                usage.completion_tokens,
                usage.total_tokens,
                usage.tts_characters,
                chat_cost.map(|c| format!("{c:.4}")).unwrap_or_else(|| "N/A".to_string()),
                tts_cost.map(|c| format!("{c:.4}")).unwrap_or_else(|| "N/A".to_string()),
            ));
            Ok(RunSummary {
                run_dir,
                usage,
                chat_cost,
                tts_cost,
            })
        }
        Err(e) => {
            logger.error(format!("run failed: {e:#}"));
            eprintln!("run failed; see {} for details", run_dir.join("run.log").display());
            Err(e)
        }
    }
}

async fn run_stages(
    request: &RunRequest<'_>,
    paths: &StagePaths,
    run_id: &str,
    launch_params: &crate::launch::LaunchParams,
    generator: &dyn TextGenerator,
    logger: &RunLogger,
) -> Result<()> {
    logger.log_stage_start("context");
    let context = ContextLoader::new(request.context_dir, Some(logger))
        .with_fold_world_files(request.fold_world_files)
        .load_context(run_id)
        .context("context loading failed")?;
    state::update_selected_context(&paths.run_dir, context.to_selected_context())
        .context("failed to persist selected context")?;
    logger.log_stage_end("context", true);

    logger.log_stage_start("outline");
    let outline = steps::outline::execute_outline_step(
        paths,
        &context,
        request.seed,
        launch_params.beats,
        generator,
        logger,
    )
    .await;
    let outline = match outline {
        Ok(o) => {
            logger.log_stage_end("outline", true);
            o
        }
        Err(e) => {
            logger.log_stage_end("outline", false);
            return Err(e).context("outline stage failed");
        }
    };

    for (index, beat) in outline.iter().enumerate() {
        logger.log_stage_start(&format!("section[{}]", index + 1));
        let section_result = steps::section::execute_section_step(
            paths,
            &context,
            request.seed,
            index,
            beat,
            launch_params.section_length,
            generator,
            logger,
        )
        .await;
        if let Err(e) = section_result {
            logger.log_stage_end(&format!("section[{}]", index + 1), false);
            return Err(e).with_context(|| format!("section stage failed for beat {}", index + 1));
        }
        logger.log_stage_end(&format!("section[{}]", index + 1), true);

        let section_id = (index + 1) as u32;
        let filename = format!("20_section_{section_id:02}.md");
        let section_content = std::fs::read_to_string(paths.artifacts_dir().join(&filename))
            .with_context(|| format!("failed to reread written section artifact {filename}"))?;

        logger.log_stage_start(&format!("summarize[{}]", index + 1));
        let summarize_result =
            steps::summarize::execute_summarize_step(paths, section_id, &section_content, generator, logger)
                .await;
        if let Err(e) = summarize_result {
            logger.log_stage_end(&format!("summarize[{}]", index + 1), false);
            return Err(e).with_context(|| format!("summarize stage failed for section {section_id}"));
        }
        logger.log_stage_end(&format!("summarize[{}]", index + 1), true);
    }

    logger.log_stage_start("critic");
    let critic_result =
        steps::critic::execute_critic_step(paths, &context, request.seed, &outline, generator, logger).await;
    let (final_script, _editor_report) = match critic_result {
        Ok(v) => {
            logger.log_stage_end("critic", true);
            v
        }
        Err(e) => {
            logger.log_stage_end("critic", false);
            return Err(e).context("critic stage failed");
        }
    };

    match (&request.tts, request.book_dir) {
        (None, Some(book_dir)) => {
            deliverable::copy_text_deliverable(&paths.run_dir, request.app, book_dir)
                .context("failed to copy text deliverable")?;
        }
        (Some(tts), _) => {
            run_audio_pipeline(request, paths, &final_script, tts, logger).await?;
        }
        (None, None) => {}
    }

    Ok(())
}

async fn run_audio_pipeline(
    request: &RunRequest<'_>,
    paths: &StagePaths,
    final_script: &str,
    tts: &TtsRunConfig<'_>,
    logger: &RunLogger,
) -> Result<()> {
    logger.log_stage_start("audio_tts");
    let _segments = audio::run_tts_pipeline(
        &paths.run_dir,
        final_script,
        &tts.output_extension,
        tts.synthesizer,
        tts.model,
        tts.voice,
        logger,
    )
    .await
    .context("tts synthesis failed")?;
    logger.log_stage_end("audio_tts", true);

    logger.log_stage_start("audio_stitch");
    let outputs_dir = paths.run_dir.join("tts/outputs");
    let (segment_paths, ext) =
        stitch::discover_segments(&outputs_dir, audio::chunker::MAX_SEGMENTS).map_err(anyhow::Error::msg)?;
    let voiceover_dir = paths.run_dir.join("voiceover");
    std::fs::create_dir_all(&voiceover_dir)?;
    let concat_list_path = voiceover_dir.join("concat_list.txt");
    let voiceover_path = voiceover_dir.join(format!("voiceover.{ext}"));
    stitch::stitch_segments(&segment_paths, &concat_list_path, &voiceover_path)
        .await
        .context("failed to stitch tts segments")?;
    logger.log_stage_end("audio_stitch", true);

    logger.log_stage_start("audio_background");
    let voice_duration = ffmpeg::get_duration_seconds(&voiceover_path)
        .await
        .context("failed to probe voiceover duration")?;
    let bg_path = background::resolve_bg_music(tts.apps_root, request.app, tts.default_assets_dir)
        .map_err(anyhow::Error::msg)?;
    let bg_looped_path = voiceover_dir.join("bg_looped.wav");
    background::build_looped_bg_with_crossfade(&bg_path, voice_duration + 6.0, &bg_looped_path)
        .await
        .context("failed to loop/crossfade background music")?;
    let bg_enveloped_path = voiceover_dir.join("bg_enveloped.wav");
    background::apply_bg_volume_envelope(&bg_looped_path, voice_duration, &bg_enveloped_path)
        .await
        .context("failed to apply background volume envelope")?;
    logger.log_stage_end("audio_background", true);

    logger.log_stage_start("audio_mix");
    let narration_path = paths
        .artifacts_dir()
        .join(format!("narration-{}.{}", request.app, tts.output_extension));
    mix::mix_voiceover_with_background(&voiceover_path, &bg_enveloped_path, &narration_path)
        .await
        .context("failed to mix voiceover with background")?;
    logger.log_artifact_write(&format!("artifacts/narration-{}.{}", request.app, tts.output_extension));
    logger.log_stage_end("audio_mix", true);

    if let Some(book_dir) = request.book_dir {
        deliverable::copy_audio_deliverable(&paths.run_dir, request.app, &tts.output_extension, book_dir)
            .context("failed to copy audio deliverable")?;
    }

    Ok(())
}
