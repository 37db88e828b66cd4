use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use narrative_forge::config::{self, AppConfig};
use narrative_forge::launch;
use narrative_forge::orchestrator::{run_pipeline, RunRequest, TtsRunConfig};
use narrative_forge::providers::openai_http::{
    load_api_key_from_creds, OpenAiHttpConfig, OpenAiHttpGenerator, OpenAiHttpSynthesizer,
};
use narrative_forge::providers::pricing::NullCostEstimator;
use narrative_forge::providers::{RetryingGenerator, RetryingSynthesizer};

const DEFAULT_LANGUAGE: &str = "en";
const DEFAULT_SECTION_LENGTH_MIDPOINT: u32 = 500;
const MAX_RETRIES: u32 = 2;

/// Per-provider default tts_model/tts_voice used when `--tts-provider` is
/// given on the CLI but `--tts-model`/`--tts-voice` are not.
const TTS_PROVIDER_DEFAULTS: &[(&str, &str, &str)] = &[
    ("openai", "gpt-4o-mini-tts", "onyx"),
    ("elevenlabs", "eleven_multilingual_v2", "21m00Tcm4TlvDq8ikWAM"),
];

#[derive(Parser, Debug)]
#[command(name = "narrative-forge", about = "Deterministic, resumable multi-stage LLM narrative pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the content generation pipeline.
    Run(RunArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Name of the app to run (requires apps/<app>/context/, or the legacy
    /// context/<app>/ + prompts/apps/<app>/ layout).
    #[arg(long)]
    app: String,

    /// Short natural-language description of the story (2-3 sentences).
    #[arg(long)]
    seed: String,

    /// Number of outline beats (1-20).
    #[arg(long)]
    beats: Option<u32>,

    /// Alias for --beats (one section per beat).
    #[arg(long)]
    sections: Option<u32>,

    /// Optional run ID override (default: run-YYYYMMDD-HHMMSS).
    #[arg(long = "run-id")]
    run_id: Option<String>,

    /// Path to configuration directory (default: config/).
    #[arg(long = "config-path", default_value = "config/")]
    config_path: PathBuf,

    /// Model identifier for all LLM calls in this run. Fails immediately if
    /// the provider does not recognize the model.
    #[arg(long)]
    model: Option<String>,

    /// Target words per section; the pipeline uses the range
    /// [N*0.8, N*1.2]. Overrides app config when set.
    #[arg(long = "section-length")]
    section_length: Option<u32>,

    /// Target total word count for the story (100 < N < 15000). Derives
    /// beat count and section length.
    #[arg(long = "word-count")]
    word_count: Option<u32>,

    /// Enable TTS after the critic step (default).
    #[arg(long)]
    tts: bool,

    /// Disable TTS; the pipeline ends after the critic step.
    #[arg(long = "no-tts")]
    no_tts: bool,

    /// TTS provider (e.g. openai). Overrides app config.
    #[arg(long = "tts-provider")]
    tts_provider: Option<String>,

    /// TTS voice name (e.g. onyx). Overrides app config.
    #[arg(long = "tts-voice")]
    tts_voice: Option<String>,

    /// Directory the finished deliverable (text or audio) is copied into.
    #[arg(long = "book-dir")]
    book_dir: Option<PathBuf>,

    #[arg(long)]
    verbose: bool,
}

/// Resolved filesystem layout for an app: `AppNotFoundError` equivalent
/// surfaced as an `anyhow` bail, since this is a CLI-boundary concern.
struct AppPaths {
    context_dir: PathBuf,
    prompts_dir: PathBuf,
    app_root: Option<PathBuf>,
}

/// Resolves `app_name` to its context/prompts directories.
///
/// Resolution order: `apps/<app_name>/context/lore_bible.md` (prompts from
/// `apps/<app_name>/prompts/` if present, else `prompts/app-defaults/`);
/// else legacy `context/<app_name>/` + `prompts/apps/<app_name>/`; else an
/// error naming what's missing.
fn resolve_app(app_name: &str, base_dir: &Path) -> Result<AppPaths> {
    if app_name.trim().is_empty() {
        bail!("App name cannot be empty.");
    }

    let apps_context = base_dir.join("apps").join(app_name).join("context");
    if apps_context.join("lore_bible.md").exists() {
        let app_root = base_dir.join("apps").join(app_name);
        let prompts_in_app = app_root.join("prompts");
        let prompts_dir = if prompts_in_app.is_dir() {
            prompts_in_app
        } else {
            base_dir.join("prompts").join("app-defaults")
        };
        return Ok(AppPaths {
            context_dir: apps_context,
            prompts_dir,
            app_root: Some(app_root),
        });
    }

    let context_dir = base_dir.join("context").join(app_name);
    let prompts_dir = base_dir.join("prompts").join("apps").join(app_name);

    let mut missing = Vec::new();
    if !context_dir.is_dir() {
        missing.push(format!("context/{app_name}/"));
    }
    if !prompts_dir.is_dir() {
        missing.push(format!("prompts/apps/{app_name}/"));
    }
    if !missing.is_empty() {
        bail!(
            "App '{app_name}' not found. Missing: {}\nEither create apps/{app_name}/context/lore_bible.md \
             or ensure both directories exist under: {}",
            missing.join(", "),
            base_dir.display(),
        );
    }

    Ok(AppPaths {
        context_dir,
        prompts_dir,
        app_root: None,
    })
}

fn tts_provider_defaults(provider: &str) -> (&'static str, &'static str) {
    TTS_PROVIDER_DEFAULTS
        .iter()
        .find(|(name, _, _)| *name == provider)
        .map(|(_, model, voice)| (*model, *voice))
        .unwrap_or(("gpt-4o-mini-tts", "onyx"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run_command(args).await,
    }
}

async fn run_command(args: RunArgs) -> Result<()> {
    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let base_dir = std::env::current_dir().context("failed to read current directory")?;
    let app_paths = resolve_app(&args.app, &base_dir)?;

    let app_config = if app_paths.app_root.is_some() {
        config::load_merged(&base_dir.join("apps"), &args.app).context("failed to load app config")?
    } else {
        AppConfig::default()
    };

    let mut beats = args.beats;
    if let Some(sections) = args.sections {
        if beats.is_some() {
            warn!("both --beats and --sections given; using --beats");
        } else {
            beats = Some(sections);
        }
    }

    let section_length_midpoint = args.section_length.unwrap_or(DEFAULT_SECTION_LENGTH_MIDPOINT);

    let model = args.model.clone().unwrap_or_else(|| app_config.model.clone());
    let language = app_config.language.clone().unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

    let tts_enabled = if args.no_tts {
        false
    } else {
        args.tts || app_config.tts_enabled
    };

    let tts_provider = args.tts_provider.clone().or_else(|| app_config.tts_provider.clone());
    let (default_model, default_voice) = tts_provider
        .as_deref()
        .map(tts_provider_defaults)
        .unwrap_or(("gpt-4o-mini-tts", "onyx"));
    // CLI --tts-provider with no explicit model/voice falls back to the
    // provider's own defaults rather than a possibly-unrelated app config
    // model/voice; CLI --tts-provider absent falls back to app config.
    let tts_model = if args.tts_provider.is_some() {
        Some(default_model.to_string())
    } else {
        app_config.tts_model.clone()
    };
    let tts_voice = args.tts_voice.clone().or_else(|| {
        if args.tts_provider.is_some() {
            Some(default_voice.to_string())
        } else {
            app_config.tts_voice.clone()
        }
    });
    let tts_provider_name = tts_provider.unwrap_or_else(|| "openai".to_string());

    info!(app = %args.app, seed_len = args.seed.len(), "starting run");

    let api_key = load_api_key_from_creds(&args.config_path)
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .context("no OpenAI API key found (config/creds.json or OPENAI_API_KEY)")?;

    let generator = OpenAiHttpGenerator::new(OpenAiHttpConfig::new(api_key.clone(), model.clone()));
    let retrying_generator = RetryingGenerator::new(generator, MAX_RETRIES);

    let synthesizer_model = tts_model.clone().unwrap_or_else(|| default_model.to_string());
    let synthesizer_voice = tts_voice.clone().unwrap_or_else(|| default_voice.to_string());
    let synthesizer = OpenAiHttpSynthesizer::new(
        OpenAiHttpConfig::new(api_key, synthesizer_model),
        synthesizer_voice,
    );
    let retrying_synthesizer = RetryingSynthesizer::new(synthesizer, MAX_RETRIES);

    let apps_root = base_dir.join("apps");
    let default_assets_dir = base_dir.join("assets");

    let tts_run_config = if tts_enabled {
        Some(TtsRunConfig {
            provider_name: tts_provider_name,
            model: tts_model.as_deref(),
            voice: tts_voice.as_deref(),
            output_extension: "mp3".to_string(),
            apps_root: &apps_root,
            default_assets_dir: &default_assets_dir,
            synthesizer: &retrying_synthesizer,
        })
    } else {
        None
    };

    let schema_base = base_dir.join("schemas");

    let request = RunRequest {
        app: &args.app,
        seed: &args.seed,
        beats,
        word_count: args.word_count,
        run_id: args.run_id.clone(),
        model: &model,
        language: &language,
        base_dir: &base_dir,
        context_dir: &app_paths.context_dir,
        prompts_dir: &app_paths.prompts_dir,
        schema_base: &schema_base,
        section_length_midpoint,
        fold_world_files: app_config.fold_world_files,
        book_dir: args.book_dir.as_deref(),
        tts: tts_run_config,
    };

    // Resolve launch params up front so CLI-level mistakes (bad beats/word_count
    // combination) surface before any network call or filesystem write.
    launch::resolve_launch_params(beats, args.word_count, section_length_midpoint)
        .context("invalid run launch parameters")?;

    match run_pipeline(request, &retrying_generator, &NullCostEstimator).await {
        Ok(summary) => {
            println!(
                "run complete: {} (prompt_tokens={} completion_tokens={} total_tokens={} tts_characters={})",
                summary.run_dir.display(),
                summary.usage.prompt_tokens,
                summary.usage.completion_tokens,
                summary.usage.total_tokens,
                summary.usage.tts_characters,
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}
