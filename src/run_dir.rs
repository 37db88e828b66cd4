//! Run directory service (spec §4.1): creates, validates, and locates the
//! per-run filesystem workspace.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;

use crate::error::RunInitError;
use crate::logging::RunLogger;
use crate::state::{Inputs, ResolvedTtsConfig, State};

const RETRY_ATTEMPTS: u32 = 8;
const RETRY_BASE_DELAY_MS: u64 = 50;

/// `run-YYYYMMDD-HHMMSS` in UTC.
pub fn generate_run_id() -> String {
    format!("run-{}", Utc::now().format("%Y%m%d-%H%M%S"))
}

/// Retries `op` on permission-denied style errors with bounded exponential
/// backoff: 8 attempts, delay `50ms * 2^n`.
fn retry_fs<T>(mut op: impl FnMut() -> std::io::Result<T>) -> std::io::Result<T> {
    let mut last_err = None;
    for attempt in 0..RETRY_ATTEMPTS {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                last_err = Some(e);
                let delay = RETRY_BASE_DELAY_MS * (1u64 << attempt);
                std::thread::sleep(Duration::from_millis(delay));
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.expect("loop always sets last_err before exhausting attempts"))
}

#[allow(clippy::too_many_arguments)]
pub struct InitializeRunParams<'a> {
    pub app: &'a str,
    pub seed: &'a str,
    pub context_dir: &'a Path,
    pub prompts_dir: &'a Path,
    pub beats: Option<u32>,
    pub run_id: Option<String>,
    pub base_dir: &'a Path,
    pub word_count: Option<u32>,
    pub resolved_tts_config: Option<ResolvedTtsConfig>,
    pub model: &'a str,
    pub language: &'a str,
}

/// Creates `runs/<run_id>/` atomically: builds the run's contents in a
/// sibling staging directory on the same filesystem, then renames the
/// staging directory into place. On any failure the staging directory is
/// removed and the final path is never created.
pub fn initialize_run(params: InitializeRunParams) -> Result<PathBuf, RunInitError> {
    let run_id = params.run_id.unwrap_or_else(generate_run_id);
    let runs_dir = params.base_dir.join("runs");
    let final_dir = runs_dir.join(&run_id);

    if final_dir.exists() {
        return Err(RunInitError::AlreadyExists(run_id));
    }

    retry_fs(|| std::fs::create_dir_all(&runs_dir)).map_err(RunInitError::RetriesExhausted)?;

    let staging_dir = runs_dir.join(format!(".staging-{run_id}-{}", std::process::id()));
    let build_result = build_staging_dir(&staging_dir, &params, &run_id);

    match build_result {
        Ok(()) => {
            match retry_fs(|| std::fs::rename(&staging_dir, &final_dir)) {
                Ok(()) => Ok(final_dir),
                Err(e) => {
                    let _ = std::fs::remove_dir_all(&staging_dir);
                    Err(RunInitError::RetriesExhausted(e))
                }
            }
        }
        Err(e) => {
            let _ = std::fs::remove_dir_all(&staging_dir);
            Err(e)
        }
    }
}

fn build_staging_dir(
    staging_dir: &Path,
    params: &InitializeRunParams,
    run_id: &str,
) -> Result<(), RunInitError> {
    retry_fs(|| std::fs::create_dir_all(staging_dir.join("artifacts")))
        .map_err(RunInitError::Io)?;

    let inputs = Inputs {
        app: params.app.to_string(),
        seed: params.seed.to_string(),
        beats: params.beats,
        word_count: params.word_count,
        run_id: run_id.to_string(),
        timestamp: Utc::now().to_rfc3339(),
        context_dir: normalize_path(params.context_dir),
        prompts_dir: normalize_path(params.prompts_dir),
        model: params.model.to_string(),
        language: params.language.to_string(),
        resolved_tts_config: params.resolved_tts_config.clone(),
    };
    crate::state::write_inputs(staging_dir, &inputs)
        .map_err(|e| RunInitError::Io(io_error_from_state(e)))?;

    let mut state = State::new(params.app, params.seed);
    if let Some(tts) = &inputs.resolved_tts_config {
        state.tts_config = Some(tts.clone());
    }
    crate::state::write_initial_state(staging_dir, &state)
        .map_err(|e| RunInitError::Io(io_error_from_state(e)))?;

    let logger = RunLogger::open(staging_dir).map_err(RunInitError::Io)?;
    logger.info(format!("run '{run_id}' initialized for app '{}'", params.app));

    Ok(())
}

fn io_error_from_state(e: crate::error::StateIOError) -> std::io::Error {
    match e {
        crate::error::StateIOError::Io { source, .. } => source,
        other => std::io::Error::other(other.to_string()),
    }
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Opens the per-run log in append mode.
pub fn get_run_logger(run_dir: &Path) -> std::io::Result<RunLogger> {
    RunLogger::open(run_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn params<'a>(base_dir: &'a Path, context_dir: &'a Path, prompts_dir: &'a Path, run_id: Option<String>) -> InitializeRunParams<'a> {
        InitializeRunParams {
            app: "test-app",
            seed: "a seed",
            context_dir,
            prompts_dir,
            beats: Some(3),
            run_id,
            base_dir,
            word_count: None,
            resolved_tts_config: None,
            model: "test-model",
            language: "en",
        }
    }

    #[test]
    fn creates_run_directory_with_expected_contents() {
        let base = tempdir().unwrap();
        let ctx = tempdir().unwrap();
        let prompts = tempdir().unwrap();
        let run_dir = initialize_run(params(
            base.path(),
            ctx.path(),
            prompts.path(),
            Some("test-run-001".to_string()),
        ))
        .unwrap();

        assert!(run_dir.join("inputs.json").exists());
        assert!(run_dir.join("state.json").exists());
        assert!(run_dir.join("run.log").exists());
        assert!(run_dir.join("artifacts").is_dir());
    }

    #[test]
    fn duplicate_run_id_is_rejected() {
        let base = tempdir().unwrap();
        let ctx = tempdir().unwrap();
        let prompts = tempdir().unwrap();

        initialize_run(params(
            base.path(),
            ctx.path(),
            prompts.path(),
            Some("run-duplicate".to_string()),
        ))
        .unwrap();

        let err = initialize_run(params(
            base.path(),
            ctx.path(),
            prompts.path(),
            Some("run-duplicate".to_string()),
        ))
        .unwrap_err();

        match err {
            RunInitError::AlreadyExists(id) => assert_eq!(id, "run-duplicate"),
            other => panic!("expected AlreadyExists, got {other:?}"),
        }
    }

    #[test]
    fn no_staging_directory_survives_success() {
        let base = tempdir().unwrap();
        let ctx = tempdir().unwrap();
        let prompts = tempdir().unwrap();
        initialize_run(params(
            base.path(),
            ctx.path(),
            prompts.path(),
            Some("run-clean".to_string()),
        ))
        .unwrap();

        let runs_dir = base.path().join("runs");
        let entries: Vec<_> = std::fs::read_dir(&runs_dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(entries, vec!["run-clean".to_string()]);
    }
}
