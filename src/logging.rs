//! Per-run human-readable log.
//!
//! `run.log` is the only human-facing timeline for a single run: every stage
//! writes start/end markers, errors and warnings are logged at their level,
//! and token/character usage is logged at INFO after every provider call.
//! Mirrors each line to `tracing` so process-wide diagnostics and the
//! per-run log stay consistent.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;

pub struct RunLogger {
    path: PathBuf,
    file: Mutex<std::fs::File>,
}

impl RunLogger {
    /// Opens `run_dir/run.log` in append mode.
    pub fn open(run_dir: &Path) -> std::io::Result<Self> {
        let path = run_dir.join("run.log");
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&self, level: &str, message: &str) {
        let line = format!(
            "[{}] [{}] {}\n",
            Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
            level,
            message
        );
        if let Ok(mut f) = self.file.lock() {
            let _ = f.write_all(line.as_bytes());
        }
    }

    pub fn info(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        self.write_line("INFO", message);
        tracing::info!("{message}");
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        self.write_line("WARNING", message);
        tracing::warn!("{message}");
    }

    pub fn error(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        self.write_line("ERROR", message);
        tracing::error!("{message}");
    }

    pub fn log_stage_start(&self, stage: &str) {
        self.info(format!("stage start: {stage}"));
    }

    pub fn log_stage_end(&self, stage: &str, success: bool) {
        self.info(format!(
            "stage end: {stage} ({})",
            if success { "success" } else { "failure" }
        ));
    }

    pub fn log_artifact_write(&self, relative_path: &str) {
        self.info(format!("wrote artifact: {relative_path}"));
    }

    pub fn log_token_usage(&self, step: &str, prompt_tokens: i64, completion_tokens: i64, total_tokens: i64) {
        self.info(format!(
            "token usage [{step}]: prompt={prompt_tokens} completion={completion_tokens} total={total_tokens}"
        ));
    }

    pub fn log_tts_character_usage(&self, segment: u32, characters: usize) {
        self.info(format!("tts segment {segment:02}: {characters} characters"));
    }

    pub fn log_tts_cumulative(&self, total_characters: usize) {
        self.info(format!("tts cumulative: {total_characters} characters"));
    }

    pub fn log_context_selection(
        &self,
        always_loaded: &[String],
        selected_location: Option<&str>,
        selected_characters: &[String],
    ) {
        self.info(format!(
            "context selection: always_loaded={always_loaded:?} location={selected_location:?} characters={selected_characters:?}"
        ));
    }

    pub fn log_validation_failure(&self, step: &str, error: &str) {
        self.error(format!("validation failure [{step}]: {error}"));
    }

    /// Logged whenever a provider response needed fenced-block/brace-span
    /// extraction or quote repair to parse as JSON, rather than masking it.
    pub fn log_json_repair(&self, step: &str) {
        self.warn(format!(
            "response for step '{step}' was not directly parseable JSON; recovered via fallback extraction"
        ));
    }
}
