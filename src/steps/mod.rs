//! Stage executors (spec §4.8-§4.11): Outline, Section (looped), Summarize
//! (looped), Critic. Each is a pure orchestration of the lower-level
//! components (prompt renderer, provider, schema validator, state store).

pub mod critic;
pub mod outline;
pub mod section;
pub mod summarize;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;

/// Variables common to every stage's prompt render call, plus the paths a
/// stage needs to locate templates/schemas/artifacts. Built once per run by
/// the orchestrator and threaded into each stage function.
pub struct StagePaths {
    pub run_dir: PathBuf,
    pub context_dir: PathBuf,
    pub prompts_dir: PathBuf,
    pub schema_base: PathBuf,
}

impl StagePaths {
    pub fn prompt_path(&self, name: &str) -> PathBuf {
        self.prompts_dir.join(name)
    }

    pub fn schema_path(&self, name: &str) -> PathBuf {
        self.schema_base.join(name)
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.run_dir.join("artifacts")
    }
}

/// Writes `content` to `path` atomically (same-directory temp file +
/// rename), matching the state store's discipline for artifacts too.
pub fn write_artifact_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().expect("artifact paths always have a parent");
    std::fs::create_dir_all(dir)?;
    let temp_path = dir.join(format!(
        ".{}.{}.tmp",
        path.file_name().unwrap().to_string_lossy(),
        std::process::id()
    ));
    std::fs::write(&temp_path, content)?;
    std::fs::rename(&temp_path, path)?;
    Ok(())
}

pub fn value_vars(pairs: Vec<(&str, Value)>) -> BTreeMap<String, Value> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

/// Splits a document of the form `---\n<yaml>\n---\n<body>` into its YAML
/// frontmatter text and body. Returns `None` if the document does not open
/// with a `---` delimiter line or the closing delimiter is absent.
pub fn split_frontmatter(text: &str) -> Option<(&str, &str)> {
    let rest = text.strip_prefix("---")?;
    let rest = rest.strip_prefix('\n').or_else(|| rest.strip_prefix("\r\n"))?;
    let close_marker = "\n---";
    let close_at = rest.find(close_marker)?;
    let yaml = &rest[..close_at];
    let after_marker = &rest[close_at + close_marker.len()..];
    let body = after_marker
        .strip_prefix('\n')
        .or_else(|| after_marker.strip_prefix("\r\n"))
        .unwrap_or(after_marker);
    Some((yaml, body))
}
