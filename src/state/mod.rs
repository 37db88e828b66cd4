//! Atomic read/update of the per-run state document (spec §4.2).
//!
//! `update_state` reads current state, invokes `updater` on the in-memory
//! structure, serializes to a temp file in the same directory, then
//! atomically renames over `state.json`. Readers observe either the prior
//! state or the new state, never a partial one.

pub mod types;

pub use types::{
    Inputs, OutlineBeat, ResolvedTtsConfig, SectionRecord, SelectedContext, State,
    SummaryRecord, TokenUsageRecord, TtsTokenUsageRecord, derive_total_tokens,
};

use crate::error::StateIOError;
use std::path::Path;

fn state_path(run_dir: &Path) -> std::path::PathBuf {
    run_dir.join("state.json")
}

fn inputs_path(run_dir: &Path) -> std::path::PathBuf {
    run_dir.join("inputs.json")
}

pub fn load_state(run_dir: &Path) -> Result<State, StateIOError> {
    let path = state_path(run_dir);
    if !path.exists() {
        return Err(StateIOError::NotFound(path));
    }
    let text = std::fs::read_to_string(&path).map_err(|source| StateIOError::Io {
        path: path.clone(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| StateIOError::InvalidJson { path, source })
}

pub fn load_inputs(run_dir: &Path) -> Result<Inputs, StateIOError> {
    let path = inputs_path(run_dir);
    if !path.exists() {
        return Err(StateIOError::NotFound(path));
    }
    let text = std::fs::read_to_string(&path).map_err(|source| StateIOError::Io {
        path: path.clone(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| StateIOError::InvalidJson { path, source })
}

/// Writes `inputs.json` exactly once, at run init. Not exposed for later
/// mutation: inputs are immutable after creation (spec §3).
pub fn write_inputs(run_dir: &Path, inputs: &Inputs) -> Result<(), StateIOError> {
    let path = inputs_path(run_dir);
    let json = serde_json::to_string_pretty(inputs).expect("Inputs is always serializable");
    std::fs::write(&path, json).map_err(|source| StateIOError::Io { path, source })
}

/// Writes the initial `state.json` at run init (before any stage executes).
pub fn write_initial_state(run_dir: &Path, state: &State) -> Result<(), StateIOError> {
    let path = state_path(run_dir);
    let json = serde_json::to_string_pretty(state).expect("State is always serializable");
    std::fs::write(&path, json).map_err(|source| StateIOError::Io { path, source })
}

/// Reads state, applies `updater`, and atomically rewrites `state.json` via
/// same-directory temp-file + rename.
pub fn update_state<F>(run_dir: &Path, updater: F) -> Result<State, StateIOError>
where
    F: FnOnce(&mut State),
{
    let mut state = load_state(run_dir)?;
    updater(&mut state);

    let path = state_path(run_dir);
    let temp_path = run_dir.join(format!(".state.json.{}.tmp", std::process::id()));
    let json = serde_json::to_string_pretty(&state).expect("State is always serializable");

    let write_result = std::fs::write(&temp_path, &json).map_err(|source| StateIOError::Io {
        path: temp_path.clone(),
        source,
    });
    if let Err(e) = write_result {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e);
    }

    if let Err(source) = std::fs::rename(&temp_path, &path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(StateIOError::Io { path, source });
    }

    Ok(state)
}

/// Convenience wrapper matching the original's
/// `update_state_selected_context`: writes `state.selected_context` in one
/// atomic update, run once before any stage executes.
pub fn update_selected_context(
    run_dir: &Path,
    selected_context: SelectedContext,
) -> Result<State, StateIOError> {
    update_state(run_dir, move |s| {
        s.selected_context = selected_context;
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_state() -> State {
        State::new("test-app", "a seed")
    }

    #[test]
    fn round_trips_state() {
        let dir = tempdir().unwrap();
        write_initial_state(dir.path(), &sample_state()).unwrap();
        let loaded = load_state(dir.path()).unwrap();
        assert_eq!(loaded.app, "test-app");
        assert_eq!(loaded.seed, "a seed");
    }

    #[test]
    fn update_state_leaves_no_tmp_file() {
        let dir = tempdir().unwrap();
        write_initial_state(dir.path(), &sample_state()).unwrap();
        update_state(dir.path(), |s| {
            s.outline.push(OutlineBeat {
                beat_id: 1,
                title: "t".into(),
                summary: "s".into(),
            });
        })
        .unwrap();

        let loaded = load_state(dir.path()).unwrap();
        assert_eq!(loaded.outline.len(), 1);

        let has_tmp = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .any(|e| e.file_name().to_string_lossy().ends_with(".tmp"));
        assert!(!has_tmp);
    }

    #[test]
    fn missing_state_file_is_not_found() {
        let dir = tempdir().unwrap();
        let err = load_state(dir.path()).unwrap_err();
        assert!(matches!(err, StateIOError::NotFound(_)));
    }
}
