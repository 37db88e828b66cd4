//! Deliverable packaging (spec's ambient packaging, SPEC_FULL §4.13
//! supplement): once a run completes, the user-facing "book" output is a
//! copy of either the text-only final script or, when TTS is enabled, the
//! mixed narration track. Ambient packaging, not domain content.

use std::path::{Path, PathBuf};

/// Copies `run_dir/artifacts/final_script.md` to `book_dir/<app>.md`.
/// Called when TTS is disabled, right after Critic succeeds.
pub fn copy_text_deliverable(run_dir: &Path, app: &str, book_dir: &Path) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(book_dir)?;
    let source = run_dir.join("artifacts").join("final_script.md");
    let dest = book_dir.join(format!("{app}.md"));
    std::fs::copy(&source, &dest)?;
    Ok(dest)
}

/// Copies `run_dir/artifacts/narration-<app>.<ext>` to
/// `book_dir/<app>.<ext>`. Called after the audio pipeline completes.
pub fn copy_audio_deliverable(
    run_dir: &Path,
    app: &str,
    extension: &str,
    book_dir: &Path,
) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(book_dir)?;
    let source = run_dir
        .join("artifacts")
        .join(format!("narration-{app}.{extension}"));
    let dest = book_dir.join(format!("{app}.{extension}"));
    std::fs::copy(&source, &dest)?;
    Ok(dest)
}
