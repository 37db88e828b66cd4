//! Segment discovery and concatenation (spec §4.12.3). Ported from the
//! original's `_discover_segments`/`_stitch_segments`.

use std::path::{Path, PathBuf};

use super::ffmpeg::{run_ffmpeg, FfmpegError};

const KNOWN_EXTENSIONS: [&str; 4] = ["mp3", "wav", "m4a", "ogg"];

/// Finds `segment_01.<ext>`, `segment_02.<ext>`, ... in `dir`, stopping at
/// the first gap. The extension is pinned on segment 1 and held fixed for
/// the rest; at least one and at most `max_segments` must exist.
pub fn discover_segments(dir: &Path, max_segments: usize) -> Result<(Vec<PathBuf>, &'static str), String> {
    if !dir.is_dir() {
        return Err(format!("segment directory not found: {}", dir.display()));
    }

    let mut segments = Vec::new();
    let mut ext: Option<&'static str> = None;

    for i in 1..=max_segments {
        match ext {
            None => {
                let mut found = false;
                for candidate in KNOWN_EXTENSIONS {
                    let path = dir.join(format!("segment_{i:02}.{candidate}"));
                    if path.exists() {
                        segments.push(path);
                        ext = Some(candidate);
                        found = true;
                        break;
                    }
                }
                if !found {
                    break;
                }
            }
            Some(fixed_ext) => {
                let path = dir.join(format!("segment_{i:02}.{fixed_ext}"));
                if !path.exists() {
                    break;
                }
                segments.push(path);
            }
        }
    }

    if segments.is_empty() {
        return Err(format!(
            "no audio segments found in {} (expected segment_01.{{mp3,wav,m4a,ogg}})",
            dir.display()
        ));
    }

    let fixed_ext = ext.expect("non-empty segments implies ext was set");
    if dir.join(format!("segment_{:02}.{fixed_ext}", max_segments + 1)).exists() {
        return Err(format!(
            "more than {max_segments} audio segments found in {}, exceeding the maximum",
            dir.display()
        ));
    }

    Ok((segments, fixed_ext))
}

/// Escapes a path for a concat-list `file '...'` line: single quotes are
/// closed, escaped, and reopened (`'\\''`), matching ffmpeg's concat demuxer
/// quoting rules.
fn escape_concat_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', r"'\''")
}

/// Writes an ffmpeg concat-demuxer list file and stitches `segments` into
/// `output_path` with stream copy (no re-encode).
pub async fn stitch_segments(segments: &[PathBuf], list_path: &Path, output_path: &Path) -> Result<(), FfmpegError> {
    let mut list_contents = String::new();
    for segment in segments {
        list_contents.push_str(&format!("file '{}'\n", escape_concat_path(segment)));
    }
    std::fs::write(list_path, list_contents).map_err(|source| FfmpegError::Spawn {
        binary: "ffmpeg",
        source,
    })?;

    let list_str = list_path.to_string_lossy();
    let output_str = output_path.to_string_lossy();
    run_ffmpeg(&[
        "-f",
        "concat",
        "-safe",
        "0",
        "-i",
        list_str.as_ref(),
        "-c",
        "copy",
        output_str.as_ref(),
    ])
    .await?;
    Ok(())
}
