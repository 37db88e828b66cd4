//! Background music resolution, loop/crossfade, and volume envelope
//! (spec §4.12.4). Filter-graph expressions are ported byte-for-byte from
//! the original's `_build_looped_bg_with_crossfade`/`_apply_bg_volume_envelope`.

use std::path::{Path, PathBuf};

use glob::glob;

use super::ffmpeg::{get_duration_seconds, run_ffmpeg, FfmpegError};

const CROSSFADE_SECONDS: f64 = 2.0;

/// Resolves background music for `app_name`: `apps/<app>/assets/bg-music.*`
/// (first match, lexicographically sorted), else `assets/default-bg-music.wav`,
/// else a fatal error.
pub fn resolve_bg_music(apps_root: &Path, app_name: &str, default_assets_dir: &Path) -> Result<PathBuf, String> {
    let pattern = apps_root
        .join(app_name)
        .join("assets")
        .join("bg-music.*")
        .to_string_lossy()
        .into_owned();
    let mut matches: Vec<PathBuf> = glob(&pattern)
        .map_err(|e| e.to_string())?
        .filter_map(Result::ok)
        .collect();
    matches.sort();
    if let Some(first) = matches.into_iter().next() {
        return Ok(first);
    }

    let default_path = default_assets_dir.join("default-bg-music.wav");
    if default_path.exists() {
        return Ok(default_path);
    }

    Err(format!(
        "no background music found: no apps/{app_name}/assets/bg-music.* and no default at {}",
        default_path.display()
    ))
}

/// Loops (and crossfades) `bg_path` to at least `target_seconds`, writing the
/// result to `output_path`.
///
/// When the source clip is very short (`<= 2s`), a simple `-stream_loop`
/// plus trim is used (a crossfade longer than the clip itself is meaningless).
/// Otherwise computes the minimal repeat count `n` such that
/// `n*bg_dur - (n-1)*2 >= target`, then chains `n` copies of the input
/// through `acrossfade=d=2:c1=2:c2=2` and trims to `target_seconds`.
pub async fn build_looped_bg_with_crossfade(
    bg_path: &Path,
    target_seconds: f64,
    output_path: &Path,
) -> Result<(), FfmpegError> {
    let bg_duration = get_duration_seconds(bg_path).await?;
    let bg_str = bg_path.to_string_lossy();
    let out_str = output_path.to_string_lossy();

    if bg_duration <= CROSSFADE_SECONDS {
        let loop_count = ((target_seconds / bg_duration) as i64 + 1).max(1);
        let loop_str = loop_count.to_string();
        let target_str = format!("{target_seconds}");
        run_ffmpeg(&[
            "-stream_loop",
            &loop_str,
            "-i",
            bg_str.as_ref(),
            "-t",
            &target_str,
            "-c",
            "copy",
            out_str.as_ref(),
        ])
        .await?;
        return Ok(());
    }

    let n = ((((target_seconds - CROSSFADE_SECONDS) / (bg_duration - CROSSFADE_SECONDS)) as i64) + 1).max(1);

    if n <= 1 {
        let target_str = format!("{target_seconds}");
        run_ffmpeg(&[
            "-i",
            bg_str.as_ref(),
            "-t",
            &target_str,
            "-c:a",
            "pcm_s16le",
            out_str.as_ref(),
        ])
        .await?;
        return Ok(());
    }

    let mut args: Vec<String> = Vec::new();
    for _ in 0..n {
        args.push("-i".to_string());
        args.push(bg_str.to_string());
    }

    let mut filter = String::new();
    filter.push_str("[0:a][1:a]acrossfade=d=2:c1=2:c2=2[a1]");
    for i in 2..n {
        filter.push_str(&format!(";[a{}][{}:a]acrossfade=d=2:c1=2:c2=2[a{}]", i - 1, i, i));
    }
    let last_label = format!("a{}", n - 1);
    filter.push_str(&format!(
        ";[{last_label}]atrim=0:{target_seconds},asetpts=PTS-STARTPTS[aout]"
    ));

    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
    let mut full_args: Vec<&str> = Vec::new();
    full_args.extend_from_slice(&arg_refs);
    full_args.extend_from_slice(&[
        "-filter_complex",
        &filter,
        "-map",
        "[aout]",
        "-c:a",
        "pcm_s16le",
        out_str.as_ref(),
    ]);

    run_ffmpeg(&full_args).await?;
    Ok(())
}

/// Applies the piecewise-linear background volume envelope (spec §4.12.4):
/// `[0,1.5)->0.75`, `[1.5,3)` linear `0.75->0.10`, `[3,voice_dur)->0.10`,
/// `[voice_dur,voice_dur+2)` linear `0.10->0.70`, `[voice_dur+2,inf)->0.70`.
/// Commas in the `volume` expression are escaped as `\,` for ffmpeg's `-af`
/// parser.
pub async fn apply_bg_volume_envelope(input_path: &Path, voice_duration: f64, output_path: &Path) -> Result<(), FfmpegError> {
    let v = voice_duration;
    let expr = format!(
        "if(lt(t,1.5),0.75,if(lt(t,3),0.75-(t-1.5)/1.5*0.65,if(lt(t,{v}),0.1,if(lt(t,{}),0.1+(t-{v})/2*0.6,0.7))))",
        v + 2.0
    );
    let expr_escaped = expr.replace(',', "\\,");
    let af = format!("volume={expr_escaped}");

    let in_str = input_path.to_string_lossy();
    let out_str = output_path.to_string_lossy();
    run_ffmpeg(&["-i", in_str.as_ref(), "-af", &af, "-c:a", "pcm_s16le", out_str.as_ref()]).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_default_when_no_app_asset() {
        let apps_root = tempfile::tempdir().unwrap();
        let assets_dir = tempfile::tempdir().unwrap();
        std::fs::write(assets_dir.path().join("default-bg-music.wav"), b"x").unwrap();
        let resolved = resolve_bg_music(apps_root.path(), "myapp", assets_dir.path()).unwrap();
        assert_eq!(resolved, assets_dir.path().join("default-bg-music.wav"));
    }

    #[test]
    fn errors_when_nothing_resolves() {
        let apps_root = tempfile::tempdir().unwrap();
        let assets_dir = tempfile::tempdir().unwrap();
        let err = resolve_bg_music(apps_root.path(), "myapp", assets_dir.path()).unwrap_err();
        assert!(err.contains("no background music found"));
    }

    #[test]
    fn prefers_app_specific_asset_over_default() {
        let apps_root = tempfile::tempdir().unwrap();
        let assets_dir = tempfile::tempdir().unwrap();
        std::fs::write(assets_dir.path().join("default-bg-music.wav"), b"x").unwrap();
        let app_assets = apps_root.path().join("myapp").join("assets");
        std::fs::create_dir_all(&app_assets).unwrap();
        std::fs::write(app_assets.join("bg-music.mp3"), b"x").unwrap();
        let resolved = resolve_bg_music(apps_root.path(), "myapp", assets_dir.path()).unwrap();
        assert_eq!(resolved, app_assets.join("bg-music.mp3"));
    }
}
