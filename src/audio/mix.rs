//! Final mix (spec §4.12.7): 1.5x gain on the voiceover, `amix` against the
//! enveloped background, output truncated to the voiceover's duration.
//! Output codec keyed off the output path's extension: WAV (PCM s16le) or
//! MP3 (libmp3lame, VBR q≈2).

use std::path::Path;

use super::ffmpeg::{run_ffmpeg, FfmpegError};

const VOICE_GAIN: f64 = 1.5;
const MP3_VBR_QUALITY: &str = "2";

/// Mixes `voiceover_path` (gained 1.5x) with `bg_enveloped_path`, taking the
/// voiceover's duration (`amix ... duration=first`), writing to
/// `output_path`. Codec is chosen from `output_path`'s extension: `.mp3`
/// gets `libmp3lame -q:a 2`, anything else is written as PCM s16le WAV.
pub async fn mix_voiceover_with_background(
    voiceover_path: &Path,
    bg_enveloped_path: &Path,
    output_path: &Path,
) -> Result<(), FfmpegError> {
    let voice_str = voiceover_path.to_string_lossy();
    let bg_str = bg_enveloped_path.to_string_lossy();
    let out_str = output_path.to_string_lossy();

    let filter = format!("[0:a]volume={VOICE_GAIN}[a1];[a1][1:a]amix=inputs=2:duration=first[aout]");

    let is_mp3 = output_path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mp3"));

    let mut args: Vec<&str> = vec!["-i", voice_str.as_ref(), "-i", bg_str.as_ref(), "-filter_complex", &filter, "-map", "[aout]"];
    if is_mp3 {
        args.extend_from_slice(&["-c:a", "libmp3lame", "-q:a", MP3_VBR_QUALITY]);
    } else {
        args.extend_from_slice(&["-c:a", "pcm_s16le"]);
    }
    args.push(out_str.as_ref());

    run_ffmpeg(&args).await?;
    Ok(())
}
