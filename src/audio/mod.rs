//! Audio post-processing graph (spec §4.12): chunker, per-chunk TTS driver,
//! concat/stitch, background-music envelope, and final mix.

pub mod background;
pub mod chunker;
pub mod ffmpeg;
pub mod mix;
pub mod stitch;
pub mod tts;

pub use tts::{run_tts_pipeline, AudioPrepStepError, TtsSegment};
