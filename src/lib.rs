pub mod audio;
pub mod config;
pub mod context;
pub mod continuity;
pub mod error;
pub mod json_extract;
pub mod launch;
pub mod logging;
pub mod orchestrator;
pub mod prompt;
pub mod providers;
pub mod run_dir;
pub mod schema;
pub mod state;
pub mod steps;

pub use config::AppConfig;
pub use context::{ContextLoader, ContextSelection};
pub use launch::{resolve_launch_params, LaunchParams};
pub use logging::RunLogger;
pub use orchestrator::{run_pipeline, RunRequest, RunSummary, TtsRunConfig};
pub use providers::{SpeechSynthesizer, TextGenerator};
pub use state::State;
