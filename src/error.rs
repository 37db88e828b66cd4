//! Crate-wide error taxonomy.
//!
//! Each kind below corresponds to a component boundary. Stage-level errors
//! (`OutlineStepError` and friends) live next to the stage that raises them,
//! in `crate::steps`, and wrap these.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),
    #[error("invalid YAML in {path}: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid launch parameters: {0}")]
    InvalidLaunchParams(String),
    #[error("unsupported or invalid language code: {0}")]
    InvalidLanguage(String),
}

#[derive(Debug, Error)]
pub enum RunInitError {
    #[error("run '{0}' already exists")]
    AlreadyExists(String),
    #[error("filesystem error initializing run: {0}")]
    Io(#[source] std::io::Error),
    #[error("exhausted retries creating run directory: {0}")]
    RetriesExhausted(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum StateIOError {
    #[error("state file not found: {0}")]
    NotFound(PathBuf),
    #[error("invalid JSON in {path}: {source}")]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("io error reading or writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ContextLoaderError {
    #[error("required file not found: {0}")]
    LoreBibleMissing(PathBuf),
    #[error("failed to read {path}: {source}")]
    ReadFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template file not found: {0}")]
    TemplateNotFound(PathBuf),
    #[error(
        "template '{path}' contains unsupported placeholder: {{{placeholder}}}. \
         Only simple identifiers like {{seed}} are allowed. If you meant literal \
         braces, escape them as '{{{{' and '}}}}'."
    )]
    UnsupportedPlaceholder { path: PathBuf, placeholder: String },
    #[error("template '{path}' requires variables that were not provided: {missing}")]
    MissingVariables { path: PathBuf, missing: String },
    #[error("template '{0}' is not valid UTF-8")]
    InvalidUtf8(PathBuf),
    #[error("error reading template file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum SchemaValidationError {
    #[error("schema file not found: {0}")]
    SchemaNotFound(PathBuf),
    #[error("invalid JSON in schema file {path}: {source}")]
    InvalidSchema {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("schema validation failed: {message}{}", path.as_ref().map(|p| format!(" (at path: {p})")).unwrap_or_default())]
    Validation {
        message: String,
        path: Option<String>,
    },
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("model not recognized: {0}")]
    ModelNotRecognized(String),
    #[error("provider returned no assistant content")]
    MissingAssistantContent,
    #[error("provider returned empty assistant content")]
    EmptyAssistantContent,
    #[error("provider returned empty audio")]
    EmptyAudio,
    #[error("provider call failed after {attempts} attempt(s): {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("provider call failed: {0}")]
    Other(String),
}
