//! Two-tier app configuration: `apps/default_config.yaml` +
//! `apps/<app>/app_config.yaml`, shallow merge (spec §6).
//!
//! Mirrors the teacher's `CliConfig` shape: a struct with
//! `#[serde(default = "fn")]` fields, loaded via `from_file`, composed here
//! into a `load_merged` that reads the default file, then the per-app file,
//! and shallow-merges (per-app keys win; missing keys fall back to default).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub fold_world_files: bool,
    #[serde(default)]
    pub tts_enabled: bool,
    #[serde(default)]
    pub tts_provider: Option<String>,
    #[serde(default)]
    pub tts_model: Option<String>,
    #[serde(default)]
    pub tts_voice: Option<String>,
    #[serde(default)]
    pub tts_arguments: BTreeMap<String, serde_json::Value>,
    /// Extra, app-specific keys not named above. Shallow-merged the same
    /// way as the named fields.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn default_model() -> String {
    "gpt-4.1-mini".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            language: None,
            fold_world_files: false,
            tts_enabled: false,
            tts_provider: None,
            tts_model: None,
            tts_voice: None,
            tts_arguments: BTreeMap::new(),
            extra: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path).map_err(|_| ConfigError::NotFound(path.to_path_buf()))?;
        serde_yaml::from_str(&text).map_err(|source| ConfigError::Invalid {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Shallow merge: fields explicitly set in `override_cfg`'s serialized
    /// form win; everything else falls back to `self`.
    fn merge_over(&self, override_value: serde_yaml::Value) -> Result<Self, ConfigError> {
        let base_value = serde_yaml::to_value(self).expect("AppConfig always serializes");
        let merged = shallow_merge_yaml(base_value, override_value);
        serde_yaml::from_value(merged).map_err(|source| ConfigError::Invalid {
            path: PathBuf::new(),
            source,
        })
    }
}

fn shallow_merge_yaml(base: serde_yaml::Value, over: serde_yaml::Value) -> serde_yaml::Value {
    match (base, over) {
        (serde_yaml::Value::Mapping(mut base_map), serde_yaml::Value::Mapping(over_map)) => {
            for (k, v) in over_map {
                base_map.insert(k, v);
            }
            serde_yaml::Value::Mapping(base_map)
        }
        (_, over) => over,
    }
}

/// Loads `apps/default_config.yaml`, then `apps/<app>/app_config.yaml` if
/// present, and shallow-merges the latter over the former. The default
/// file is required; the per-app override is optional.
pub fn load_merged(apps_root: &Path, app_name: &str) -> Result<AppConfig, ConfigError> {
    let default_path = apps_root.join("default_config.yaml");
    let base = AppConfig::from_file(&default_path)?;

    let override_path = apps_root.join(app_name).join("app_config.yaml");
    if !override_path.exists() {
        return Ok(base);
    }

    let override_text = std::fs::read_to_string(&override_path)
        .map_err(|_| ConfigError::NotFound(override_path.clone()))?;
    let override_value: serde_yaml::Value =
        serde_yaml::from_str(&override_text).map_err(|source| ConfigError::Invalid {
            path: override_path.clone(),
            source,
        })?;

    base.merge_over(override_value)
}
