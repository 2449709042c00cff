//! Configuration file loading for diptych.
//!
//! Reads `diptych.config.json` from the project root. Every field is
//! optional; command line flags override whatever the file sets.

use std::path::Path;

use diptych_atelier::CompilerOptions;
use diptych_croquis::{Environment, LookupConfig, LookupKind, Mode};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = "diptych.config.json";

/// Top-level diptych configuration.
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiptychConfig {
    /// JSON Schema reference (for editor autocompletion).
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<Environment>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,

    /// `react`, `solid`, ...
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_env_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,

    /// Replaces the framework's default library exports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_configurations: Option<Vec<LookupConfig>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_kinds: Option<Vec<LookupKind>>,
}

impl DiptychConfig {
    /// Compiler options for `env`, with every field the file sets applied.
    pub fn compiler_options(&self, env: Environment) -> CompilerOptions {
        let mut options = CompilerOptions::new(env);
        if let Some(env_name) = &self.env_name {
            options.env_name = env_name.clone();
        }
        if let Some(root) = &self.root {
            options.root = root.clone();
        }
        if let Some(framework) = &self.framework {
            options.framework = framework.clone();
        }
        if let Some(provider_env_name) = &self.provider_env_name {
            options.provider_env_name = provider_env_name.clone();
        }
        if let Some(mode) = self.mode {
            options.mode = mode;
        }
        options.lookup_configurations = self.lookup_configurations.clone();
        options.lookup_kinds = self.lookup_kinds.clone();
        options
    }
}

/// Load `diptych.config.json` from the given directory (or CWD if None).
///
/// A missing file yields the defaults. An unreadable or invalid one is
/// reported and ignored.
pub fn load_config(dir: Option<&Path>) -> DiptychConfig {
    let base = dir
        .map(|d| d.to_path_buf())
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());
    let config_path = base.join(CONFIG_FILE_NAME);

    if !config_path.exists() {
        return DiptychConfig::default();
    }

    match std::fs::read_to_string(&config_path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %config_path.display(), "failed to parse config: {e}");
                DiptychConfig::default()
            }
        },
        Err(e) => {
            tracing::warn!(path = %config_path.display(), "failed to read config: {e}");
            DiptychConfig::default()
        }
    }
}
