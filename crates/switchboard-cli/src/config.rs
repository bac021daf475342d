//! Persistent CLI settings.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// Serialized settings from ~/.switchboard/config.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend used when `--provider` is not given.
    pub provider: String,
    /// Model for the default backend; other backends use their own default.
    pub model: Option<String>,
    /// API keys by backend name.
    pub api_keys: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: None,
            api_keys: HashMap::new(),
        }
    }
}

impl Config {
    /// Model for `provider`: the stored model only applies to the stored provider.
    pub fn model_for(&self, provider: &str) -> Option<&str> {
        if self.provider.eq_ignore_ascii_case(provider) {
            self.model.as_deref()
        } else {
            None
        }
    }
}

/// Location of the settings file.
pub struct ConfigStore {
    path: PathBuf,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore {
    pub fn new() -> Self {
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".switchboard");
        path.push("config.json");
        Self { path }
    }

    /// A store backed by an explicit file.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the saved config, or fall back to the defaults.
    pub fn load(&self) -> Config {
        let Ok(content) = fs::read_to_string(&self.path) else {
            return Config::default();
        };
        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "ignoring unreadable config");
                Config::default()
            }
        }
    }

    /// Export stored API keys as `<BACKEND>_API_KEY`, never replacing a
    /// variable that is already set.
    pub fn hydrate_env(&self, config: &Config) {
        for (provider, key) in &config.api_keys {
            if key.is_empty() {
                continue;
            }
            let env_var = format!("{}_API_KEY", provider.to_uppercase());
            if std::env::var(&env_var).is_err() {
                tracing::debug!(var = %env_var, "using API key from config");
                std::env::set_var(&env_var, key);
            }
        }
    }
}
