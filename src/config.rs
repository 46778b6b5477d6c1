//! Configuration loading for kumo.
//!
//! Settings live as TOML at the platform's XDG config path
//! (`~/.config/kumo/config.toml` on Linux). A default file with
//! `{env:...}` placeholders is created on first run. String values support
//! `{env:VAR}` substitution, and the API key resolves env-first so a shell
//! export always wins over the file.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{APP_NAME, CONFIG_FILENAME, DEFAULT_MODEL};

/// Root configuration, deserialized from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Default model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// API key. Usually left as an `{env:ANTHROPIC_API_KEY}` placeholder.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Override for the API base URL (proxies, test servers).
    #[serde(default)]
    pub base_url: Option<String>,
    /// Custom system instructions replacing the built-in persona.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key: None,
            base_url: None,
            system_prompt: None,
        }
    }
}

impl Config {
    /// Loads the config file, creating a default one if none exists.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            let default_toml = format!(
                "model = \"{}\"\napi_key = \"{{env:ANTHROPIC_API_KEY}}\"\n",
                default_model()
            );
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, &default_toml)
                .with_context(|| format!("Failed to write default config to {:?}", path))?;
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        let mut config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config at {:?}", path))?;
        config.resolve_substitutions();
        Ok(config)
    }

    /// Returns the platform-specific configuration directory.
    pub fn config_dir() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
            .join(APP_NAME);
        Ok(dir)
    }

    /// Returns the full path to the configuration file.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILENAME))
    }

    /// Returns the platform-specific cache directory (readline history).
    pub fn cache_dir() -> Result<PathBuf> {
        let dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine cache directory"))?
            .join(APP_NAME);
        Ok(dir)
    }

    /// Resolve the API key: environment variable first, then config value.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Ok(val) = std::env::var("ANTHROPIC_API_KEY") {
            if !val.is_empty() {
                return Some(val);
            }
        }
        self.api_key.clone().filter(|k| !k.is_empty())
    }

    /// Resolve `{env:VAR}` patterns in all string fields.
    fn resolve_substitutions(&mut self) {
        self.model = resolve_str(&self.model);
        if let Some(ref mut key) = self.api_key {
            *key = resolve_str(key);
        }
        if let Some(ref mut url) = self.base_url {
            *url = resolve_str(url);
        }
        if let Some(ref mut sp) = self.system_prompt {
            *sp = resolve_str(sp);
        }
    }
}

/// Replace `{env:VAR}` with the environment variable's value (empty when
/// unset).
fn resolve_str(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("{env:") {
        let Some(end) = result[start..].find('}') else {
            break;
        };
        let var_name = &result[start + 5..start + end];
        let value = std::env::var(var_name).unwrap_or_default();
        result = format!("{}{}{}", &result[..start], value, &result[start + end + 1..]);
    }
    result
}
