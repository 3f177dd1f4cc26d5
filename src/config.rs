use crate::error::{RelayError, Result};
use crate::providers::ProviderPreset;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_name")]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Overrides the preset's thinking extension. Must be a table / JSON object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_extension: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Used when a request leaves `enable_thinking` unset.
    #[serde(default = "default_enable_thinking")]
    pub enable_thinking: bool,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// End-to-end deadline for one upstream stream, connect included.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_port() -> u16 {
    8000
}

fn default_provider_name() -> String {
    "deepseek".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_model() -> String {
    "deepseek-chat".to_string()
}

fn default_system_prompt() -> String {
    "你是一个友好的 AI 助手，请用简洁清晰的中文回答用户的问题。".to_string()
}

fn default_enable_thinking() -> bool {
    true
}

fn default_max_tokens() -> u32 {
    8192
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            provider: ProviderConfig::default(),
            chat: ChatConfig::default(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            base_url: None,
            api_key_env: default_api_key_env(),
            model: default_model(),
            thinking_extension: None,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            enable_thinking: default_enable_thinking(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl RelayConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RelayError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Search standard locations for a config file, falling back to defaults.
    /// Priority: CLI arg > CWD > XDG config > home dir
    pub fn find_and_load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load(path);
        }

        for candidate in config_search_paths() {
            if candidate.exists() {
                tracing::info!(path = %candidate.display(), "Loading config");
                return Self::load(&candidate);
            }
        }

        tracing::info!("No config file found, using defaults and environment");
        Ok(Self::default())
    }

    /// Apply the environment overrides understood by the relay.
    ///
    /// `lookup` is `std::env::var` in the binary; tests pass a closure.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("OPENAI_MODEL") {
            self.provider.model = model;
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.provider.base_url = Some(url);
        }
        if let Some(flag) = lookup("ENABLE_THINKING") {
            self.chat.enable_thinking = flag.trim().eq_ignore_ascii_case("true");
        }
        if let Some(prompt) = lookup("SYSTEM_PROMPT") {
            self.chat.system_prompt = prompt;
        }
    }

    /// Reject values the relay cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.chat.max_tokens == 0 {
            return Err(RelayError::config("chat.max_tokens must be greater than 0"));
        }
        if self.chat.timeout_secs == 0 {
            return Err(RelayError::config("chat.timeout_secs must be greater than 0"));
        }
        if self.provider.model.trim().is_empty() {
            return Err(RelayError::config("provider.model must not be empty"));
        }
        self.effective_base_url()?;
        self.effective_thinking_extension()?;
        Ok(())
    }

    /// Resolve the effective base URL (config override or provider preset default)
    pub fn effective_base_url(&self) -> Result<String> {
        if let Some(ref url) = self.provider.base_url {
            return Ok(url.clone());
        }

        let preset = ProviderPreset::from_name(&self.provider.name).ok_or_else(|| {
            RelayError::config(format!(
                "Unknown provider '{}' and no base_url configured. Known providers: {}",
                self.provider.name,
                ProviderPreset::names().join(", ")
            ))
        })?;

        Ok(preset.base_url.to_string())
    }

    /// Resolve the request extension sent when thinking mode is on.
    pub fn effective_thinking_extension(&self) -> Result<Option<Map<String, Value>>> {
        match self.provider.thinking_extension {
            Some(Value::Object(ref map)) => Ok(Some(map.clone())),
            Some(_) => Err(RelayError::config(
                "provider.thinking_extension must be a table",
            )),
            None => match ProviderPreset::from_name(&self.provider.name) {
                Some(preset) => preset.thinking_extension(),
                None => Ok(None),
            },
        }
    }

    /// Resolve the API key from the configured environment variable
    pub fn resolve_api_key(&self) -> Result<String> {
        std::env::var(&self.provider.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                RelayError::config(format!(
                    "Environment variable '{}' not set. Set it with your provider API key.",
                    self.provider.api_key_env
                ))
            })
    }
}

#[must_use]
pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("chat-relay.toml")];

    if cfg!(target_os = "macos") {
        if let Some(home) = home_dir() {
            paths.push(
                home.join("Library")
                    .join("Application Support")
                    .join("chat-relay")
                    .join("config.toml"),
            );
        }
    } else {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            paths.push(PathBuf::from(xdg).join("chat-relay").join("config.toml"));
        }
        if let Some(home) = home_dir() {
            paths.push(home.join(".config").join("chat-relay").join("config.toml"));
        }
    }

    if let Some(home) = home_dir() {
        paths.push(home.join(".chat-relay.toml"));
    }

    paths
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
