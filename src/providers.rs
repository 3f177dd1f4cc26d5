//! Built-in presets for OpenAI-compatible chat completion providers.
//!
//! A preset supplies the base URL and, where the provider has one, the request
//! extension that switches on its deliberation trace (`reasoning_content`).
//! Users name a provider in their config and override either field when needed.

use crate::error::{RelayError, Result};
use serde_json::{Map, Value};

#[derive(Debug, Clone)]
pub struct ProviderPreset {
    pub name: &'static str,
    pub base_url: &'static str,
    /// JSON object merged into the request body when thinking mode is on.
    pub thinking_extension: Option<&'static str>,
}

const PRESETS: &[ProviderPreset] = &[
    ProviderPreset {
        name: "deepseek",
        base_url: "https://api.deepseek.com",
        thinking_extension: Some(r#"{"thinking":{"type":"enabled"}}"#),
    },
    ProviderPreset {
        name: "dashscope",
        base_url: "https://dashscope.aliyuncs.com/compatible-mode/v1",
        thinking_extension: Some(r#"{"enable_thinking":true}"#),
    },
    ProviderPreset {
        name: "openai",
        base_url: "https://api.openai.com/v1",
        thinking_extension: None,
    },
    ProviderPreset {
        name: "openrouter",
        base_url: "https://openrouter.ai/api/v1",
        thinking_extension: None,
    },
    ProviderPreset {
        name: "fireworks",
        base_url: "https://api.fireworks.ai/inference/v1",
        thinking_extension: None,
    },
    ProviderPreset {
        name: "together",
        base_url: "https://api.together.xyz/v1",
        thinking_extension: None,
    },
    ProviderPreset {
        name: "groq",
        base_url: "https://api.groq.com/openai/v1",
        thinking_extension: None,
    },
];

impl ProviderPreset {
    #[must_use]
    pub fn from_name(name: &str) -> Option<&'static ProviderPreset> {
        PRESETS.iter().find(|p| p.name == name.to_lowercase())
    }

    #[must_use]
    pub fn all() -> &'static [ProviderPreset] {
        PRESETS
    }

    #[must_use]
    pub fn names() -> Vec<&'static str> {
        PRESETS.iter().map(|p| p.name).collect()
    }

    /// Decode the preset's thinking extension into a JSON object.
    pub fn thinking_extension(&self) -> Result<Option<Map<String, Value>>> {
        self.thinking_extension
            .map(|raw| match serde_json::from_str::<Value>(raw)? {
                Value::Object(map) => Ok(map),
                _ => Err(RelayError::config(format!(
                    "thinking extension for preset '{}' is not a JSON object",
                    self.name
                ))),
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_providers() {
        assert!(ProviderPreset::from_name("deepseek").is_some());
        assert!(ProviderPreset::from_name("DeepSeek").is_some()); // case-insensitive
        assert!(ProviderPreset::from_name("openai").is_some());
        assert!(ProviderPreset::from_name("unknown_provider").is_none());
    }

    #[test]
    fn test_deepseek_thinking_extension() {
        let preset = ProviderPreset::from_name("deepseek").unwrap();
        let ext = preset.thinking_extension().unwrap().unwrap();
        assert_eq!(ext["thinking"]["type"], "enabled");
    }

    #[test]
    fn test_all_extensions_are_objects() {
        for preset in ProviderPreset::all() {
            assert!(
                preset.thinking_extension().is_ok(),
                "Preset {} has an invalid thinking extension",
                preset.name
            );
        }
        let openai = ProviderPreset::from_name("openai").unwrap();
        assert!(openai.thinking_extension().unwrap().is_none());
    }
}
