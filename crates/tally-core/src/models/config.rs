//! Configuration for the receipt extraction service.

use serde::{Deserialize, Serialize};

/// Environment variable consulted when no API key is configured.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_CURRENCY: &str = "USD";
const DEFAULT_LANGUAGE: &str = "en";
const DEFAULT_TIMEZONE: &str = "UTC";
const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_MAX_TOKENS: u32 = 4096;
const DEFAULT_TEMPERATURE: f32 = 0.1;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Service configuration, owned by a single `ReceiptService`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Bearer credential for the vision endpoint.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_key: String,

    /// Base URL of the chat-completions API.
    pub api_base_url: String,

    /// Currency assumed when the receipt does not show one.
    pub default_currency: String,

    /// Language hint passed to the extractor.
    pub default_language: String,

    /// Timezone assumed for receipts printed without an offset.
    pub default_timezone: String,

    /// Model used for image extraction.
    pub vision_model: String,

    /// Model used for text-only completions.
    pub completion_model: String,

    /// Upper bound on generated tokens.
    pub max_tokens: u32,

    /// Sampling temperature; low values keep extraction stable.
    pub temperature: f32,

    /// Timeout for a single extraction call, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            default_currency: DEFAULT_CURRENCY.to_string(),
            default_language: DEFAULT_LANGUAGE.to_string(),
            default_timezone: DEFAULT_TIMEZONE.to_string(),
            vision_model: DEFAULT_MODEL.to_string(),
            completion_model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// A partial update to a `ServiceConfig`. Absent fields leave the current value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigPatch {
    pub api_key: Option<String>,
    pub api_base_url: Option<String>,
    pub default_currency: Option<String>,
    pub default_language: Option<String>,
    pub default_timezone: Option<String>,
    pub vision_model: Option<String>,
    pub completion_model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub request_timeout_secs: Option<u64>,
}

impl ServiceConfig {
    /// Fill every empty or zero field with its built-in default.
    pub fn with_defaults(self) -> Self {
        let defaults = Self::default();
        Self {
            api_key: self.api_key,
            api_base_url: or_default(self.api_base_url, defaults.api_base_url),
            default_currency: or_default(self.default_currency, defaults.default_currency),
            default_language: or_default(self.default_language, defaults.default_language),
            default_timezone: or_default(self.default_timezone, defaults.default_timezone),
            vision_model: or_default(self.vision_model, defaults.vision_model),
            completion_model: or_default(self.completion_model, defaults.completion_model),
            max_tokens: if self.max_tokens == 0 { defaults.max_tokens } else { self.max_tokens },
            temperature: if self.temperature == 0.0 { defaults.temperature } else { self.temperature },
            request_timeout_secs: if self.request_timeout_secs == 0 {
                defaults.request_timeout_secs
            } else {
                self.request_timeout_secs
            },
        }
    }

    /// Return a new configuration with the present fields of `patch` applied.
    ///
    /// Empty strings and zero counts count as absent. A temperature is applied
    /// when it is finite and non-negative, so an explicit `0.0` is honored.
    pub fn merge(&self, patch: &ConfigPatch) -> Self {
        let mut merged = self.clone();

        apply_text(&mut merged.api_key, &patch.api_key);
        apply_text(&mut merged.api_base_url, &patch.api_base_url);
        apply_text(&mut merged.default_currency, &patch.default_currency);
        apply_text(&mut merged.default_language, &patch.default_language);
        apply_text(&mut merged.default_timezone, &patch.default_timezone);
        apply_text(&mut merged.vision_model, &patch.vision_model);
        apply_text(&mut merged.completion_model, &patch.completion_model);

        if let Some(tokens) = patch.max_tokens.filter(|&t| t > 0) {
            merged.max_tokens = tokens;
        }
        if let Some(temperature) = patch.temperature.filter(|t| t.is_finite() && *t >= 0.0) {
            merged.temperature = temperature;
        }
        if let Some(secs) = patch.request_timeout_secs.filter(|&s| s > 0) {
            merged.request_timeout_secs = secs;
        }

        merged
    }

    /// The configured API key, falling back to the `OPENAI_API_KEY` environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        if !self.api_key.trim().is_empty() {
            return Some(self.api_key.clone());
        }
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    /// Full URL of the chat-completions endpoint.
    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base_url.trim_end_matches('/'))
    }

    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        Ok(config.with_defaults())
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}

fn or_default(value: String, default: String) -> String {
    if value.trim().is_empty() { default } else { value }
}

fn apply_text(target: &mut String, update: &Option<String>) {
    if let Some(value) = update.as_deref().filter(|v| !v.trim().is_empty()) {
        *target = value.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.default_currency, "USD");
        assert_eq!(config.default_language, "en");
        assert_eq!(config.default_timezone, "UTC");
        assert_eq!(config.vision_model, "gpt-4o");
        assert_eq!(config.max_tokens, 4096);
        assert_eq!(config.request_timeout_secs, 60);
    }

    #[test]
    fn test_with_defaults_fills_only_unset_fields() {
        let config = ServiceConfig {
            api_key: "sk-test".to_string(),
            api_base_url: String::new(),
            default_currency: "KRW".to_string(),
            default_language: String::new(),
            default_timezone: String::new(),
            vision_model: String::new(),
            completion_model: "gpt-4o-mini".to_string(),
            max_tokens: 0,
            temperature: 0.0,
            request_timeout_secs: 0,
        }
        .with_defaults();

        assert_eq!(config.default_currency, "KRW");
        assert_eq!(config.default_language, "en");
        assert_eq!(config.completion_model, "gpt-4o-mini");
        assert_eq!(config.vision_model, "gpt-4o");
        assert_eq!(config.max_tokens, 4096);
        assert_eq!(config.temperature, 0.1);
        assert_eq!(config.api_key, "sk-test");
    }

    #[test]
    fn test_merge_applies_present_fields_only() {
        let base = ServiceConfig::default();
        let patch = ConfigPatch {
            default_currency: Some("JPY".to_string()),
            default_language: Some(String::new()),
            max_tokens: Some(0),
            temperature: Some(0.0),
            ..ConfigPatch::default()
        };

        let merged = base.merge(&patch);
        assert_eq!(merged.default_currency, "JPY");
        assert_eq!(merged.default_language, "en");
        assert_eq!(merged.max_tokens, 4096);
        assert_eq!(merged.temperature, 0.0);
        // The source value is untouched.
        assert_eq!(base.default_currency, "USD");
    }

    #[test]
    fn test_merge_rejects_negative_temperature() {
        let patch = ConfigPatch {
            temperature: Some(-1.0),
            ..ConfigPatch::default()
        };
        assert_eq!(ServiceConfig::default().merge(&patch).temperature, 0.1);
    }

    #[test]
    fn test_chat_completions_url() {
        let config = ServiceConfig {
            api_base_url: "http://127.0.0.1:8080/v1/".to_string(),
            ..ServiceConfig::default()
        };
        assert_eq!(config.chat_completions_url(), "http://127.0.0.1:8080/v1/chat/completions");
    }

    #[test]
    fn test_explicit_api_key_wins() {
        let config = ServiceConfig {
            api_key: "sk-explicit".to_string(),
            ..ServiceConfig::default()
        };
        assert_eq!(config.resolve_api_key().as_deref(), Some("sk-explicit"));
    }
}
