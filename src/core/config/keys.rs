use crate::core::config::data::{Settings, SettingsSource};
use crate::core::generation::clamp_temperature;
use crate::utils::url::validate_base_url;
use thiserror::Error;

/// Keys accepted by `ai-writer set` / `ai-writer unset`.
pub const SETTING_KEYS: &[&str] = &[
    "url",
    "timeout",
    "default-model",
    "temperature",
    "token-limit",
    "min-token-limit",
    "max-token-limit",
    "system-instruction",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingError {
    #[error("Unknown setting '{0}'. Known settings: {}", SETTING_KEYS.join(", "))]
    UnknownKey(String),
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

fn invalid(key: &str, value: &str, reason: impl Into<String>) -> SettingError {
    SettingError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn parse_u32(key: &str, value: &str) -> Result<u32, SettingError> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|e| invalid(key, value, e.to_string()))
}

impl Settings {
    /// Apply a `key = value` assignment and return a confirmation line.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<String, SettingError> {
        match key {
            "url" => {
                self.ollama.url =
                    validate_base_url(value).map_err(|reason| invalid(key, value, reason))?;
            }
            "timeout" => {
                let secs = value
                    .trim()
                    .parse::<u64>()
                    .map_err(|e| invalid(key, value, e.to_string()))?;
                if secs == 0 {
                    return Err(invalid(key, value, "timeout must be at least one second"));
                }
                self.ollama.timeout_secs = secs;
            }
            "default-model" => {
                let model = value.trim();
                if model.is_empty() {
                    return Err(invalid(key, value, "model name is empty"));
                }
                self.ollama.default_model = Some(model.to_string());
            }
            "temperature" => {
                let temperature = value
                    .trim()
                    .parse::<f32>()
                    .map_err(|e| invalid(key, value, e.to_string()))?;
                if !temperature.is_finite() {
                    return Err(invalid(key, value, "temperature must be a finite number"));
                }
                self.generation.default_temperature =
                    clamp_temperature(temperature, self.generation.default_temperature);
            }
            "token-limit" => {
                let limit = parse_u32(key, value)?;
                let (min, max) = self.token_limit_bounds();
                self.generation.default_token_limit = limit.clamp(min, max);
            }
            "min-token-limit" => {
                let limit = parse_u32(key, value)?;
                if limit == 0 || limit > self.generation.max_token_limit {
                    return Err(invalid(key, value, "must be between 1 and max-token-limit"));
                }
                self.generation.min_token_limit = limit;
            }
            "max-token-limit" => {
                let limit = parse_u32(key, value)?;
                if limit < self.generation.min_token_limit {
                    return Err(invalid(key, value, "must not be below min-token-limit"));
                }
                self.generation.max_token_limit = limit;
            }
            "system-instruction" => {
                self.generation.system_instruction = Some(value.to_string());
            }
            _ => return Err(SettingError::UnknownKey(key.to_string())),
        }

        Ok(format!("✅ Set {key} = {}", self.display_value(key)))
    }

    /// Restore a key to its default.
    pub fn unset_value(&mut self, key: &str) -> Result<String, SettingError> {
        let defaults = Settings::default();
        match key {
            "url" => self.ollama.url = defaults.ollama.url,
            "timeout" => self.ollama.timeout_secs = defaults.ollama.timeout_secs,
            "default-model" => self.ollama.default_model = None,
            "temperature" => {
                self.generation.default_temperature = defaults.generation.default_temperature
            }
            "token-limit" => {
                self.generation.default_token_limit = defaults.generation.default_token_limit
            }
            "min-token-limit" => self.generation.min_token_limit = defaults.generation.min_token_limit,
            "max-token-limit" => self.generation.max_token_limit = defaults.generation.max_token_limit,
            "system-instruction" => {
                self.generation.system_instruction = defaults.generation.system_instruction
            }
            _ => return Err(SettingError::UnknownKey(key.to_string())),
        }

        Ok(format!("✅ Reset {key} ({})", self.display_value(key)))
    }

    pub fn display_value(&self, key: &str) -> String {
        match key {
            "url" => self.ollama.url.clone(),
            "timeout" => format!("{}s", self.ollama.timeout_secs),
            "default-model" => self
                .ollama
                .default_model
                .clone()
                .unwrap_or_else(|| "(unset)".to_string()),
            "temperature" => format!("{:.2}", self.generation.default_temperature),
            "token-limit" => self.generation.default_token_limit.to_string(),
            "min-token-limit" => self.generation.min_token_limit.to_string(),
            "max-token-limit" => self.generation.max_token_limit.to_string(),
            "system-instruction" => match &self.generation.system_instruction {
                Some(text) if !text.trim().is_empty() => text.clone(),
                _ => "(none)".to_string(),
            },
            _ => String::new(),
        }
    }
}
