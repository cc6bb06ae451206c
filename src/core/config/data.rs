use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::constants::{
    DEFAULT_MAX_TOKEN_LIMIT, DEFAULT_MIN_TOKEN_LIMIT, DEFAULT_OLLAMA_URL, DEFAULT_SYSTEM_INSTRUCTION,
    DEFAULT_TEMPERATURE, DEFAULT_TIMEOUT_SECS, DEFAULT_TOKEN_LIMIT,
};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct OllamaSettings {
    pub url: String,
    /// Upper bound on a whole generation request, in seconds.
    pub timeout_secs: u64,
    pub default_model: Option<String>,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_OLLAMA_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            default_model: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct GenerationSettings {
    pub default_temperature: f32,
    pub default_token_limit: u32,
    pub min_token_limit: u32,
    pub max_token_limit: u32,
    /// Sent as the `system` field so the model continues instead of chatting.
    pub system_instruction: Option<String>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            default_temperature: DEFAULT_TEMPERATURE,
            default_token_limit: DEFAULT_TOKEN_LIMIT,
            min_token_limit: DEFAULT_MIN_TOKEN_LIMIT,
            max_token_limit: DEFAULT_MAX_TOKEN_LIMIT,
            system_instruction: Some(DEFAULT_SYSTEM_INSTRUCTION.to_string()),
        }
    }
}

/// Which models a prompt template is offered for.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ModelFilter {
    #[default]
    All,
    Model(String),
}

impl ModelFilter {
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            ModelFilter::All
        } else {
            ModelFilter::Model(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ModelFilter::All => "all",
            ModelFilter::Model(name) => name,
        }
    }

    pub fn matches(&self, model: &str) -> bool {
        match self {
            ModelFilter::All => true,
            ModelFilter::Model(name) => name == model,
        }
    }
}

impl Serialize for ModelFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ModelFilter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(ModelFilter::parse(&raw))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PromptTemplate {
    pub id: String,
    pub name: String,
    /// Text placed ahead of the document when this template is selected.
    #[serde(rename = "content")]
    pub body: String,
    #[serde(rename = "language_model", default)]
    pub applies_to: ModelFilter,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct PromptSettings {
    pub templates: Vec<PromptTemplate>,
    pub selected_template_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub ollama: OllamaSettings,
    pub generation: GenerationSettings,
    pub prompts: PromptSettings,
}

/// Read-only view of the settings the generation pipeline consults when it builds a request.
pub trait SettingsSource {
    fn base_url(&self) -> &str;
    fn default_temperature(&self) -> f32;
    fn default_token_limit(&self) -> u32;
    /// Inclusive `(min, max)` range for token limits.
    fn token_limit_bounds(&self) -> (u32, u32);
    fn request_timeout(&self) -> Duration;
    fn system_instruction(&self) -> Option<&str>;
    fn templates(&self) -> &[PromptTemplate];
}

impl SettingsSource for Settings {
    fn base_url(&self) -> &str {
        &self.ollama.url
    }

    fn default_temperature(&self) -> f32 {
        self.generation.default_temperature
    }

    fn default_token_limit(&self) -> u32 {
        self.generation.default_token_limit
    }

    fn token_limit_bounds(&self) -> (u32, u32) {
        let min = self.generation.min_token_limit.max(1);
        let max = self.generation.max_token_limit.max(min);
        (min, max)
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.ollama.timeout_secs.max(1))
    }

    fn system_instruction(&self) -> Option<&str> {
        self.generation
            .system_instruction
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }

    fn templates(&self) -> &[PromptTemplate] {
        &self.prompts.templates
    }
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
