//! Shared constants used across the application

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Generations are slow on modest hardware; this bounds the whole request, not a single read.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const MIN_TEMPERATURE: f32 = 0.0;
pub const MAX_TEMPERATURE: f32 = 2.0;

pub const DEFAULT_TOKEN_LIMIT: u32 = 140;
pub const DEFAULT_MIN_TOKEN_LIMIT: u32 = 10;
pub const DEFAULT_MAX_TOKEN_LIMIT: u32 = 2000;

pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "Continue writing from where the text ends naturally. \
Do not repeat what was already written. \
Do not add explanations, comments, or meta-text. \
Just continue the story or sentence seamlessly.";

/// Name of the settings file inside the platform config directory.
pub const SETTINGS_FILE_NAME: &str = "settings.json";
