use serde::{Deserialize, Serialize};

#[derive(Serialize, Debug, Clone)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub stream: bool,
    pub options: GenerateOptions,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct GenerateOptions {
    pub temperature: f32,
    /// Ollama's name for the token limit.
    pub num_predict: u32,
}

/// One line of the `/api/generate` NDJSON stream.
#[derive(Deserialize, Debug, Default)]
pub struct GenerateChunk {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub name: String,
    /// RFC 3339 timestamp of the last pull.
    #[serde(default)]
    pub modified_at: Option<String>,
    /// Bytes on disk.
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Deserialize)]
pub struct TagsResponse {
    #[serde(default)]
    pub models: Vec<ModelInfo>,
}

pub mod models;
