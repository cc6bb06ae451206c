//! Model listing functionality
//!
//! This module lists the models installed on the configured Ollama server.

use std::error::Error;

use chrono::DateTime;

use crate::api::ModelInfo;
use crate::core::config::{Settings, SettingsSource};
use crate::core::ollama::OllamaClient;

pub async fn list_models(settings: &Settings) -> Result<(), Box<dyn Error>> {
    let client = OllamaClient::new(settings.base_url(), settings.request_timeout())?;

    println!("🤖 Available Models at {}", client.base_url());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();

    let models = client.list_model_details().await?;
    let default_model = settings.ollama.default_model.as_deref();

    if models.is_empty() {
        println!("No models found. Pull one first, e.g. 'ollama pull llama2'.");
        return Ok(());
    }

    for line in format_model_lines(&models, default_model) {
        println!("{line}");
    }

    if let Some(default_model) = default_model {
        if !models.iter().any(|m| m.name == default_model) {
            println!();
            println!("⚠️  Default model '{default_model}' is not installed on this server.");
        }
    }

    Ok(())
}

fn format_model_lines(models: &[ModelInfo], default_model: Option<&str>) -> Vec<String> {
    let mut lines = Vec::new();
    for model in models {
        if Some(model.name.as_str()) == default_model {
            lines.push(format!("  • {} (default)", model.name));
        } else {
            lines.push(format!("  • {}", model.name));
        }
        if let Some(size) = model.size {
            lines.push(format!("    Size: {}", format_size(size)));
        }
        if let Some(modified) = model.modified_at.as_deref().and_then(format_modified) {
            lines.push(format!("    Modified: {modified}"));
        }
    }
    lines
}

fn format_size(bytes: u64) -> String {
    const GB: f64 = 1_000_000_000.0;
    const MB: f64 = 1_000_000.0;
    let bytes = bytes as f64;
    if bytes >= GB {
        format!("{:.1} GB", bytes / GB)
    } else {
        format!("{:.0} MB", bytes / MB)
    }
}

// Shown in the server's own UTC offset.
fn format_modified(raw: &str) -> Option<String> {
    let parsed = DateTime::parse_from_rfc3339(raw).ok()?;
    Some(parsed.format("%Y-%m-%d %H:%M").to_string())
}
