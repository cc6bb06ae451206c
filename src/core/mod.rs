pub mod config;
pub mod constants;
pub mod document;
pub mod error;
pub mod generation;
pub mod ollama;
pub mod prompts;
pub mod reconciler;
pub mod session;
pub mod status;
