//! ai-writer continues a piece of writing with a local Ollama model.
//!
//! The crate is organized around a small generation pipeline:
//! - [`core::ollama`] talks to the model server and decodes its streamed output.
//! - [`core::generation`] runs one request on a worker thread and hands fragments back over a
//!   channel, with cooperative cancellation and an overall timeout.
//! - [`core::reconciler`] inserts fragments into the document at the position generation
//!   started from, stopping if the user edits the document in the meantime.
//! - [`core::session`] enforces a single active generation and reports status.
//! - [`core::config`] and [`core::prompts`] hold persisted settings and prompt templates.
//!
//! The binary (`src/main.rs`) routes through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod logging;
pub mod utils;
