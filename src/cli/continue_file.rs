//! TUI-less "continue" command: stream a continuation of a text file to stdout and save it.

use std::error::Error;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use tokio::runtime::Runtime;
use tracing::debug;

use crate::core::config::{Settings, SettingsSource, SettingsStore};
use crate::core::document::{DocumentView, TextBuffer};
use crate::core::error::ErrorKind;
use crate::core::generation::{CancelHandle, GenerationParams};
use crate::core::ollama::OllamaClient;
use crate::core::session::{SessionCoordinator, SessionReport, SessionUpdate};
use crate::core::status::{StatusSink, TracingSink};
use crate::utils::fs::write_atomic;

#[derive(clap::Args, Debug, Clone, Default)]
pub struct ContinueArgs {
    /// Text file to continue
    pub file: PathBuf,

    /// Model to use (defaults to the configured default-model, then the first installed model)
    #[arg(short = 'm', long)]
    pub model: Option<String>,

    /// Sampling temperature, 0.0-2.0
    #[arg(short = 't', long)]
    pub temperature: Option<f32>,

    /// Maximum number of tokens to generate
    #[arg(short = 'n', long = "tokens", value_name = "N")]
    pub token_limit: Option<u32>,

    /// Prompt template id (defaults to the selected template)
    #[arg(long, value_name = "ID")]
    pub template: Option<String>,

    /// Send the text without any prompt template
    #[arg(long, conflicts_with = "template")]
    pub no_template: bool,

    /// Continue from this character offset instead of the end of the file
    #[arg(long, value_name = "OFFSET")]
    pub cursor: Option<usize>,

    /// Write the result here instead of back into FILE
    #[arg(short = 'o', long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Stream the continuation but do not save anything
    #[arg(long)]
    pub dry_run: bool,

    /// Print only the generated text; status lines go to the log
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

/// Status lines on stderr, so stdout carries only generated text.
pub struct TerminalSink;

impl StatusSink for TerminalSink {
    fn status(&mut self, message: &str) {
        eprintln!("{message}");
    }

    fn error(&mut self, kind: ErrorKind, message: &str) {
        eprintln!("❌ {kind}: {message}");
    }

    fn notice(&mut self, message: &str) {
        eprintln!("⚠️  {message}");
    }
}

pub fn run_continue(
    store: &SettingsStore,
    runtime: &Runtime,
    args: ContinueArgs,
) -> Result<(), Box<dyn Error>> {
    let settings = store.load()?;
    let original = fs::read_to_string(&args.file)
        .map_err(|e| format!("Failed to read {}: {e}", args.file.display()))?;

    let mut doc = TextBuffer::new(original);
    if let Some(cursor) = args.cursor {
        doc.set_cursor(cursor);
    }

    let model = resolve_model(&settings, runtime, args.model.as_deref())?;
    let params = GenerationParams {
        model,
        temperature: args.temperature,
        token_limit: args.token_limit,
        template_id: if args.no_template {
            None
        } else {
            args.template
                .clone()
                .or_else(|| settings.prompts.selected_template_id.clone())
        },
    };

    let mut sink: Box<dyn StatusSink> = if args.quiet {
        Box::new(TracingSink)
    } else {
        Box::new(TerminalSink)
    };

    let mut session = SessionCoordinator::new();
    session.request_generation(&settings, &doc, &params, sink.as_mut())?;

    if let Some(handle) = session.cancel_handle() {
        runtime.spawn(watch_interrupts(handle));
    }

    let report = stream_to_stdout(&mut session, &mut doc, sink.as_mut())?;

    if let Some(err) = report.error {
        return Err(err.into());
    }

    if report.inserted.is_empty() {
        debug!("nothing generated, leaving file untouched");
        return Ok(());
    }

    if args.dry_run {
        return Ok(());
    }

    let target = args.output.as_ref().unwrap_or(&args.file);
    write_atomic(target, doc.text().as_bytes())
        .map_err(|e| format!("Failed to write {}: {e}", target.display()))?;
    if !args.quiet {
        eprintln!(
            "💾 Saved {} new characters to {}",
            report.inserted.chars().count(),
            target.display()
        );
    }
    Ok(())
}

/// First Ctrl+C cancels the generation; a second one exits without waiting for the worker.
async fn watch_interrupts(handle: CancelHandle) {
    let mut presses = 0u32;
    while tokio::signal::ctrl_c().await.is_ok() {
        presses += 1;
        if interrupt_action(presses) == InterruptAction::Exit {
            eprintln!();
            eprintln!("Interrupted again, exiting");
            std::process::exit(EXIT_INTERRUPTED);
        }
        handle.cancel();
        eprintln!();
        eprintln!("Cancelling... press Ctrl+C again to exit immediately");
    }
}

/// Shell convention for termination by SIGINT.
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InterruptAction {
    Cancel,
    Exit,
}

pub(crate) fn interrupt_action(presses: u32) -> InterruptAction {
    if presses > 1 {
        InterruptAction::Exit
    } else {
        InterruptAction::Cancel
    }
}

fn stream_to_stdout<D: DocumentView + ?Sized>(
    session: &mut SessionCoordinator,
    doc: &mut D,
    sink: &mut dyn StatusSink,
) -> Result<SessionReport, Box<dyn Error>> {
    let mut stdout = io::stdout();
    loop {
        match session.next_update(doc, sink) {
            Some(SessionUpdate::Inserted(text)) => {
                print!("{text}");
                stdout.flush()?;
            }
            Some(SessionUpdate::StaleDocument) => {}
            Some(SessionUpdate::Finished(report)) => {
                if !report.inserted.is_empty() {
                    println!();
                }
                return Ok(report);
            }
            None => return Err("generation ended without a result".into()),
        }
    }
}

/// Explicit choice, then the configured default, then whatever the server lists first.
fn resolve_model(
    settings: &Settings,
    runtime: &Runtime,
    requested: Option<&str>,
) -> Result<String, Box<dyn Error>> {
    let configured = requested
        .or(settings.ollama.default_model.as_deref())
        .map(str::trim)
        .filter(|model| !model.is_empty());
    if let Some(model) = configured {
        return Ok(model.to_string());
    }

    let client = OllamaClient::new(settings.base_url(), settings.request_timeout())?;
    let models = runtime.block_on(client.list_models())?;
    let first = models.into_iter().next().ok_or(
        "No models installed on the Ollama server. Pull one first, e.g. 'ollama pull llama2'.",
    )?;
    debug!(model = %first, "no model configured, using the first installed one");
    Ok(first)
}
