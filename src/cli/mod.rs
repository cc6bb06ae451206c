//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod continue_file;
pub mod model_list;
pub mod prompt_commands;
pub mod settings;

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::cli::continue_file::{run_continue, ContinueArgs};
use crate::cli::model_list::list_models;
use crate::cli::prompt_commands::{run_prompt_command, PromptCommands};
use crate::cli::settings::{run_set, run_unset, show_config};
use crate::core::config::SettingsStore;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\ncommit: ",
    env!("VERGEN_GIT_DESCRIBE"),
    " (",
    env!("VERGEN_GIT_SHA"),
    ")\nbuilt: ",
    env!("VERGEN_BUILD_TIMESTAMP"),
    " for ",
    env!("VERGEN_CARGO_TARGET_TRIPLE"),
);

#[derive(Parser)]
#[command(name = "ai-writer", version, long_version = LONG_VERSION)]
#[command(about = "Continue your writing with a local Ollama model")]
#[command(
    long_about = "ai-writer sends the text before the cursor to an Ollama server and streams the \
model's continuation back into the document.\n\n\
Settings live in a JSON file in the platform configuration directory; use 'ai-writer config' to \
see where, and 'ai-writer set' / 'ai-writer unset' to change them.\n\n\
Environment Variables:\n\
  AI_WRITER_LOG     Log filter, e.g. 'debug' or 'ai_writer=trace' (falls back to RUST_LOG)\n\n\
While generating:\n\
  Ctrl+C            Cancel; text already streamed is kept"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Settings file to use instead of the platform default
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log more detail to stderr (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List models available on the Ollama server
    Models,
    /// Continue a text file from its end, or from --cursor
    Continue(ContinueArgs),
    /// Manage prompt templates
    Prompts {
        #[command(subcommand)]
        command: PromptCommands,
    },
    /// Set a configuration value, or show all values if none is given
    Set {
        /// Configuration key to set
        key: String,
        /// Value to set (multiple words are joined with spaces)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Option<Vec<String>>,
    },
    /// Restore a configuration value to its default
    Unset {
        /// Configuration key to unset
        key: String,
    },
    /// Show the current configuration and where it is stored
    Config,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    crate::logging::init(args.verbose);

    let store = match args.config {
        Some(path) => SettingsStore::new(path),
        None => SettingsStore::open_default()?,
    };

    match args.command {
        Commands::Models => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(list_models(&store.load()?))
        }
        Commands::Continue(continue_args) => {
            // Generation blocks this thread; the runtime only hosts the Ctrl+C listener.
            let runtime = tokio::runtime::Runtime::new()?;
            run_continue(&store, &runtime, continue_args)
        }
        Commands::Prompts { command } => run_prompt_command(&store, command),
        Commands::Set { key, value } => run_set(&store, &key, value),
        Commands::Unset { key } => run_unset(&store, &key),
        Commands::Config => show_config(&store),
    }
}

#[cfg(test)]
mod tests;
