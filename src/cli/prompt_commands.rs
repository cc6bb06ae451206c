//! `ai-writer prompts ...`: create, edit, select and remove prompt templates.

use std::error::Error;

use clap::Subcommand;

use crate::core::config::{ModelFilter, PromptTemplate, Settings, SettingsStore};
use crate::core::prompts::TemplateUpdate;

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum PromptCommands {
    /// List templates, optionally only those usable with a model
    List {
        #[arg(long)]
        model: Option<String>,
    },
    /// Add a template
    Add {
        name: String,
        /// Text placed before the document
        #[arg(long)]
        body: String,
        /// Model the template is for, or "all"
        #[arg(long, default_value = "all")]
        model: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Change fields of an existing template
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        body: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a template
    Remove { id: String },
    /// Use a template for future generations
    Select { id: String },
    /// Stop using a template
    Clear,
    /// Add the built-in templates if none exist
    Defaults,
}

pub fn run_prompt_command(
    store: &SettingsStore,
    command: PromptCommands,
) -> Result<(), Box<dyn Error>> {
    match command {
        PromptCommands::List { model } => {
            let settings = store.load()?;
            print_templates(&settings, model.as_deref());
        }
        command => {
            let message = store.mutate(|settings| apply_prompt_command(settings, command))?;
            println!("{message}");
        }
    }
    Ok(())
}

/// Apply a mutating command and describe what changed.
pub fn apply_prompt_command(
    settings: &mut Settings,
    command: PromptCommands,
) -> Result<String, Box<dyn Error>> {
    let message = match command {
        PromptCommands::List { .. } => String::new(),
        PromptCommands::Add {
            name,
            body,
            model,
            description,
        } => {
            let template =
                settings.create_template(&name, &body, ModelFilter::parse(&model), &description)?;
            format!("✅ Added template '{}' ({})", template.name, template.id)
        }
        PromptCommands::Edit {
            id,
            name,
            body,
            model,
            description,
        } => {
            settings.update_template(
                &id,
                TemplateUpdate {
                    name,
                    body,
                    applies_to: model.as_deref().map(ModelFilter::parse),
                    description,
                },
            )?;
            format!("✅ Updated template {id}")
        }
        PromptCommands::Remove { id } => {
            let removed = settings.remove_template(&id)?;
            format!("✅ Removed template '{}'", removed.name)
        }
        PromptCommands::Select { id } => {
            settings.select_template(Some(&id))?;
            format!("✅ Selected template {id}")
        }
        PromptCommands::Clear => {
            settings.select_template(None)?;
            "✅ Cleared template selection".to_string()
        }
        PromptCommands::Defaults => match settings.ensure_default_templates() {
            0 => "Templates already exist; nothing added".to_string(),
            added => format!("✅ Added {added} built-in templates"),
        },
    };
    Ok(message)
}

fn print_templates(settings: &Settings, model: Option<&str>) {
    let templates: Vec<&PromptTemplate> = match model {
        Some(model) => settings.templates_for_model(model),
        None => settings.prompts.templates.iter().collect(),
    };

    if templates.is_empty() {
        println!("No prompt templates. Run 'ai-writer prompts defaults' to add the built-in ones.");
        return;
    }

    let selected = settings.prompts.selected_template_id.as_deref();
    for template in templates {
        let marker = if Some(template.id.as_str()) == selected {
            "*"
        } else {
            " "
        };
        println!(
            "{marker} {} [{}] ({})",
            template.name,
            template.applies_to.as_str(),
            template.id
        );
        if !template.description.is_empty() {
            println!("    {}", template.description);
        }
    }
}
