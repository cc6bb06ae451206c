use crate::core::config::data::Settings;
use crate::core::config::keys::SETTING_KEYS;

impl Settings {
    pub fn print_all(&self) {
        println!("Current configuration:");
        for key in SETTING_KEYS {
            println!("  {key}: {}", self.display_value(key));
        }
        if self.prompts.templates.is_empty() {
            println!("  prompt-templates: (none)");
        } else {
            println!("  prompt-templates: {}", self.prompts.templates.len());
        }
        match self.selected_template() {
            Some(template) => println!("  selected-template: {} ({})", template.name, template.id),
            None => println!("  selected-template: (none)"),
        }
    }
}
