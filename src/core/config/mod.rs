pub mod data;
pub mod io;
pub mod keys;
pub mod orchestrator;
pub mod printing;

pub use data::{
    GenerationSettings, ModelFilter, OllamaSettings, PromptSettings, PromptTemplate, Settings,
    SettingsSource,
};
pub use io::ConfigError;
pub use keys::{SettingError, SETTING_KEYS};
pub use orchestrator::SettingsStore;
