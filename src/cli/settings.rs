//! `ai-writer set`, `unset` and `config`.

use std::error::Error;

use crate::core::config::data::path_display;
use crate::core::config::SettingsStore;

pub fn run_set(
    store: &SettingsStore,
    key: &str,
    value: Option<Vec<String>>,
) -> Result<(), Box<dyn Error>> {
    let value = value.map(|parts| parts.join(" ")).unwrap_or_default();
    if value.trim().is_empty() {
        store.load()?.print_all();
        return Ok(());
    }

    let message = store.mutate(|settings| {
        settings
            .set_value(key, &value)
            .map_err(|e| -> Box<dyn Error> { e.into() })
    })?;
    println!("{message}");
    Ok(())
}

pub fn run_unset(store: &SettingsStore, key: &str) -> Result<(), Box<dyn Error>> {
    let message = store.mutate(|settings| {
        settings
            .unset_value(key)
            .map_err(|e| -> Box<dyn Error> { e.into() })
    })?;
    println!("{message}");
    Ok(())
}

pub fn show_config(store: &SettingsStore) -> Result<(), Box<dyn Error>> {
    let settings = store.load()?;
    println!("Settings file: {}", path_display(store.path()));
    println!();
    settings.print_all();
    Ok(())
}
