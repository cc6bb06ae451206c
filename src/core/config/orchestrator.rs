use crate::core::config::data::Settings;
use crate::core::config::io::ConfigError;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

#[derive(Default)]
struct SettingsCacheState {
    settings: Option<Settings>,
    modified: Option<SystemTime>,
}

/// Owns the settings file: caches the parsed contents and reloads when the file changes on disk.
pub struct SettingsStore {
    path: PathBuf,
    state: Mutex<SettingsCacheState>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            state: Mutex::new(SettingsCacheState::default()),
        }
    }

    /// Store backed by the platform config directory.
    pub fn open_default() -> Result<Self, ConfigError> {
        Ok(Self::new(Settings::default_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Settings, ConfigError> {
        let mut state = self.lock_state();
        self.refresh(&mut state)?;
        Ok(state.settings.clone().unwrap_or_default())
    }

    pub fn persist(&self, settings: Settings) -> Result<(), ConfigError> {
        settings.save_to_path(&self.path)?;
        let mut state = self.lock_state();
        state.modified = Self::modified_time(&self.path);
        state.settings = Some(settings);
        Ok(())
    }

    /// Load, apply `mutator`, and save. Nothing is written if the mutator fails.
    pub fn mutate<F, T, E>(&self, mutator: F) -> Result<T, E>
    where
        F: FnOnce(&mut Settings) -> Result<T, E>,
        E: From<ConfigError>,
    {
        let mut working = self.load()?;
        let result = mutator(&mut working)?;
        self.persist(working)?;
        Ok(result)
    }

    fn refresh(&self, state: &mut SettingsCacheState) -> Result<(), ConfigError> {
        let disk_modified = Self::modified_time(&self.path);
        if state.settings.is_none() || state.modified != disk_modified {
            let settings = Settings::load_from_path(&self.path)?;
            state.modified = disk_modified;
            state.settings = Some(settings);
        }
        Ok(())
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SettingsCacheState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn modified_time(path: &Path) -> Option<SystemTime> {
        fs::metadata(path).ok()?.modified().ok()
    }
}
