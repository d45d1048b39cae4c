use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use crate::restore::RestoreOptions;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RestoreSettings {
    pub poll_interval_ms: u64,
    pub launch_timeout_secs: u64,
    pub tolerance_px: u32,
}

impl Default for RestoreSettings {
    fn default() -> Self {
        let defaults = RestoreOptions::default();
        Self {
            poll_interval_ms: defaults.poll_interval.as_millis() as u64,
            launch_timeout_secs: defaults.launch_timeout.as_secs(),
            tolerance_px: defaults.tolerance_px,
        }
    }
}

impl RestoreSettings {
    pub fn to_options(&self) -> RestoreOptions {
        RestoreOptions {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            launch_timeout: Duration::from_secs(self.launch_timeout_secs),
            tolerance_px: self.tolerance_px,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            bail!("poll interval must be positive");
        }
        if self.launch_timeout_secs == 0 {
            bail!("launch timeout must be positive");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SnapshotSettings {
    pub auto_save_interval_secs: u64,
    pub auto_save_name: String,
    pub max_history: usize,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            auto_save_interval_secs: 300,
            auto_save_name: "Auto-Save".into(),
            max_history: 10,
        }
    }
}

impl SnapshotSettings {
    pub fn auto_save_interval(&self) -> Duration {
        Duration::from_secs(self.auto_save_interval_secs.max(1))
    }

    fn validate(&self) -> Result<()> {
        if self.auto_save_interval_secs == 0 {
            bail!("auto-save interval must be positive");
        }
        if self.auto_save_name.trim().is_empty() {
            bail!("auto-save name must not be empty");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct UserSettings {
    restore: RestoreSettings,
    snapshots: SnapshotSettings,
}

impl UserSettings {
    /// Swap any section that fails validation for its defaults.
    fn sanitized(mut self, path: &Path) -> Self {
        if let Err(err) = self.restore.validate() {
            log::warn!("Ignoring restore settings in {}: {err}", path.display());
            self.restore = RestoreSettings::default();
        }
        if let Err(err) = self.snapshots.validate() {
            log::warn!("Ignoring snapshot settings in {}: {err}", path.display());
            self.snapshots = SnapshotSettings::default();
        }
        self
    }
}

/// JSON-backed user settings, cached in memory and rewritten on every update.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str::<UserSettings>(&contents)
                .map(|loaded| loaded.sanitized(&path))
                .unwrap_or_else(|err| {
                    log::warn!("Ignoring unreadable settings at {}: {err}", path.display());
                    UserSettings::default()
                })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn restore(&self) -> RestoreSettings {
        self.read().restore.clone()
    }

    pub fn restore_options(&self) -> RestoreOptions {
        self.read().restore.to_options()
    }

    pub fn update_restore(&self, settings: RestoreSettings) -> Result<()> {
        settings.validate()?;
        let mut guard = self.write();
        guard.restore = settings;
        self.persist(&guard)
    }

    pub fn snapshots(&self) -> SnapshotSettings {
        self.read().snapshots.clone()
    }

    pub fn update_snapshots(&self, settings: SnapshotSettings) -> Result<()> {
        settings.validate()?;
        let mut guard = self.write();
        guard.snapshots = settings;
        self.persist(&guard)
    }

    fn read(&self) -> RwLockReadGuard<'_, UserSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
