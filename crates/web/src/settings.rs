//! Directory listing sort order, shared by all workers and persisted as JSON.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Column a directory listing is sorted by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Name,
    Size,
    Date,
}

impl SortKey {
    pub const ALL: [SortKey; 3] = [SortKey::Name, SortKey::Size, SortKey::Date];

    /// The number used for this key in sort commands.
    pub fn index(self) -> u8 {
        match self {
            SortKey::Name => 0,
            SortKey::Size => 1,
            SortKey::Date => 2,
        }
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.index() == index)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SortSettings {
    pub key: SortKey,
    pub descending: bool,
}

impl SortSettings {
    /// Parses a `sort_<field>_<desc>` command, e.g. `sort_2_1` for newest first.
    pub fn from_command(command: &str) -> Option<Self> {
        let mut parts = command.strip_prefix("sort_")?.split('_');
        let key = parts.next()?.parse().ok().and_then(SortKey::from_index)?;
        let descending = match parts.next()? {
            "0" => false,
            "1" => true,
            _ => return None,
        };

        match parts.next() {
            None => Some(Self { key, descending }),
            Some(_) => None,
        }
    }

    /// The command that selects `key`: toggles the direction of the current key and
    /// keeps the current direction for any other.
    pub fn command_for(self, key: SortKey) -> String {
        let descending = if key == self.key { !self.descending } else { self.descending };
        format!("sort_{}_{}", key.index(), u8::from(descending))
    }
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("can't access settings file {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("malformed settings file {path}: {source}")]
    Json { path: PathBuf, source: serde_json::Error },
}

/// Live sort settings.
///
/// Readers never block: every change swaps in a new value. When the store has a file,
/// each change is written back to it.
#[derive(Debug)]
pub struct SettingsStore {
    path: Option<PathBuf>,
    current: ArcSwap<SortSettings>,
}

impl SettingsStore {
    /// A store that is never persisted.
    pub fn in_memory(settings: SortSettings) -> Self {
        Self { path: None, current: ArcSwap::from_pointee(settings) }
    }

    /// Loads the settings saved at `path`.
    ///
    /// A missing or unreadable file leaves the defaults in place; later changes are
    /// still saved to `path`.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let settings = match read_settings(&path).await {
            Ok(settings) => {
                info!(path = %path.display(), ?settings, "loaded sort settings");
                settings
            }
            Err(SettingsError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file, using defaults");
                SortSettings::default()
            }
            Err(e) => {
                warn!(cause = %e, "using default sort settings");
                SortSettings::default()
            }
        };

        Self { path: Some(path), current: ArcSwap::from_pointee(settings) }
    }

    pub fn current(&self) -> SortSettings {
        **self.current.load()
    }

    /// Applies a sort command, returning whether it was one.
    ///
    /// Failing to save the new settings is logged; they stay in effect for this run.
    pub async fn apply_command(&self, command: &str) -> bool {
        let Some(settings) = SortSettings::from_command(command) else {
            debug!(command, "ignoring unknown command");
            return false;
        };

        self.current.store(Arc::new(settings));
        info!(?settings, "changed sort settings");

        if let Some(path) = &self.path
            && let Err(e) = write_settings(path, settings).await
        {
            warn!(cause = %e, "can't save sort settings");
        }
        true
    }
}

async fn read_settings(path: &Path) -> Result<SortSettings, SettingsError> {
    let content = tokio::fs::read(path).await.map_err(|source| SettingsError::Io { path: path.to_owned(), source })?;
    serde_json::from_slice(&content).map_err(|source| SettingsError::Json { path: path.to_owned(), source })
}

async fn write_settings(path: &Path, settings: SortSettings) -> Result<(), SettingsError> {
    let content =
        serde_json::to_vec_pretty(&settings).map_err(|source| SettingsError::Json { path: path.to_owned(), source })?;
    tokio::fs::write(path, content).await.map_err(|source| SettingsError::Io { path: path.to_owned(), source })
}
