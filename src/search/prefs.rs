//! Favorites and recency, keyed by asset name so they survive archive reloads.
//!
//! Persisted as pretty JSON next to the archive slot. Writes are best-effort:
//! a read-only or full disk downgrades to in-memory preferences.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub favorites: BTreeSet<String>,
    #[serde(default)]
    pub last_used: HashMap<String, DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct PreferenceStore {
    path: Option<PathBuf>,
    prefs: Preferences,
}

impl PreferenceStore {
    /// Preferences that are never written anywhere
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open (or start) the preferences file at `path`
    pub fn open(path: &Path) -> Self {
        let prefs = match std::fs::read_to_string(path) {
            Ok(data) => serde_json::from_str(&data).unwrap_or_else(|e| {
                warn!("Ignoring unreadable preferences {}: {}", path.display(), e);
                Preferences::default()
            }),
            Err(_) => Preferences::default(),
        };

        Self {
            path: Some(path.to_path_buf()),
            prefs,
        }
    }

    pub fn is_favorite(&self, name: &str) -> bool {
        self.prefs.favorites.contains(name)
    }

    pub fn last_used(&self, name: &str) -> Option<DateTime<Utc>> {
        self.prefs.last_used.get(name).copied()
    }

    /// Returns true when the stored value changed
    pub fn set_favorite(&mut self, name: &str, favorite: bool) -> bool {
        let changed = if favorite {
            self.prefs.favorites.insert(name.to_string())
        } else {
            self.prefs.favorites.remove(name)
        };
        if changed {
            self.save();
        }
        changed
    }

    pub fn mark_used(&mut self, name: &str, at: DateTime<Utc>) {
        self.prefs.last_used.insert(name.to_string(), at);
        self.save();
    }

    pub fn favorites(&self) -> impl Iterator<Item = &str> {
        self.prefs.favorites.iter().map(String::as_str)
    }

    fn save(&self) {
        let Some(ref path) = self.path else {
            return;
        };
        let result = serde_json::to_string_pretty(&self.prefs)
            .map_err(std::io::Error::other)
            .and_then(|json| {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, json)
            });
        match result {
            Ok(()) => debug!("Preferences saved to {}", path.display()),
            Err(e) => warn!("Preferences not saved ({}): {}", path.display(), e),
        }
    }
}
