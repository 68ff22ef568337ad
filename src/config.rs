//! Configuration Module - User preferences from config.toml
//!
//! Supports:
//! - Archive ingestion (extension, worker offloading, cache location)
//! - Search weights and cache bounds
//! - Render batch pacing
//! - Insertion placement cascade

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Logo Shelf Configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Archive settings
    pub archive: ArchiveConfig,
    /// Search settings
    pub search: SearchConfig,
    /// Render settings
    pub render: RenderConfig,
    /// Insertion settings
    pub insert: InsertConfig,
}

/// Archive ingestion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// The single file extension considered inside archives
    pub extension: String,
    /// Decompress on a dedicated worker thread (falls back automatically)
    pub use_worker: bool,
    /// Directory holding the persisted archive slot and preferences
    pub cache_dir: Option<PathBuf>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            extension: "svg".to_string(),
            use_worker: true,
            cache_dir: None,
        }
    }
}

/// Search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Score contributed by each query token found literally
    pub direct_weight: u32,
    /// Score contributed by each distinct synonym found
    pub synonym_weight: u32,
    /// Related terms taken per query token
    pub max_synonyms: usize,
    /// Memoized query results kept before a full clear
    pub cache_limit: usize,
    /// Shortest indexed prefix
    pub min_prefix: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            direct_weight: 100,
            synonym_weight: 10,
            max_synonyms: 6,
            cache_limit: 200,
            min_prefix: 3,
        }
    }
}

/// Render settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Tiles materialized per frame
    pub batch_size: usize,
    /// Frame pacing interval
    pub frame_interval_ms: u64,
    /// Margin (px) around the viewport that triggers hydration
    pub lookahead_px: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            batch_size: 60,
            frame_interval_ms: 16,
            lookahead_px: 200,
        }
    }
}

impl RenderConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }
}

/// Insertion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InsertConfig {
    /// Replace the selected shape when exactly one is selected
    pub replace_selection: bool,
    /// Left of the first cascade position (points)
    pub base_left: f64,
    /// Top of the first cascade position (points)
    pub base_top: f64,
    /// Offset added per successive insert (points)
    pub step: f64,
    /// Cascade positions before wrapping to the base
    pub max_steps: u32,
    /// Idle time after which a context's cascade restarts
    pub idle_reset_ms: u64,
    /// How long the active context identity is trusted
    pub context_ttl_ms: u64,
    /// Width of inserted images (points)
    pub default_width: f64,
    /// Height of inserted images (points)
    pub default_height: f64,
}

impl Default for InsertConfig {
    fn default() -> Self {
        Self {
            replace_selection: true,
            base_left: 40.0,
            base_top: 40.0,
            step: 18.0,
            max_steps: 8,
            idle_reset_ms: 4_000,
            context_ttl_ms: 1_500,
            default_width: 120.0,
            default_height: 120.0,
        }
    }
}

impl InsertConfig {
    pub fn idle_reset(&self) -> Duration {
        Duration::from_millis(self.idle_reset_ms)
    }

    pub fn context_ttl(&self) -> Duration {
        Duration::from_millis(self.context_ttl_ms)
    }
}

impl Config {
    /// Load config from default path or return defaults
    pub fn load() -> Self {
        Self::load_from(&Self::default_path()).unwrap_or_default()
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;

        Ok(config)
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;

        Ok(())
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "tunclon", "logo-shelf")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".logo-shelf")
                    .join("config.toml")
            })
    }

    /// Directory for the archive slot and preferences
    pub fn data_dir(&self) -> PathBuf {
        if let Some(ref dir) = self.archive.cache_dir {
            return dir.clone();
        }
        directories::ProjectDirs::from("com", "tunclon", "logo-shelf")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".logo-shelf"))
    }
}

/// Generate a sample config file with comments
pub fn generate_sample_config() -> String {
    r#"# Logo Shelf Configuration

[archive]
# File extension picked out of imported archives
extension = "svg"

# Decompress entries on a background worker thread
use_worker = true

# Where the archive cache and favorites live (optional)
# cache_dir = "/home/user/.local/share/logo-shelf"

[search]
# Score per query word found literally
direct_weight = 100

# Score per distinct synonym found
synonym_weight = 10

# Synonyms considered per query word
max_synonyms = 6

# Cached query results before the cache is flushed
cache_limit = 200

# Shortest indexed prefix
min_prefix = 3

[render]
# Tiles drawn per frame
batch_size = 60

# Frame interval in milliseconds
frame_interval_ms = 16

# Pixels around the viewport that start image loading
lookahead_px = 200

[insert]
# Replace the selected shape when exactly one is selected
replace_selection = true

# First cascade position (points)
base_left = 40.0
base_top = 40.0

# Offset per successive insert and number of positions before wrapping
step = 18.0
max_steps = 8

# Restart the cascade after this much idle time
idle_reset_ms = 4000

# Trust the active slide identity for this long
context_ttl_ms = 1500

# Inserted image size (points)
default_width = 120.0
default_height = 120.0
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.archive.extension, "svg");
        assert!(config.archive.use_worker);
        assert_eq!(config.insert.max_steps, 8);
        assert!(config.search.direct_weight > config.search.synonym_weight * config.search.max_synonyms as u32);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test_config.toml");

        let mut config = Config::default();
        config.render.batch_size = 12;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.render.batch_size, 12);
        assert_eq!(loaded.insert.step, config.insert.step);
    }

    #[test]
    fn test_parse_sample_config() {
        let sample = generate_sample_config();
        let config: Config = toml::from_str(&sample).unwrap();
        assert_eq!(config.search.cache_limit, 200);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config = toml::from_str("[insert]\nstep = 10.0\n").unwrap();
        assert_eq!(config.insert.step, 10.0);
        assert_eq!(config.insert.max_steps, 8);
        assert_eq!(config.archive.extension, "svg");
    }
}
