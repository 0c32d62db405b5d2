//! Observe Configuration Module
//!
//! Config is stored in `~/.config/nika/observe.toml`.
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. Environment variables (`NIKA_OBSERVE_ROOT`, `NIKA_OBSERVE_RETENTION_DAYS`)
//! 2. Config file (`~/.config/nika/observe.toml`)
//! 3. Defaults
//!
//! Components never read this themselves; the binary builds them from it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::dashboard::Dashboard;
use crate::error::{ObserveError, Result};
use crate::event::EventLog;
use crate::metrics::{MetricsCollector, MetricsOptions, SkillUsageLog};
use crate::util::{
    DEFAULT_FLUSH_THRESHOLD, DEFAULT_RECENT_CACHE_SIZE, DEFAULT_RETENTION_DAYS, RING_BUFFER_SIZE,
};

pub const ENV_ROOT: &str = "NIKA_OBSERVE_ROOT";
pub const ENV_RETENTION_DAYS: &str = "NIKA_OBSERVE_RETENTION_DAYS";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ObserveConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Root for events/, metrics/ and analytics/
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(".nika/observe"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EventsConfig {
    pub ring_buffer_size: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            ring_buffer_size: RING_BUFFER_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    pub flush_threshold: usize,
    pub recent_cache_size: usize,
    pub retention_days: u32,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            recent_cache_size: DEFAULT_RECENT_CACHE_SIZE,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

impl ObserveConfig {
    /// `~/.config/nika/` on Unix, `%APPDATA%/nika/` on Windows
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("nika")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("observe.toml")
    }

    /// Load from the default path
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_path())
    }

    /// Missing file means defaults; a malformed one is a `ConfigError`
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ObserveError::ConfigError {
            reason: format!("Failed to read {}: {}", path.display(), e),
        })?;

        toml::from_str(&content).map_err(|e| ObserveError::ConfigError {
            reason: format!("Failed to parse {}: {}", path.display(), e),
        })
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ObserveError::ConfigError {
                reason: format!("Failed to create config directory: {}", e),
            })?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| ObserveError::ConfigError {
            reason: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(path, content).map_err(|e| ObserveError::ConfigError {
            reason: format!("Failed to write {}: {}", path.display(), e),
        })
    }

    /// Merge environment overrides (non-empty values only)
    pub fn with_env(self) -> Result<Self> {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    pub fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(root) = lookup(ENV_ROOT).filter(|v| !v.is_empty()) {
            self.storage.root = PathBuf::from(root);
        }

        if let Some(days) = lookup(ENV_RETENTION_DAYS).filter(|v| !v.is_empty()) {
            self.metrics.retention_days = days.trim().parse().map_err(|_| ObserveError::ConfigError {
                reason: format!("{} must be a non-negative integer, got '{}'", ENV_RETENTION_DAYS, days),
            })?;
        }

        Ok(self)
    }

    pub fn events_dir(&self) -> PathBuf {
        self.storage.root.join("events")
    }

    pub fn metrics_dir(&self) -> PathBuf {
        self.storage.root.join("metrics")
    }

    pub fn analytics_dir(&self) -> PathBuf {
        self.storage.root.join("analytics")
    }

    pub fn metrics_options(&self) -> MetricsOptions {
        MetricsOptions {
            flush_threshold: self.metrics.flush_threshold,
            recent_cache_size: self.metrics.recent_cache_size,
            ..MetricsOptions::default()
        }
    }

    pub fn event_log(&self) -> EventLog {
        EventLog::with_capacity(self.events_dir(), self.events.ring_buffer_size)
    }

    /// Collector writing skill outcomes to `analytics/skill_usage.jsonl`
    pub fn metrics_collector(&self) -> MetricsCollector {
        MetricsCollector::with_options(
            self.metrics_dir(),
            self.metrics_options(),
            Arc::new(SkillUsageLog::new(self.analytics_dir())),
        )
    }

    pub fn dashboard(&self) -> Dashboard {
        Dashboard::new(self.event_log(), Arc::new(self.metrics_collector()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_config_path_contains_nika() {
        let path = ObserveConfig::config_path();
        assert!(path.to_string_lossy().contains("nika"));
        assert!(path.to_string_lossy().ends_with("observe.toml"));
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let config = ObserveConfig::load_from(dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, ObserveConfig::default());
        assert_eq!(config.metrics.retention_days, 30);
        assert_eq!(config.events_dir(), PathBuf::from(".nika/observe/events"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("observe.toml");
        fs::write(&path, "[metrics]\nflush_threshold = 50\n").unwrap();

        let config = ObserveConfig::load_from(&path).unwrap();
        assert_eq!(config.metrics.flush_threshold, 50);
        assert_eq!(config.metrics.recent_cache_size, 1000);
        assert_eq!(config.events.ring_buffer_size, 1000);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("observe.toml");
        fs::write(&path, "[metrics\n").unwrap();

        let err = ObserveConfig::load_from(&path).unwrap_err();
        assert_eq!(err.code(), "OBS-080");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/observe.toml");
        let mut config = ObserveConfig::default();
        config.storage.root = PathBuf::from("/var/lib/nika");
        config.metrics.retention_days = 7;

        config.save_to(&path).unwrap();
        assert_eq!(ObserveConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_env_overrides() {
        let config = ObserveConfig::default()
            .with_env_from(|key| match key {
                ENV_ROOT => Some("/tmp/observe".to_string()),
                ENV_RETENTION_DAYS => Some("14".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.storage.root, PathBuf::from("/tmp/observe"));
        assert_eq!(config.metrics.retention_days, 14);
        assert_eq!(config.analytics_dir(), PathBuf::from("/tmp/observe/analytics"));
    }

    #[test]
    fn test_empty_env_is_ignored() {
        let config = ObserveConfig::default()
            .with_env_from(|_| Some(String::new()))
            .unwrap();
        assert_eq!(config, ObserveConfig::default());
    }

    #[test]
    fn test_bad_retention_env() {
        let err = ObserveConfig::default()
            .with_env_from(|key| (key == ENV_RETENTION_DAYS).then(|| "-3".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_RETENTION_DAYS));
    }
}
