use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Tunables for the sync loop, persisted as JSON in the user config directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Period of the reconciliation timer
    pub tick_interval_ms: u64,
    /// Reconciliation requests inside this window collapse into one trailing run
    pub debounce_ms: u64,
    /// The frame driver requests a reconciliation every Nth frame
    pub frame_throttle: u32,
    /// Period of the frame driver
    pub frame_interval_ms: u64,
    /// A route starting this soon counts as visible
    pub lookahead_ms: i64,
    /// Drift corrected with playback rate instead of seeking
    pub micro_correction_s: f64,
    /// Buffered-ahead seconds considered sufficient
    pub sufficient_buffer_s: f64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 250,
            debounce_ms: 100,
            frame_throttle: 20,
            frame_interval_ms: 16,
            lookahead_ms: 5_000,
            micro_correction_s: 0.3,
            sufficient_buffer_s: 30.0,
        }
    }
}

impl TimelineConfig {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("drive-timeline").join("config.json"))
    }

    /// Load from the user config directory, falling back to defaults
    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Load from `path`, falling back to defaults when missing or unreadable
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match fs::read_to_string(path).map(|contents| serde_json::from_str::<Self>(&contents)) {
            Ok(Ok(config)) => config,
            Ok(Err(e)) => {
                warn!("Ignoring malformed config {}: {}", path.display(), e);
                Self::default()
            }
            Err(e) => {
                warn!("Could not read config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self) -> std::io::Result<()> {
        match Self::config_path() {
            Some(path) => self.save_to(&path),
            None => Ok(()),
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}
