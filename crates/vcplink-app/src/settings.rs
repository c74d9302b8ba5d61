//! Persistent settings, stored as JSON in the user's config directory.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use vcplink_core::assembler::{DEFAULT_MAX_LINE_LEN, DEFAULT_RETRY_DELAY};
use vcplink_core::serial_service::{DEFAULT_BAUD_RATE, DEFAULT_PORT};
use vcplink_core::session::DEFAULT_POLL_INTERVAL_MS;
use vcplink_core::{SerialConfig, SessionConfig};

/// Shortest line limit that still fits a full data record.
pub const MIN_LINE_LEN: usize = 64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable blocks
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub port: String,
    pub baud_rate: u32,
    pub poll_interval_ms: u32,
    pub max_line_len: usize,
    pub retry_delay_ms: u64,
    pub format: OutputFormat,
    /// Stop after this many readings; run until killed when unset.
    pub count: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_line_len: DEFAULT_MAX_LINE_LEN,
            retry_delay_ms: DEFAULT_RETRY_DELAY.as_millis() as u64,
            format: OutputFormat::Text,
            count: None,
        }
    }
}

impl Settings {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("vcplink").join("settings.json"))
    }

    /// Loads `path` if given. Otherwise loads the default file when it
    /// exists, or falls back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("could not read settings from {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("invalid settings in {}", path.display()))
    }

    /// Rejects values the reader cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.max_line_len < MIN_LINE_LEN {
            bail!(
                "max_line_len must be at least {MIN_LINE_LEN} bytes, got {}",
                self.max_line_len
            );
        }
        if self.baud_rate == 0 {
            bail!("baud_rate must be non-zero");
        }
        if self.poll_interval_ms == 0 {
            bail!("poll_interval_ms must be non-zero");
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn serial_config(&self) -> SerialConfig {
        SerialConfig {
            baud_rate: self.baud_rate,
            ..SerialConfig::new(self.port.clone())
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            poll_interval_ms: self.poll_interval_ms,
            line_ending: self.serial_config().line_ending,
            max_line_len: self.max_line_len,
            retry_delay: self.retry_delay(),
        }
    }
}
