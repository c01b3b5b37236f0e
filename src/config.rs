use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Input device to capture from; the host default when unset
    #[serde(default)]
    pub input_device: Option<String>,

    /// Seconds of audio per captured chunk; one Progress event per chunk
    #[serde(default = "default_chunk_secs")]
    pub chunk_secs: f32,

    /// Seconds of audio between best-effort header refreshes while recording
    #[serde(default = "default_header_flush_secs")]
    pub header_flush_secs: f32,

    /// How long `stop` waits for in-flight audio before finalizing
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,

    /// Capacity of the realtime capture ring, in seconds
    #[serde(default = "default_ring_buffer_secs")]
    pub ring_buffer_secs: f32,
}

fn default_chunk_secs() -> f32 {
    0.1
}

fn default_header_flush_secs() -> f32 {
    1.0
}

fn default_drain_timeout_ms() -> u64 {
    2000
}

fn default_ring_buffer_secs() -> f32 {
    10.0
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_device: None,
            chunk_secs: default_chunk_secs(),
            header_flush_secs: default_header_flush_secs(),
            drain_timeout_ms: default_drain_timeout_ms(),
            ring_buffer_secs: default_ring_buffer_secs(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.config/appending-recorder/config.json)
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            tracing::info!(
                "Config file not found at {:?}, creating default config",
                config_path
            );
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let config = Self::load_from(&config_path)?;
        tracing::info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        // Create parent directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        tracing::info!("Saved config to {:?}", config_path);
        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = if let Ok(dir) = std::env::var("XDG_CONFIG_HOME") {
            PathBuf::from(dir)
        } else {
            let home = std::env::var("HOME").context("HOME environment variable not set")?;
            PathBuf::from(home).join(".config")
        };

        Ok(config_dir.join("appending-recorder").join("config.json"))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !(self.chunk_secs > 0.0 && self.chunk_secs <= 5.0) {
            return Err(anyhow::anyhow!("chunk_secs must be in (0, 5]"));
        }

        if self.header_flush_secs <= 0.0 {
            return Err(anyhow::anyhow!("header_flush_secs must be positive"));
        }

        if self.ring_buffer_secs < self.chunk_secs * 2.0 {
            return Err(anyhow::anyhow!(
                "ring_buffer_secs must hold at least two chunks"
            ));
        }

        if matches!(&self.input_device, Some(name) if name.trim().is_empty()) {
            return Err(anyhow::anyhow!("input_device cannot be empty"));
        }

        Ok(())
    }
}
