use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use sdi_types::{AudioConnection, VideoConnection, VideoFormat};
use serde::{Deserialize, Serialize};

/**
    Settings read from the optional YAML configuration file.

    Every field may be omitted. Command line flags take precedence over the
    file, and built-in defaults fill whatever neither sets.
*/
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    pub card: Option<usize>,
    pub video_connection: Option<VideoConnection>,
    pub audio_connection: Option<AudioConnection>,
    pub video_format: Option<VideoFormat>,
    pub audio_channels: Option<u16>,
    pub queues: QueueConfig,
}

/**
    Capacities of the queues between capture and the downstream workers.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueueConfig {
    pub video: usize,
    pub audio: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { video: 8, audio: 32 }
    }
}

impl IngestConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(text)?;
        anyhow::ensure!(
            config.queues.video > 0 && config.queues.audio > 0,
            "queue capacities must be at least 1"
        );
        Ok(config)
    }
}
