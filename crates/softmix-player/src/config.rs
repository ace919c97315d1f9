//! Player configuration for softmix-player
//!
//! Configuration is stored as YAML in the user's config directory.
//! Default location: ~/.config/softmix/player.yaml

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use softmix_core::driver::{DriverKind, DEFAULT_PERIOD_BYTES};
use softmix_core::{Format, MixerConfig};

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Mixer output settings
    pub mixer: MixerConfig,
    /// Output driver
    pub driver: DriverKind,
    /// Bytes consumed per nosound period
    pub period_bytes: usize,
    /// Streaming settings
    pub stream: StreamConfig,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            mixer: MixerConfig::default(),
            driver: DriverKind::default(),
            period_bytes: DEFAULT_PERIOD_BYTES,
            stream: StreamConfig::default(),
        }
    }
}

/// How input files are read and queued
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Sample format of the raw input files
    pub file_format: Format,
    /// Sample rate of the raw input files
    pub file_rate: u32,
    /// Bytes per queued buffer
    pub chunk_bytes: usize,
    /// Buffers cycling through the source queue
    pub buffers: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            file_format: Format::STEREO16,
            file_rate: 44100,
            chunk_bytes: 16384,
            buffers: 4,
        }
    }
}

impl StreamConfig {
    /// Chunk size rounded down to whole frames, at least one frame
    pub fn aligned_chunk(&self) -> usize {
        let frame = self.file_format.sample_size() as usize;
        (self.chunk_bytes / frame).max(1) * frame
    }
}

/// Get the default config file path
pub fn default_config_path() -> PathBuf {
    softmix_core::config::default_config_path("player.yaml")
}
