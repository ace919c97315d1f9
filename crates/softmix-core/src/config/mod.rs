//! Mixer configuration
//!
//! The output format, rate, resampler tier and fake-data flag are fixed for
//! the lifetime of a `Mixer`; changing any of them means building a new
//! mixer. Table capacities are fixed at the same time so the render path
//! never sees a table reallocate underneath it.
//!
//! # Usage
//!
//! ```ignore
//! use softmix_core::config::{load_config, default_config_path, MixerConfig};
//!
//! let config: MixerConfig = load_config(&default_config_path("mixer.yaml"));
//! let mixer = Mixer::new(config)?;
//! ```

mod io;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{MixerError, MixerResult};
use crate::format::Format;
use crate::types::{MixerFlags, Quality, DEFAULT_MAX_BUFFERS, DEFAULT_MAX_SOURCES};

pub use io::{load_config, read_config, save_config};

/// Mixer configuration, fixed at init
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    /// Output sample rate in Hz
    pub frequency: u32,
    /// Output sample format
    pub format: Format,
    /// Upsampling quality tier
    pub quality: Quality,
    /// Skip PCM storage/conversion while keeping queue bookkeeping
    pub fake_data: bool,
    /// Capacity of the Source table
    pub max_sources: usize,
    /// Capacity of the Buffer table
    pub max_buffers: usize,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            frequency: Quality::default().preferred_frequency(),
            format: Format::STEREO16,
            quality: Quality::default(),
            fake_data: false,
            max_sources: DEFAULT_MAX_SOURCES,
            max_buffers: DEFAULT_MAX_BUFFERS,
        }
    }
}

impl MixerConfig {
    /// Build a config from the four init parameters, with default capacities
    pub fn new(frequency: u32, format: Format, quality: Quality, flags: MixerFlags) -> Self {
        Self {
            frequency,
            format,
            quality,
            fake_data: flags == MixerFlags::FakeData,
            ..Self::default()
        }
    }

    /// Config used when no audio device is available: 8-bit mono at the
    /// low-quality rate with fake data
    pub fn nosound() -> Self {
        Self::new(
            Quality::Low.preferred_frequency(),
            Format::MONO8,
            Quality::Low,
            MixerFlags::FakeData,
        )
    }

    /// Set table capacities
    pub fn with_capacity(mut self, max_sources: usize, max_buffers: usize) -> Self {
        self.max_sources = max_sources;
        self.max_buffers = max_buffers;
        self
    }

    pub fn flags(&self) -> MixerFlags {
        if self.fake_data {
            MixerFlags::FakeData
        } else {
            MixerFlags::None
        }
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> MixerResult<()> {
        if self.frequency == 0 {
            log::debug!("MixerConfig::validate(): zero frequency");
            return Err(MixerError::InvalidValue);
        }
        if !self.format.is_supported() {
            log::debug!("MixerConfig::validate(): unsupported format {}", self.format);
            return Err(MixerError::InvalidValue);
        }
        if self.max_sources == 0 || self.max_buffers == 0 {
            log::debug!("MixerConfig::validate(): zero table capacity");
            return Err(MixerError::InvalidValue);
        }
        Ok(())
    }

    /// Derived output parameters used on every render step
    pub(crate) fn output_spec(&self) -> OutputSpec {
        OutputSpec {
            frequency: self.frequency,
            chansize: self.format.bytes_per_channel() as usize,
            channels: self.format.channels() as usize,
            sampsize: self.format.sample_size() as usize,
            quality: self.quality,
            fake_data: self.fake_data,
        }
    }
}

/// Output parameters precomputed from `MixerConfig`
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct OutputSpec {
    pub frequency: u32,
    /// Bytes per output channel sample
    pub chansize: usize,
    pub channels: usize,
    /// Bytes per output frame
    pub sampsize: usize,
    pub quality: Quality,
    pub fake_data: bool,
}

/// Default location of a softmix config file
///
/// Returns: `<user config dir>/softmix/{filename}`
pub fn default_config_path(filename: &str) -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("softmix")
        .join(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = MixerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.frequency, 44100);
        assert_eq!(config.flags(), MixerFlags::None);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = MixerConfig::default();
        config.frequency = 0;
        assert_eq!(config.validate(), Err(MixerError::InvalidValue));

        let config = MixerConfig::new(44100, Format::make(3, 2), Quality::High, MixerFlags::None);
        assert_eq!(config.validate(), Err(MixerError::InvalidValue));

        let config = MixerConfig::default().with_capacity(0, 16);
        assert_eq!(config.validate(), Err(MixerError::InvalidValue));
    }

    #[test]
    fn test_nosound_preset() {
        let config = MixerConfig::nosound();
        assert_eq!(config.frequency, 22050);
        assert_eq!(config.format, Format::MONO8);
        assert!(config.fake_data);
    }

    #[test]
    fn test_output_spec() {
        let spec = MixerConfig::default().output_spec();
        assert_eq!(spec.chansize, 2);
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sampsize, 4);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "frequency: 22050\nquality: high\n";
        let config: MixerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.frequency, 22050);
        assert_eq!(config.quality, Quality::High);
        assert_eq!(config.format, Format::STEREO16);
    }

    #[test]
    fn test_default_path_under_softmix() {
        let path = default_config_path("mixer.yaml");
        assert!(path.ends_with("softmix/mixer.yaml"));
    }
}
