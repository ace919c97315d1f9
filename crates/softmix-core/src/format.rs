//! Packed PCM format descriptor
//!
//! A format is a single `u32`:
//! - bits 0..7: bytes per channel (1 or 2)
//! - bits 8..15: channel count (1 or 2)
//! - bits 16..31: a fixed tag so a zero or random integer is never a valid format

use std::fmt;

use serde::{Deserialize, Serialize};

/// Tag stored in the upper half of every packed format
const FORMAT_TAG: u32 = 0x0017_0000;

/// Largest supported bytes-per-channel
pub const MAX_BYTES_PER_CHANNEL: u32 = 2;

/// Largest supported channel count
pub const MAX_CHANNELS: u32 = 2;

/// Packed PCM format (bytes per channel + channel count)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Format(u32);

impl Format {
    pub const MONO8: Format = Format::make(1, 1);
    pub const STEREO8: Format = Format::make(1, 2);
    pub const MONO16: Format = Format::make(2, 1);
    pub const STEREO16: Format = Format::make(2, 2);

    /// Pack bytes-per-channel and channel count
    pub const fn make(bytes_per_channel: u32, channels: u32) -> Self {
        Format(FORMAT_TAG | (bytes_per_channel & 0xff) | ((channels & 0xff) << 8))
    }

    /// Wrap a raw packed value without checking it
    pub const fn from_raw(raw: u32) -> Self {
        Format(raw)
    }

    /// The raw packed value
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn bytes_per_channel(self) -> u32 {
        self.0 & 0xff
    }

    #[inline]
    pub const fn bits_per_channel(self) -> u32 {
        self.bytes_per_channel() * 8
    }

    #[inline]
    pub const fn channels(self) -> u32 {
        (self.0 >> 8) & 0xff
    }

    /// Bytes in one frame (one sample for every channel)
    #[inline]
    pub const fn sample_size(self) -> u32 {
        self.bytes_per_channel() * self.channels()
    }

    /// Whether both fields are in the supported range
    pub const fn is_supported(self) -> bool {
        let bpc = self.bytes_per_channel();
        let chans = self.channels();
        bpc >= 1 && bpc <= MAX_BYTES_PER_CHANNEL && chans >= 1 && chans <= MAX_CHANNELS
    }

    /// Short lowercase name (`mono16`, `stereo8`, ...), `None` if unsupported
    pub fn name(self) -> Option<&'static str> {
        match (self.bytes_per_channel(), self.channels()) {
            (1, 1) => Some("mono8"),
            (1, 2) => Some("stereo8"),
            (2, 1) => Some("mono16"),
            (2, 2) => Some("stereo16"),
            _ => None,
        }
    }
}

impl Default for Format {
    fn default() -> Self {
        Format::STEREO16
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{:#010x}", self.0),
        }
    }
}

impl TryFrom<String> for Format {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_ascii_lowercase().as_str() {
            "mono8" => Ok(Format::MONO8),
            "stereo8" => Ok(Format::STEREO8),
            "mono16" => Ok(Format::MONO16),
            "stereo16" => Ok(Format::STEREO16),
            other => Err(format!("unknown sample format '{}'", other)),
        }
    }
}

impl From<Format> for String {
    fn from(format: Format) -> Self {
        format.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_extraction() {
        assert_eq!(Format::MONO8.bytes_per_channel(), 1);
        assert_eq!(Format::MONO8.channels(), 1);
        assert_eq!(Format::MONO8.sample_size(), 1);

        assert_eq!(Format::STEREO16.bits_per_channel(), 16);
        assert_eq!(Format::STEREO16.channels(), 2);
        assert_eq!(Format::STEREO16.sample_size(), 4);
    }

    #[test]
    fn test_format_make_matches_raw_constants() {
        assert_eq!(Format::make(2, 2).raw(), 0x0017_0202);
        assert_eq!(Format::make(1, 1).raw(), 0x0017_0101);
    }

    #[test]
    fn test_unsupported_formats() {
        assert!(!Format::make(3, 1).is_supported());
        assert!(!Format::make(2, 0).is_supported());
        assert!(!Format::make(0, 2).is_supported());
        assert!(Format::MONO16.is_supported());
        assert_eq!(Format::make(4, 4).name(), None);
    }

    #[test]
    fn test_format_names_parse() {
        assert_eq!(Format::try_from("Stereo16".to_string()), Ok(Format::STEREO16));
        assert!(Format::try_from("surround51".to_string()).is_err());
        assert_eq!(Format::MONO8.to_string(), "mono8");
    }
}
