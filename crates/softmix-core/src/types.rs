//! Common types for softmix
//!
//! Playback states, property identifiers and quality tiers shared by the
//! engine, the OpenAL-shaped adapter and the drivers. Numeric values match
//! the OpenAL constants so raw codes can cross an FFI or scripting boundary
//! unchanged.

use serde::{Deserialize, Serialize};

/// Number of slots in the active-source table
///
/// At most this many sources are rendered at once; further activations are
/// logged and ignored.
pub const MAX_SOURCES: usize = 8;

/// Default capacity of the Source table
pub const DEFAULT_MAX_SOURCES: usize = 64;

/// Default capacity of the Buffer table
pub const DEFAULT_MAX_BUFFERS: usize = 512;

/// Playback state of a source
///
/// Ordering matters: the state machine compares against `Playing` to decide
/// whether a source currently occupies an active slot (`Playing` and
/// `Paused` do, `Initial` and `Stopped` don't).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u32)]
pub enum SourceState {
    #[default]
    Initial = 0,
    Stopped = 1,
    Playing = 2,
    Paused = 3,
}

impl SourceState {
    /// Whether a source in this state is expected to hold an active slot
    #[inline]
    pub fn is_active(self) -> bool {
        self >= SourceState::Playing
    }

    /// Convert from the raw state value
    pub fn from_raw(value: i64) -> Option<Self> {
        match value {
            0 => Some(SourceState::Initial),
            1 => Some(SourceState::Stopped),
            2 => Some(SourceState::Playing),
            3 => Some(SourceState::Paused),
            _ => None,
        }
    }
}

/// Lifecycle state of a buffer
///
/// `Initial → Filled → Queued → Playing → Processed`, and back to `Filled`
/// when the buffer leaves a source's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u32)]
pub enum BufferState {
    #[default]
    Initial = 0,
    Filled = 1,
    Queued = 2,
    Playing = 3,
    Processed = 4,
}

/// Source properties (OpenAL ids)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SourceProperty {
    Position = 0x1004,
    Looping = 0x1007,
    Buffer = 0x1009,
    Gain = 0x100A,
    SourceState = 0x1010,
    BuffersQueued = 0x1015,
    BuffersProcessed = 0x1016,
}

impl SourceProperty {
    /// Look up a property by its raw id
    pub fn from_raw(id: u32) -> Option<Self> {
        match id {
            0x1004 => Some(Self::Position),
            0x1007 => Some(Self::Looping),
            0x1009 => Some(Self::Buffer),
            0x100A => Some(Self::Gain),
            0x1010 => Some(Self::SourceState),
            0x1015 => Some(Self::BuffersQueued),
            0x1016 => Some(Self::BuffersProcessed),
            _ => None,
        }
    }
}

/// Buffer properties (OpenAL ids), all read-only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum BufferProperty {
    Frequency = 0x2001,
    Bits = 0x2002,
    Channels = 0x2003,
    Size = 0x2004,
    Data = 0x2005,
}

impl BufferProperty {
    /// Look up a property by its raw id
    pub fn from_raw(id: u32) -> Option<Self> {
        match id {
            0x2001 => Some(Self::Frequency),
            0x2002 => Some(Self::Bits),
            0x2003 => Some(Self::Channels),
            0x2004 => Some(Self::Size),
            0x2005 => Some(Self::Data),
            _ => None,
        }
    }
}

/// Resampler quality tier
///
/// Only affects upsampling: downsampling is always nearest-neighbour and
/// matching rates always pass through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    /// Nearest-neighbour upsampling
    Low,
    /// Linear interpolation
    #[default]
    Medium,
    /// Catmull-Rom cubic interpolation
    High,
}

impl Quality {
    /// Output rate a driver should ask the device for at this tier
    pub fn preferred_frequency(self) -> u32 {
        match self {
            Quality::Low => 22050,
            Quality::Medium | Quality::High => 44100,
        }
    }

    /// Get display name for logs
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Low => "Low (nearest)",
            Self::Medium => "Medium (linear)",
            Self::High => "High (cubic)",
        }
    }
}

/// Mixer behaviour flags, fixed at init
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MixerFlags {
    #[default]
    None,
    /// Skip PCM storage and conversion; buffer and source bookkeeping still
    /// runs so queue progress behaves as if audio were rendered
    FakeData,
}
