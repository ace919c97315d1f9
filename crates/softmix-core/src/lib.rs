//! Softmix Core - software PCM mixer with an OpenAL-shaped object model
//!
//! Callers create Sources and Buffers, upload PCM into Buffers, queue
//! Buffers on Sources and control playback. An output driver calls the
//! render entry point once per period; up to eight playing sources are
//! resampled to the output rate, scaled by gain, summed and clipped.
//!
//! - [`engine::Mixer`]: typed API returning `MixerResult`
//! - [`compat::AlMixer`]: raw handles and a sticky error code
//! - [`driver`]: nosound timer thread and optional CPAL output

pub mod compat;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod format;
pub mod sample;
pub mod types;

pub use compat::AlMixer;
pub use config::MixerConfig;
pub use engine::{BufferId, Handle, Mixer, SourceId, SourceInfo};
pub use error::{MixerError, MixerResult, NO_ERROR};
pub use format::Format;
pub use types::*;
