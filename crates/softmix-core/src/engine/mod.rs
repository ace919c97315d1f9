//! Mixing engine
//!
//! - [`handle`]: generation-checked arenas and the `SourceId`/`BufferId` handles
//! - [`buffer`] / [`convert`]: buffer table and upload normalization
//! - [`resample`]: identity, nearest, linear and cubic sampling
//! - [`source`]: source table, playback state and buffer queues
//! - [`active`]: the fixed table of sources the render path visits
//! - [`locks`]: the source → buffer → active lock chain
//! - [`render`]: `mix_channels` / `mix_fake`
//! - [`mixer`]: the public `Mixer` tying it together

mod active;
mod buffer;
mod convert;
pub mod handle;
mod locks;
mod mixer;
mod render;
mod resample;
mod source;

pub use buffer::UploadInfo;
pub use handle::{BufferId, Handle, SourceId};
pub use mixer::{Mixer, SourceInfo};
pub use resample::Resampler;
