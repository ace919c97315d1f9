//! OpenAL-shaped mixer surface
//!
//! `AlMixer` wraps a [`Mixer`] for callers that expect the classic
//! object-and-error-code API: handles are raw integers, properties are
//! numeric ids, and calls never return errors. A failing call records its
//! error in a sticky slot and returns a harmless default; the first error
//! recorded stays until [`AlMixer::get_error`] drains it.
//!
//! ```ignore
//! let al = AlMixer::init(44100, Format::STEREO16.raw(), Quality::High, MixerFlags::None)?;
//! let src = al.gen_sources(1)[0];
//! al.source_play(src);
//! if al.get_error() != NO_ERROR { ... }
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::engine::{BufferId, Handle, Mixer, SourceId};
use crate::error::{MixerError, MixerResult, NO_ERROR};
use crate::format::Format;
use crate::types::{BufferProperty, MixerFlags, Quality, SourceProperty, SourceState};

/// Mixer with a sticky last-error slot and raw handles
pub struct AlMixer {
    mixer: Arc<Mixer>,
    last_error: AtomicU32,
}

fn source_id(raw: u64) -> MixerResult<SourceId> {
    SourceId::from_raw(raw).ok_or_else(|| {
        log::debug!("not a source: {:#x}", raw);
        MixerError::InvalidName
    })
}

fn buffer_id(raw: u64) -> MixerResult<BufferId> {
    BufferId::from_raw(raw).ok_or_else(|| {
        log::debug!("not a buffer: {:#x}", raw);
        MixerError::InvalidName
    })
}

/// Decode a handle list, dropping null entries
fn decode_list<H: Handle>(raw: &[u64], decode: fn(u64) -> MixerResult<H>) -> MixerResult<Vec<H>> {
    raw.iter().filter(|&&r| r != 0).map(|&r| decode(r)).collect()
}

impl AlMixer {
    /// Build a mixer from the four init parameters; `None` if they're
    /// rejected
    pub fn init(frequency: u32, format: u32, quality: Quality, flags: MixerFlags) -> Option<Self> {
        match Mixer::init(frequency, Format::from_raw(format), quality, flags) {
            Ok(mixer) => Some(Self::new(Arc::new(mixer))),
            Err(e) => {
                log::warn!("AlMixer::init(): {}", e);
                None
            }
        }
    }

    /// Wrap an existing mixer
    pub fn new(mixer: Arc<Mixer>) -> Self {
        Self {
            mixer,
            last_error: AtomicU32::new(NO_ERROR),
        }
    }

    /// The wrapped mixer, for handing to an output driver
    pub fn mixer(&self) -> &Arc<Mixer> {
        &self.mixer
    }

    /// Release this handle on the mixer; outstanding objects are not freed
    pub fn uninit(self) {
        log::debug!("AlMixer::uninit()");
    }

    /// Return and clear the pending error code
    pub fn get_error(&self) -> u32 {
        self.last_error.swap(NO_ERROR, Ordering::AcqRel)
    }

    fn set_error(&self, error: MixerError) {
        // first error wins until drained
        let _ = self.last_error.compare_exchange(
            NO_ERROR,
            error.code(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Unwrap `result`, recording the error and falling back to the default
    fn check<T: Default>(&self, op: &str, result: MixerResult<T>) -> T {
        match result {
            Ok(value) => value,
            Err(e) => {
                log::debug!("{}(): {}", op, e);
                self.set_error(e);
                T::default()
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Sources
    // ─────────────────────────────────────────────────────────────

    pub fn gen_sources(&self, n: usize) -> Vec<u64> {
        let ids = self.check("gen_sources", self.mixer.gen_sources(n));
        ids.into_iter().map(SourceId::to_raw).collect()
    }

    pub fn delete_sources(&self, sources: &[u64]) {
        let result =
            decode_list(sources, source_id).and_then(|ids| self.mixer.delete_sources(&ids));
        self.check("delete_sources", result)
    }

    pub fn is_source(&self, source: u64) -> bool {
        SourceId::from_raw(source).map_or(false, |id| self.mixer.is_source(id))
    }

    /// Set an integer source property
    pub fn source_i(&self, source: u64, prop: u32, value: i64) {
        let result = source_id(source).and_then(|id| match SourceProperty::from_raw(prop) {
            Some(SourceProperty::Looping) => self.mixer.set_looping(id, value != 0),
            Some(SourceProperty::Buffer) => {
                let buffer = match value {
                    0 => Ok(None),
                    raw => buffer_id(raw as u64).map(Some),
                };
                buffer.and_then(|buffer| self.mixer.set_buffer(id, buffer))
            }
            Some(SourceProperty::SourceState) => match SourceState::from_raw(value) {
                Some(state) => self.mixer.set_state(id, state),
                None => self.mixer.source_info(id).map(|_| {
                    log::debug!(
                        "source_i(SOURCE_STATE): unsupported state {}, call ignored",
                        value
                    );
                }),
            },
            _ => {
                log::debug!("source_i(): unsupported property {:#x}", prop);
                Err(MixerError::InvalidEnum)
            }
        });
        self.check("source_i", result)
    }

    /// Set a float source property; only GAIN is supported, others are
    /// ignored
    pub fn source_f(&self, source: u64, prop: u32, value: f32) {
        let result = source_id(source).and_then(|id| match SourceProperty::from_raw(prop) {
            Some(SourceProperty::Gain) => self.mixer.set_gain(id, value),
            _ => self.mixer.source_info(id).map(|_| {
                log::debug!("source_f(): unsupported property {:#x}, call ignored", prop);
            }),
        });
        self.check("source_f", result)
    }

    /// Set a vector source property; positional properties are accepted and
    /// ignored
    pub fn source_fv(&self, source: u64, prop: u32, value: &[f32; 3]) {
        let result = source_id(source).and_then(|id| self.mixer.source_info(id)).map(|_| {
            log::debug!("source_fv({:#x}, {:?}): ignored", prop, value);
        });
        self.check("source_fv", result)
    }

    /// Read an integer source property
    pub fn get_source_i(&self, source: u64, prop: u32) -> i64 {
        let result = source_id(source)
            .and_then(|id| self.mixer.source_info(id))
            .and_then(|info| match SourceProperty::from_raw(prop) {
                Some(SourceProperty::Looping) => Ok(info.looping as i64),
                Some(SourceProperty::Buffer) => Ok(info.buffer.map_or(0, |b| b.to_raw() as i64)),
                Some(SourceProperty::SourceState) => Ok(info.state as i64),
                Some(SourceProperty::BuffersQueued) => Ok(info.buffers_queued as i64),
                Some(SourceProperty::BuffersProcessed) => Ok(info.buffers_processed as i64),
                _ => {
                    log::debug!("get_source_i(): unsupported property {:#x}", prop);
                    Err(MixerError::InvalidEnum)
                }
            });
        self.check("get_source_i", result)
    }

    /// Read a float source property; unsupported ids read as 0.0
    pub fn get_source_f(&self, source: u64, prop: u32) -> f32 {
        let result = source_id(source)
            .and_then(|id| self.mixer.source_info(id))
            .map(|info| match SourceProperty::from_raw(prop) {
                Some(SourceProperty::Gain) => info.gain,
                _ => {
                    log::debug!("get_source_f(): unsupported property {:#x}", prop);
                    0.0
                }
            });
        self.check("get_source_f", result)
    }

    pub fn source_play(&self, source: u64) {
        let result = source_id(source).and_then(|id| self.mixer.play(id));
        self.check("source_play", result)
    }

    pub fn source_pause(&self, source: u64) {
        let result = source_id(source).and_then(|id| self.mixer.pause(id));
        self.check("source_pause", result)
    }

    pub fn source_stop(&self, source: u64) {
        let result = source_id(source).and_then(|id| self.mixer.stop(id));
        self.check("source_stop", result)
    }

    pub fn source_rewind(&self, source: u64) {
        let result = source_id(source).and_then(|id| self.mixer.rewind(id));
        self.check("source_rewind", result)
    }

    pub fn source_queue_buffers(&self, source: u64, buffers: &[u64]) {
        let result = source_id(source).and_then(|id| {
            let bufs = buffers
                .iter()
                .map(|&raw| buffer_id(raw))
                .collect::<MixerResult<Vec<_>>>()?;
            self.mixer.queue_buffers(id, &bufs)
        });
        self.check("source_queue_buffers", result)
    }

    /// Unqueue `n` buffers; empty on failure
    pub fn source_unqueue_buffers(&self, source: u64, n: usize) -> Vec<u64> {
        let result = source_id(source).and_then(|id| self.mixer.unqueue_buffers(id, n));
        let ids = self.check("source_unqueue_buffers", result);
        ids.into_iter().map(BufferId::to_raw).collect()
    }

    // ─────────────────────────────────────────────────────────────
    // Buffers
    // ─────────────────────────────────────────────────────────────

    pub fn gen_buffers(&self, n: usize) -> Vec<u64> {
        let ids = self.check("gen_buffers", self.mixer.gen_buffers(n));
        ids.into_iter().map(BufferId::to_raw).collect()
    }

    pub fn delete_buffers(&self, buffers: &[u64]) {
        let result =
            decode_list(buffers, buffer_id).and_then(|ids| self.mixer.delete_buffers(&ids));
        self.check("delete_buffers", result)
    }

    pub fn is_buffer(&self, buffer: u64) -> bool {
        BufferId::from_raw(buffer).map_or(false, |id| self.mixer.is_buffer(id))
    }

    /// Read a buffer property as it was uploaded
    pub fn get_buffer_i(&self, buffer: u64, prop: u32) -> i64 {
        let result = buffer_id(buffer).and_then(|id| match BufferProperty::from_raw(prop) {
            Some(prop) => self.mixer.buffer_property(id, prop).map(|v| v as i64),
            None => {
                log::debug!("get_buffer_i(): unsupported property {:#x}", prop);
                Err(MixerError::InvalidEnum)
            }
        });
        self.check("get_buffer_i", result)
    }

    pub fn buffer_data(&self, buffer: u64, format: u32, data: &[u8], freq: u32) {
        let result = buffer_id(buffer)
            .and_then(|id| self.mixer.buffer_data(id, Format::from_raw(format), data, freq));
        self.check("buffer_data", result)
    }

    // ─────────────────────────────────────────────────────────────
    // Render entry points
    // ─────────────────────────────────────────────────────────────

    pub fn mix_channels(&self, stream: &mut [u8]) {
        self.mixer.mix_channels(stream);
    }

    pub fn mix_fake(&self, len: usize) {
        self.mixer.mix_fake(len);
    }
}
