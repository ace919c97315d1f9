//! The mixer: control API and render entry points
//!
//! `Mixer` is shared between the control thread(s) and the audio callback
//! (usually through an `Arc`). Every method takes `&self`; state lives
//! behind the ordered locks in [`super::locks`].
//!
//! Control calls return `MixerResult`. For the OpenAL-shaped sticky-error
//! surface see [`crate::compat::AlMixer`].

use std::collections::HashSet;

use super::active::ActiveSlots;
use super::buffer::{BufferStore, UploadInfo};
use super::convert;
use super::handle::{BufferId, SourceId};
use super::locks::MixerLocks;
use super::render;
use super::source::{Source, SourceStore};
use crate::config::{MixerConfig, OutputSpec};
use crate::error::{MixerError, MixerResult};
use crate::format::Format;
use crate::types::{BufferProperty, BufferState, MixerFlags, Quality, SourceState};

/// Snapshot of a source's properties
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceInfo {
    pub state: SourceState,
    pub looping: bool,
    pub gain: f32,
    /// Head of the queue
    pub buffer: Option<BufferId>,
    /// Buffer the render path reads next
    pub current: Option<BufferId>,
    pub buffers_queued: usize,
    pub buffers_processed: usize,
}

impl From<&Source> for SourceInfo {
    fn from(src: &Source) -> Self {
        Self {
            state: src.state(),
            looping: src.looping(),
            gain: src.gain(),
            buffer: src.first_queued(),
            current: src.current(),
            buffers_queued: src.buffers_queued(),
            buffers_processed: src.buffers_processed(),
        }
    }
}

/// Software mixer
pub struct Mixer {
    config: MixerConfig,
    spec: OutputSpec,
    locks: MixerLocks,
}

impl Mixer {
    /// Build a mixer with a fixed output configuration
    pub fn new(config: MixerConfig) -> MixerResult<Self> {
        config.validate()?;

        log::info!(
            "Mixer: {} Hz {}, quality {}, {} sources / {} buffers{}",
            config.frequency,
            config.format,
            config.quality.display_name(),
            config.max_sources,
            config.max_buffers,
            if config.fake_data { ", fake data" } else { "" }
        );

        Ok(Self {
            spec: config.output_spec(),
            locks: MixerLocks::new(
                SourceStore::with_capacity(config.max_sources),
                BufferStore::with_capacity(config.max_buffers),
                ActiveSlots::new(),
            ),
            config,
        })
    }

    /// Build a mixer from the four classic init parameters
    pub fn init(
        frequency: u32,
        format: Format,
        quality: Quality,
        flags: MixerFlags,
    ) -> MixerResult<Self> {
        Self::new(MixerConfig::new(frequency, format, quality, flags))
    }

    pub fn config(&self) -> &MixerConfig {
        &self.config
    }

    pub fn frequency(&self) -> u32 {
        self.config.frequency
    }

    pub fn format(&self) -> Format {
        self.config.format
    }

    // ─────────────────────────────────────────────────────────────
    // Sources
    // ─────────────────────────────────────────────────────────────

    /// Create `n` sources, all or nothing
    pub fn gen_sources(&self, n: usize) -> MixerResult<Vec<SourceId>> {
        self.locks.sources().sources_mut().generate(n)
    }

    /// Delete sources, all or nothing
    ///
    /// Each source is taken off the active table and its queue released
    /// before it is freed.
    pub fn delete_sources(&self, ids: &[SourceId]) -> MixerResult<()> {
        let mut held = self.locks.all();
        let (sources, buffers, active) = held.parts();

        for &id in ids {
            sources.checked(id, "delete_sources")?;
        }
        for &id in ids {
            let Some(mut src) = sources.remove(id) else {
                continue;
            };
            if active.contains(id) {
                active.deactivate(id);
            }
            src.unqueue_all(buffers);
        }
        Ok(())
    }

    pub fn is_source(&self, id: SourceId) -> bool {
        self.locks.sources().sources().contains(id)
    }

    /// All readable properties of a source
    pub fn source_info(&self, id: SourceId) -> MixerResult<SourceInfo> {
        let held = self.locks.sources();
        held.sources().checked(id, "get_source").map(SourceInfo::from)
    }

    pub fn source_state(&self, id: SourceId) -> MixerResult<SourceState> {
        self.source_info(id).map(|info| info.state)
    }

    pub fn set_looping(&self, id: SourceId, looping: bool) -> MixerResult<()> {
        let mut held = self.locks.sources();
        held.sources_mut().checked_mut(id, "set_looping")?.looping = looping;
        Ok(())
    }

    /// Set the post-resample gain; negative or non-finite values are rejected
    pub fn set_gain(&self, id: SourceId, gain: f32) -> MixerResult<()> {
        let mut held = self.locks.sources();
        let src = held.sources_mut().checked_mut(id, "set_gain")?;
        if !gain.is_finite() || gain < 0.0 {
            log::debug!("set_gain(): bad gain {}", gain);
            return Err(MixerError::InvalidValue);
        }
        src.gain = gain;
        Ok(())
    }

    /// Replace the whole queue with `buffer` (or nothing)
    ///
    /// The old queue is released first, so a rejected buffer still leaves
    /// the source with an empty queue.
    pub fn set_buffer(&self, id: SourceId, buffer: Option<BufferId>) -> MixerResult<()> {
        let mut held = self.locks.all();
        let (sources, buffers, active) = held.parts();
        let src = sources.checked_mut(id, "set_buffer")?;

        if src.buffers_queued() > 0 {
            src.unqueue_all(buffers);
        }

        let mut result = Ok(());
        if let Some(buf) = buffer {
            match buffers.check_queueable(buf, "set_buffer") {
                Ok(_) => src.enqueue(&[buf], buffers),
                Err(e) => result = Err(e),
            }
        }

        if src.buffers_queued() == 0 && src.state.is_active() {
            active.deactivate(id);
            src.state = SourceState::Stopped;
        }
        result
    }

    /// Request a state change; only `Initial` (rewind) is honoured, other
    /// states are logged and ignored
    pub fn set_state(&self, id: SourceId, state: SourceState) -> MixerResult<()> {
        if state != SourceState::Initial {
            let held = self.locks.sources();
            held.sources().checked(id, "set_state")?;
            log::debug!("set_state(): unsupported state {:?}, call ignored", state);
            return Ok(());
        }
        self.rewind(id)
    }

    // ─────────────────────────────────────────────────────────────
    // Playback control
    // ─────────────────────────────────────────────────────────────

    /// Start or resume a source
    ///
    /// A source whose queue was played through starts over from the head.
    /// A source with an empty queue goes straight to STOPPED.
    pub fn play(&self, id: SourceId) -> MixerResult<()> {
        let mut held = self.locks.all();
        let (sources, buffers, active) = held.parts();
        let src = sources.checked_mut(id, "source_play")?;

        if src.buffers_queued() == 0 {
            log::debug!("source_play(): empty queue, source stopped");
            if src.state.is_active() {
                active.deactivate(id);
            }
            src.state = SourceState::Stopped;
            return Ok(());
        }
        if src.is_exhausted() {
            src.rewind_queue(buffers);
        }
        if src.state < SourceState::Playing {
            active.activate(id);
        }
        src.state = SourceState::Playing;
        Ok(())
    }

    /// Pause a source, keeping its queue position
    pub fn pause(&self, id: SourceId) -> MixerResult<()> {
        let mut held = self.locks.all();
        let (sources, _, active) = held.parts();
        let src = sources.checked_mut(id, "source_pause")?;

        if src.state < SourceState::Playing {
            active.activate(id);
        }
        src.state = SourceState::Paused;
        Ok(())
    }

    /// Stop a source and release its queue
    pub fn stop(&self, id: SourceId) -> MixerResult<()> {
        let mut held = self.locks.all();
        let (sources, buffers, active) = held.parts();
        let src = sources.checked_mut(id, "source_stop")?;

        if src.state.is_active() {
            active.deactivate(id);
        }
        src.stop_queue(buffers);
        src.state = SourceState::Stopped;
        Ok(())
    }

    /// Move a source back to the head of its queue, state INITIAL
    pub fn rewind(&self, id: SourceId) -> MixerResult<()> {
        let mut held = self.locks.all();
        let (sources, buffers, active) = held.parts();
        let src = sources.checked_mut(id, "source_rewind")?;

        if src.state.is_active() {
            active.deactivate(id);
        }
        src.rewind_queue(buffers);
        src.state = SourceState::Initial;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // Queueing
    // ─────────────────────────────────────────────────────────────

    /// Append buffers to a source's queue, all or nothing
    ///
    /// Every buffer must be FILLED and listed once.
    pub fn queue_buffers(&self, id: SourceId, ids: &[BufferId]) -> MixerResult<()> {
        let mut held = self.locks.sources().with_buffers();
        let (sources, buffers) = held.parts();

        let mut seen = HashSet::with_capacity(ids.len());
        for &buf in ids {
            buffers.check_queueable(buf, "source_queue_buffers")?;
            if !seen.insert(buf) {
                log::debug!("source_queue_buffers(): buffer listed twice");
                return Err(MixerError::InvalidOperation);
            }
        }

        let src = sources.checked_mut(id, "source_queue_buffers")?;
        src.enqueue(ids, buffers);
        Ok(())
    }

    /// Detach the first `n` buffers of a source's queue
    ///
    /// Fails if `n` exceeds the queue length or any of those buffers is
    /// being played. A PLAYING/PAUSED source left with an empty queue is
    /// stopped.
    pub fn unqueue_buffers(&self, id: SourceId, n: usize) -> MixerResult<Vec<BufferId>> {
        let mut held = self.locks.all();
        let (sources, buffers, active) = held.parts();
        let src = sources.checked_mut(id, "source_unqueue_buffers")?;

        let out = src.unqueue(n, buffers)?;
        if src.buffers_queued() == 0 && src.state.is_active() {
            active.deactivate(id);
            src.state = SourceState::Stopped;
        }
        Ok(out)
    }

    // ─────────────────────────────────────────────────────────────
    // Buffers
    // ─────────────────────────────────────────────────────────────

    /// Create `n` empty buffers, all or nothing
    pub fn gen_buffers(&self, n: usize) -> MixerResult<Vec<BufferId>> {
        self.locks.buffers().generate(n)
    }

    /// Delete buffers, all or nothing; queued or locked buffers are refused
    pub fn delete_buffers(&self, ids: &[BufferId]) -> MixerResult<()> {
        self.locks.buffers().delete(ids)
    }

    pub fn is_buffer(&self, id: BufferId) -> bool {
        self.locks.buffers().contains(id)
    }

    /// Read one property of a buffer's last upload
    pub fn buffer_property(&self, id: BufferId, prop: BufferProperty) -> MixerResult<u64> {
        let buffers = self.locks.buffers();
        buffers.checked(id, "get_buffer_i").map(|buf| buf.property(prop))
    }

    /// Metadata of a buffer's last upload
    pub fn buffer_info(&self, id: BufferId) -> MixerResult<UploadInfo> {
        let buffers = self.locks.buffers();
        buffers.checked(id, "get_buffer_info").map(|buf| buf.upload_info())
    }

    pub fn buffer_state(&self, id: BufferId) -> MixerResult<BufferState> {
        self.locks.buffers().state(id).ok_or(MixerError::InvalidName)
    }

    /// Upload PCM (external representation) into a buffer
    ///
    /// The buffer must be unlocked and not attached to a source. Conversion
    /// to the internal format runs with the buffer lock released; the buffer
    /// is marked locked meanwhile so it can't be queued, read or deleted.
    pub fn buffer_data(
        &self,
        id: BufferId,
        format: Format,
        data: &[u8],
        freq: u32,
    ) -> MixerResult<()> {
        if data.is_empty() || !format.is_supported() || freq == 0 {
            log::debug!(
                "buffer_data(): bad param (format {}, {} bytes, {} Hz)",
                format,
                data.len(),
                freq
            );
            return Err(MixerError::InvalidValue);
        }
        if data.len() > u32::MAX as usize {
            log::debug!("buffer_data(): {} bytes is too large", data.len());
            return Err(MixerError::InvalidValue);
        }

        let internal = convert::internal_format(format, self.config.format);
        {
            let mut buffers = self.locks.buffers();
            let buf = buffers.get_mut(id).ok_or_else(|| {
                log::debug!("buffer_data(): not a buffer");
                MixerError::InvalidName
            })?;
            if buf.locked {
                log::debug!("buffer_data(): called with locked buffer");
                return Err(MixerError::InvalidOperation);
            }
            if buf.state > BufferState::Filled {
                log::debug!("buffer_data(): attempted on in-use buffer");
                return Err(MixerError::InvalidOperation);
            }

            buf.begin_upload(format, data, freq, internal);
            if self.spec.fake_data {
                buf.finish_upload(None, &self.spec);
                return Ok(());
            }
            buf.locked = true;
        }

        let converted = convert::to_internal(data, format, internal);

        let mut buffers = self.locks.buffers();
        match buffers.get_mut(id) {
            Some(buf) => buf.finish_upload(Some(converted), &self.spec),
            None => log::debug!("buffer_data(): buffer vanished during conversion"),
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // Render entry points
    // ─────────────────────────────────────────────────────────────

    /// Render one period into `stream` (external format, interleaved)
    pub fn mix_channels(&self, stream: &mut [u8]) {
        let mut held = self.locks.all();
        let (sources, buffers, active) = held.parts();
        render::mix_channels(sources, buffers, active, &self.spec, stream);
    }

    /// Advance sources through a period of `len` bytes without rendering
    pub fn mix_fake(&self, len: usize) {
        let mut held = self.locks.all();
        let (sources, buffers, active) = held.parts();
        render::mix_fake(sources, buffers, active, &self.spec, len);
    }

    // ─────────────────────────────────────────────────────────────
    // Introspection
    // ─────────────────────────────────────────────────────────────

    /// Whether a source currently holds an active slot
    pub fn is_active(&self, id: SourceId) -> bool {
        self.locks.active().contains(id)
    }

    /// Sources currently holding an active slot, in slot order
    pub fn active_sources(&self) -> Vec<SourceId> {
        self.locks.active().ids().collect()
    }

    /// Live (sources, buffers)
    pub fn object_counts(&self) -> (usize, usize) {
        let mut held = self.locks.sources().with_buffers();
        let (sources, buffers) = held.parts();
        (sources.len(), buffers.len())
    }
}

impl Drop for Mixer {
    fn drop(&mut self) {
        let (sources, buffers) = self.object_counts();
        log::info!(
            "Mixer: shut down with {} sources and {} buffers outstanding",
            sources,
            buffers
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mixer(format: Format) -> Mixer {
        Mixer::init(22050, format, Quality::Medium, MixerFlags::None).unwrap()
    }

    fn s16(values: &[i16]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_ne_bytes()).collect()
    }

    fn filled(mixer: &Mixer, n: usize) -> Vec<BufferId> {
        let ids = mixer.gen_buffers(n).unwrap();
        for (i, &id) in ids.iter().enumerate() {
            mixer.buffer_data(id, Format::MONO16, &s16(&[i as i16; 4]), 22050).unwrap();
        }
        ids
    }

    #[test]
    fn test_init_rejects_bad_config() {
        let bad = Mixer::init(0, Format::MONO16, Quality::Low, MixerFlags::None);
        assert_eq!(bad.err(), Some(MixerError::InvalidValue));
    }

    #[test]
    fn test_buffer_data_states_and_errors() {
        let mixer = mixer(Format::MONO16);
        let id = mixer.gen_buffers(1).unwrap()[0];
        assert_eq!(mixer.buffer_state(id), Ok(BufferState::Initial));

        assert_eq!(
            mixer.buffer_data(id, Format::MONO16, &[], 22050),
            Err(MixerError::InvalidValue)
        );
        assert_eq!(
            mixer.buffer_data(id, Format::make(3, 1), &[0; 6], 22050),
            Err(MixerError::InvalidValue)
        );

        mixer.buffer_data(id, Format::STEREO8, &[0x80; 8], 11025).unwrap();
        assert_eq!(mixer.buffer_state(id), Ok(BufferState::Filled));
        assert_eq!(mixer.buffer_property(id, BufferProperty::Bits), Ok(8));
        assert_eq!(mixer.buffer_property(id, BufferProperty::Channels), Ok(2));
        assert_eq!(mixer.buffer_property(id, BufferProperty::Frequency), Ok(11025));
        assert_eq!(mixer.buffer_property(id, BufferProperty::Size), Ok(8));

        // re-fill allowed while FILLED
        mixer.buffer_data(id, Format::MONO16, &s16(&[1, 2]), 22050).unwrap();
        assert_eq!(mixer.buffer_property(id, BufferProperty::Bits), Ok(16));
    }

    #[test]
    fn test_queued_buffer_cannot_be_refilled_or_deleted() {
        let mixer = mixer(Format::MONO16);
        let src = mixer.gen_sources(1).unwrap()[0];
        let bufs = filled(&mixer, 1);
        mixer.queue_buffers(src, &bufs).unwrap();

        assert_eq!(
            mixer.buffer_data(bufs[0], Format::MONO16, &s16(&[1]), 22050),
            Err(MixerError::InvalidOperation)
        );
        assert_eq!(mixer.delete_buffers(&bufs), Err(MixerError::InvalidOperation));
    }

    #[test]
    fn test_queue_is_all_or_nothing() {
        let mixer = mixer(Format::MONO16);
        let src = mixer.gen_sources(1).unwrap()[0];
        let mut bufs = filled(&mixer, 2);
        bufs.extend(mixer.gen_buffers(1).unwrap());

        assert_eq!(mixer.queue_buffers(src, &bufs), Err(MixerError::InvalidOperation));
        assert_eq!(mixer.source_info(src).unwrap().buffers_queued, 0);
        assert_eq!(mixer.buffer_state(bufs[0]), Ok(BufferState::Filled));

        assert_eq!(
            mixer.queue_buffers(src, &[bufs[0], bufs[0]]),
            Err(MixerError::InvalidOperation)
        );
    }

    #[test]
    fn test_play_empty_queue_stops() {
        let mixer = mixer(Format::MONO16);
        let src = mixer.gen_sources(1).unwrap()[0];
        mixer.play(src).unwrap();
        assert_eq!(mixer.source_state(src), Ok(SourceState::Stopped));
        assert!(!mixer.is_active(src));
    }

    #[test]
    fn test_pause_then_play_keeps_position() {
        let mixer = mixer(Format::MONO16);
        let src = mixer.gen_sources(1).unwrap()[0];
        let buf = mixer.gen_buffers(1).unwrap()[0];
        mixer.buffer_data(buf, Format::MONO16, &s16(&[1, 2, 3, 4]), 22050).unwrap();
        mixer.queue_buffers(src, &[buf]).unwrap();
        mixer.play(src).unwrap();

        let mut out = vec![0u8; 4];
        mixer.mix_channels(&mut out);
        mixer.pause(src).unwrap();
        mixer.mix_channels(&mut out);
        assert_eq!(out, vec![0u8; 4]);
        assert!(mixer.is_active(src));

        mixer.play(src).unwrap();
        mixer.mix_channels(&mut out);
        assert_eq!(out, s16(&[3, 4]));
        assert_eq!(mixer.source_state(src), Ok(SourceState::Stopped));
    }

    #[test]
    fn test_play_after_drain_restarts() {
        let mixer = mixer(Format::MONO16);
        let src = mixer.gen_sources(1).unwrap()[0];
        let buf = mixer.gen_buffers(1).unwrap()[0];
        mixer.buffer_data(buf, Format::MONO16, &s16(&[9]), 22050).unwrap();
        mixer.queue_buffers(src, &[buf]).unwrap();
        mixer.play(src).unwrap();

        let mut out = vec![0u8; 2];
        mixer.mix_channels(&mut out);
        assert_eq!(mixer.source_info(src).unwrap().buffers_processed, 1);

        mixer.play(src).unwrap();
        assert_eq!(mixer.source_info(src).unwrap().buffers_processed, 0);
        mixer.mix_channels(&mut out);
        assert_eq!(out, s16(&[9]));
    }

    #[test]
    fn test_rewind_resets_to_initial() {
        let mixer = mixer(Format::MONO16);
        let src = mixer.gen_sources(1).unwrap()[0];
        let bufs = filled(&mixer, 2);
        mixer.queue_buffers(src, &bufs).unwrap();
        mixer.play(src).unwrap();
        let mut out = vec![0u8; 8];
        mixer.mix_channels(&mut out);

        mixer.set_state(src, SourceState::Initial).unwrap();
        let info = mixer.source_info(src).unwrap();
        assert_eq!(info.state, SourceState::Initial);
        assert_eq!(info.buffers_processed, 0);
        assert!(!mixer.is_active(src));
        assert_eq!(mixer.buffer_state(bufs[0]), Ok(BufferState::Queued));

        // other target states are ignored
        mixer.set_state(src, SourceState::Playing).unwrap();
        assert_eq!(mixer.source_state(src), Ok(SourceState::Initial));
    }

    #[test]
    fn test_set_buffer_replaces_queue() {
        let mixer = mixer(Format::MONO16);
        let src = mixer.gen_sources(1).unwrap()[0];
        let bufs = filled(&mixer, 3);
        mixer.queue_buffers(src, &bufs[..2]).unwrap();

        mixer.set_buffer(src, Some(bufs[2])).unwrap();
        let info = mixer.source_info(src).unwrap();
        assert_eq!(info.buffer, Some(bufs[2]));
        assert_eq!(info.buffers_queued, 1);
        assert_eq!(mixer.buffer_state(bufs[0]), Ok(BufferState::Filled));
        assert_eq!(mixer.buffer_state(bufs[2]), Ok(BufferState::Queued));

        let empty = mixer.gen_buffers(1).unwrap()[0];
        assert_eq!(mixer.set_buffer(src, Some(empty)), Err(MixerError::InvalidOperation));
        assert_eq!(mixer.source_info(src).unwrap().buffers_queued, 0);
        assert_eq!(mixer.buffer_state(bufs[2]), Ok(BufferState::Filled));
    }

    #[test]
    fn test_unqueue_emptying_playing_source_stops_it() {
        let mixer = mixer(Format::MONO16);
        let src = mixer.gen_sources(1).unwrap()[0];
        let bufs = filled(&mixer, 1);
        mixer.queue_buffers(src, &bufs).unwrap();
        mixer.play(src).unwrap();

        assert_eq!(mixer.unqueue_buffers(src, 1).unwrap(), bufs);
        assert_eq!(mixer.source_state(src), Ok(SourceState::Stopped));
        assert!(!mixer.is_active(src));
    }

    #[test]
    fn test_delete_sources_releases_queue() {
        let mixer = mixer(Format::MONO16);
        let srcs = mixer.gen_sources(2).unwrap();
        let bufs = filled(&mixer, 2);
        mixer.queue_buffers(srcs[0], &bufs).unwrap();
        mixer.play(srcs[0]).unwrap();

        mixer.delete_sources(&srcs).unwrap();
        assert!(!mixer.is_source(srcs[0]));
        assert!(mixer.active_sources().is_empty());
        assert_eq!(mixer.buffer_state(bufs[1]), Ok(BufferState::Filled));
        assert!(mixer.delete_buffers(&bufs).is_ok());

        assert_eq!(mixer.delete_sources(&srcs), Err(MixerError::InvalidName));
    }

    #[test]
    fn test_gain_validation() {
        let mixer = mixer(Format::MONO16);
        let src = mixer.gen_sources(1).unwrap()[0];
        assert_eq!(mixer.set_gain(src, -1.0), Err(MixerError::InvalidValue));
        assert_eq!(mixer.set_gain(src, f32::NAN), Err(MixerError::InvalidValue));
        mixer.set_gain(src, 0.5).unwrap();
        assert_eq!(mixer.source_info(src).unwrap().gain, 0.5);
    }

    #[test]
    fn test_fake_data_skips_storage() {
        let mixer = Mixer::init(22050, Format::MONO8, Quality::Low, MixerFlags::FakeData).unwrap();
        let src = mixer.gen_sources(1).unwrap()[0];
        let buf = mixer.gen_buffers(1).unwrap()[0];
        mixer.buffer_data(buf, Format::MONO8, &[0xff; 4], 22050).unwrap();
        mixer.queue_buffers(src, &[buf]).unwrap();
        mixer.play(src).unwrap();

        let mut out = vec![0u8; 4];
        mixer.mix_channels(&mut out);
        assert_eq!(out, vec![0x80; 4]);
        assert_eq!(mixer.source_info(src).unwrap().buffers_processed, 1);
        assert_eq!(mixer.source_state(src), Ok(SourceState::Stopped));
    }
}
