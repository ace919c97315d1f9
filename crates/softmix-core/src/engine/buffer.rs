//! Buffer objects
//!
//! A buffer holds one chunk of PCM in the mixer's internal format plus the
//! metadata of the original upload, which is what property queries report.

use super::handle::{Arena, BufferId};
use super::resample::Resampler;
use crate::config::OutputSpec;
use crate::error::{MixerError, MixerResult};
use crate::format::Format;
use crate::types::{BufferProperty, BufferState};

/// Metadata of the last upload, reported verbatim by property queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadInfo {
    /// Address of the caller's data at upload time (never dereferenced)
    pub data: usize,
    pub frequency: u32,
    pub size: usize,
    pub channels: u32,
    pub bytes_per_channel: u32,
}

/// Fixed-point playback step and resampler, computed once per upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Step {
    /// Whole bytes to advance per output sample
    pub high: usize,
    /// Fractional advance, 16.16
    pub low: u32,
    pub resampler: Resampler,
}

impl Default for Step {
    fn default() -> Self {
        Self {
            high: 0,
            low: 0,
            resampler: Resampler::Identity,
        }
    }
}

impl Step {
    pub fn new(source_freq: u32, spec: &OutputSpec, sampsize: usize) -> Self {
        let mixer_freq = spec.frequency;
        let high = (source_freq / mixer_freq) as usize * sampsize;
        let low = (((source_freq % mixer_freq) as u64) << 16) / mixer_freq as u64;
        Self {
            high,
            low: low as u32,
            resampler: Resampler::select(source_freq, mixer_freq, spec.quality),
        }
    }
}

/// One PCM buffer
#[derive(Debug, Default)]
pub struct Buffer {
    /// Set while an upload converts data outside the buffer lock
    pub(crate) locked: bool,
    pub(crate) state: BufferState,
    /// Internal-format samples; `None` in fake-data mode or before upload
    pub(crate) data: Option<Vec<u8>>,
    /// Byte length of the internal data (tracked even without data)
    pub(crate) size: usize,
    /// Bytes per internal frame
    pub(crate) sampsize: usize,
    pub(crate) step: Step,
    pub(crate) upload: UploadInfo,
}

impl Buffer {
    pub fn upload_info(&self) -> UploadInfo {
        self.upload
    }

    /// Internal data, empty if none was stored
    #[inline]
    pub(crate) fn bytes(&self) -> &[u8] {
        self.data.as_deref().unwrap_or(&[])
    }

    /// Whether this buffer holds real data at least `len` bytes long
    #[inline]
    pub(crate) fn has_data(&self, len: usize) -> bool {
        self.data.as_ref().map_or(false, |d| d.len() >= len)
    }

    /// Read one property of the original upload
    pub fn property(&self, prop: BufferProperty) -> u64 {
        match prop {
            BufferProperty::Frequency => self.upload.frequency as u64,
            BufferProperty::Bits => (self.upload.bytes_per_channel * 8) as u64,
            BufferProperty::Channels => self.upload.channels as u64,
            BufferProperty::Size => self.upload.size as u64,
            BufferProperty::Data => self.upload.data as u64,
        }
    }

    /// Record upload metadata and size the internal storage
    ///
    /// Clears any previous data; the caller stores converted data and calls
    /// [`Buffer::finish_upload`].
    pub(crate) fn begin_upload(
        &mut self,
        format: Format,
        data: &[u8],
        freq: u32,
        internal: Format,
    ) {
        self.data = None;
        self.upload = UploadInfo {
            data: data.as_ptr() as usize,
            frequency: freq,
            size: data.len(),
            channels: format.channels(),
            bytes_per_channel: format.bytes_per_channel(),
        };
        self.sampsize = internal.sample_size() as usize;
        self.size = data.len() / format.sample_size() as usize * self.sampsize;
    }

    pub(crate) fn finish_upload(&mut self, data: Option<Vec<u8>>, spec: &OutputSpec) {
        self.data = data;
        self.locked = false;
        self.state = BufferState::Filled;
        self.step = Step::new(self.upload.frequency, spec, self.sampsize);
    }
}

/// Fixed-capacity buffer table
pub(crate) struct BufferStore {
    arena: Arena<BufferId, Buffer>,
}

impl BufferStore {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            arena: Arena::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Allocate `n` empty buffers, all or nothing
    pub fn generate(&mut self, n: usize) -> MixerResult<Vec<BufferId>> {
        if n > self.arena.available() {
            log::debug!(
                "gen_buffers(): {} requested, {} of {} slots free",
                n,
                self.arena.available(),
                self.arena.capacity()
            );
            return Err(MixerError::OutOfMemory);
        }
        Ok((0..n)
            .filter_map(|_| self.arena.insert(Buffer::default()))
            .collect())
    }

    /// Free `ids`, all or nothing: every id must be live, unlocked and not
    /// attached to a source
    pub fn delete(&mut self, ids: &[BufferId]) -> MixerResult<()> {
        for &id in ids {
            let buf = self.arena.get(id).ok_or_else(|| {
                log::debug!("delete_buffers(): not a buffer");
                MixerError::InvalidName
            })?;
            if buf.locked {
                log::debug!("delete_buffers(): locked buffer attempted");
                return Err(MixerError::InvalidOperation);
            }
            if buf.state >= BufferState::Queued {
                log::debug!("delete_buffers(): attempted on queued buffer");
                return Err(MixerError::InvalidOperation);
            }
        }
        for &id in ids {
            self.arena.remove(id);
        }
        Ok(())
    }

    #[inline]
    pub fn get(&self, id: BufferId) -> Option<&Buffer> {
        self.arena.get(id)
    }

    #[inline]
    pub fn get_mut(&mut self, id: BufferId) -> Option<&mut Buffer> {
        self.arena.get_mut(id)
    }

    pub fn contains(&self, id: BufferId) -> bool {
        self.arena.contains(id)
    }

    /// Look up a buffer that is readable: live and not mid-upload
    pub fn checked(&self, id: BufferId, op: &str) -> MixerResult<&Buffer> {
        let buf = self.arena.get(id).ok_or_else(|| {
            log::debug!("{}(): not a buffer", op);
            MixerError::InvalidName
        })?;
        if buf.locked {
            log::debug!("{}(): locked buffer attempted", op);
            return Err(MixerError::InvalidOperation);
        }
        Ok(buf)
    }

    /// Look up a buffer that can be attached to a source: readable and
    /// FILLED
    pub fn check_queueable(&self, id: BufferId, op: &str) -> MixerResult<&Buffer> {
        let buf = self.checked(id, op)?;
        if buf.state != BufferState::Filled {
            log::debug!("{}(): invalid buffer attempted ({:?})", op, buf.state);
            return Err(MixerError::InvalidOperation);
        }
        Ok(buf)
    }

    pub fn set_state(&mut self, id: BufferId, state: BufferState) {
        if let Some(buf) = self.arena.get_mut(id) {
            buf.state = state;
        }
    }

    pub fn state(&self, id: BufferId) -> Option<BufferState> {
        self.arena.get(id).map(|b| b.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MixerConfig;
    use crate::types::{MixerFlags, Quality};

    fn spec(freq: u32, quality: Quality) -> OutputSpec {
        MixerConfig::new(freq, Format::STEREO16, quality, MixerFlags::None).output_spec()
    }

    #[test]
    fn test_step_identity() {
        let step = Step::new(44100, &spec(44100, Quality::High), 4);
        assert_eq!(step.high, 4);
        assert_eq!(step.low, 0);
        assert_eq!(step.resampler, Resampler::Identity);
    }

    #[test]
    fn test_step_upsample() {
        let step = Step::new(22050, &spec(44100, Quality::Medium), 4);
        assert_eq!(step.high, 0);
        assert_eq!(step.low, 0x8000);
        assert_eq!(step.resampler, Resampler::Linear);
    }

    #[test]
    fn test_step_downsample() {
        let step = Step::new(48000, &spec(44100, Quality::High), 2);
        assert_eq!(step.high, 2);
        assert_eq!(step.low, ((3900u64 << 16) / 44100) as u32);
        assert_eq!(step.resampler, Resampler::Nearest);
    }

    #[test]
    fn test_generate_is_all_or_nothing() {
        let mut store = BufferStore::with_capacity(3);
        assert_eq!(store.generate(2).unwrap().len(), 2);
        assert_eq!(store.generate(2), Err(MixerError::OutOfMemory));
        assert_eq!(store.len(), 2);
        assert_eq!(store.generate(0).unwrap().len(), 0);
    }

    #[test]
    fn test_delete_rejects_queued() {
        let mut store = BufferStore::with_capacity(4);
        let ids = store.generate(2).unwrap();
        store.set_state(ids[1], BufferState::Queued);

        assert_eq!(store.delete(&ids), Err(MixerError::InvalidOperation));
        assert!(store.contains(ids[0]));

        store.set_state(ids[1], BufferState::Filled);
        assert!(store.delete(&ids).is_ok());
        assert!(!store.contains(ids[0]));
        assert_eq!(store.delete(&ids[..1]), Err(MixerError::InvalidName));
    }

    #[test]
    fn test_properties_report_upload() {
        let mut buf = Buffer::default();
        let data = vec![0u8; 10];
        buf.begin_upload(Format::STEREO8, &data, 11025, Format::STEREO16);
        assert_eq!(buf.size, 20);
        assert_eq!(buf.property(BufferProperty::Bits), 8);
        assert_eq!(buf.property(BufferProperty::Channels), 2);
        assert_eq!(buf.property(BufferProperty::Size), 10);
        assert_eq!(buf.property(BufferProperty::Frequency), 11025);
        assert_eq!(buf.property(BufferProperty::Data), data.as_ptr() as u64);
    }
}
