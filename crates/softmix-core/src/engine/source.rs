//! Source objects and their buffer queues
//!
//! A source's queue is an ordered list of buffer handles plus a cursor:
//!
//! ```text
//!   queue:  [ b0 | b1 | b2 | b3 ]
//!             ^^^^^^^    ^
//!            processed  cursor (next buffer to read)
//! ```
//!
//! Buffers before the cursor have been consumed by the render path and stay
//! queued until the control thread unqueues them. The buffer just before
//! the cursor is the interpolation history for the cubic resampler.
//!
//! Queue mutations here touch buffer states, so callers hold both the source
//! and buffer locks. Activation is handled by the caller.

use std::collections::VecDeque;

use super::buffer::BufferStore;
use super::handle::{Arena, BufferId, SourceId};
use super::resample::Cursor;
use crate::error::{MixerError, MixerResult};
use crate::types::{BufferState, SourceState};

/// One playback source
#[derive(Debug)]
pub struct Source {
    pub(crate) state: SourceState,
    pub(crate) looping: bool,
    pub(crate) gain: f32,
    pub(crate) queue: VecDeque<BufferId>,
    /// Index into `queue` of the next buffer to read; `queue.len()` when
    /// the queue has been played through
    pub(crate) cursor: usize,
    /// Buffers before the cursor marked PROCESSED
    pub(crate) processed: usize,
    pub(crate) play: Cursor,
    /// Last left-channel sample, replayed on the right for mono buffers
    pub(crate) sample_cache: f32,
}

impl Default for Source {
    fn default() -> Self {
        Self {
            state: SourceState::Initial,
            looping: false,
            gain: 1.0,
            queue: VecDeque::new(),
            cursor: 0,
            processed: 0,
            play: Cursor::default(),
            sample_cache: 0.0,
        }
    }
}

impl Source {
    pub fn state(&self) -> SourceState {
        self.state
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn buffers_queued(&self) -> usize {
        self.queue.len()
    }

    pub fn buffers_processed(&self) -> usize {
        self.processed
    }

    /// Head of the queue
    pub fn first_queued(&self) -> Option<BufferId> {
        self.queue.front().copied()
    }

    /// Buffer the render path reads next
    #[inline]
    pub fn current(&self) -> Option<BufferId> {
        self.queue.get(self.cursor).copied()
    }

    /// Buffer read just before the current one
    #[inline]
    pub(crate) fn previous(&self) -> Option<BufferId> {
        self.cursor.checked_sub(1).and_then(|i| self.queue.get(i).copied())
    }

    /// Buffer queued after the current one
    #[inline]
    pub(crate) fn following(&self) -> Option<BufferId> {
        self.queue.get(self.cursor + 1).copied()
    }

    /// Whether the queue holds buffers but all of them were played through
    pub fn is_exhausted(&self) -> bool {
        !self.queue.is_empty() && self.cursor >= self.queue.len()
    }

    fn reset_position(&mut self) {
        self.cursor = 0;
        self.play = Cursor::default();
    }

    /// Append already-validated buffers and mark them QUEUED
    pub(crate) fn enqueue(&mut self, ids: &[BufferId], buffers: &mut BufferStore) {
        for &id in ids {
            self.queue.push_back(id);
            buffers.set_state(id, BufferState::Queued);
        }
    }

    /// Detach the first `n` buffers and return them to FILLED
    ///
    /// Fails without touching anything if fewer than `n` buffers are queued
    /// or one of them is being read by the render path.
    pub(crate) fn unqueue(
        &mut self,
        n: usize,
        buffers: &mut BufferStore,
    ) -> MixerResult<Vec<BufferId>> {
        if n > self.queue.len() {
            log::debug!(
                "source_unqueue_buffers(): {} requested, {} queued",
                n,
                self.queue.len()
            );
            return Err(MixerError::InvalidOperation);
        }
        let busy = self
            .queue
            .iter()
            .take(n)
            .any(|&id| buffers.state(id) == Some(BufferState::Playing));
        if busy {
            log::debug!("source_unqueue_buffers(): active buffer attempted");
            return Err(MixerError::InvalidOperation);
        }

        let mut out = Vec::with_capacity(n);
        for id in self.queue.drain(..n) {
            if buffers.state(id) == Some(BufferState::Processed) {
                self.processed = self.processed.saturating_sub(1);
            }
            buffers.set_state(id, BufferState::Filled);
            out.push(id);
        }
        self.cursor = self.cursor.saturating_sub(n);
        Ok(out)
    }

    /// Release the whole queue, every buffer back to FILLED
    pub(crate) fn unqueue_all(&mut self, buffers: &mut BufferStore) {
        for id in self.queue.drain(..) {
            if buffers.state(id) == Some(BufferState::Playing) {
                log::debug!("source_unqueue_all(): attempted on active buffer");
            }
            buffers.set_state(id, BufferState::Filled);
        }
        self.processed = 0;
        self.reset_position();
    }

    /// Queue reset performed by stop: pending and processed buffers are
    /// both released
    pub(crate) fn stop_queue(&mut self, buffers: &mut BufferStore) {
        if self.queue.is_empty() {
            self.processed = 0;
            self.reset_position();
            return;
        }

        let in_sync = self.cursor <= self.queue.len() && self.processed <= self.queue.len();
        if !in_sync {
            log::debug!(
                "source_stop(): desynced source state (cursor {}, processed {}, queued {})",
                self.cursor,
                self.processed,
                self.queue.len()
            );
        }
        debug_assert!(in_sync, "source queue desync");

        self.unqueue_all(buffers);
    }

    /// Mark every queued buffer QUEUED again and move the cursor to the head
    pub(crate) fn rewind_queue(&mut self, buffers: &mut BufferStore) {
        for &id in self.queue.iter() {
            buffers.set_state(id, BufferState::Queued);
        }
        self.processed = 0;
        self.reset_position();
    }

    /// Current buffer is done: mark it PROCESSED and move to the next one
    pub(crate) fn finish_current(&mut self, buffers: &mut BufferStore) {
        if let Some(id) = self.current() {
            buffers.set_state(id, BufferState::Processed);
            self.processed += 1;
        }
        self.cursor += 1;
        self.play.pos = 0;
    }
}

/// Fixed-capacity source table
pub(crate) struct SourceStore {
    arena: Arena<SourceId, Source>,
}

impl SourceStore {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            arena: Arena::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Allocate `n` sources in INITIAL state, all or nothing
    pub fn generate(&mut self, n: usize) -> MixerResult<Vec<SourceId>> {
        if n > self.arena.available() {
            log::debug!(
                "gen_sources(): {} requested, {} of {} slots free",
                n,
                self.arena.available(),
                self.arena.capacity()
            );
            return Err(MixerError::OutOfMemory);
        }
        Ok((0..n)
            .filter_map(|_| self.arena.insert(Source::default()))
            .collect())
    }

    pub fn remove(&mut self, id: SourceId) -> Option<Source> {
        self.arena.remove(id)
    }

    #[inline]
    pub fn get(&self, id: SourceId) -> Option<&Source> {
        self.arena.get(id)
    }

    #[inline]
    pub fn get_mut(&mut self, id: SourceId) -> Option<&mut Source> {
        self.arena.get_mut(id)
    }

    pub fn contains(&self, id: SourceId) -> bool {
        self.arena.contains(id)
    }

    /// Look up a live source, logging `op` on failure
    pub fn checked(&self, id: SourceId, op: &str) -> MixerResult<&Source> {
        self.arena.get(id).ok_or_else(|| {
            log::debug!("{}(): not a source", op);
            MixerError::InvalidName
        })
    }

    /// Mutable variant of [`SourceStore::checked`]
    pub fn checked_mut(&mut self, id: SourceId, op: &str) -> MixerResult<&mut Source> {
        self.arena.get_mut(id).ok_or_else(|| {
            log::debug!("{}(): not a source", op);
            MixerError::InvalidName
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(n: usize) -> (Source, BufferStore, Vec<BufferId>) {
        let mut buffers = BufferStore::with_capacity(16);
        let ids = buffers.generate(n).unwrap();
        for &id in &ids {
            buffers.set_state(id, BufferState::Filled);
        }
        let mut src = Source::default();
        src.enqueue(&ids, &mut buffers);
        (src, buffers, ids)
    }

    #[test]
    fn test_enqueue_marks_queued() {
        let (src, buffers, ids) = setup(3);
        assert_eq!(src.buffers_queued(), 3);
        assert_eq!(src.current(), Some(ids[0]));
        assert_eq!(src.previous(), None);
        assert_eq!(src.following(), Some(ids[1]));
        assert!(ids.iter().all(|&id| buffers.state(id) == Some(BufferState::Queued)));
    }

    #[test]
    fn test_finish_current_moves_cursor() {
        let (mut src, mut buffers, ids) = setup(2);
        src.finish_current(&mut buffers);
        assert_eq!(src.current(), Some(ids[1]));
        assert_eq!(src.previous(), Some(ids[0]));
        assert_eq!(src.buffers_processed(), 1);
        assert_eq!(buffers.state(ids[0]), Some(BufferState::Processed));

        src.finish_current(&mut buffers);
        assert!(src.is_exhausted());
        assert_eq!(src.current(), None);
    }

    #[test]
    fn test_unqueue_processed() {
        let (mut src, mut buffers, ids) = setup(3);
        src.finish_current(&mut buffers);

        let out = src.unqueue(1, &mut buffers).unwrap();
        assert_eq!(out, vec![ids[0]]);
        assert_eq!(src.buffers_processed(), 0);
        assert_eq!(src.buffers_queued(), 2);
        assert_eq!(src.current(), Some(ids[1]));
        assert_eq!(buffers.state(ids[0]), Some(BufferState::Filled));
    }

    #[test]
    fn test_unqueue_rejects_playing_and_overflow() {
        let (mut src, mut buffers, ids) = setup(2);
        assert_eq!(src.unqueue(3, &mut buffers), Err(MixerError::InvalidOperation));

        buffers.set_state(ids[0], BufferState::Playing);
        assert_eq!(src.unqueue(1, &mut buffers), Err(MixerError::InvalidOperation));
        assert_eq!(src.buffers_queued(), 2);
    }

    #[test]
    fn test_stop_queue_releases_everything() {
        let (mut src, mut buffers, ids) = setup(3);
        src.finish_current(&mut buffers);
        buffers.set_state(ids[1], BufferState::Playing);
        src.play.pos = 8;

        src.stop_queue(&mut buffers);
        assert_eq!(src.buffers_queued(), 0);
        assert_eq!(src.buffers_processed(), 0);
        assert_eq!(src.play, Cursor::default());
        assert!(ids.iter().all(|&id| buffers.state(id) == Some(BufferState::Filled)));
    }

    #[test]
    fn test_rewind_requeues() {
        let (mut src, mut buffers, ids) = setup(2);
        src.finish_current(&mut buffers);
        src.finish_current(&mut buffers);

        src.rewind_queue(&mut buffers);
        assert_eq!(src.current(), Some(ids[0]));
        assert_eq!(src.buffers_processed(), 0);
        assert!(ids.iter().all(|&id| buffers.state(id) == Some(BufferState::Queued)));
    }

    #[test]
    fn test_store_generate_and_check() {
        let mut store = SourceStore::with_capacity(2);
        let ids = store.generate(2).unwrap();
        assert_eq!(store.generate(1), Err(MixerError::OutOfMemory));

        assert_eq!(store.checked(ids[0], "test").unwrap().gain(), 1.0);
        store.remove(ids[0]);
        assert_eq!(store.checked(ids[0], "test").err(), Some(MixerError::InvalidName));
    }
}
