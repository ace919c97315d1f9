//! Render path
//!
//! Runs once per output period with all three locks held. For every output
//! channel sample it walks the active-slot table, pulls one resampled and
//! gain-scaled sample from each PLAYING source, sums, clips and writes.
//! Nothing here allocates, blocks or logs per sample.
//!
//! Buffer bookkeeping happens as samples are pulled: the buffer being read
//! is PLAYING, an exhausted buffer becomes PROCESSED and the source moves
//! to its next queued buffer. A source that runs out of buffers is dropped
//! from the active table and STOPPED right away, unless it loops, in which
//! case its queue is rewound in place.

use super::active::ActiveSlots;
use super::buffer::BufferStore;
use super::resample::Window;
use super::source::{Source, SourceStore};
use crate::config::OutputSpec;
use crate::sample;
use crate::types::{BufferState, SourceState, MAX_SOURCES};

/// Mix one period into `stream` (external format, interleaved)
///
/// Trailing bytes that don't form a whole channel sample are zeroed.
pub(crate) fn mix_channels(
    sources: &mut SourceStore,
    buffers: &mut BufferStore,
    active: &mut ActiveSlots,
    spec: &OutputSpec,
    stream: &mut [u8],
) {
    let mut left = true;
    let mut chunks = stream.chunks_exact_mut(spec.chansize);

    for out in &mut chunks {
        let mut full = 0.0f32;
        for slot in 0..MAX_SOURCES {
            let pulled = pull_slot(slot, sources, buffers, active, spec, left, spec.fake_data);
            if let Some(samp) = pulled {
                full += samp;
            }
        }

        sample::to_external(out, spec.chansize, sample::clip(full, spec.chansize));
        if spec.channels == 2 {
            left = !left;
        }
    }

    chunks.into_remainder().fill(0);
}

/// Advance sources through one period of `len` bytes without producing audio
pub(crate) fn mix_fake(
    sources: &mut SourceStore,
    buffers: &mut BufferStore,
    active: &mut ActiveSlots,
    spec: &OutputSpec,
    len: usize,
) {
    let mut left = true;
    for _ in 0..len / spec.chansize {
        for slot in 0..MAX_SOURCES {
            pull_slot(slot, sources, buffers, active, spec, left, true);
        }
        if spec.channels == 2 {
            left = !left;
        }
    }
}

/// Pull one sample from the source in `slot`, retiring it if it ran dry
fn pull_slot(
    slot: usize,
    sources: &mut SourceStore,
    buffers: &mut BufferStore,
    active: &mut ActiveSlots,
    spec: &OutputSpec,
    left: bool,
    fake: bool,
) -> Option<f32> {
    let id = active.get(slot)?;
    let Some(src) = sources.get_mut(id) else {
        active.clear(slot);
        return None;
    };
    if src.state != SourceState::Playing {
        return None;
    }

    let samp = if fake {
        pull_fake(src, buffers, spec, left)
    } else {
        pull(src, buffers, spec, left)
    };

    if src.current().is_none() {
        active.clear(slot);
        src.state = SourceState::Stopped;
    }
    samp
}

/// Next real sample of `src`, skipping buffers too short to play
///
/// A looping source whose skips run off the end of its queue is rewound
/// once; a queue with nothing playable still ends.
fn pull(src: &mut Source, buffers: &mut BufferStore, spec: &OutputSpec, left: bool) -> Option<f32> {
    let mut rewound = false;
    loop {
        let Some(id) = src.current() else {
            if src.looping && !rewound && src.buffers_queued() > 0 {
                src.rewind_queue(buffers);
                rewound = true;
                continue;
            }
            return None;
        };
        let prev = src.previous();
        let next = src.following();

        let (samp, size, sampsize) = {
            let Some(curr) = buffers.get(id) else {
                src.finish_current(buffers);
                continue;
            };
            if curr.size < curr.sampsize || !curr.has_data(curr.sampsize) {
                src.finish_current(buffers);
                continue;
            }

            let samp = if !left && curr.upload.channels == 1 {
                src.sample_cache
            } else {
                let window = Window {
                    prev: prev.and_then(|p| buffers.get(p)),
                    curr,
                    next: next.and_then(|n| buffers.get(n)),
                };
                let resampler = curr.step.resampler;
                let samp = resampler.next_sample(&mut src.play, &window, spec, left) * src.gain;
                src.sample_cache = samp;
                samp
            };
            (samp, curr.size, curr.sampsize)
        };

        settle(src, buffers, spec, left, size, sampsize);
        return Some(samp);
    }
}

/// Bookkeeping-only counterpart of [`pull`]: positions advance as if the
/// buffer had been read, the sample is silence
fn pull_fake(
    src: &mut Source,
    buffers: &mut BufferStore,
    spec: &OutputSpec,
    left: bool,
) -> Option<f32> {
    let id = src.current()?;
    let Some(curr) = buffers.get(id) else {
        src.finish_current(buffers);
        return Some(0.0);
    };

    if left || curr.upload.channels != 1 {
        if curr.upload.frequency == spec.frequency {
            src.play.pos += spec.chansize;
        } else {
            src.play.advance(curr, spec, left);
        }
    }
    let (size, sampsize) = (curr.size, curr.sampsize);

    settle(src, buffers, spec, left, size, sampsize);
    Some(0.0)
}

/// Update the current buffer after a read: still PLAYING, or exhausted
fn settle(
    src: &mut Source,
    buffers: &mut BufferStore,
    spec: &OutputSpec,
    left: bool,
    size: usize,
    sampsize: usize,
) {
    // a narrower-than-output buffer finishes its frame on the right channel
    let keep = src.play.pos < size || (left && sampsize != spec.sampsize);
    if keep {
        if let Some(id) = src.current() {
            buffers.set_state(id, BufferState::Playing);
        }
        return;
    }

    src.finish_current(buffers);
    if src.current().is_none() && src.looping {
        src.rewind_queue(buffers);
    }
}
