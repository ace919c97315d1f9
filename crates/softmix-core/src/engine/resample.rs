//! Resampling engine
//!
//! Each buffer picks one strategy at upload time from the ratio of its rate
//! to the mixer rate:
//!
//! | Ratio            | Strategy                          |
//! |------------------|-----------------------------------|
//! | equal            | `Identity`: straight read         |
//! | source > mixer   | `Nearest`                         |
//! | source < mixer   | `Nearest` / `Linear` / `Cubic` by quality tier |
//!
//! Playback position is a byte offset (`pos`) into the current buffer plus a
//! 16-bit fractional accumulator (`count`). Each output sample advances
//! `pos` by the buffer's `high` step and `count` by its `low` step,
//! carrying one internal frame into `pos` when `count` overflows.
//!
//! Interpolating strategies look one frame back and up to two frames ahead.
//! Neighbours past the edge of the current buffer are taken from the
//! previous/next buffer in the queue when those hold enough data, and
//! otherwise repeat the nearest available sample. Reads never go out of
//! bounds.

use super::buffer::Buffer;
use crate::config::OutputSpec;
use crate::sample;
use crate::types::Quality;

/// Fractional accumulator range (16.16 fixed point)
const FRACTION_ONE: u32 = 0x1_0000;

/// Per-buffer sampling strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resampler {
    #[default]
    Identity,
    Nearest,
    Linear,
    Cubic,
}

impl Resampler {
    /// Strategy for a buffer at `source_freq` on a mixer at `mixer_freq`
    pub fn select(source_freq: u32, mixer_freq: u32, quality: Quality) -> Self {
        if source_freq == mixer_freq {
            Resampler::Identity
        } else if source_freq < mixer_freq {
            match quality {
                Quality::Low => Resampler::Nearest,
                Quality::Medium => Resampler::Linear,
                Quality::High => Resampler::Cubic,
            }
        } else {
            Resampler::Nearest
        }
    }

    /// Produce the next sample of `window.curr` for one output channel and
    /// advance `cursor`
    pub(crate) fn next_sample(
        self,
        cursor: &mut Cursor,
        window: &Window<'_>,
        spec: &OutputSpec,
        left: bool,
    ) -> f32 {
        match self {
            Resampler::Identity => identity(cursor, window, spec),
            Resampler::Nearest => nearest(cursor, window, spec, left),
            Resampler::Linear => linear(cursor, window, spec, left),
            Resampler::Cubic => cubic(cursor, window, spec, left),
        }
    }
}

/// Playback position within the current buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Cursor {
    /// Byte offset into the current buffer's internal data
    pub pos: usize,
    /// Fractional position, `0..0x10000`
    pub count: u32,
}

impl Cursor {
    /// Step one output sample through `curr`
    ///
    /// A stereo buffer on a stereo mixer only steps on the right channel;
    /// the right channel then reads one channel width past the frame start.
    /// Returns the offset to add to the pre-advance position for the read.
    #[inline]
    pub fn advance(&mut self, curr: &Buffer, spec: &OutputSpec, left: bool) -> usize {
        let stereo_pair = curr.upload.channels == 2 && spec.channels == 2;
        if stereo_pair && left {
            return 0;
        }

        self.pos += curr.step.high;
        self.count += curr.step.low;
        if self.count >= FRACTION_ONE {
            self.count -= FRACTION_ONE;
            self.pos += curr.sampsize;
        }

        if stereo_pair {
            spec.chansize
        } else {
            0
        }
    }

    /// Fractional position as `0.0..1.0`
    #[inline]
    fn fraction(&self) -> f32 {
        self.count as f32 / FRACTION_ONE as f32
    }
}

/// The buffers around the read position
pub(crate) struct Window<'a> {
    /// Buffer consumed just before `curr`
    pub prev: Option<&'a Buffer>,
    pub curr: &'a Buffer,
    /// Buffer queued right after `curr`
    pub next: Option<&'a Buffer>,
}

/// Where one sample lives: a buffer's bytes and an offset into them
type Tap<'a> = (&'a [u8], usize);

#[inline]
fn read(tap: Tap<'_>, spec: &OutputSpec) -> f32 {
    sample::internal_at(tap.0, tap.1, spec.chansize)
}

/// First sample of `buf` for the current channel
#[inline]
fn head_of<'a>(buf: &'a Buffer, spec: &OutputSpec, left: bool) -> Tap<'a> {
    (buf.bytes(), if left { 0 } else { spec.chansize })
}

fn identity(cursor: &mut Cursor, window: &Window<'_>, spec: &OutputSpec) -> f32 {
    let at = cursor.pos;
    cursor.pos += spec.chansize;
    read((window.curr.bytes(), at), spec)
}

fn nearest(cursor: &mut Cursor, window: &Window<'_>, spec: &OutputSpec, left: bool) -> f32 {
    let mut at = cursor.pos;
    at += cursor.advance(window.curr, spec, left);
    read((window.curr.bytes(), at), spec)
}

fn linear(cursor: &mut Cursor, window: &Window<'_>, spec: &OutputSpec, left: bool) -> f32 {
    let curr = window.curr;
    let data = curr.bytes();
    let step = curr.sampsize;

    let t = cursor.fraction();
    let d0 = cursor.pos + cursor.advance(curr, spec, left);

    let t1: Tap<'_> = if d0 + step >= curr.size {
        match window.next {
            Some(next) if next.has_data(step) => head_of(next, spec, left),
            _ => (data, d0),
        }
    } else {
        (data, d0 + step)
    };

    let s0 = read((data, d0), spec);
    let s1 = read(t1, spec);
    s0 + t * (s1 - s0)
}

fn cubic(cursor: &mut Cursor, window: &Window<'_>, spec: &OutputSpec, left: bool) -> f32 {
    let curr = window.curr;
    let data = curr.bytes();
    let step = curr.sampsize;

    let t = cursor.fraction();
    let t2 = t * t;
    let d1 = cursor.pos + cursor.advance(curr, spec, left);
    let tap1: Tap<'_> = (data, d1);

    let tap0: Tap<'_> = if d1 < step {
        match window.prev {
            Some(prev) if prev.has_data(step) => {
                let at = prev.size - step + if left { 0 } else { spec.chansize };
                (prev.bytes(), at)
            }
            _ => tap1,
        }
    } else {
        (data, d1 - step)
    };

    let (tap2, tap3): (Tap<'_>, Tap<'_>) = if d1 + step >= curr.size {
        match window.next {
            Some(next) if next.has_data(step * 2) => {
                let (bytes, at) = head_of(next, spec, left);
                ((bytes, at), (bytes, at + step))
            }
            _ => (tap1, tap1),
        }
    } else {
        let d2 = d1 + step;
        let tap3 = if d2 + step >= curr.size {
            match window.next {
                Some(next) if next.has_data(step) => head_of(next, spec, left),
                _ => (data, d2),
            }
        } else {
            (data, d2 + step)
        };
        ((data, d2), tap3)
    };

    let s0 = read(tap0, spec);
    let s1 = read(tap1, spec);
    let s2 = read(tap2, spec);
    let s3 = read(tap3, spec);

    catmull_rom(s0, s1, s2, s3, t, t2)
}

/// Catmull-Rom segment between `s1` and `s2`
#[inline]
fn catmull_rom(s0: f32, s1: f32, s2: f32, s3: f32, t: f32, t2: f32) -> f32 {
    let a = (3.0 * (s1 - s2) - s0 + s3) * 0.5;
    let b = 2.0 * s2 + s0 - (5.0 * s1 + s3) * 0.5;
    let c = (s2 - s0) * 0.5;
    a * t2 * t + b * t2 + c * t + s1
}
