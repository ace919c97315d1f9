//! Upload normalization
//!
//! Uploaded PCM is stored in the mixer's internal representation: the
//! mixer's sample width, signed, and either the mixer's channel count or
//! mono when the upload has fewer channels than the mixer. Mono data on a
//! stereo mixer is not duplicated; the render path serves the right channel
//! from the left.

use crate::format::Format;
use crate::sample;

/// Per-sample conversion steps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ConvFlags {
    stereo_up: bool,
    stereo_down: bool,
    size_up: bool,
    size_down: bool,
}

impl ConvFlags {
    fn between(src: Format, dst: Format) -> Self {
        let (src_bpc, dst_bpc) = (src.bytes_per_channel(), dst.bytes_per_channel());
        let (src_chans, dst_chans) = (src.channels(), dst.channels());
        Self {
            stereo_up: src_chans < dst_chans,
            stereo_down: src_chans > dst_chans,
            size_up: src_bpc < dst_bpc,
            size_down: src_bpc > dst_bpc,
        }
    }
}

/// Internal storage format for an upload in `upload` format on a mixer
/// running `mixer`
pub(crate) fn internal_format(upload: Format, mixer: Format) -> Format {
    if upload.channels() < mixer.channels() {
        Format::make(mixer.bytes_per_channel(), upload.channels())
    } else {
        mixer
    }
}

/// Convert `data` (external representation, `upload` format) into a fresh
/// internal-format buffer in `internal` format
///
/// Trailing bytes that don't form a whole frame are dropped.
pub(crate) fn to_internal(data: &[u8], upload: Format, internal: Format) -> Vec<u8> {
    let frames = data.len() / upload.sample_size() as usize;

    if upload == internal {
        let mut out = data[..frames * upload.sample_size() as usize].to_vec();
        if upload.bytes_per_channel() == 1 {
            sample::flip_bias(&mut out);
        }
        return out;
    }

    convert_flat(data, frames, upload, internal)
}

/// Sample-by-sample width/channel conversion
fn convert_flat(data: &[u8], frames: usize, src: Format, dst: Format) -> Vec<u8> {
    let flags = ConvFlags::between(src, dst);
    let src_bpc = src.bytes_per_channel() as usize;
    let dst_bpc = dst.bytes_per_channel() as usize;

    let mut out = vec![0u8; frames * dst.sample_size() as usize];

    // one iteration per frame when the channel count changes, one per
    // channel sample otherwise
    let steps = if flags.stereo_up || flags.stereo_down {
        frames
    } else {
        frames * src.channels() as usize
    };

    let mut rd = 0;
    let mut wr = 0;
    for _ in 0..steps {
        let mut samp = sample::from_external(&data[rd..], src_bpc);
        rd += src_bpc;
        if flags.stereo_down {
            samp = (samp + sample::from_external(&data[rd..], src_bpc)) / 2;
            rd += src_bpc;
        }

        if flags.size_up {
            samp <<= 8;
        } else if flags.size_down {
            samp /= 0x100;
        }

        sample::to_internal(&mut out[wr..], dst_bpc, samp);
        wr += dst_bpc;
        if flags.stereo_up {
            sample::to_internal(&mut out[wr..], dst_bpc, samp);
            wr += dst_bpc;
        }
    }

    out
}
