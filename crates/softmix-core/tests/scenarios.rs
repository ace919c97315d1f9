//! End-to-end mixing scenarios through the public `Mixer` API

use softmix_core::{
    BufferState, Format, Mixer, MixerError, MixerFlags, Quality, SourceId, SourceState, MAX_SOURCES,
};

const RATE: u32 = 22050;

fn mixer(format: Format) -> Mixer {
    Mixer::init(RATE, format, Quality::Medium, MixerFlags::None).unwrap()
}

fn s16(values: &[i16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_ne_bytes()).collect()
}

fn read_s16(data: &[u8]) -> Vec<i16> {
    data.chunks_exact(2).map(|c| i16::from_ne_bytes([c[0], c[1]])).collect()
}

/// A source with one buffer per entry of `chunks`, all at the mixer rate
fn queued_source(
    mixer: &Mixer,
    format: Format,
    chunks: &[&[u8]],
) -> (SourceId, Vec<softmix_core::BufferId>) {
    let src = mixer.gen_sources(1).unwrap()[0];
    let bufs = mixer.gen_buffers(chunks.len()).unwrap();
    for (&buf, data) in bufs.iter().zip(chunks) {
        mixer.buffer_data(buf, format, data, RATE).unwrap();
    }
    mixer.queue_buffers(src, &bufs).unwrap();
    (src, bufs)
}

#[test]
fn test_single_buffer_plays_through_and_stops() {
    let mixer = mixer(Format::MONO16);
    let (src, bufs) = queued_source(&mixer, Format::MONO16, &[&s16(&[100, 200, 300, 400])]);
    mixer.play(src).unwrap();

    let mut out = vec![0u8; 8];
    mixer.mix_channels(&mut out);

    assert_eq!(read_s16(&out), vec![100, 200, 300, 400]);
    let info = mixer.source_info(src).unwrap();
    assert_eq!(info.state, SourceState::Stopped);
    assert_eq!(info.buffers_processed, 1);
    assert_eq!(info.buffers_queued, 1);
    assert_eq!(mixer.buffer_state(bufs[0]).unwrap(), BufferState::Processed);
    assert!(!mixer.is_active(src));
}

#[test]
fn test_second_buffer_follows_first() {
    let mixer = mixer(Format::MONO16);
    let (src, bufs) = queued_source(&mixer, Format::MONO16, &[&s16(&[1, 2]), &s16(&[3, 4])]);
    mixer.play(src).unwrap();

    let mut out = vec![0u8; 4];
    mixer.mix_channels(&mut out);

    let info = mixer.source_info(src).unwrap();
    assert_eq!(info.current, Some(bufs[1]));
    assert_eq!(info.buffers_processed, 1);
    assert_eq!(info.buffers_queued, 2);
    assert_eq!(info.state, SourceState::Playing);
    assert_eq!(mixer.buffer_state(bufs[0]).unwrap(), BufferState::Processed);

    mixer.mix_channels(&mut out);
    assert_eq!(read_s16(&out), vec![3, 4]);
    assert_eq!(mixer.source_state(src).unwrap(), SourceState::Stopped);
}

#[test]
fn test_stop_releases_whole_queue() {
    let mixer = mixer(Format::MONO16);
    let chunks = [s16(&[1, 2]), s16(&[3, 4]), s16(&[5, 6])];
    let refs: Vec<&[u8]> = chunks.iter().map(Vec::as_slice).collect();
    let (src, bufs) = queued_source(&mixer, Format::MONO16, &refs);
    mixer.play(src).unwrap();

    let mut out = vec![0u8; 4];
    mixer.mix_channels(&mut out);
    assert_eq!(mixer.buffer_state(bufs[0]).unwrap(), BufferState::Processed);

    mixer.stop(src).unwrap();
    let info = mixer.source_info(src).unwrap();
    assert_eq!(info.buffers_queued, 0);
    assert_eq!(info.buffers_processed, 0);
    assert_eq!(info.state, SourceState::Stopped);
    for buf in &bufs {
        assert_eq!(mixer.buffer_state(*buf).unwrap(), BufferState::Filled);
    }
    assert!(!mixer.is_active(src));
    mixer.delete_buffers(&bufs).unwrap();
}

#[test]
fn test_ninth_source_is_not_activated() {
    let mixer = mixer(Format::MONO16);
    let data = s16(&[1; 64]);
    let srcs: Vec<SourceId> = (0..=MAX_SOURCES)
        .map(|_| queued_source(&mixer, Format::MONO16, &[&data]).0)
        .collect();

    for &src in &srcs {
        mixer.play(src).unwrap();
    }

    let active = mixer.active_sources();
    assert_eq!(active, srcs[..MAX_SOURCES].to_vec());
    let ninth = srcs[MAX_SOURCES];
    assert!(!mixer.is_active(ninth));
    assert_eq!(mixer.source_state(ninth).unwrap(), SourceState::Playing);

    // the eight active sources still render
    let mut out = vec![0u8; 2];
    mixer.mix_channels(&mut out);
    assert_eq!(read_s16(&out), vec![MAX_SOURCES as i16]);
}

#[test]
fn test_sum_clips_16_bit() {
    let mixer = mixer(Format::MONO16);
    let loud = s16(&[30000, -30000]);
    let srcs: Vec<SourceId> = (0..4)
        .map(|_| queued_source(&mixer, Format::MONO16, &[&loud]).0)
        .collect();
    for &src in &srcs {
        mixer.play(src).unwrap();
    }

    let mut out = vec![0u8; 4];
    mixer.mix_channels(&mut out);
    assert_eq!(read_s16(&out), vec![i16::MAX, i16::MIN]);
}

#[test]
fn test_sum_clips_8_bit() {
    let mixer = mixer(Format::MONO8);
    let srcs: Vec<SourceId> = (0..4)
        .map(|_| queued_source(&mixer, Format::MONO8, &[&[0xf0, 0x00, 0x90]]).0)
        .collect();
    for &src in &srcs {
        mixer.play(src).unwrap();
    }

    let mut out = vec![0u8; 3];
    mixer.mix_channels(&mut out);
    // +112 * 4 and -128 * 4 clip; +16 * 4 fits
    assert_eq!(out, vec![0xff, 0x00, 0xc0]);
}

#[test]
fn test_identity_preserves_16_bit_stereo() {
    let mixer = mixer(Format::STEREO16);
    let samples: Vec<i16> = (0..32).map(|i| (i * 997 - 15000) as i16).collect();
    let data = s16(&samples);
    let (src, _) = queued_source(&mixer, Format::STEREO16, &[&data]);
    mixer.play(src).unwrap();

    let mut out = vec![0u8; data.len()];
    mixer.mix_channels(&mut out);
    assert_eq!(out, data);
}

#[test]
fn test_identity_preserves_8_bit() {
    let mixer = mixer(Format::MONO8);
    let data: Vec<u8> = (0..=255).collect();
    let (src, _) = queued_source(&mixer, Format::MONO8, &[&data]);
    mixer.play(src).unwrap();

    let mut out = vec![0u8; data.len()];
    mixer.mix_channels(&mut out);
    assert_eq!(out, data);
}

#[test]
fn test_stereo_upload_on_mono_mixer_averages() {
    let mixer = mixer(Format::MONO16);
    let (src, bufs) = queued_source(&mixer, Format::STEREO16, &[&s16(&[100, 300, -50, -150])]);
    assert_eq!(mixer.buffer_info(bufs[0]).unwrap().channels, 2);
    mixer.play(src).unwrap();

    let mut out = vec![0u8; 4];
    mixer.mix_channels(&mut out);
    assert_eq!(read_s16(&out), vec![200, -100]);
}

#[test]
fn test_downsampling_picks_nearest() {
    let mixer = mixer(Format::MONO16);
    let src = mixer.gen_sources(1).unwrap()[0];
    let buf = mixer.gen_buffers(1).unwrap()[0];
    mixer.buffer_data(buf, Format::MONO16, &s16(&[1, 2, 3, 4, 5, 6]), RATE * 2).unwrap();
    mixer.set_buffer(src, Some(buf)).unwrap();
    mixer.play(src).unwrap();

    let mut out = vec![0u8; 8];
    mixer.mix_channels(&mut out);
    assert_eq!(read_s16(&out), vec![1, 3, 5, 0]);
    assert_eq!(mixer.source_state(src).unwrap(), SourceState::Stopped);
}

#[test]
fn test_gain_scales_output() {
    let mixer = mixer(Format::MONO16);
    let (src, _) = queued_source(&mixer, Format::MONO16, &[&s16(&[1000, -1000])]);
    mixer.set_gain(src, 0.5).unwrap();
    assert_eq!(mixer.set_gain(src, -1.0), Err(MixerError::InvalidValue));
    mixer.play(src).unwrap();

    let mut out = vec![0u8; 4];
    mixer.mix_channels(&mut out);
    assert_eq!(read_s16(&out), vec![500, -500]);
}

#[test]
fn test_fake_mode_keeps_bookkeeping() {
    let mixer = Mixer::init(RATE, Format::MONO8, Quality::Low, MixerFlags::FakeData).unwrap();
    let (src, bufs) = queued_source(&mixer, Format::MONO8, &[&[0x80; 100], &[0x80; 100]]);
    mixer.play(src).unwrap();

    mixer.mix_fake(100);
    assert_eq!(mixer.buffer_state(bufs[0]).unwrap(), BufferState::Processed);
    assert_eq!(mixer.source_info(src).unwrap().buffers_processed, 1);

    mixer.mix_fake(100);
    assert_eq!(mixer.source_state(src).unwrap(), SourceState::Stopped);

    let done = mixer.unqueue_buffers(src, 2).unwrap();
    assert_eq!(done, bufs);
}
