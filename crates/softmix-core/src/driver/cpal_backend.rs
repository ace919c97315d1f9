//! CPAL output driver
//!
//! Opens the default output device and renders the mixer straight from the
//! device callback:
//!
//! ```text
//! ┌──────────────────┐   queue/unqueue   ┌─────────────────────┐
//! │  Control threads │──────────────────►│   Mixer (3 locks)   │
//! └──────────────────┘                   └──────────┬──────────┘
//!                                                   │ mix_channels()
//!                                        ┌──────────▼──────────┐
//!                                        │  CPAL Audio Thread  │
//!                                        │  i16 scratch → f32  │
//!                                        └─────────────────────┘
//! ```
//!
//! The mixer runs at the device's rate with a 16-bit format of one or two
//! channels; devices with more channels get silence on the extras. An f32
//! stream is preferred; devices that only offer i16 or u16 get a stream in
//! that format instead.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig, SupportedStreamConfig,
    SupportedStreamConfigRange,
};

use super::error::{DriverError, DriverResult};
use crate::config::MixerConfig;
use crate::engine::Mixer;
use crate::format::Format;

/// Frames rendered per mixer call inside the callback
const SCRATCH_FRAMES: usize = 4096;

/// Keeps the output stream alive; drop to stop audio
pub struct CpalHandle {
    _stream: Stream,
    mixer: Arc<Mixer>,
    sample_rate: u32,
    device_channels: u16,
}

impl CpalHandle {
    pub fn mixer(&self) -> &Arc<Mixer> {
        &self.mixer
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn device_channels(&self) -> u16 {
        self.device_channels
    }
}

impl Drop for CpalHandle {
    fn drop(&mut self) {
        log::info!("cpal driver stopped");
    }
}

/// Start output on the default device
///
/// `config` supplies quality and table capacities; rate and format come
/// from the device.
pub fn start(config: &MixerConfig) -> DriverResult<CpalHandle> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| DriverError::NoDefaultDevice("no default output device".to_string()))?;

    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("Using audio device: {}", device_name);

    let default = device
        .default_output_config()
        .map_err(|e| DriverError::ConfigError(e.to_string()))?;
    let ranges: Vec<_> = match device.supported_output_configs() {
        Ok(ranges) => ranges.collect(),
        Err(e) => {
            log::warn!("Could not list output configs, using the default: {}", e);
            Vec::new()
        }
    };
    let supported = choose_output_config(default, &ranges);
    let sample_rate = supported.sample_rate().0;
    let device_channels = supported.channels();
    let mixer_channels = match device_channels {
        0 => return Err(DriverError::UnsupportedChannels(0)),
        1 => 1,
        _ => 2,
    };

    let mixer_config = MixerConfig {
        frequency: sample_rate,
        format: Format::make(2, mixer_channels),
        fake_data: false,
        ..config.clone()
    };
    let mixer = Arc::new(Mixer::new(mixer_config)?);

    let stream_config = StreamConfig {
        channels: device_channels,
        sample_rate: supported.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    };
    log::info!(
        "Audio config: {} channels ({} mixed), {}Hz, {:?}",
        device_channels,
        mixer_channels,
        sample_rate,
        supported.sample_format()
    );

    let mixer_channels = mixer_channels as usize;
    let stream = match supported.sample_format() {
        SampleFormat::F32 => {
            build_output_stream::<f32>(&device, &stream_config, Arc::clone(&mixer), mixer_channels)
        }
        SampleFormat::I16 => {
            build_output_stream::<i16>(&device, &stream_config, Arc::clone(&mixer), mixer_channels)
        }
        SampleFormat::U16 => {
            build_output_stream::<u16>(&device, &stream_config, Arc::clone(&mixer), mixer_channels)
        }
        other => {
            return Err(DriverError::ConfigError(format!(
                "unsupported sample format {:?}",
                other
            )))
        }
    }?;
    stream
        .play()
        .map_err(|e| DriverError::StreamPlayError(e.to_string()))?;

    log::info!("cpal driver started");

    Ok(CpalHandle {
        _stream: stream,
        mixer,
        sample_rate,
        device_channels,
    })
}

/// Pick the stream config for a device
///
/// The default config is kept when it is f32. Otherwise an f32 range
/// covering the default rate is taken, preferring the default channel
/// count. Failing that the default config is used as is.
fn choose_output_config(
    default: SupportedStreamConfig,
    ranges: &[SupportedStreamConfigRange],
) -> SupportedStreamConfig {
    if default.sample_format() == SampleFormat::F32 {
        return default;
    }

    let rate = default.sample_rate();
    let f32_range = ranges
        .iter()
        .filter(|r| r.sample_format() == SampleFormat::F32)
        .filter(|r| r.channels() > 0)
        .filter(|r| rate >= r.min_sample_rate() && rate <= r.max_sample_rate())
        .max_by_key(|r| r.channels() == default.channels());

    match f32_range {
        Some(range) => range.clone().with_sample_rate(rate),
        None => default,
    }
}

/// Spread one block of mixed i16 frames over the device channels
fn fill_block<T>(block: &mut [T], mixed: &[i16], channels: usize, mixer_channels: usize)
where
    T: Sample + FromSample<i16>,
{
    for (frame, samples) in block.chunks_mut(channels).zip(mixed.chunks(mixer_channels)) {
        for (ch, out) in frame.iter_mut().enumerate() {
            *out = samples.get(ch).map_or(T::EQUILIBRIUM, |&s| T::from_sample(s));
        }
    }
}

fn build_output_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mixer: Arc<Mixer>,
    mixer_channels: usize,
) -> DriverResult<Stream>
where
    T: SizedSample + FromSample<i16>,
{
    let channels = config.channels as usize;
    let mut scratch = vec![0i16; SCRATCH_FRAMES * mixer_channels];

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [T], _info: &cpal::OutputCallbackInfo| {
                for block in data.chunks_mut(SCRATCH_FRAMES * channels) {
                    let frames = block.len() / channels;
                    let mixed = &mut scratch[..frames * mixer_channels];
                    mixer.mix_channels(bytemuck::cast_slice_mut(mixed));
                    fill_block(block, mixed, channels, mixer_channels);
                }
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| DriverError::StreamBuildError(e.to_string()))?;

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpal::{SampleRate, SupportedBufferSize};

    fn default_config(channels: u16, format: SampleFormat) -> SupportedStreamConfig {
        SupportedStreamConfig::new(
            channels,
            SampleRate(48000),
            SupportedBufferSize::Unknown,
            format,
        )
    }

    fn range(
        channels: u16,
        min: u32,
        max: u32,
        format: SampleFormat,
    ) -> SupportedStreamConfigRange {
        SupportedStreamConfigRange::new(
            channels,
            SampleRate(min),
            SampleRate(max),
            SupportedBufferSize::Unknown,
            format,
        )
    }

    #[test]
    fn test_f32_default_is_kept() {
        let chosen = choose_output_config(default_config(2, SampleFormat::F32), &[]);
        assert_eq!(chosen.sample_format(), SampleFormat::F32);
        assert_eq!(chosen.channels(), 2);
    }

    #[test]
    fn test_i16_default_prefers_f32_range() {
        let ranges = [
            range(2, 44100, 44100, SampleFormat::F32),
            range(6, 8000, 192000, SampleFormat::F32),
            range(2, 8000, 192000, SampleFormat::F32),
            range(2, 8000, 192000, SampleFormat::I16),
        ];
        let chosen = choose_output_config(default_config(2, SampleFormat::I16), &ranges);
        assert_eq!(chosen.sample_format(), SampleFormat::F32);
        assert_eq!(chosen.channels(), 2);
        assert_eq!(chosen.sample_rate(), SampleRate(48000));
    }

    #[test]
    fn test_i16_only_device_keeps_default() {
        let ranges = [range(2, 8000, 192000, SampleFormat::I16)];
        let chosen = choose_output_config(default_config(2, SampleFormat::I16), &ranges);
        assert_eq!(chosen.sample_format(), SampleFormat::I16);
    }

    #[test]
    fn test_fill_block_converts_and_pads() {
        let mixed = [0i16, -32768, 16384, 32767];

        let mut f = [1.0f32; 6];
        fill_block(&mut f, &mixed, 3, 2);
        assert_eq!(f, [0.0, -1.0, 0.0, 0.5, 32767.0 / 32768.0, 0.0]);

        let mut i = [1i16; 6];
        fill_block(&mut i, &mixed, 3, 2);
        assert_eq!(i, [0, -32768, 0, 16384, 32767, 0]);

        let mut u = [1u16; 6];
        fill_block(&mut u, &mixed, 3, 2);
        assert_eq!(u, [32768, 0, 32768, 49152, 65535, 32768]);
    }
}
