//! Streaming a file through one source
//!
//! A fixed set of buffers cycles through the source queue: fill and queue
//! them all, play, then keep taking processed buffers off the head,
//! refilling them from the file and queueing them again at the tail. If the
//! source ran dry before a refill arrived it is restarted.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use softmix_core::{AlMixer, MixerError, SourceProperty, SourceState, NO_ERROR};

use crate::config::StreamConfig;

const STATE: u32 = SourceProperty::SourceState as u32;
const QUEUED: u32 = SourceProperty::BuffersQueued as u32;
const PROCESSED: u32 = SourceProperty::BuffersProcessed as u32;

/// Summary of one streamed file
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StreamStats {
    pub bytes: usize,
    pub buffers_queued: usize,
    pub underruns: usize,
}

/// Owns one source and its streaming buffers on an `AlMixer`
pub struct Streamer<'a> {
    al: &'a AlMixer,
    config: StreamConfig,
    poll: Duration,
    source: u64,
    buffers: Vec<u64>,
    chunk: Vec<u8>,
}

/// Turn the pending sticky error into a failure
fn check(al: &AlMixer, what: &str) -> Result<()> {
    match al.get_error() {
        NO_ERROR => Ok(()),
        code => match MixerError::from_code(code) {
            Some(e) => bail!("{}: {}", what, e),
            None => bail!("{}: error {:#x}", what, code),
        },
    }
}

/// Read until `buf` is full or the input ends
fn read_chunk(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

impl<'a> Streamer<'a> {
    pub fn new(al: &'a AlMixer, config: StreamConfig, poll: Duration) -> Result<Self> {
        let buffers = config.buffers.max(1);
        let source = al.gen_sources(1).first().copied();
        let ids = al.gen_buffers(buffers);
        check(al, "allocating stream objects")?;
        let source = source.context("no source allocated")?;

        Ok(Self {
            al,
            chunk: vec![0; config.aligned_chunk()],
            config,
            poll,
            source,
            buffers: ids,
        })
    }

    /// Stream `path` to completion
    pub fn play_file(&mut self, path: &Path) -> Result<StreamStats> {
        let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        log::info!(
            "Streaming {:?} ({} @ {} Hz)",
            path,
            self.config.file_format,
            self.config.file_rate
        );
        self.play_reader(BufReader::new(file))
    }

    /// Stream everything `reader` yields
    pub fn play_reader(&mut self, mut reader: impl Read) -> Result<StreamStats> {
        let mut stats = StreamStats::default();

        let initial = self.buffers.clone();
        let primed = self.refill(&mut reader, &initial, &mut stats)?;
        if primed == 0 {
            log::warn!("Nothing to play");
            return Ok(stats);
        }
        self.al.source_play(self.source);
        check(self.al, "starting playback")?;

        let mut eof = primed < initial.len();
        loop {
            std::thread::sleep(self.poll);

            let processed = self.al.get_source_i(self.source, PROCESSED).max(0) as usize;
            if processed > 0 {
                let done = self.al.source_unqueue_buffers(self.source, processed);
                check(self.al, "unqueueing buffers")?;
                if !eof {
                    let queued = self.refill(&mut reader, &done, &mut stats)?;
                    eof = queued < done.len();
                }
            }

            let state = self.al.get_source_i(self.source, STATE);
            let queued = self.al.get_source_i(self.source, QUEUED);
            if state == SourceState::Stopped as i64 {
                if eof && self.al.get_source_i(self.source, PROCESSED) == queued {
                    break;
                }
                if queued > 0 {
                    log::warn!("Buffer underrun, restarting source");
                    stats.underruns += 1;
                    self.al.source_play(self.source);
                }
            }
            check(self.al, "streaming")?;
        }

        let leftover = self.al.get_source_i(self.source, QUEUED).max(0) as usize;
        self.al.source_unqueue_buffers(self.source, leftover);
        check(self.al, "draining")?;

        log::info!(
            "Finished: {} bytes in {} buffers, {} underruns",
            stats.bytes,
            stats.buffers_queued,
            stats.underruns
        );
        Ok(stats)
    }

    /// Fill `ids` in order from `reader` and queue the filled ones; returns
    /// how many were queued
    fn refill(
        &mut self,
        reader: &mut impl Read,
        ids: &[u64],
        stats: &mut StreamStats,
    ) -> Result<usize> {
        let frame = self.config.file_format.sample_size() as usize;
        let mut filled = Vec::with_capacity(ids.len());

        for &buf in ids {
            let n = read_chunk(reader, &mut self.chunk).context("Failed to read input")?;
            let n = n / frame * frame;
            if n == 0 {
                break;
            }
            let format = self.config.file_format.raw();
            self.al.buffer_data(buf, format, &self.chunk[..n], self.config.file_rate);
            stats.bytes += n;
            filled.push(buf);
            if n < self.chunk.len() {
                break;
            }
        }

        if !filled.is_empty() {
            self.al.source_queue_buffers(self.source, &filled);
            stats.buffers_queued += filled.len();
        }
        check(self.al, "queueing buffers")?;
        Ok(filled.len())
    }
}

impl Drop for Streamer<'_> {
    fn drop(&mut self) {
        self.al.source_stop(self.source);
        self.al.delete_sources(&[self.source]);
        self.al.delete_buffers(&self.buffers);
        if self.al.get_error() != NO_ERROR {
            log::debug!("Streamer cleanup reported an error");
        }
    }
}
