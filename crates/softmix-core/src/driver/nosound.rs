//! Timer-driven driver with no device
//!
//! A background thread pulls one period from the mixer at the rate a real
//! device would, so queued buffers drain and sources stop on schedule even
//! with no audio hardware. With fake data enabled it only advances
//! bookkeeping; otherwise it renders into a scratch buffer that is thrown
//! away.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};

use super::error::{DriverError, DriverResult};
use crate::engine::Mixer;

/// Default bytes consumed per period
pub const DEFAULT_PERIOD_BYTES: usize = 2048;

/// Keeps the nosound thread alive; drop to stop it
pub struct NoSoundHandle {
    mixer: Arc<Mixer>,
    period: Duration,
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl NoSoundHandle {
    pub fn mixer(&self) -> &Arc<Mixer> {
        &self.mixer
    }

    /// Wall-clock length of one period
    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Drop for NoSoundHandle {
    fn drop(&mut self) {
        // closing the channel wakes the thread out of its sleep
        self.stop_tx.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("nosound driver thread panicked");
            }
        }
        log::info!("nosound driver stopped");
    }
}

/// Length of a period of `period_bytes` at the mixer's output rate
pub fn period_duration(mixer: &Mixer, period_bytes: usize) -> Duration {
    let bytes_per_sec = mixer.frequency() as u64 * mixer.format().sample_size() as u64;
    Duration::from_nanos(period_bytes as u64 * 1_000_000_000 / bytes_per_sec.max(1))
}

/// Start the nosound thread over `mixer`
pub fn start(mixer: Arc<Mixer>, period_bytes: usize) -> DriverResult<NoSoundHandle> {
    let period_bytes = period_bytes.max(mixer.format().sample_size() as usize);
    let period = period_duration(&mixer, period_bytes);
    let (stop_tx, stop_rx) = channel::bounded::<()>(0);

    let thread_mixer = Arc::clone(&mixer);
    let thread = thread::Builder::new()
        .name("softmix-nosound".to_string())
        .spawn(move || run(&thread_mixer, period_bytes, period, &stop_rx))
        .map_err(|e| DriverError::ThreadSpawn(e.to_string()))?;

    log::info!(
        "nosound driver started: {}Hz {}, {} bytes/period (~{:.1}ms)",
        mixer.frequency(),
        mixer.format(),
        period_bytes,
        period.as_secs_f32() * 1000.0
    );

    Ok(NoSoundHandle {
        mixer,
        period,
        stop_tx: Some(stop_tx),
        thread: Some(thread),
    })
}

fn run(mixer: &Mixer, period_bytes: usize, period: Duration, stop_rx: &Receiver<()>) {
    let fake = mixer.config().fake_data;
    let mut scratch = if fake { Vec::new() } else { vec![0u8; period_bytes] };

    loop {
        let started = Instant::now();
        if fake {
            mixer.mix_fake(period_bytes);
        } else {
            mixer.mix_channels(&mut scratch);
        }

        let remaining = period.saturating_sub(started.elapsed());
        match stop_rx.recv_timeout(remaining) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
