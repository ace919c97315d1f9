//! softmix-player - stream raw PCM files through the software mixer
//!
//! Starts an output driver, then plays each file in turn by cycling a small
//! set of buffers through one source.
//!
//! ## Command line
//!
//! ```text
//! softmix-player [--config PATH] [--driver nosound|cpal] [--fake]
//!                [--format mono8|stereo8|mono16|stereo16] [--rate HZ] FILE.raw...
//! ```
//!
//! - `--config`: YAML config (default `~/.config/softmix/player.yaml`)
//! - `--fake`: keep queue bookkeeping but skip PCM conversion
//! - `--format` / `--rate`: layout of the raw input files

mod config;
mod stream;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use softmix_core::config::{load_config, read_config};
use softmix_core::driver::{start_driver_with_period, DriverKind};
use softmix_core::{AlMixer, Format};

use config::PlayerConfig;
use stream::Streamer;

const USAGE: &str = "usage: softmix-player [--config PATH] [--driver nosound|cpal] [--fake] \
[--format mono8|stereo8|mono16|stereo16] [--rate HZ] FILE.raw...";

/// How often the streamer checks for processed buffers
const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    driver: Option<DriverKind>,
    fake: bool,
    format: Option<Format>,
    rate: Option<u32>,
    files: Vec<PathBuf>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let mut value = |flag: &str| args.next().with_context(|| format!("{} needs a value", flag));
        match arg.as_str() {
            "--config" => parsed.config = Some(PathBuf::from(value("--config")?)),
            "--driver" => {
                let name = value("--driver")?;
                let driver = serde_yaml::from_str(&name)
                    .with_context(|| format!("unknown driver '{}'", name))?;
                parsed.driver = Some(driver);
            }
            "--fake" => parsed.fake = true,
            "--format" => {
                let format = Format::try_from(value("--format")?).map_err(anyhow::Error::msg)?;
                parsed.format = Some(format);
            }
            "--rate" => {
                let rate = value("--rate")?;
                parsed.rate = Some(rate.parse().with_context(|| format!("bad rate '{}'", rate))?);
            }
            "-h" | "--help" => bail!(USAGE),
            flag if flag.starts_with("--") => bail!("unknown option {}\n{}", flag, USAGE),
            file => parsed.files.push(PathBuf::from(file)),
        }
    }

    if parsed.files.is_empty() {
        bail!(USAGE);
    }
    Ok(parsed)
}

fn main() -> Result<()> {
    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    log::info!("softmix-player starting up");

    let mut config: PlayerConfig = match &args.config {
        Some(path) => read_config(path)?,
        None => load_config(&config::default_config_path()),
    };
    if let Some(driver) = args.driver {
        config.driver = driver;
    }
    if args.fake {
        config.mixer.fake_data = true;
    }
    if let Some(format) = args.format {
        config.stream.file_format = format;
    }
    if let Some(rate) = args.rate {
        config.stream.file_rate = rate;
    }

    let handle = start_driver_with_period(&config.mixer, config.driver, config.period_bytes)
        .context("Failed to start output driver")?;
    let al = AlMixer::new(Arc::clone(handle.mixer()));

    {
        let mut streamer = Streamer::new(&al, config.stream.clone(), POLL_INTERVAL)?;
        for file in &args.files {
            let stats = streamer.play_file(file)?;
            if stats.underruns > 0 {
                log::warn!("{:?}: {} underruns", file, stats.underruns);
            }
        }
    }

    match al.get_error() {
        softmix_core::NO_ERROR => log::info!("Done"),
        code => log::warn!("Done, pending mixer error {:#x}", code),
    }
    drop(handle);
    Ok(())
}
