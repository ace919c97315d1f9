//! Output driver error types

use thiserror::Error;

use crate::error::MixerError;

/// Errors that can occur while starting or running an output driver
#[derive(Error, Debug)]
pub enum DriverError {
    /// The mixer rejected the driver's configuration
    #[error("Failed to initialize mixer: {0}")]
    MixerInit(#[from] MixerError),

    /// Driver thread could not be started
    #[error("Failed to spawn driver thread: {0}")]
    ThreadSpawn(String),

    /// Driver was requested but not compiled in
    #[error("Driver not available in this build: {0}")]
    Unavailable(String),

    /// Failed to get default device
    #[error("Failed to get default audio device: {0}")]
    NoDefaultDevice(String),

    /// Failed to get device configuration
    #[error("Failed to get device config: {0}")]
    ConfigError(String),

    /// Device channel layout the mixer can't render
    #[error("Unsupported channel count: {0}")]
    UnsupportedChannels(u16),

    /// Failed to build audio stream
    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    /// Failed to start/play stream
    #[error("Failed to start audio stream: {0}")]
    StreamPlayError(String),
}

impl From<DriverError> for MixerError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::MixerInit(e) => e,
            _ => MixerError::DriverFailure,
        }
    }
}

/// Result type for driver operations
pub type DriverResult<T> = Result<T, DriverError>;
