//! Output drivers
//!
//! A driver owns a [`Mixer`] and calls its render entry point once per
//! output period:
//!
//! - **NoSound**: a timer thread that consumes periods without a device
//! - **Cpal**: the default system output device (cargo feature `cpal-backend`)
//!
//! # Example Usage
//!
//! ```ignore
//! use softmix_core::driver::{start_driver, DriverKind};
//!
//! let handle = start_driver(&MixerConfig::nosound(), DriverKind::NoSound)?;
//! let al = AlMixer::new(Arc::clone(handle.mixer()));
//! // ... queue buffers, play ...
//! drop(handle); // stops output
//! ```

mod error;
pub mod nosound;

#[cfg(feature = "cpal-backend")]
mod cpal_backend;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::MixerConfig;
use crate::engine::Mixer;

pub use error::{DriverError, DriverResult};
pub use nosound::{NoSoundHandle, DEFAULT_PERIOD_BYTES};

#[cfg(feature = "cpal-backend")]
pub use cpal_backend::CpalHandle;

/// Which output driver to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// Timer thread, no device
    #[default]
    NoSound,
    /// Default output device through CPAL
    Cpal,
}

impl DriverKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            DriverKind::NoSound => "nosound",
            DriverKind::Cpal => "cpal",
        }
    }
}

/// Handle to a running driver
///
/// Keeps output alive. Drop this to stop it.
pub enum DriverHandle {
    NoSound(NoSoundHandle),
    #[cfg(feature = "cpal-backend")]
    Cpal(CpalHandle),
}

impl DriverHandle {
    /// The mixer this driver renders
    pub fn mixer(&self) -> &Arc<Mixer> {
        match self {
            DriverHandle::NoSound(h) => h.mixer(),
            #[cfg(feature = "cpal-backend")]
            DriverHandle::Cpal(h) => h.mixer(),
        }
    }

    pub fn kind(&self) -> DriverKind {
        match self {
            DriverHandle::NoSound(_) => DriverKind::NoSound,
            #[cfg(feature = "cpal-backend")]
            DriverHandle::Cpal(_) => DriverKind::Cpal,
        }
    }
}

/// Build a mixer from `config` and start `kind` over it
pub fn start_driver(config: &MixerConfig, kind: DriverKind) -> DriverResult<DriverHandle> {
    start_driver_with_period(config, kind, DEFAULT_PERIOD_BYTES)
}

/// As [`start_driver`], with an explicit nosound period size
pub fn start_driver_with_period(
    config: &MixerConfig,
    kind: DriverKind,
    period_bytes: usize,
) -> DriverResult<DriverHandle> {
    log::info!("Starting {} driver", kind.display_name());
    match kind {
        DriverKind::NoSound => {
            let mixer = Arc::new(Mixer::new(config.clone())?);
            nosound::start(mixer, period_bytes).map(DriverHandle::NoSound)
        }
        #[cfg(feature = "cpal-backend")]
        DriverKind::Cpal => cpal_backend::start(config).map(DriverHandle::Cpal),
        #[cfg(not(feature = "cpal-backend"))]
        DriverKind::Cpal => Err(DriverError::Unavailable(
            "built without the cpal-backend feature".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nosound_driver_owns_mixer() {
        let handle =
            start_driver_with_period(&MixerConfig::nosound(), DriverKind::NoSound, 512).unwrap();
        assert_eq!(handle.kind(), DriverKind::NoSound);
        assert_eq!(handle.mixer().frequency(), 22050);
    }

    #[test]
    fn test_bad_config_is_mixer_init_error() {
        let config = MixerConfig {
            frequency: 0,
            ..MixerConfig::nosound()
        };
        let err = start_driver(&config, DriverKind::NoSound).err().unwrap();
        assert!(matches!(err, DriverError::MixerInit(_)));
    }

    #[cfg(not(feature = "cpal-backend"))]
    #[test]
    fn test_cpal_unavailable_without_feature() {
        let err = start_driver(&MixerConfig::default(), DriverKind::Cpal).err().unwrap();
        assert!(matches!(err, DriverError::Unavailable(_)));
    }

    #[test]
    fn test_kind_yaml_names() {
        let kind: DriverKind = serde_yaml::from_str("cpal").unwrap();
        assert_eq!(kind, DriverKind::Cpal);
        assert_eq!(serde_yaml::to_string(&DriverKind::NoSound).unwrap().trim(), "nosound");
    }
}
