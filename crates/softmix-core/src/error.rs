//! Mixer error types
//!
//! The variants mirror the OpenAL error taxonomy and carry no payload, so an
//! error can be produced on any thread without allocating.

use thiserror::Error;

/// Numeric code reported when no error is pending
pub const NO_ERROR: u32 = 0;

/// Errors returned by mixer operations
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MixerError {
    /// Handle is null, of the wrong kind, or stale
    #[error("Invalid object name")]
    InvalidName,

    /// Unsupported property id
    #[error("Invalid enum value")]
    InvalidEnum,

    /// Malformed argument
    #[error("Invalid value")]
    InvalidValue,

    /// Objects are valid but the call is illegal in their current state
    #[error("Invalid operation")]
    InvalidOperation,

    /// Object table is full
    #[error("Out of memory")]
    OutOfMemory,

    /// Output driver failed
    #[error("Driver failure")]
    DriverFailure,
}

impl MixerError {
    /// OpenAL-compatible numeric code
    pub fn code(self) -> u32 {
        match self {
            MixerError::InvalidName => 0xA001,
            MixerError::InvalidEnum => 0xA002,
            MixerError::InvalidValue => 0xA003,
            MixerError::InvalidOperation => 0xA004,
            MixerError::OutOfMemory => 0xA005,
            MixerError::DriverFailure => 0xA101,
        }
    }

    /// Decode a numeric code; `NO_ERROR` decodes to `None` and unknown
    /// codes to `DriverFailure`
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            NO_ERROR => None,
            0xA001 => Some(MixerError::InvalidName),
            0xA002 => Some(MixerError::InvalidEnum),
            0xA003 => Some(MixerError::InvalidValue),
            0xA004 => Some(MixerError::InvalidOperation),
            0xA005 => Some(MixerError::OutOfMemory),
            _ => Some(MixerError::DriverFailure),
        }
    }
}

/// Result type for mixer operations
pub type MixerResult<T> = Result<T, MixerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(MixerError::InvalidName.code(), 0xA001);
        assert_eq!(MixerError::from_code(0xA002), Some(MixerError::InvalidEnum));
        assert_eq!(MixerError::from_code(NO_ERROR), None);
        assert_eq!(MixerError::from_code(0xBEEF), Some(MixerError::DriverFailure));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(MixerError::InvalidOperation.to_string(), "Invalid operation");
    }
}
