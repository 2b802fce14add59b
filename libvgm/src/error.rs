use thiserror::Error;

use crate::header::Version;

#[derive(Debug, Error)]
pub enum VgmError {
    #[error("Invalid VGM file: {field} at 0x{offset:02X}: {reason}")]
    InvalidFormat {
        field: &'static str,
        offset: usize,
        reason: String,
    },

    #[error("Unsupported VGM version {found} (minimum supported is {minimum})")]
    UnsupportedVersion { found: Version, minimum: Version },

    #[error("Offset underflow rewriting {field}: {value} - {subtrahend} would be negative")]
    ArithmeticUnderflow {
        field: &'static str,
        value: u64,
        subtrahend: u64,
    },

    #[error("Bad config: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VgmError {
    pub(crate) fn invalid(field: &'static str, offset: usize, reason: impl Into<String>) -> Self {
        VgmError::InvalidFormat {
            field,
            offset,
            reason: reason.into(),
        }
    }
}

impl From<toml::de::Error> for VgmError {
    fn from(e: toml::de::Error) -> Self {
        VgmError::Config(e.to_string())
    }
}
