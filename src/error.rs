use invcache_matrix::InvertError;
use thiserror::Error;

use crate::registry::SlotId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    /// The id was never handed out by this registry.
    #[error("slot {0} does not exist")]
    InvalidSlot(SlotId),
    #[error("slot {0} has no matrix to invert")]
    NoMatrixSet(SlotId),
    #[error("inverting the matrix in slot {slot} failed: {source}")]
    InversionFailed {
        slot: SlotId,
        #[source]
        source: InvertError,
    },
}

impl CacheError {
    /// `InvalidSlot` is a caller bug; the other kinds can be fixed by
    /// setting a (different) matrix and retrying.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::InvalidSlot(_))
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[cfg(feature = "toml-config")]
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[cfg(feature = "toml-config")]
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
}
