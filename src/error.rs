// Mapper error types

use thiserror::Error;

/// Problems found while reading or resolving the mapper configuration.
///
/// None of these stop the emulated machine: the registry logs
/// [`ConfigError::UnresolvedDevice`] and drops the entry, and a host that
/// fails to parse a configuration can fall back to [`crate::MapperConfig::ti998`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed mapper configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("device {0:?} not found")]
    UnresolvedDevice(String),
}
