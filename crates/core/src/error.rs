//! Configuration error model.

use thiserror::Error;

/// Result type used while loading configuration.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Startup configuration error.
///
/// These are fatal: a process refuses to start with a value it cannot parse.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable was present but could not be parsed.
    #[error("invalid value for {name}: {value:?} ({reason})")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// A variable was present but empty.
    #[error("{0} must not be empty")]
    Empty(&'static str),
}

impl ConfigError {
    pub fn invalid(name: &'static str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            name,
            value: value.into(),
            reason: reason.into(),
        }
    }
}
