//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Why the bot refused to start with the given configuration.
///
/// Validation errors name the offending key in dotted form, e.g.
/// `transport.webhook.port`, matching the TOML layout and the `GAVEL_*`
/// variable (`GAVEL_TRANSPORT__WEBHOOK__PORT`).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// The layered sources could not be merged into a [`GavelConfig`](super::GavelConfig).
    #[error("Failed to extract configuration: {0}")]
    Extract(#[from] Box<figment::Error>),

    /// The file extension has no enabled parser.
    #[error("Unsupported or disabled configuration file format: .{0}")]
    UnsupportedFormat(String),

    #[error("Missing required configuration value `{key}`")]
    MissingField { key: String },

    #[error("Invalid value for `{key}`: {reason}")]
    Invalid { key: String, reason: String },

    #[error("Invalid URL in `{key}` ({url}): {reason}")]
    InvalidUrl {
        key: String,
        url: String,
        reason: String,
    },
}

impl ConfigError {
    pub fn missing_field(key: impl Into<String>) -> Self {
        Self::MissingField { key: key.into() }
    }

    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_url(key: impl Into<String>, url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            key: key.into(),
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// The dotted key a validation error refers to.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::MissingField { key } | Self::Invalid { key, .. } | Self::InvalidUrl { key, .. } => {
                Some(key)
            }
            _ => None,
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(error: figment::Error) -> Self {
        Self::Extract(Box::new(error))
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
