//! Runtime error types.

use gavel_core::StoreError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur while starting or running the bot.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// The worker pool cannot be built with these settings.
    #[error("Invalid worker pool: {0}")]
    InvalidPool(&'static str),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
