//! Framework error types.

use thiserror::Error;

// =============================================================================
// Registry Errors
// =============================================================================

/// Errors raised while building the module registry. All of them are fatal
/// configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Two modules share a name under case-insensitive comparison.
    #[error("duplicate module name '{name}' (already registered as '{existing}')")]
    DuplicateModule {
        /// The rejected display name.
        name: String,
        /// Display name of the module already holding the key.
        existing: String,
    },

    /// The name cannot be embedded in callback data.
    #[error("invalid module name '{name}': {reason}")]
    InvalidModuleName {
        /// The rejected display name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}

impl RegistryError {
    pub fn duplicate(name: impl Into<String>, existing: impl Into<String>) -> Self {
        Self::DuplicateModule {
            name: name.into(),
            existing: existing.into(),
        }
    }

    pub fn invalid_name(name: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidModuleName {
            name: name.into(),
            reason,
        }
    }
}

// =============================================================================
// Pagination Errors
// =============================================================================

/// Errors raised while rendering or parsing menu callback data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PaginationError {
    /// The callback data matches none of the menu shapes.
    #[error("unrecognized callback data '{0}'")]
    UnrecognizedCallback(String),

    /// A rendered button would exceed the platform's payload limit.
    #[error("callback data '{data}' is {len} bytes, limit is {max}")]
    CallbackTooLong {
        data: String,
        len: usize,
        max: usize,
    },
}

impl PaginationError {
    pub fn unrecognized(data: impl Into<String>) -> Self {
        Self::UnrecognizedCallback(data.into())
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

pub type RegistryResult<T> = Result<T, RegistryError>;

pub type PaginationResult<T> = Result<T, PaginationError>;
