//! Gavel Runtime - everything between the framework and the process.
//!
//! This crate provides:
//! - Layered configuration (`ConfigLoader`, `GavelConfig`, `validate_config`)
//! - Logging setup (`LoggingBuilder`, `init_from_config`)
//! - The file-backed module store (`FileStore`)
//! - The worker pool that feeds updates to the dispatcher (`GavelRuntime`)
//!
//! # Example
//!
//! ```ignore
//! use gavel_runtime::{GavelRuntime, PoolOptions, config, logging};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = config::load_config()?;
//!     config::validate_config(&config)?;
//!     logging::init_from_config(&config.logging);
//!
//!     let dispatcher = build_dispatcher(&config).await?;
//!     let runtime = GavelRuntime::start(dispatcher, PoolOptions::from(&config.dispatch))?;
//!
//!     // Feed updates into `runtime.intake()` from polling or a webhook.
//!     runtime.run_until_signal().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod store;

// Re-exports
pub use config::{ConfigError, ConfigLoader, ConfigResult, GavelConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::LoggingBuilder;
pub use runtime::{GavelRuntime, PoolOptions, ShutdownReport, wait_for_shutdown};
pub use store::FileStore;

// Re-export tracing for use by other crates
pub use tracing;

/// Prelude module for convenient imports.
///
/// This provides all the commonly used logging macros:
/// - `trace!`, `debug!`, `info!`, `warn!`, `error!`
/// - `span`, `event`
/// - `instrument` attribute
/// - `Level` for span creation
pub mod prelude {
    pub use tracing::{Level, debug, error, event, info, instrument, span, trace, warn};
}
