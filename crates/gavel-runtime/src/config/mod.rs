//! Configuration for the Gavel runtime.
//!
//! Layered TOML and environment loading via figment, plus validation of
//! everything startup depends on.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    BotConfig, DispatchConfig, FloodConfig, GavelConfig, IdentitiesConfig, LogFormat, LogLevel,
    LogOutput, LoggingConfig, MessagesConfig, ModulesConfig, PolicyConfig, RetryConfig,
    StorageConfig, TransportConfig, TransportMode, WebhookConfig,
};
pub use validation::validate_config;
