//! Configuration schema definitions.
//!
//! Every section has serde defaults, so a config file only needs the values
//! that differ. The minimal working file is:
//!
//! ```toml
//! [bot]
//! token = "123456:ABC-DEF"
//! owner_id = 12345678
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use gavel_core::{ChatId, UserId};
use gavel_framework::{FloodController, Identities, ModuleFilter, Policy};
use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GavelConfig {
    pub bot: BotConfig,
    pub identities: IdentitiesConfig,
    pub policy: PolicyConfig,
    pub modules: ModulesConfig,
    pub dispatch: DispatchConfig,
    pub flood: FloodConfig,
    pub transport: TransportConfig,
    pub storage: StorageConfig,
    pub messages: MessagesConfig,
    pub logging: LoggingConfig,
}

impl GavelConfig {
    /// Owner, sudo, support and whitelist sets.
    pub fn identities(&self) -> Identities {
        Identities::new(
            self.bot.owner_id,
            self.identities.sudo_users.iter().copied(),
            self.identities.support_users.iter().copied(),
            self.identities.whitelist_users.iter().copied(),
        )
    }

    pub fn policy(&self) -> Policy {
        Policy {
            del_cmds: self.policy.del_cmds,
            allow_excl: self.policy.allow_excl,
        }
    }

    pub fn module_filter(&self) -> ModuleFilter {
        ModuleFilter::new(&self.modules.load, &self.modules.no_load)
    }

    pub fn flood_controller(&self) -> FloodController {
        FloodController::new(self.flood.limit, self.flood.window())
    }
}

// ─── Bot identity ─────────────────────────────────────────────────────────────

/// Credentials and the owner account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Bot API token from @BotFather.
    pub token: String,

    /// Receives error reports and passes every privileged check.
    pub owner_id: UserId,

    /// Bot API base URL, for self-hosted API servers.
    pub api_url: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            owner_id: 0,
            api_url: "https://api.telegram.org".to_string(),
        }
    }
}

/// Privileged user lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentitiesConfig {
    pub sudo_users: Vec<UserId>,
    pub support_users: Vec<UserId>,
    pub whitelist_users: Vec<UserId>,
}

/// Behaviour switches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Delete bare admin commands sent by non-admins.
    pub del_cmds: bool,

    /// Accept `!cmd` in addition to `/cmd`.
    pub allow_excl: bool,
}

/// Which feature modules to load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModulesConfig {
    /// When non-empty, only these modules are loaded.
    pub load: Vec<String>,

    /// Modules never loaded. Applied after `load`.
    pub no_load: Vec<String>,
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            load: Vec::new(),
            no_load: vec!["translation".to_string()],
        }
    }
}

// ─── Dispatch ─────────────────────────────────────────────────────────────────

/// Worker pool sizing and handler limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub workers: usize,
    /// Capacity of each worker's queue.
    pub queue_capacity: usize,
    pub handler_timeout_secs: u64,
    /// How long shutdown waits for in-flight updates.
    pub shutdown_timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            queue_capacity: 256,
            handler_timeout_secs: 60,
            shutdown_timeout_secs: 10,
        }
    }
}

impl DispatchConfig {
    pub fn handler_timeout(&self) -> Duration {
        Duration::from_secs(self.handler_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Per-chat admission window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FloodConfig {
    pub limit: u32,
    pub window_ms: u64,
}

impl Default for FloodConfig {
    fn default() -> Self {
        Self {
            limit: 10,
            window_ms: 1000,
        }
    }
}

impl FloodConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

// ─── Transport ────────────────────────────────────────────────────────────────

/// How updates are received.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Long polling with `getUpdates`.
    #[default]
    Polling,
    /// An HTTPS endpoint registered with `setWebhook`.
    Webhook,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub mode: TransportMode,

    /// Long-poll timeout passed to `getUpdates`.
    pub poll_timeout_secs: u64,

    /// Backoff after failed polls.
    pub retry: RetryConfig,

    pub webhook: WebhookConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            mode: TransportMode::Polling,
            poll_timeout_secs: 30,
            retry: RetryConfig::default(),
            webhook: WebhookConfig::default(),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Initial delay between retries in milliseconds.
    pub initial_delay_ms: u64,

    /// Maximum delay between retries in milliseconds.
    pub max_delay_ms: u64,

    /// Exponential backoff multiplier.
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Webhook endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Public base URL Telegram posts to. Must be `https://`.
    pub url: String,

    /// Address to bind the local listener to.
    pub host: String,

    pub port: u16,

    /// Route path, appended to `url` when registering.
    pub path: String,

    /// Self-signed certificate uploaded with `setWebhook`.
    pub cert_path: Option<PathBuf>,

    /// Expected `X-Telegram-Bot-Api-Secret-Token` header value.
    pub secret_token: Option<String>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            host: "0.0.0.0".to_string(),
            port: 5000,
            path: "/webhook".to_string(),
            cert_path: None,
            secret_token: None,
        }
    }
}

impl WebhookConfig {
    /// The URL registered with `setWebhook`.
    pub fn public_url(&self) -> String {
        format!("{}{}", self.url.trim_end_matches('/'), self.path)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ─── Storage & messages ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory; documents live under `<base_dir>/data/`.
    pub base_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
        }
    }
}

/// Operator-supplied texts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagesConfig {
    pub donation_link: Option<String>,

    /// Chat that receives the startup notice.
    pub message_dump: Option<ChatId>,

    /// Overrides the private `/start` greeting.
    pub start_text: Option<String>,
}

// ─── Logging ──────────────────────────────────────────────────────────────────

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Line format of log output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    #[cfg(feature = "json-log")]
    Json,
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,

    /// Required when `output = "file"`.
    pub file_path: Option<PathBuf>,

    /// Per-target overrides, e.g. `gavel_telegram = "debug"`.
    pub filters: BTreeMap<String, LogLevel>,

    pub thread_ids: bool,

    /// Include source file and line.
    pub file_location: bool,
}
