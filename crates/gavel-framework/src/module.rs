//! Module descriptors.
//!
//! A [`ModuleDescriptor`] is the registration contract of a feature module:
//! a display name, its handlers, and a set of independent, optional
//! capabilities. Each capability is a typed field holding a boxed async
//! closure; the registry indexes a module under every capability whose field
//! is set.
//!
//! ```rust,ignore
//! let store = store.clone();
//! ModuleDescriptor::new("AFK")
//!     .help(" - /afk <reason>: mark yourself as AFK.")
//!     .handler(on_command("afk").handler(set_afk))
//!     .on_gdpr(move |user_id| {
//!         let store = store.clone();
//!         async move { store.delete("afk", &user_id.to_string()).await?; Ok(()) }
//!     })
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use gavel_core::{Chat, ChatId, UserId};
use serde_json::Value;
use tower::BoxError;

use crate::handler::HandlerSpec;

/// Result returned by capability closures.
pub type CapabilityResult<T> = Result<T, BoxError>;

pub type MigrateFn =
    Arc<dyn Fn(ChatId, ChatId) -> BoxFuture<'static, CapabilityResult<()>> + Send + Sync>;
pub type StatsFn = Arc<dyn Fn() -> BoxFuture<'static, CapabilityResult<String>> + Send + Sync>;
pub type GdprFn = Arc<dyn Fn(UserId) -> BoxFuture<'static, CapabilityResult<()>> + Send + Sync>;
pub type UserInfoFn = Arc<
    dyn Fn(UserId, Option<ChatId>) -> BoxFuture<'static, CapabilityResult<Option<String>>>
        + Send
        + Sync,
>;
pub type ImportFn =
    Arc<dyn Fn(ChatId, Value) -> BoxFuture<'static, CapabilityResult<()>> + Send + Sync>;
pub type ExportFn =
    Arc<dyn Fn(ChatId) -> BoxFuture<'static, CapabilityResult<Option<Value>>> + Send + Sync>;
pub type ChatSettingsFn =
    Arc<dyn Fn(ChatId, UserId) -> BoxFuture<'static, CapabilityResult<String>> + Send + Sync>;
pub type UserSettingsFn =
    Arc<dyn Fn(UserId) -> BoxFuture<'static, CapabilityResult<String>> + Send + Sync>;
pub type ChatLinkFn =
    Arc<dyn Fn(Chat, UserId) -> BoxFuture<'static, CapabilityResult<Option<String>>> + Send + Sync>;

/// Optional behaviours a module may advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Help,
    ChatSettings,
    UserSettings,
    Migrate,
    Stats,
    Gdpr,
    UserInfo,
    DataImport,
    DataExport,
    /// Answers `/start {chat_id}` deep links in private chats.
    ChatLink,
}

impl Capability {
    pub const ALL: [Capability; 10] = [
        Capability::Help,
        Capability::ChatSettings,
        Capability::UserSettings,
        Capability::Migrate,
        Capability::Stats,
        Capability::Gdpr,
        Capability::UserInfo,
        Capability::DataImport,
        Capability::DataExport,
        Capability::ChatLink,
    ];
}

// =============================================================================
// ModuleDescriptor
// =============================================================================

/// A feature module as seen by the registry.
#[derive(Clone)]
pub struct ModuleDescriptor {
    name: String,
    key: String,
    help: Option<String>,
    handlers: Vec<HandlerSpec>,
    migrate: Option<MigrateFn>,
    stats: Option<StatsFn>,
    gdpr: Option<GdprFn>,
    user_info: Option<UserInfoFn>,
    import: Option<ImportFn>,
    export: Option<ExportFn>,
    chat_settings: Option<ChatSettingsFn>,
    user_settings: Option<UserSettingsFn>,
    chat_link: Option<ChatLinkFn>,
}

impl ModuleDescriptor {
    /// Creates a module with no handlers and no capabilities.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            key: name.to_lowercase(),
            name,
            help: None,
            handlers: Vec::new(),
            migrate: None,
            stats: None,
            gdpr: None,
            user_info: None,
            import: None,
            export: None,
            chat_settings: None,
            user_settings: None,
            chat_link: None,
        }
    }

    /// Display name, used for menu labels and ordering.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lower-cased lookup key, used in callback data.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn help_text(&self) -> Option<&str> {
        self.help.as_deref()
    }

    pub fn handlers(&self) -> &[HandlerSpec] {
        &self.handlers
    }

    /// Returns `true` if the capability is present.
    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::Help => self.help.is_some(),
            Capability::ChatSettings => self.chat_settings.is_some(),
            Capability::UserSettings => self.user_settings.is_some(),
            Capability::Migrate => self.migrate.is_some(),
            Capability::Stats => self.stats.is_some(),
            Capability::Gdpr => self.gdpr.is_some(),
            Capability::UserInfo => self.user_info.is_some(),
            Capability::DataImport => self.import.is_some(),
            Capability::DataExport => self.export.is_some(),
            Capability::ChatLink => self.chat_link.is_some(),
        }
    }

    // ─── Builders ────────────────────────────────────────────────────────────

    pub fn help(mut self, text: impl Into<String>) -> Self {
        self.help = Some(text.into());
        self
    }

    /// Appends a handler. Handlers are matched in the order they are added.
    pub fn handler(mut self, handler: HandlerSpec) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Called with `(old_chat_id, new_chat_id)` when a chat is upgraded.
    pub fn on_migrate<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(ChatId, ChatId) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CapabilityResult<()>> + Send + 'static,
    {
        self.migrate = Some(Arc::new(move |old, new| Box::pin(hook(old, new))));
        self
    }

    /// One line for the `/stats` report.
    pub fn on_stats<F, Fut>(mut self, provider: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CapabilityResult<String>> + Send + 'static,
    {
        self.stats = Some(Arc::new(move || Box::pin(provider())));
        self
    }

    /// Erases everything the module stores about a user.
    pub fn on_gdpr<F, Fut>(mut self, eraser: F) -> Self
    where
        F: Fn(UserId) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CapabilityResult<()>> + Send + 'static,
    {
        self.gdpr = Some(Arc::new(move |user| Box::pin(eraser(user))));
        self
    }

    pub fn on_user_info<F, Fut>(mut self, provider: F) -> Self
    where
        F: Fn(UserId, Option<ChatId>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CapabilityResult<Option<String>>> + Send + 'static,
    {
        self.user_info = Some(Arc::new(move |user, chat| Box::pin(provider(user, chat))));
        self
    }

    pub fn on_import<F, Fut>(mut self, importer: F) -> Self
    where
        F: Fn(ChatId, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CapabilityResult<()>> + Send + 'static,
    {
        self.import = Some(Arc::new(move |chat, data| Box::pin(importer(chat, data))));
        self
    }

    pub fn on_export<F, Fut>(mut self, exporter: F) -> Self
    where
        F: Fn(ChatId) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CapabilityResult<Option<Value>>> + Send + 'static,
    {
        self.export = Some(Arc::new(move |chat| Box::pin(exporter(chat))));
        self
    }

    /// Read-only projection of a chat's settings for this module.
    pub fn on_chat_settings<F, Fut>(mut self, provider: F) -> Self
    where
        F: Fn(ChatId, UserId) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CapabilityResult<String>> + Send + 'static,
    {
        self.chat_settings = Some(Arc::new(move |chat, user| Box::pin(provider(chat, user))));
        self
    }

    /// Read-only projection of a user's personal settings for this module.
    pub fn on_user_settings<F, Fut>(mut self, provider: F) -> Self
    where
        F: Fn(UserId) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CapabilityResult<String>> + Send + 'static,
    {
        self.user_settings = Some(Arc::new(move |user| Box::pin(provider(user))));
        self
    }

    /// Markdown sent to a user who followed a deep link to `chat`, or
    /// `None` to stay silent.
    pub fn on_chat_link<F, Fut>(mut self, responder: F) -> Self
    where
        F: Fn(Chat, UserId) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CapabilityResult<Option<String>>> + Send + 'static,
    {
        self.chat_link = Some(Arc::new(move |chat, user| Box::pin(responder(chat, user))));
        self
    }

    // ─── Invocation ──────────────────────────────────────────────────────────
    //
    // Absent capabilities resolve to `Ok(None)` / `Ok(())`.

    pub async fn migrate(&self, old: ChatId, new: ChatId) -> CapabilityResult<()> {
        match &self.migrate {
            Some(hook) => hook(old, new).await,
            None => Ok(()),
        }
    }

    pub async fn stats(&self) -> CapabilityResult<Option<String>> {
        match &self.stats {
            Some(provider) => provider().await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn erase_user(&self, user_id: UserId) -> CapabilityResult<()> {
        match &self.gdpr {
            Some(eraser) => eraser(user_id).await,
            None => Ok(()),
        }
    }

    pub async fn user_info(
        &self,
        user_id: UserId,
        chat_id: Option<ChatId>,
    ) -> CapabilityResult<Option<String>> {
        match &self.user_info {
            Some(provider) => provider(user_id, chat_id).await,
            None => Ok(None),
        }
    }

    pub async fn import_data(&self, chat_id: ChatId, data: Value) -> CapabilityResult<()> {
        match &self.import {
            Some(importer) => importer(chat_id, data).await,
            None => Ok(()),
        }
    }

    pub async fn export_data(&self, chat_id: ChatId) -> CapabilityResult<Option<Value>> {
        match &self.export {
            Some(exporter) => exporter(chat_id).await,
            None => Ok(None),
        }
    }

    pub async fn chat_settings(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> CapabilityResult<Option<String>> {
        match &self.chat_settings {
            Some(provider) => provider(chat_id, user_id).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn user_settings(&self, user_id: UserId) -> CapabilityResult<Option<String>> {
        match &self.user_settings {
            Some(provider) => provider(user_id).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn chat_link(&self, chat: &Chat, user_id: UserId) -> CapabilityResult<Option<String>> {
        match &self.chat_link {
            Some(responder) => responder(chat.clone(), user_id).await,
            None => Ok(None),
        }
    }
}

impl fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let capabilities: Vec<_> = Capability::ALL
            .into_iter()
            .filter(|capability| self.has(*capability))
            .collect();
        f.debug_struct("ModuleDescriptor")
            .field("name", &self.name)
            .field("handlers", &self.handlers.len())
            .field("capabilities", &capabilities)
            .finish()
    }
}
