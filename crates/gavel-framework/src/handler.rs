//! Handler registrations.
//!
//! A [`HandlerSpec`] pairs a [`Trigger`] with an optional [`Guard`] and a
//! handler body. Bodies are stored as Tower services, so any
//! `async fn(Arc<UpdateContext>) -> Result<(), BoxError>` works:
//!
//! ```rust,ignore
//! async fn set_rules(ctx: Arc<UpdateContext>) -> Result<(), BoxError> {
//!     ctx.reply("New rules set!").await?;
//!     Ok(())
//! }
//!
//! let spec = on_command("setrules").guard(Guard::UserAdmin).handler(set_rules);
//! ```
//!
//! Matching is structural only: command name, callback prefix, or a message
//! predicate. The dispatcher takes the first registration that matches.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use gavel_core::{Message, Update, UpdateKind};
use tower::util::BoxCloneSyncService;
use tower::{BoxError, ServiceExt, service_fn};

use crate::command::ParsedCommand;
use crate::context::UpdateContext;
use crate::guard::Guard;

/// Type-erased handler body.
pub type HandlerService = BoxCloneSyncService<Arc<UpdateContext>, (), BoxError>;

/// Predicate for message triggers.
pub type CheckFn = Arc<dyn Fn(&Message) -> bool + Send + Sync>;

/// What an update must look like for a handler to match.
#[derive(Clone)]
pub enum Trigger {
    /// Any of these command names (lower-case, no prefix).
    Command(Vec<String>),
    /// Callback data starting with this prefix.
    Callback(String),
    /// A non-command message accepted by the predicate.
    Message(CheckFn),
}

impl fmt::Debug for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command(names) => f.debug_tuple("Command").field(names).finish(),
            Self::Callback(prefix) => f.debug_tuple("Callback").field(prefix).finish(),
            Self::Message(_) => f.write_str("Message(<predicate>)"),
        }
    }
}

#[derive(Clone)]
struct HandlerInner {
    name: String,
    trigger: Trigger,
    guard: Option<Guard>,
    allow_edited: bool,
    keep_prompt: bool,
    service: HandlerService,
}

/// A handler registration. Cheap to clone.
#[derive(Clone)]
pub struct HandlerSpec {
    inner: Arc<HandlerInner>,
}

impl HandlerSpec {
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn trigger(&self) -> &Trigger {
        &self.inner.trigger
    }

    pub fn guard(&self) -> Option<Guard> {
        self.inner.guard
    }

    /// Whether the prompt of a pressed button is left in place after the
    /// handler runs.
    pub fn keeps_prompt(&self) -> bool {
        self.inner.keep_prompt
    }

    /// Structural match against an update. `command` is the update's parsed
    /// command, if any.
    pub fn matches(&self, update: &Update, command: Option<&ParsedCommand>) -> bool {
        let message = match &update.kind {
            UpdateKind::Message(message) => message,
            UpdateKind::EditedMessage(message) if self.inner.allow_edited => message,
            UpdateKind::CallbackQuery(query) => {
                return match (&self.inner.trigger, query.data.as_deref()) {
                    (Trigger::Callback(prefix), Some(data)) => data.starts_with(prefix.as_str()),
                    _ => false,
                };
            }
            _ => return false,
        };

        match (&self.inner.trigger, command) {
            (Trigger::Command(names), Some(command)) => names.contains(&command.name),
            (Trigger::Message(check), None) => check(message),
            _ => false,
        }
    }

    /// Runs the handler body.
    pub fn call(&self, ctx: Arc<UpdateContext>) -> BoxFuture<'static, Result<(), BoxError>> {
        let service = self.inner.service.clone();
        Box::pin(service.oneshot(ctx))
    }
}

impl fmt::Debug for HandlerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerSpec")
            .field("name", &self.inner.name)
            .field("trigger", &self.inner.trigger)
            .field("guard", &self.inner.guard)
            .finish()
    }
}

// =============================================================================
// Builders
// =============================================================================

/// Builder returned by [`on_command`], [`on_callback`] and [`on_message`].
pub struct HandlerBuilder {
    name: String,
    trigger: Trigger,
    guard: Option<Guard>,
    allow_edited: bool,
    keep_prompt: bool,
}

impl HandlerBuilder {
    fn new(name: String, trigger: Trigger) -> Self {
        Self {
            name,
            trigger,
            guard: None,
            allow_edited: false,
            keep_prompt: false,
        }
    }

    /// Adds another command name. Ignored for non-command triggers.
    pub fn alias(mut self, name: &str) -> Self {
        if let Trigger::Command(names) = &mut self.trigger {
            names.push(name.to_lowercase());
        }
        self
    }

    /// Sets the precondition checked before the body runs.
    pub fn guard(mut self, guard: Guard) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Overrides the name used in logs and error reports.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Also match edited messages.
    pub fn allow_edited(mut self) -> Self {
        self.allow_edited = true;
        self
    }

    /// Keep the prompt message after a button press instead of deleting it.
    pub fn keep_prompt(mut self) -> Self {
        self.keep_prompt = true;
        self
    }

    /// Finishes the registration with a handler body.
    pub fn handler<F, Fut>(self, f: F) -> HandlerSpec
    where
        F: Fn(Arc<UpdateContext>) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        HandlerSpec {
            inner: Arc::new(HandlerInner {
                name: self.name,
                trigger: self.trigger,
                guard: self.guard,
                allow_edited: self.allow_edited,
                keep_prompt: self.keep_prompt,
                service: BoxCloneSyncService::new(service_fn(f)),
            }),
        }
    }
}

/// Matches `/name` (and `!name` when enabled).
pub fn on_command(name: &str) -> HandlerBuilder {
    let name = name.to_lowercase();
    HandlerBuilder::new(format!("/{name}"), Trigger::Command(vec![name]))
}

/// Matches button presses whose data starts with `prefix`.
pub fn on_callback(prefix: &str) -> HandlerBuilder {
    HandlerBuilder::new(
        format!("callback:{prefix}"),
        Trigger::Callback(prefix.to_string()),
    )
}

/// Matches non-command messages accepted by `check`.
pub fn on_message<F>(check: F) -> HandlerBuilder
where
    F: Fn(&Message) -> bool + Send + Sync + 'static,
{
    HandlerBuilder::new("message".to_string(), Trigger::Message(Arc::new(check)))
}
