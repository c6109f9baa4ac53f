//! The update dispatcher.
//!
//! Every inbound update runs through the same state machine, stopping at the
//! first terminal exit:
//!
//! 1. **Admit**: per-chat flood control; throttled updates are dropped silently
//! 2. **Classify**: chat migrations fan out to every migrate hook
//! 3. **Match**: first handler whose trigger matches, in registration order
//! 4. **Guard**: the handler's declared [`Guard`](crate::Guard), if any
//! 5. **Invoke**: the handler body, with errors, panics and timeouts caught
//! 6. **Acknowledge**: button presses are answered and their prompt removed
//!
//! A faulting handler is logged and reported to the owner, never to the
//! chat, and never stops dispatch of later updates.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use gavel_core::{ApiError, ChatId, OutgoingMessage, Transport, Update, UpdateKind};
use tracing::{Instrument, Level, debug, error, info, span, trace, warn};

use crate::command::{ParsedCommand, parse_command};
use crate::context::{BotState, UpdateContext};
use crate::flood::FloodController;
use crate::handler::HandlerSpec;
use crate::module::ModuleDescriptor;
use crate::registry::Registry;
use crate::text::truncate_message;
use crate::users::UserDirectory;

/// Default upper bound for a single handler invocation.
pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(60);

/// Which exit of the state machine an update took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Dropped by flood control.
    Throttled,
    /// Migration fanned out to `hooks` listeners, `failures` of which faulted.
    Migrated { hooks: usize, failures: usize },
    /// No handler matched.
    Unmatched,
    /// The handler's guard rejected the update.
    Denied,
    /// The handler ran to completion.
    Handled,
    /// The handler returned an error, panicked or timed out.
    Failed,
}

/// Runs updates through flood control, matching, guards and handlers.
pub struct Dispatcher {
    registry: Arc<Registry>,
    transport: Arc<dyn Transport>,
    state: Arc<BotState>,
    flood: FloodController,
    handler_timeout: Duration,
    users: Option<Arc<UserDirectory>>,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>, transport: Arc<dyn Transport>, state: Arc<BotState>) -> Self {
        Self {
            registry,
            transport,
            state,
            flood: FloodController::default(),
            handler_timeout: DEFAULT_HANDLER_TIMEOUT,
            users: None,
        }
    }

    /// Replaces the flood controller (builder pattern).
    pub fn with_flood(mut self, flood: FloodController) -> Self {
        self.flood = flood;
        self
    }

    /// Sets the per-invocation timeout (builder pattern).
    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = timeout;
        self
    }

    /// Records senders' usernames for `@username` lookups (builder pattern).
    pub fn with_users(mut self, users: UserDirectory) -> Self {
        self.users = Some(Arc::new(users));
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Dispatches one update.
    pub async fn dispatch(&self, update: Update) -> DispatchOutcome {
        self.dispatch_at(update, Instant::now()).await
    }

    /// Dispatches one update as if it arrived at `now`.
    pub async fn dispatch_at(&self, update: Update, now: Instant) -> DispatchOutcome {
        let span = span!(
            Level::DEBUG,
            "dispatch",
            update_id = update.id,
            chat_id = update.chat_id()
        );
        self.run(update, now).instrument(span).await
    }

    async fn run(&self, update: Update, now: Instant) -> DispatchOutcome {
        // 1. Admit
        if let Some(chat_id) = update.chat_id() {
            if !self.flood.admit(chat_id, now) {
                trace!(chat_id, "Update throttled");
                return DispatchOutcome::Throttled;
            }
        }

        // 2. Classify
        if let Some((old, new)) = update.migration() {
            return self.migrate(old, new).await;
        }
        self.record_users(&update).await;

        // 3. Match
        let command = self.parse_command(&update);
        let Some((module, handler)) = self
            .registry
            .handlers()
            .find(|(_, handler)| handler.matches(&update, command.as_ref()))
        else {
            trace!("No handler matched");
            return DispatchOutcome::Unmatched;
        };
        let (module, handler) = (module.clone(), handler.clone());
        debug!(module = %module.name(), handler = %handler.name(), "Handler matched");

        let ctx = Arc::new(UpdateContext::new(
            update,
            command,
            self.transport.clone(),
            self.registry.clone(),
            self.state.clone(),
        )
        .with_users(self.users.clone()));

        // 4. Guard
        if let Some(guard) = handler.guard() {
            if !guard.check(&ctx).await {
                debug!(handler = %handler.name(), ?guard, "Guard rejected update");
                return DispatchOutcome::Denied;
            }
        }

        // 5. Invoke
        let outcome = self.invoke(&module, &handler, ctx.clone()).await;

        // 6. Acknowledge
        self.acknowledge(&ctx, &handler).await;

        outcome
    }

    async fn record_users(&self, update: &Update) {
        let (Some(users), UpdateKind::Message(message)) = (&self.users, &update.kind) else {
            return;
        };
        if let Err(e) = users.record_message(message).await {
            warn!(error = %e, "Failed to record usernames");
        }
    }

    fn parse_command(&self, update: &Update) -> Option<ParsedCommand> {
        let message = match &update.kind {
            UpdateKind::Message(message) | UpdateKind::EditedMessage(message) => message,
            _ => return None,
        };
        parse_command(
            message.content()?,
            self.state.username(),
            self.state.policy.allow_excl,
        )
    }

    async fn migrate(&self, old: ChatId, new: ChatId) -> DispatchOutcome {
        info!(old, new, "Migrating chat");
        let hooks = self.registry.migrateable();
        let mut failures = 0;

        for module in hooks {
            let result = AssertUnwindSafe(module.migrate(old, new))
                .catch_unwind()
                .await;
            let fault = match result {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(panic) => panic_message(panic.as_ref()),
            };
            failures += 1;
            error!(module = %module.name(), old, new, error = %fault, "Migration hook failed");
        }

        info!(old, new, hooks = hooks.len(), failures, "Chat migrated");
        DispatchOutcome::Migrated {
            hooks: hooks.len(),
            failures,
        }
    }

    async fn invoke(
        &self,
        module: &ModuleDescriptor,
        handler: &HandlerSpec,
        ctx: Arc<UpdateContext>,
    ) -> DispatchOutcome {
        let update_id = ctx.update().id;
        let chat_id = ctx.update().chat_id();
        let body = AssertUnwindSafe(handler.call(ctx)).catch_unwind();

        let fault = match tokio::time::timeout(self.handler_timeout, body).await {
            Ok(Ok(Ok(()))) => return DispatchOutcome::Handled,
            Ok(Ok(Err(e))) => format!("{e}"),
            Ok(Err(panic)) => format!("panicked: {}", panic_message(panic.as_ref())),
            Err(_) => format!("timed out after {:?}", self.handler_timeout),
        };

        error!(
            update_id,
            chat_id,
            module = %module.name(),
            handler = %handler.name(),
            error = %fault,
            "Handler failed"
        );
        self.report_to_owner(update_id, chat_id, handler.name(), &fault)
            .await;
        DispatchOutcome::Failed
    }

    async fn report_to_owner(
        &self,
        update_id: i64,
        chat_id: Option<ChatId>,
        handler: &str,
        fault: &str,
    ) {
        let chat = chat_id.map_or_else(|| "-".to_string(), |id| id.to_string());
        let text = truncate_message(&format!(
            "An error occurred while handling update {update_id} in chat {chat} ({handler}):\n{fault}"
        ));
        let owner = self.state.identities.owner();
        if let Err(e) = self
            .transport
            .send_message(OutgoingMessage::new(owner, text))
            .await
        {
            warn!(owner, error = %e, "Failed to report handler error to owner");
        }
    }

    async fn acknowledge(&self, ctx: &UpdateContext, handler: &HandlerSpec) {
        let Some(query) = ctx.callback() else {
            return;
        };

        if let Err(e) = self.transport.answer_callback(&query.id, None).await {
            log_cleanup_failure("answer callback", handler.name(), &e);
        }

        if handler.keeps_prompt() {
            return;
        }
        if let Some(prompt) = &query.message {
            if let Err(e) = self
                .transport
                .delete_message(prompt.chat.id, prompt.id)
                .await
            {
                log_cleanup_failure("delete prompt", handler.name(), &e);
            }
        }
    }
}

fn log_cleanup_failure(step: &str, handler: &str, error: &ApiError) {
    if error.is_benign() {
        trace!(step, handler, error = %error, "Ignoring benign cleanup failure");
    } else {
        warn!(step, handler, error = %error, "Callback cleanup failed");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("modules", &self.registry.len())
            .field("handler_timeout", &self.handler_timeout)
            .finish()
    }
}
