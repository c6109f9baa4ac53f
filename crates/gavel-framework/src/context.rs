//! Per-update handler context.
//!
//! An [`UpdateContext`] is created by the dispatcher after a handler has
//! matched. It carries the update, the parsed command (if any) and shared
//! handles to the transport, the registry and the bot's static state.

use std::sync::Arc;

use gavel_core::{
    ApiResult, CallbackQuery, Chat, ChatId, InlineKeyboard, Message, MessageRef, OutgoingMessage,
    Transport, Update, User,
};

use crate::command::ParsedCommand;
use crate::guard::{Identities, PermissionGuard};
use crate::registry::Registry;
use crate::text::split_message;
use crate::users::UserDirectory;

/// Behaviour switches loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct Policy {
    /// Delete bare admin commands sent by non-admins instead of replying.
    pub del_cmds: bool,
    /// Accept `!cmd` as well as `/cmd`.
    pub allow_excl: bool,
}

/// Static facts about the running bot, shared by every update.
#[derive(Debug, Clone)]
pub struct BotState {
    /// The bot's own account, from `get_me`.
    pub me: User,
    pub identities: Identities,
    pub policy: Policy,
}

impl BotState {
    pub fn new(me: User, identities: Identities, policy: Policy) -> Self {
        Self {
            me,
            identities,
            policy,
        }
    }

    /// Username used in deep links and `/cmd@bot` matching.
    pub fn username(&self) -> &str {
        self.me.username.as_deref().unwrap_or_default()
    }

    /// `https://t.me/<bot>?start=<payload>`.
    pub fn deep_link(&self, payload: &str) -> String {
        format!("https://t.me/{}?start={payload}", self.username())
    }
}

/// Everything a handler needs to act on one update.
pub struct UpdateContext {
    update: Update,
    command: Option<ParsedCommand>,
    transport: Arc<dyn Transport>,
    registry: Arc<Registry>,
    state: Arc<BotState>,
    users: Option<Arc<UserDirectory>>,
}

impl UpdateContext {
    pub fn new(
        update: Update,
        command: Option<ParsedCommand>,
        transport: Arc<dyn Transport>,
        registry: Arc<Registry>,
        state: Arc<BotState>,
    ) -> Self {
        Self {
            update,
            command,
            transport,
            registry,
            state,
            users: None,
        }
    }

    /// Attaches the username directory.
    pub fn with_users(mut self, users: Option<Arc<UserDirectory>>) -> Self {
        self.users = users;
        self
    }

    // ─── Update accessors ────────────────────────────────────────────────────

    pub fn update(&self) -> &Update {
        &self.update
    }

    /// The triggering message, or the prompt carrying a pressed button.
    pub fn message(&self) -> Option<&Message> {
        self.update.message()
    }

    pub fn chat(&self) -> Option<&Chat> {
        self.update.chat()
    }

    pub fn user(&self) -> Option<&User> {
        self.update.user()
    }

    pub fn callback(&self) -> Option<&CallbackQuery> {
        self.update.callback()
    }

    pub fn callback_data(&self) -> Option<&str> {
        self.callback().and_then(|query| query.data.as_deref())
    }

    pub fn command(&self) -> Option<&ParsedCommand> {
        self.command.as_ref()
    }

    /// Whitespace-separated command arguments.
    pub fn args(&self) -> &[String] {
        self.command
            .as_ref()
            .map(|command| command.args.as_slice())
            .unwrap_or_default()
    }

    /// Everything after the command, with line breaks preserved.
    pub fn raw_args(&self) -> &str {
        self.command
            .as_ref()
            .map(|command| command.raw_args.as_str())
            .unwrap_or_default()
    }

    // ─── Shared handles ──────────────────────────────────────────────────────

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn state(&self) -> &BotState {
        &self.state
    }

    /// The username directory, when the dispatcher keeps one.
    pub fn users(&self) -> Option<&UserDirectory> {
        self.users.as_deref()
    }

    #[cfg(test)]
    pub(crate) fn state_mut(&mut self) -> &mut BotState {
        Arc::make_mut(&mut self.state)
    }

    /// Permission predicates bound to this update's transport.
    pub fn permissions(&self) -> PermissionGuard<'_> {
        PermissionGuard::new(
            self.transport.as_ref(),
            &self.state.identities,
            self.state.me.id,
        )
    }

    // ─── Sending ─────────────────────────────────────────────────────────────

    /// Replies in the current chat. Quotes the trigger in groups only.
    pub async fn reply(&self, text: impl Into<String>) -> ApiResult<MessageRef> {
        self.transport.send_message(self.reply_message(text)?).await
    }

    /// Markdown reply with an optional keyboard.
    pub async fn reply_markdown(
        &self,
        text: impl Into<String>,
        keyboard: Option<InlineKeyboard>,
    ) -> ApiResult<MessageRef> {
        let mut message = self.reply_message(text)?.markdown();
        message.keyboard = keyboard;
        self.transport.send_message(message).await
    }

    /// Sends text that may exceed the platform limit, split on line
    /// boundaries. The keyboard goes on the last chunk.
    pub async fn send_long(
        &self,
        chat_id: ChatId,
        text: &str,
        markdown: bool,
        keyboard: Option<InlineKeyboard>,
    ) -> ApiResult<()> {
        let chunks = split_message(text);
        let last = chunks.len().saturating_sub(1);
        let mut keyboard = keyboard;
        for (index, chunk) in chunks.into_iter().enumerate() {
            let mut message = OutgoingMessage::new(chat_id, chunk);
            if markdown {
                message = message.markdown();
            }
            if index == last {
                message.keyboard = keyboard.take();
            }
            self.transport.send_message(message).await?;
        }
        Ok(())
    }

    fn reply_message(&self, text: impl Into<String>) -> ApiResult<OutgoingMessage> {
        let message = self
            .message()
            .ok_or_else(|| gavel_core::ApiError::Other("update has no chat to reply to".into()))?;
        let outgoing = OutgoingMessage::new(message.chat.id, text);
        Ok(if message.chat.is_private() || self.callback().is_some() {
            outgoing
        } else {
            outgoing.reply_to(message.id)
        })
    }
}
