//! The outbound messaging capability.
//!
//! A [`Transport`] is everything the bot needs from the platform: sending,
//! editing and deleting messages, resolving chats and memberships, and
//! answering button presses. Update *delivery* is not part of this trait;
//! update sources push [`Update`](crate::Update)s into the runtime instead.
//!
//! Implementations must be cheap to share: the dispatcher holds a single
//! `Arc<dyn Transport>` and hands it to every handler.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::keyboard::InlineKeyboard;
use crate::model::{Chat, ChatId, ChatMember, MessageId, User, UserId};

/// Text formatting applied by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseMode {
    Markdown,
    Html,
}

/// Reference to a message the bot has sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// An outgoing text message.
///
/// ```rust,ignore
/// let msg = OutgoingMessage::new(chat_id, "*hi*")
///     .markdown()
///     .keyboard(keyboard)
///     .reply_to(message_id);
/// transport.send_message(msg).await?;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMessage {
    pub chat_id: ChatId,
    pub text: String,
    pub parse_mode: Option<ParseMode>,
    pub keyboard: Option<InlineKeyboard>,
    pub reply_to: Option<MessageId>,
    pub disable_link_preview: bool,
}

impl OutgoingMessage {
    pub fn new(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            parse_mode: None,
            keyboard: None,
            reply_to: None,
            disable_link_preview: false,
        }
    }

    pub fn markdown(mut self) -> Self {
        self.parse_mode = Some(ParseMode::Markdown);
        self
    }

    pub fn keyboard(mut self, keyboard: InlineKeyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    pub fn reply_to(mut self, message_id: MessageId) -> Self {
        self.reply_to = Some(message_id);
        self
    }

    pub fn no_link_preview(mut self) -> Self {
        self.disable_link_preview = true;
        self
    }
}

/// Outbound platform API.
///
/// `delete_message` must report a missing or undeletable message as
/// [`ApiError::NotFoundOrForbidden`](crate::ApiError::NotFoundOrForbidden).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a message and returns a reference to it.
    async fn send_message(&self, message: OutgoingMessage) -> ApiResult<MessageRef>;

    /// Replaces the text (and keyboard) of a message the bot sent earlier.
    async fn edit_message_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        parse_mode: Option<ParseMode>,
        keyboard: Option<InlineKeyboard>,
    ) -> ApiResult<()>;

    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> ApiResult<()>;

    async fn get_chat(&self, chat_id: ChatId) -> ApiResult<Chat>;

    async fn get_chat_member(&self, chat_id: ChatId, user_id: UserId) -> ApiResult<ChatMember>;

    /// Clears the loading indicator of a pressed button, optionally showing
    /// a short notice.
    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> ApiResult<()>;

    /// The bot's own account.
    async fn get_me(&self) -> ApiResult<User>;

    /// Releases connections. Calls made afterwards may fail with
    /// [`ApiError::NotConnected`](crate::ApiError::NotConnected).
    async fn close(&self) {}
}
