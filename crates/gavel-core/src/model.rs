//! Platform-neutral chat model.
//!
//! Transports translate their wire types into these before an update reaches
//! the dispatcher, so nothing above this layer depends on a specific API.

use serde::{Deserialize, Serialize};

/// Chat identifier. Negative for groups on most platforms.
pub type ChatId = i64;

/// User identifier.
pub type UserId = i64;

/// Message identifier, unique within a chat.
pub type MessageId = i64;

// =============================================================================
// Chats & Users
// =============================================================================

/// The class of a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    /// One-to-one conversation with the bot.
    Private,
    /// Basic group.
    Group,
    /// Supergroup.
    Supergroup,
    /// Broadcast channel.
    Channel,
}

/// A chat as seen by the bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    pub kind: ChatKind,
    #[serde(default)]
    pub title: Option<String>,
    /// Set for private chats only.
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    /// Legacy group flag: every member holds admin rights.
    #[serde(default)]
    pub all_members_are_administrators: bool,
}

impl Chat {
    /// Creates a chat with no title or username.
    pub fn new(id: ChatId, kind: ChatKind) -> Self {
        Self {
            id,
            kind,
            title: None,
            first_name: None,
            username: None,
            all_members_are_administrators: false,
        }
    }

    /// Sets the chat title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Returns `true` for one-to-one chats.
    pub fn is_private(&self) -> bool {
        self.kind == ChatKind::Private
    }

    /// The user on the other end of a private chat.
    pub fn as_user(&self) -> Option<User> {
        if !self.is_private() {
            return None;
        }
        Some(User {
            id: self.id,
            is_bot: false,
            first_name: self.first_name.clone().unwrap_or_default(),
            username: self.username.clone(),
        })
    }

    /// Returns the title (or a private chat's first name), falling back to
    /// the username or the numeric id.
    pub fn display_name(&self) -> String {
        self.title
            .clone()
            .or_else(|| self.first_name.clone())
            .or_else(|| self.username.clone())
            .unwrap_or_else(|| self.id.to_string())
    }
}

/// A platform user (or bot).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

impl User {
    pub fn new(id: UserId, first_name: impl Into<String>) -> Self {
        Self {
            id,
            is_bot: false,
            first_name: first_name.into(),
            username: None,
        }
    }

    /// Sets the username.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

// =============================================================================
// Membership
// =============================================================================

/// Membership status of a user in a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Creator,
    Administrator,
    Member,
    Restricted,
    Left,
    Kicked,
}

impl MemberStatus {
    /// `administrator` or `creator`.
    pub fn is_admin(self) -> bool {
        matches!(self, Self::Creator | Self::Administrator)
    }

    /// Anything except `left` and `kicked`.
    pub fn is_present(self) -> bool {
        !matches!(self, Self::Left | Self::Kicked)
    }
}

/// Resolved membership of one user in one chat, including admin rights.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMember {
    pub user: User,
    pub status: MemberStatus,
    #[serde(default)]
    pub can_delete_messages: bool,
    #[serde(default)]
    pub can_pin_messages: bool,
    #[serde(default)]
    pub can_promote_members: bool,
    #[serde(default)]
    pub can_restrict_members: bool,
}

impl ChatMember {
    /// A member with the given status and no admin rights.
    pub fn new(user: User, status: MemberStatus) -> Self {
        Self {
            user,
            status,
            can_delete_messages: false,
            can_pin_messages: false,
            can_promote_members: false,
            can_restrict_members: false,
        }
    }

    /// The creator implicitly holds every right.
    fn has_right(&self, right: bool) -> bool {
        self.status == MemberStatus::Creator || (self.status == MemberStatus::Administrator && right)
    }

    pub fn can_delete(&self) -> bool {
        self.has_right(self.can_delete_messages)
    }

    pub fn can_pin(&self) -> bool {
        self.has_right(self.can_pin_messages)
    }

    pub fn can_promote(&self) -> bool {
        self.has_right(self.can_promote_members)
    }

    pub fn can_restrict(&self) -> bool {
        self.has_right(self.can_restrict_members)
    }
}

// =============================================================================
// Messages & Updates
// =============================================================================

/// An inbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    /// Unix timestamp.
    #[serde(default)]
    pub date: i64,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    /// Entities of `text`, with offsets in UTF-16 code units.
    #[serde(default)]
    pub entities: Vec<MessageEntity>,
    #[serde(default)]
    pub reply_to: Option<Box<Message>>,
    /// Set on the service message left in a group that was upgraded.
    #[serde(default)]
    pub migrate_to_chat_id: Option<ChatId>,
    /// Set on the first service message of the upgraded chat.
    #[serde(default)]
    pub migrate_from_chat_id: Option<ChatId>,
}

impl Message {
    /// Creates a plain text message.
    pub fn text(id: MessageId, chat: Chat, from: Option<User>, text: impl Into<String>) -> Self {
        Self {
            id,
            chat,
            from,
            date: 0,
            text: Some(text.into()),
            caption: None,
            entities: Vec::new(),
            reply_to: None,
            migrate_to_chat_id: None,
            migrate_from_chat_id: None,
        }
    }

    /// Text body, or the media caption when there is no text.
    pub fn content(&self) -> Option<&str> {
        self.text.as_deref().or(self.caption.as_deref())
    }

    /// Resolves `(old_chat_id, new_chat_id)` if this is a migration notice.
    pub fn migration(&self) -> Option<(ChatId, ChatId)> {
        match (self.migrate_to_chat_id, self.migrate_from_chat_id) {
            (Some(to), _) => Some((self.chat.id, to)),
            (None, Some(from)) => Some((from, self.chat.id)),
            (None, None) => None,
        }
    }

    /// Entities of `kind`, in message order.
    pub fn entities_of(&self, kind: EntityKind) -> impl Iterator<Item = &MessageEntity> {
        self.entities.iter().filter(move |entity| entity.kind == kind)
    }
}

/// The class of a [`MessageEntity`]. Kinds Gavel never reads collapse into
/// [`Other`](EntityKind::Other).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// `@username`.
    Mention,
    /// A mention of a user without a username; carries the user.
    TextMention,
    BotCommand,
    #[serde(other)]
    Other,
}

/// A marked-up span of a message's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEntity {
    pub kind: EntityKind,
    /// Start, in UTF-16 code units.
    pub offset: usize,
    /// Length, in UTF-16 code units.
    pub length: usize,
    /// Set for [`EntityKind::TextMention`].
    #[serde(default)]
    pub user: Option<User>,
}

impl MessageEntity {
    pub fn new(kind: EntityKind, offset: usize, length: usize) -> Self {
        Self {
            kind,
            offset,
            length,
            user: None,
        }
    }

    /// A text mention of `user`.
    pub fn text_mention(offset: usize, length: usize, user: User) -> Self {
        Self {
            kind: EntityKind::TextMention,
            offset,
            length,
            user: Some(user),
        }
    }
}

/// A button press on an inline keyboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    /// The message carrying the pressed keyboard, if still accessible.
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

/// Payload of an inbound [`Update`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpdateKind {
    Message(Message),
    EditedMessage(Message),
    CallbackQuery(CallbackQuery),
    /// Update types the bot does not act on.
    Other,
}

/// One inbound event from the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub id: i64,
    pub kind: UpdateKind,
}

impl Update {
    pub fn new(id: i64, kind: UpdateKind) -> Self {
        Self { id, kind }
    }

    /// The message this update is about: the message itself, or the message
    /// carrying a pressed button.
    pub fn message(&self) -> Option<&Message> {
        match &self.kind {
            UpdateKind::Message(message) | UpdateKind::EditedMessage(message) => Some(message),
            UpdateKind::CallbackQuery(query) => query.message.as_ref(),
            UpdateKind::Other => None,
        }
    }

    pub fn chat(&self) -> Option<&Chat> {
        self.message().map(|message| &message.chat)
    }

    pub fn chat_id(&self) -> Option<ChatId> {
        self.chat().map(|chat| chat.id)
    }

    /// The user who caused this update.
    pub fn user(&self) -> Option<&User> {
        match &self.kind {
            UpdateKind::Message(message) | UpdateKind::EditedMessage(message) => {
                message.from.as_ref()
            }
            UpdateKind::CallbackQuery(query) => Some(&query.from),
            UpdateKind::Other => None,
        }
    }

    pub fn callback(&self) -> Option<&CallbackQuery> {
        match &self.kind {
            UpdateKind::CallbackQuery(query) => Some(query),
            _ => None,
        }
    }

    /// `(old, new)` if this update announces a chat migration.
    pub fn migration(&self) -> Option<(ChatId, ChatId)> {
        match &self.kind {
            UpdateKind::Message(message) => message.migration(),
            _ => None,
        }
    }
}
