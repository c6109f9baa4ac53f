//! Mapping between Bot API wire types and `gavel-core` types.

use gavel_core::{
    ButtonAction, CallbackQuery, Chat, ChatKind, ChatMember, EntityKind, InlineKeyboard,
    MemberStatus, Message, MessageEntity, ParseMode, Update, UpdateKind, User,
};
use tracing::trace;

use crate::model::{
    InlineKeyboardButton, InlineKeyboardMarkup, TgCallbackQuery, TgChat, TgChatMember, TgMessage,
    TgMessageEntity, TgUpdate, TgUser,
};

impl From<TgUser> for User {
    fn from(user: TgUser) -> Self {
        Self {
            id: user.id,
            is_bot: user.is_bot,
            first_name: user.first_name,
            username: user.username,
        }
    }
}

fn chat_kind(kind: &str) -> ChatKind {
    match kind {
        "private" => ChatKind::Private,
        "supergroup" => ChatKind::Supergroup,
        "channel" => ChatKind::Channel,
        _ => ChatKind::Group,
    }
}

impl From<TgChat> for Chat {
    fn from(chat: TgChat) -> Self {
        Self {
            id: chat.id,
            kind: chat_kind(&chat.kind),
            title: chat.title,
            first_name: chat.first_name,
            username: chat.username,
            all_members_are_administrators: chat.all_members_are_administrators,
        }
    }
}

impl From<TgMessageEntity> for MessageEntity {
    fn from(entity: TgMessageEntity) -> Self {
        let kind = match entity.kind.as_str() {
            "mention" => EntityKind::Mention,
            "text_mention" => EntityKind::TextMention,
            "bot_command" => EntityKind::BotCommand,
            _ => EntityKind::Other,
        };
        Self {
            kind,
            offset: entity.offset,
            length: entity.length,
            user: entity.user.map(User::from),
        }
    }
}

impl From<TgMessage> for Message {
    fn from(message: TgMessage) -> Self {
        Self {
            id: message.message_id,
            chat: message.chat.into(),
            from: message.from.map(User::from),
            date: message.date,
            text: message.text,
            caption: message.caption,
            entities: message.entities.into_iter().map(MessageEntity::from).collect(),
            reply_to: message.reply_to_message.map(|reply| Box::new((*reply).into())),
            migrate_to_chat_id: message.migrate_to_chat_id,
            migrate_from_chat_id: message.migrate_from_chat_id,
        }
    }
}

impl From<TgCallbackQuery> for CallbackQuery {
    fn from(query: TgCallbackQuery) -> Self {
        Self {
            id: query.id,
            from: query.from.into(),
            message: query.message.map(Message::from),
            data: query.data,
        }
    }
}

impl From<TgUpdate> for Update {
    fn from(update: TgUpdate) -> Self {
        let kind = if let Some(message) = update.message {
            UpdateKind::Message(message.into())
        } else if let Some(message) = update.edited_message {
            UpdateKind::EditedMessage(message.into())
        } else if let Some(query) = update.callback_query {
            UpdateKind::CallbackQuery(query.into())
        } else {
            trace!(update_id = update.update_id, "Unsupported update kind");
            UpdateKind::Other
        };
        Update::new(update.update_id, kind)
    }
}

fn member_status(status: &str) -> MemberStatus {
    match status {
        "creator" => MemberStatus::Creator,
        "administrator" => MemberStatus::Administrator,
        "restricted" => MemberStatus::Restricted,
        "left" => MemberStatus::Left,
        "kicked" => MemberStatus::Kicked,
        _ => MemberStatus::Member,
    }
}

impl From<TgChatMember> for ChatMember {
    fn from(member: TgChatMember) -> Self {
        Self {
            user: member.user.into(),
            status: member_status(&member.status),
            can_delete_messages: member.can_delete_messages,
            can_pin_messages: member.can_pin_messages,
            can_promote_members: member.can_promote_members,
            can_restrict_members: member.can_restrict_members,
        }
    }
}

impl From<InlineKeyboard> for InlineKeyboardMarkup {
    fn from(keyboard: InlineKeyboard) -> Self {
        let inline_keyboard = keyboard
            .rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|button| match button.action {
                        ButtonAction::Callback(data) => InlineKeyboardButton {
                            text: button.text,
                            callback_data: Some(data),
                            url: None,
                        },
                        ButtonAction::Url(url) => InlineKeyboardButton {
                            text: button.text,
                            callback_data: None,
                            url: Some(url),
                        },
                    })
                    .collect()
            })
            .collect();
        Self { inline_keyboard }
    }
}

pub fn parse_mode(mode: ParseMode) -> &'static str {
    match mode {
        ParseMode::Markdown => "Markdown",
        ParseMode::Html => "HTML",
    }
}
