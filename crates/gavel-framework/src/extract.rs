//! Finding the user a command is aimed at.
//!
//! A command can name its target four ways, tried in order:
//!
//! 1. a text mention (a mention of a user without a username) right after
//!    the command;
//! 2. `@username`, resolved through the [`UserDirectory`](crate::UserDirectory);
//! 3. a numeric user id;
//! 4. replying to one of the target's messages.
//!
//! Usernames and ids are checked with `get_chat`, since the bot can only act
//! on users it has seen.

use gavel_core::{ApiError, EntityKind, Message, User, UserId};
use tower::BoxError;
use tracing::debug;

use crate::context::UpdateContext;

pub const UNKNOWN_USERNAME_REPLY: &str = "I don't have that user in my db. You'll be able to \
interact with them if you reply to that person's message instead, or forward one of that user's \
messages.";

pub const NEVER_SEEN_REPLY: &str = "I don't seem to have interacted with this user before - \
please forward a message from them to give me control! (like a voodoo doll, I need a piece of \
them to be able to execute certain commands...)";

/// A resolved target and whatever text followed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub user: User,
    /// Remaining command text, trimmed. Empty when there is none.
    pub text: String,
}

/// What [`extract_user_and_text`] found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Found(Target),
    /// Nothing in the command refers to a user.
    NoTarget,
    /// A target was named but cannot be used; the chat has been told why.
    Rejected,
}

impl Extraction {
    pub fn user(self) -> Option<User> {
        match self {
            Self::Found(target) => Some(target.user),
            Self::NoTarget | Self::Rejected => None,
        }
    }
}

/// Resolves the command's target user and the text after it.
pub async fn extract_user_and_text(ctx: &UpdateContext) -> Result<Extraction, BoxError> {
    let Some(message) = ctx.message() else {
        return Ok(Extraction::NoTarget);
    };
    let raw = ctx.raw_args().trim();
    let from_reply = || match message.reply_to.as_ref().and_then(|reply| reply.from.clone()) {
        Some(user) => Extraction::Found(Target {
            user,
            text: raw.to_string(),
        }),
        None => Extraction::NoTarget,
    };

    if raw.is_empty() {
        return Ok(from_reply());
    }

    if let Some(target) = leading_text_mention(message, ctx.raw_args()) {
        return Ok(Extraction::Found(target));
    }

    let (first, rest) = match raw.split_once(char::is_whitespace) {
        Some((first, rest)) => (first, rest.trim()),
        None => (raw, ""),
    };

    let user_id = if first.starts_with('@') {
        let resolved = match ctx.users() {
            Some(users) => users.resolve(first).await?,
            None => None,
        };
        match resolved {
            Some(user_id) => user_id,
            None => {
                debug!(username = first, "Unknown username");
                ctx.reply(UNKNOWN_USERNAME_REPLY).await?;
                return Ok(Extraction::Rejected);
            }
        }
    } else if !first.is_empty() && first.chars().all(|c| c.is_ascii_digit()) {
        match first.parse::<UserId>() {
            Ok(user_id) => user_id,
            Err(_) => return Ok(from_reply()),
        }
    } else {
        return Ok(from_reply());
    };

    match lookup_user(ctx, user_id).await? {
        Some(user) => Ok(Extraction::Found(Target {
            user,
            text: rest.to_string(),
        })),
        None => {
            ctx.reply(NEVER_SEEN_REPLY).await?;
            Ok(Extraction::Rejected)
        }
    }
}

/// Resolves only the target user.
pub async fn extract_user(ctx: &UpdateContext) -> Result<Extraction, BoxError> {
    Ok(match extract_user_and_text(ctx).await? {
        Extraction::Found(mut target) => {
            target.text.clear();
            Extraction::Found(target)
        }
        other => other,
    })
}

async fn lookup_user(ctx: &UpdateContext, user_id: UserId) -> Result<Option<User>, ApiError> {
    match ctx.transport().get_chat(user_id).await {
        Ok(chat) => Ok(chat.as_user()),
        Err(ApiError::BadRequest(description) | ApiError::NotFoundOrForbidden(description)) => {
            debug!(user_id, %description, "Target user lookup failed");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// A text mention that starts exactly where the arguments start.
fn leading_text_mention(message: &Message, raw_args: &str) -> Option<Target> {
    let content = message.content()?;
    let args_start = content.len().checked_sub(raw_args.len())?;
    if !content.is_char_boundary(args_start) || &content[args_start..] != raw_args {
        return None;
    }
    let offset = content[..args_start].encode_utf16().count();

    let entity = message
        .entities_of(EntityKind::TextMention)
        .find(|entity| entity.offset == offset)?;
    let user = entity.user.clone()?;
    let end = utf16_to_byte(content, entity.offset + entity.length)?;
    Some(Target {
        user,
        text: content[end..].trim().to_string(),
    })
}

/// Byte index of the `units`-th UTF-16 code unit of `text`.
fn utf16_to_byte(text: &str, units: usize) -> Option<usize> {
    let mut seen = 0;
    for (index, c) in text.char_indices() {
        if seen == units {
            return Some(index);
        }
        seen += c.len_utf16();
    }
    (seen == units).then_some(text.len())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use gavel_core::{Chat, ChatKind, MemoryStore, MessageEntity, Update, UpdateKind};

    use super::*;
    use crate::testing::{MockTransport, chat_for, context_for};
    use crate::users::UserDirectory;

    const CHAT: i64 = -10;

    fn update_with(text: &str, reply_from: Option<User>, entities: Vec<MessageEntity>) -> Update {
        let mut message = Message::text(10, chat_for(CHAT), Some(User::new(5, "caller")), text);
        message.entities = entities;
        message.reply_to = reply_from
            .map(|user| Box::new(Message::text(9, chat_for(CHAT), Some(user), "earlier")));
        Update::new(1, UpdateKind::Message(message))
    }

    fn private_chat(id: i64, first_name: &str) -> Chat {
        let mut chat = Chat::new(id, ChatKind::Private);
        chat.first_name = Some(first_name.to_string());
        chat
    }

    #[tokio::test]
    async fn test_reply_target_keeps_arguments_as_text() {
        let transport = Arc::new(MockTransport::new());
        let ctx = context_for(
            transport,
            update_with("/warn spamming", Some(User::new(8, "Bob")), Vec::new()),
        );
        assert_eq!(
            extract_user_and_text(&ctx).await.unwrap(),
            Extraction::Found(Target {
                user: User::new(8, "Bob"),
                text: "spamming".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_numeric_id_is_checked_with_get_chat() {
        let transport = Arc::new(MockTransport::new());
        transport.insert_chat(private_chat(42, "Dave"));

        let ctx = context_for(transport.clone(), update_with("/ban 42 flooding", None, Vec::new()));
        let Extraction::Found(target) = extract_user_and_text(&ctx).await.unwrap() else {
            panic!("expected a target");
        };
        assert_eq!(target.user.first_name, "Dave");
        assert_eq!(target.text, "flooding");

        let unknown = context_for(transport.clone(), update_with("/ban 43", None, Vec::new()));
        assert_eq!(extract_user(&unknown).await.unwrap(), Extraction::Rejected);
        assert_eq!(transport.sent_texts(), vec![NEVER_SEEN_REPLY.to_string()]);
    }

    #[tokio::test]
    async fn test_username_needs_the_directory() {
        let transport = Arc::new(MockTransport::new());
        transport.insert_chat(private_chat(42, "Dave"));
        let users = UserDirectory::new(Arc::new(MemoryStore::new()));
        users
            .record(&User::new(42, "Dave").with_username("dave"))
            .await
            .unwrap();

        let ctx = context_for(transport.clone(), update_with("/info @Dave", None, Vec::new()))
            .with_users(Some(Arc::new(users)));
        assert_eq!(
            extract_user(&ctx).await.unwrap().user().map(|user| user.id),
            Some(42)
        );

        let ctx = context_for(transport.clone(), update_with("/info @nobody", None, Vec::new()));
        assert_eq!(extract_user(&ctx).await.unwrap(), Extraction::Rejected);
        assert_eq!(transport.sent_texts(), vec![UNKNOWN_USERNAME_REPLY.to_string()]);
    }

    #[tokio::test]
    async fn test_text_mention_after_command() {
        let transport = Arc::new(MockTransport::new());
        let erin = User::new(77, "Érin");
        // "/ban " is five UTF-16 units; "Érin" is four.
        let update = update_with(
            "/ban Érin too loud",
            None,
            vec![MessageEntity::text_mention(5, 4, erin.clone())],
        );
        let ctx = context_for(transport.clone(), update);
        assert_eq!(
            extract_user_and_text(&ctx).await.unwrap(),
            Extraction::Found(Target {
                user: erin,
                text: "too loud".to_string(),
            })
        );
        assert!(transport.sent_texts().is_empty());
    }

    #[tokio::test]
    async fn test_nothing_to_extract() {
        let transport = Arc::new(MockTransport::new());
        let bare = context_for(transport.clone(), update_with("/info", None, Vec::new()));
        assert_eq!(extract_user(&bare).await.unwrap(), Extraction::NoTarget);

        let words = context_for(transport.clone(), update_with("/info someone", None, Vec::new()));
        assert_eq!(extract_user(&words).await.unwrap(), Extraction::NoTarget);
        assert!(transport.sent_texts().is_empty());
    }

    #[test]
    fn test_utf16_offsets() {
        assert_eq!(utf16_to_byte("a😀b", 0), Some(0));
        assert_eq!(utf16_to_byte("a😀b", 3), Some(5));
        assert_eq!(utf16_to_byte("a😀b", 4), Some(6));
        assert_eq!(utf16_to_byte("a😀b", 2), None);
        assert_eq!(utf16_to_byte("a😀b", 9), None);
    }
}
