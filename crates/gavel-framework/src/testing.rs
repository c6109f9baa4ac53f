//! Test doubles for handler and module tests.
//!
//! Compiled for this crate's own tests and, through the `testing` feature,
//! for downstream crates that test their modules.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

use async_trait::async_trait;
use gavel_core::{
    ApiError, ApiResult, CallbackQuery, Chat, ChatId, ChatKind, ChatMember, InlineKeyboard,
    MemberStatus, Message, MessageId, MessageRef, OutgoingMessage, ParseMode, Transport, Update,
    UpdateKind, User, UserId,
};
use parking_lot::Mutex;

use crate::context::{BotState, Policy, UpdateContext};
use crate::guard::Identities;
use crate::registry::Registry;

pub const BOT_ID: UserId = 1;
pub const OWNER_ID: UserId = 100;

/// Records every outbound call; membership answers are scripted.
#[derive(Default)]
pub struct MockTransport {
    members: Mutex<HashMap<(ChatId, UserId), ChatMember>>,
    chats: Mutex<HashMap<ChatId, Chat>>,
    sent: Mutex<Vec<OutgoingMessage>>,
    deleted: Mutex<Vec<(ChatId, MessageId)>>,
    answered: Mutex<Vec<(String, Option<String>)>>,
    delete_attempts: AtomicUsize,
    next_message_id: AtomicI64,
    fail_members: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_member(&self, chat_id: ChatId, user_id: UserId, status: MemberStatus) {
        self.insert_member(chat_id, ChatMember::new(User::new(user_id, "member"), status));
    }

    pub fn insert_member(&self, chat_id: ChatId, member: ChatMember) {
        self.members.lock().insert((chat_id, member.user.id), member);
    }

    pub fn insert_chat(&self, chat: Chat) {
        self.chats.lock().insert(chat.id, chat);
    }

    pub fn fail_member_lookups(&self) {
        self.fail_members.store(true, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self) {
        self.fail_deletes.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent.lock().iter().map(|m| m.text.clone()).collect()
    }

    pub fn deleted(&self) -> Vec<(ChatId, MessageId)> {
        self.deleted.lock().clone()
    }

    pub fn delete_attempts(&self) -> usize {
        self.delete_attempts.load(Ordering::SeqCst)
    }

    pub fn answered(&self) -> Vec<(String, Option<String>)> {
        self.answered.lock().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_message(&self, message: OutgoingMessage) -> ApiResult<MessageRef> {
        let message_id = self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1000;
        let chat_id = message.chat_id;
        self.sent.lock().push(message);
        Ok(MessageRef {
            chat_id,
            message_id,
        })
    }

    async fn edit_message_text(
        &self,
        _chat_id: ChatId,
        _message_id: MessageId,
        _text: &str,
        _parse_mode: Option<ParseMode>,
        _keyboard: Option<InlineKeyboard>,
    ) -> ApiResult<()> {
        Ok(())
    }

    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> ApiResult<()> {
        self.delete_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(ApiError::not_found("message can't be deleted"));
        }
        self.deleted.lock().push((chat_id, message_id));
        Ok(())
    }

    async fn get_chat(&self, chat_id: ChatId) -> ApiResult<Chat> {
        self.chats
            .lock()
            .get(&chat_id)
            .cloned()
            .ok_or_else(|| ApiError::bad_request("Bad Request: chat not found"))
    }

    async fn get_chat_member(&self, chat_id: ChatId, user_id: UserId) -> ApiResult<ChatMember> {
        if self.fail_members.load(Ordering::SeqCst) {
            return Err(ApiError::Timeout);
        }
        Ok(self
            .members
            .lock()
            .get(&(chat_id, user_id))
            .cloned()
            .unwrap_or_else(|| ChatMember::new(User::new(user_id, "stranger"), MemberStatus::Left)))
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> ApiResult<()> {
        self.answered
            .lock()
            .push((callback_id.to_string(), text.map(str::to_string)));
        Ok(())
    }

    async fn get_me(&self) -> ApiResult<User> {
        Ok(bot_user())
    }
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

pub fn bot_user() -> User {
    let mut me = User::new(BOT_ID, "Gavel").with_username("gavel_bot");
    me.is_bot = true;
    me
}

pub fn bot_state() -> BotState {
    BotState::new(
        bot_user(),
        Identities::new(OWNER_ID, [200], [300], [400]),
        Policy::default(),
    )
}

pub fn group_chat(id: ChatId) -> Chat {
    Chat::new(id, ChatKind::Supergroup).with_title("Test Group")
}

/// Chat kind follows the sign of the id: positive ids are private chats.
pub fn chat_for(id: ChatId) -> Chat {
    if id > 0 {
        Chat::new(id, ChatKind::Private)
    } else {
        group_chat(id)
    }
}

pub fn text_update(chat_id: ChatId, user_id: UserId, text: &str) -> Update {
    Update::new(
        1,
        UpdateKind::Message(Message::text(
            10,
            chat_for(chat_id),
            Some(User::new(user_id, "user")),
            text,
        )),
    )
}

pub fn callback_update(chat_id: ChatId, user_id: UserId, data: &str) -> Update {
    Update::new(
        2,
        UpdateKind::CallbackQuery(CallbackQuery {
            id: "cb-1".to_string(),
            from: User::new(user_id, "user"),
            message: Some(Message::text(20, chat_for(chat_id), Some(bot_user()), "menu")),
            data: Some(data.to_string()),
        }),
    )
}

pub fn context_for(transport: Arc<MockTransport>, update: Update) -> UpdateContext {
    context_with(transport, update, Registry::build(Vec::new()).unwrap())
}

pub fn context_with(
    transport: Arc<MockTransport>,
    update: Update,
    registry: Registry,
) -> UpdateContext {
    let command = update
        .message()
        .and_then(|m| m.content())
        .and_then(|text| crate::command::parse_command(text, "gavel_bot", false));
    UpdateContext::new(
        update,
        command,
        transport,
        Arc::new(registry),
        Arc::new(bot_state()),
    )
}
