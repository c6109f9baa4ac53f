//! Permission predicates and handler guards.
//!
//! [`PermissionGuard`] answers questions about a chat and an actor. Every
//! membership lookup that fails is treated as "no": the guard never grants
//! a permission it could not verify.
//!
//! [`Guard`] is the precondition a handler registration declares. The
//! dispatcher evaluates it before invoking the handler; each variant owns
//! its output policy on rejection (reply, delete, or stay silent).

use std::collections::HashSet;

use gavel_core::{Chat, ChatId, ChatMember, OutgoingMessage, Transport, UserId};
use tracing::debug;

use crate::context::UpdateContext;

pub const NOT_ADMIN_REPLY: &str = "Who dis non-admin telling me what to do?";
pub const BOT_NOT_ADMIN_REPLY: &str = "I'm not admin!";
pub const BOT_CANT_DELETE_REPLY: &str =
    "I can't delete messages here! Make sure I'm admin and can delete other user's messages.";
pub const BOT_CANT_PIN_REPLY: &str =
    "I can't pin messages here! Make sure I'm admin and can pin messages.";
pub const BOT_CANT_PROMOTE_REPLY: &str =
    "I can't promote/demote people here! Make sure I'm admin and can appoint new admins.";
pub const BOT_CANT_RESTRICT_REPLY: &str =
    "I can't restrict people here! Make sure I'm admin and can appoint new admins.";

// =============================================================================
// Identities
// =============================================================================

/// Process-wide identity sets, loaded once from configuration.
#[derive(Debug, Clone)]
pub struct Identities {
    owner: UserId,
    sudo: HashSet<UserId>,
    support: HashSet<UserId>,
    whitelist: HashSet<UserId>,
}

impl Identities {
    /// The owner is always added to the sudo set.
    pub fn new(
        owner: UserId,
        sudo: impl IntoIterator<Item = UserId>,
        support: impl IntoIterator<Item = UserId>,
        whitelist: impl IntoIterator<Item = UserId>,
    ) -> Self {
        let mut sudo: HashSet<_> = sudo.into_iter().collect();
        sudo.insert(owner);
        Self {
            owner,
            sudo,
            support: support.into_iter().collect(),
            whitelist: whitelist.into_iter().collect(),
        }
    }

    pub fn owner(&self) -> UserId {
        self.owner
    }

    pub fn is_owner(&self, user_id: UserId) -> bool {
        self.owner == user_id
    }

    pub fn is_sudo(&self, user_id: UserId) -> bool {
        self.sudo.contains(&user_id)
    }

    pub fn is_support(&self, user_id: UserId) -> bool {
        self.support.contains(&user_id)
    }

    pub fn is_whitelisted(&self, user_id: UserId) -> bool {
        self.whitelist.contains(&user_id)
    }
}

// =============================================================================
// PermissionGuard
// =============================================================================

/// Permission predicates over a transport and the configured identities.
pub struct PermissionGuard<'a> {
    transport: &'a dyn Transport,
    identities: &'a Identities,
    bot_id: UserId,
}

impl<'a> PermissionGuard<'a> {
    pub fn new(transport: &'a dyn Transport, identities: &'a Identities, bot_id: UserId) -> Self {
        Self {
            transport,
            identities,
            bot_id,
        }
    }

    /// Users that moderation actions must not touch.
    pub async fn is_ban_protected(&self, chat: &Chat, user_id: UserId) -> bool {
        chat.is_private()
            || self.identities.is_sudo(user_id)
            || self.identities.is_whitelisted(user_id)
            || chat.all_members_are_administrators
            || self.status_is_admin(chat.id, user_id).await
    }

    pub async fn is_user_admin(&self, chat: &Chat, user_id: UserId) -> bool {
        chat.is_private()
            || self.identities.is_sudo(user_id)
            || chat.all_members_are_administrators
            || self.status_is_admin(chat.id, user_id).await
    }

    pub async fn is_bot_admin(&self, chat: &Chat) -> bool {
        chat.is_private()
            || chat.all_members_are_administrators
            || self.status_is_admin(chat.id, self.bot_id).await
    }

    /// `true` unless the user has left or been kicked.
    pub async fn is_user_in_chat(&self, chat: &Chat, user_id: UserId) -> bool {
        self.member(chat.id, user_id)
            .await
            .is_some_and(|member| member.status.is_present())
    }

    pub async fn bot_can_delete(&self, chat: &Chat) -> bool {
        self.bot_member(chat)
            .await
            .is_some_and(|member| member.can_delete())
    }

    /// The bot's own membership, if it can be resolved.
    pub async fn bot_member(&self, chat: &Chat) -> Option<ChatMember> {
        self.member(chat.id, self.bot_id).await
    }

    async fn status_is_admin(&self, chat_id: ChatId, user_id: UserId) -> bool {
        self.member(chat_id, user_id)
            .await
            .is_some_and(|member| member.status.is_admin())
    }

    async fn member(&self, chat_id: ChatId, user_id: UserId) -> Option<ChatMember> {
        match self.transport.get_chat_member(chat_id, user_id).await {
            Ok(member) => Some(member),
            Err(e) => {
                debug!(chat_id, user_id, error = %e, "Membership lookup failed, denying");
                None
            }
        }
    }
}

// =============================================================================
// Guard
// =============================================================================

/// A named precondition attached to a handler registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    /// Actor must be an admin; non-admins get a rejection reply, or have a
    /// bare command deleted when `del_cmds` is on.
    UserAdmin,
    /// Like [`Guard::UserAdmin`] but never replies.
    UserAdminSilent,
    /// Actor must be known and not an admin; no output on rejection.
    UserNotAdmin,
    BotAdmin,
    BotCanDelete,
    BotCanPin,
    BotCanPromote,
    BotCanRestrict,
    /// Actor must be in the sudo set; silent.
    Sudo,
    /// Actor must be the owner; silent.
    Owner,
}

impl Guard {
    /// Evaluates the guard, producing its rejection output if any.
    /// Returns `true` when the handler may run.
    pub async fn check(self, ctx: &UpdateContext) -> bool {
        match self {
            Self::UserAdmin => require_user_admin(ctx, true).await,
            Self::UserAdminSilent => require_user_admin(ctx, false).await,
            Self::UserNotAdmin => require_user_not_admin(ctx).await,
            Self::BotAdmin
            | Self::BotCanDelete
            | Self::BotCanPin
            | Self::BotCanPromote
            | Self::BotCanRestrict => require_bot_right(ctx, self).await,
            Self::Sudo => ctx
                .user()
                .is_some_and(|user| ctx.state().identities.is_sudo(user.id)),
            Self::Owner => ctx
                .user()
                .is_some_and(|user| ctx.state().identities.is_owner(user.id)),
        }
    }
}

async fn require_user_admin(ctx: &UpdateContext, notify: bool) -> bool {
    let (Some(user), Some(chat)) = (ctx.user(), ctx.chat()) else {
        return false;
    };
    if ctx.permissions().is_user_admin(chat, user.id).await {
        return true;
    }

    if let Some(query) = ctx.callback() {
        if notify {
            if let Err(e) = ctx
                .transport()
                .answer_callback(&query.id, Some(NOT_ADMIN_REPLY))
                .await
            {
                debug!(error = %e, "Failed to answer rejected callback");
            }
        }
        return false;
    }

    let Some(message) = ctx.message() else {
        return false;
    };
    let bare_command = !message
        .content()
        .is_some_and(|text| text.chars().any(char::is_whitespace));

    if ctx.state().policy.del_cmds && bare_command {
        if let Err(e) = ctx.transport().delete_message(chat.id, message.id).await {
            debug!(chat_id = chat.id, error = %e, "Could not delete non-admin command");
        }
    } else if notify {
        if let Err(e) = ctx.reply(NOT_ADMIN_REPLY).await {
            debug!(chat_id = chat.id, error = %e, "Failed to send non-admin notice");
        }
    }
    false
}

async fn require_user_not_admin(ctx: &UpdateContext) -> bool {
    let (Some(user), Some(chat)) = (ctx.user(), ctx.chat()) else {
        return false;
    };
    !ctx.permissions().is_user_admin(chat, user.id).await
}

async fn require_bot_right(ctx: &UpdateContext, guard: Guard) -> bool {
    let Some(chat) = ctx.chat() else {
        return false;
    };
    let permissions = ctx.permissions();

    let (allowed, reply) = match guard {
        Guard::BotAdmin => (permissions.is_bot_admin(chat).await, BOT_NOT_ADMIN_REPLY),
        _ => {
            let member = permissions.bot_member(chat).await;
            match guard {
                Guard::BotCanDelete => (member.is_some_and(|m| m.can_delete()), BOT_CANT_DELETE_REPLY),
                Guard::BotCanPin => (member.is_some_and(|m| m.can_pin()), BOT_CANT_PIN_REPLY),
                Guard::BotCanPromote => (member.is_some_and(|m| m.can_promote()), BOT_CANT_PROMOTE_REPLY),
                _ => (member.is_some_and(|m| m.can_restrict()), BOT_CANT_RESTRICT_REPLY),
            }
        }
    };

    if !allowed {
        let message = OutgoingMessage::new(chat.id, reply);
        let message = match ctx.message() {
            Some(trigger) if ctx.callback().is_none() => message.reply_to(trigger.id),
            _ => message,
        };
        if let Err(e) = ctx.transport().send_message(message).await {
            debug!(chat_id = chat.id, error = %e, "Failed to send missing-rights notice");
        }
    }
    allowed
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use gavel_core::{ChatKind, MemberStatus};

    use super::*;
    use crate::testing::{MockTransport, context_for, group_chat, text_update};

    const BOT: UserId = 1;

    fn identities() -> Identities {
        Identities::new(100, [200], [300], [400])
    }

    #[test]
    fn test_owner_is_always_sudo() {
        let ids = identities();
        assert!(ids.is_sudo(100));
        assert!(ids.is_sudo(200));
        assert!(!ids.is_sudo(300));
        assert!(ids.is_support(300));
    }

    #[tokio::test]
    async fn test_predicates_use_membership() {
        let transport = MockTransport::new();
        transport.set_member(-10, 5, MemberStatus::Administrator);
        transport.set_member(-10, 6, MemberStatus::Member);
        let ids = identities();
        let guard = PermissionGuard::new(&transport, &ids, BOT);
        let chat = group_chat(-10);

        assert!(guard.is_user_admin(&chat, 5).await);
        assert!(!guard.is_user_admin(&chat, 6).await);
        assert!(guard.is_user_admin(&chat, 200).await);
        assert!(!guard.is_user_admin(&chat, 400).await);
        assert!(guard.is_ban_protected(&chat, 400).await);
        assert!(guard.is_user_in_chat(&chat, 6).await);
    }

    #[tokio::test]
    async fn test_private_and_all_admin_chats_short_circuit() {
        let transport = MockTransport::new();
        transport.fail_member_lookups();
        let ids = identities();
        let guard = PermissionGuard::new(&transport, &ids, BOT);

        let private = Chat::new(7, ChatKind::Private);
        assert!(guard.is_user_admin(&private, 7).await);
        assert!(guard.is_bot_admin(&private).await);

        let mut legacy = group_chat(-11);
        legacy.all_members_are_administrators = true;
        assert!(guard.is_user_admin(&legacy, 8).await);
        assert!(guard.is_bot_admin(&legacy).await);
    }

    #[tokio::test]
    async fn test_lookup_failure_fails_closed() {
        let transport = MockTransport::new();
        transport.fail_member_lookups();
        let ids = identities();
        let guard = PermissionGuard::new(&transport, &ids, BOT);
        let chat = group_chat(-10);

        assert!(!guard.is_user_admin(&chat, 5).await);
        assert!(!guard.is_bot_admin(&chat).await);
        assert!(!guard.is_user_in_chat(&chat, 5).await);
        assert!(!guard.bot_can_delete(&chat).await);
    }

    #[tokio::test]
    async fn test_user_admin_guard_replies_to_non_admin() {
        let transport = Arc::new(MockTransport::new());
        transport.set_member(-10, 6, MemberStatus::Member);
        let ctx = context_for(transport.clone(), text_update(-10, 6, "/setrules be nice"));

        assert!(!Guard::UserAdmin.check(&ctx).await);
        assert_eq!(transport.sent_texts(), vec![NOT_ADMIN_REPLY.to_string()]);
        assert!(transport.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_user_admin_guard_deletes_bare_command_when_configured() {
        let transport = Arc::new(MockTransport::new());
        transport.set_member(-10, 6, MemberStatus::Member);
        transport.fail_deletes();
        let mut ctx = context_for(transport.clone(), text_update(-10, 6, "/clearrules"));
        ctx.state_mut().policy.del_cmds = true;

        assert!(!Guard::UserAdmin.check(&ctx).await);
        assert!(transport.sent_texts().is_empty());
        assert_eq!(transport.delete_attempts(), 1);
    }

    #[tokio::test]
    async fn test_silent_and_not_admin_guards_produce_no_output() {
        let transport = Arc::new(MockTransport::new());
        transport.set_member(-10, 6, MemberStatus::Member);
        transport.set_member(-10, 5, MemberStatus::Creator);

        let member = context_for(transport.clone(), text_update(-10, 6, "/purge now"));
        assert!(!Guard::UserAdminSilent.check(&member).await);
        assert!(Guard::UserNotAdmin.check(&member).await);

        let admin = context_for(transport.clone(), text_update(-10, 5, "/kickme"));
        assert!(!Guard::UserNotAdmin.check(&admin).await);
        assert!(transport.sent_texts().is_empty());
    }

    #[tokio::test]
    async fn test_user_guards_drop_updates_without_a_sender() {
        let transport = Arc::new(MockTransport::new());
        let anonymous = gavel_core::Update::new(
            1,
            gavel_core::UpdateKind::Message(gavel_core::Message::text(
                10,
                group_chat(-10),
                None,
                "/setrules",
            )),
        );
        let mut ctx = context_for(transport.clone(), anonymous);
        ctx.state_mut().policy.del_cmds = true;

        assert!(!Guard::UserAdmin.check(&ctx).await);
        assert!(!Guard::UserAdminSilent.check(&ctx).await);
        assert!(!Guard::UserNotAdmin.check(&ctx).await);
        assert!(transport.sent_texts().is_empty());
        assert_eq!(transport.delete_attempts(), 0);
    }

    #[tokio::test]
    async fn test_bot_right_guards_reply_with_remediation() {
        let transport = Arc::new(MockTransport::new());
        let mut bot = ChatMember::new(gavel_core::User::new(BOT, "bot"), MemberStatus::Administrator);
        bot.can_delete_messages = true;
        transport.insert_member(-10, bot);
        let ctx = context_for(transport.clone(), text_update(-10, 5, "/pin"));

        assert!(Guard::BotAdmin.check(&ctx).await);
        assert!(Guard::BotCanDelete.check(&ctx).await);
        assert!(!Guard::BotCanPin.check(&ctx).await);
        assert_eq!(transport.sent_texts(), vec![BOT_CANT_PIN_REPLY.to_string()]);

        transport.fail_member_lookups();
        assert!(!Guard::BotCanRestrict.check(&ctx).await);
        assert_eq!(transport.sent_texts().last().map(String::as_str), Some(BOT_CANT_RESTRICT_REPLY));
    }

    #[tokio::test]
    async fn test_identity_guards() {
        let transport = Arc::new(MockTransport::new());
        let owner = context_for(transport.clone(), text_update(-10, 100, "/stats"));
        let sudo = context_for(transport.clone(), text_update(-10, 200, "/stats"));
        let nobody = context_for(transport.clone(), text_update(-10, 6, "/stats"));

        assert!(Guard::Owner.check(&owner).await);
        assert!(!Guard::Owner.check(&sudo).await);
        assert!(Guard::Sudo.check(&sudo).await);
        assert!(!Guard::Sudo.check(&nobody).await);
    }
}
