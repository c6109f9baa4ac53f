//! Commands that work across every loaded module.
//!
//! `/stats`, `/gdpr`, `/info`, `/export` and `/import` fan out over the
//! registry's capability indexes; `/donate` and `/ids` stand alone.

use std::sync::Arc;

use gavel_core::{ApiError, OutgoingMessage, User};
use gavel_framework::text::escape_markdown;
use gavel_framework::{
    BoxError, Capability, Extraction, Guard, ModuleDescriptor, UpdateContext, extract_user,
    on_command,
};
use serde_json::{Map, Value};
use tracing::{info, warn};

const DONATE_TEXT: &str = "Heya, glad to hear you want to donate!
Keeping a bot running takes a server and a fair amount of upkeep, and every \
donation helps pay for both. Thanks for thinking of it!";

const GDPR_DONE: &str = "Your personal data has been deleted.

Note that this will not unban you from any chats, as that is telegram data, \
not bot data.";

pub fn module(donation_link: Option<String>) -> ModuleDescriptor {
    let donation_link = Arc::new(donation_link);

    ModuleDescriptor::new("Basics")
        .handler(on_command("donate").handler(move |ctx| donate(ctx, donation_link.clone())))
        .handler(on_command("ids").handler(ids))
        .handler(on_command("info").handler(user_info))
        .handler(on_command("stats").guard(Guard::Sudo).handler(stats))
        .handler(on_command("gdpr").handler(gdpr))
        .handler(on_command("export").guard(Guard::UserAdmin).handler(export))
        .handler(on_command("import").guard(Guard::UserAdmin).handler(import))
}

// =============================================================================
// Standalone commands
// =============================================================================

async fn donate(ctx: Arc<UpdateContext>, donation_link: Arc<Option<String>>) -> Result<(), BoxError> {
    let (Some(chat), Some(user)) = (ctx.chat(), ctx.user()) else {
        return Ok(());
    };

    let mut texts = vec![DONATE_TEXT.to_string()];
    if let Some(link) = donation_link.as_deref() {
        texts.push(format!(
            "You can also donate to the person currently running me [here]({link})"
        ));
    }

    if chat.is_private() {
        send_donation(&ctx, user, &texts).await?;
        return Ok(());
    }

    match send_donation(&ctx, user, &texts).await {
        Ok(()) => {
            ctx.reply("I've PM'ed you about donating to my creator!").await?;
        }
        Err(ApiError::Forbidden(_)) => {
            ctx.reply("Contact me in PM first to get donation information.")
                .await?;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

async fn send_donation(ctx: &UpdateContext, user: &User, texts: &[String]) -> Result<(), ApiError> {
    for text in texts {
        let message = OutgoingMessage::new(user.id, text.as_str())
            .markdown()
            .no_link_preview();
        ctx.transport().send_message(message).await?;
    }
    Ok(())
}

async fn ids(ctx: Arc<UpdateContext>) -> Result<(), BoxError> {
    let (Some(chat), Some(user)) = (ctx.chat(), ctx.user()) else {
        return Ok(());
    };
    let text = format!("This chat's id is `{}`.\nYour id is `{}`.", chat.id, user.id);
    ctx.reply_markdown(text, None).await?;
    Ok(())
}

// =============================================================================
// Registry fan-out
// =============================================================================

/// `/info [user]`: what every module knows about a user. The target is
/// named by mention, `@username` or id, or by replying to them; with none of
/// those it is the sender.
async fn user_info(ctx: Arc<UpdateContext>) -> Result<(), BoxError> {
    let Some(message) = ctx.message() else {
        return Ok(());
    };
    let user = match extract_user(&ctx).await? {
        Extraction::Found(target) => target.user,
        Extraction::Rejected => return Ok(()),
        Extraction::NoTarget if ctx.args().is_empty() => match &message.from {
            Some(sender) => sender.clone(),
            None => return Ok(()),
        },
        Extraction::NoTarget => {
            ctx.reply("I can't extract a user from this.").await?;
            return Ok(());
        }
    };

    let mut text = format!(
        "*User info*:\nID: `{}`\nFirst Name: {}",
        user.id,
        escape_markdown(&user.first_name)
    );
    if let Some(username) = &user.username {
        text.push_str(&format!("\nUsername: @{}", escape_markdown(username)));
    }

    let chat_id = ctx.chat().map(|chat| chat.id);
    for module in ctx.registry().all_with_capability(Capability::UserInfo) {
        match module.user_info(user.id, chat_id).await {
            Ok(Some(line)) => {
                text.push_str("\n\n");
                text.push_str(&line);
            }
            Ok(None) => {}
            Err(e) => warn!(module = %module.name(), user_id = user.id, error = %e, "User info failed"),
        }
    }

    ctx.send_long(message.chat.id, &text, true, None).await?;
    Ok(())
}

async fn stats(ctx: Arc<UpdateContext>) -> Result<(), BoxError> {
    let Some(chat) = ctx.chat() else {
        return Ok(());
    };

    let mut lines = vec!["Current stats:".to_string()];
    for module in ctx.registry().all_with_capability(Capability::Stats) {
        match module.stats().await {
            Ok(Some(line)) => lines.push(line),
            Ok(None) => {}
            Err(e) => warn!(module = %module.name(), error = %e, "Stats provider failed"),
        }
    }

    ctx.send_long(chat.id, &lines.join("\n"), false, None).await?;
    Ok(())
}

/// Erases the caller from every module that stores user data.
///
/// Stops at the first failing eraser so the user is never told their data
/// is gone when some of it is not.
async fn gdpr(ctx: Arc<UpdateContext>) -> Result<(), BoxError> {
    let (Some(chat), Some(user)) = (ctx.chat(), ctx.user()) else {
        return Ok(());
    };
    if !chat.is_private() {
        ctx.reply("Please run this command in PM.").await?;
        return Ok(());
    }

    for module in ctx.registry().gdpr_capable() {
        module.erase_user(user.id).await?;
    }
    if let Some(users) = ctx.users() {
        users.forget(user.id).await?;
    }
    info!(user_id = user.id, modules = ctx.registry().gdpr_capable().len(), "User data erased");

    ctx.reply(GDPR_DONE).await?;
    Ok(())
}

/// `/export`: one JSON object, keyed by module, with every module's data for
/// this chat.
async fn export(ctx: Arc<UpdateContext>) -> Result<(), BoxError> {
    let Some(chat) = ctx.chat() else {
        return Ok(());
    };

    let mut data = Map::new();
    for module in ctx.registry().all_with_capability(Capability::DataExport) {
        if let Some(value) = module.export_data(chat.id).await? {
            data.insert(module.key().to_string(), value);
        }
    }

    if data.is_empty() {
        ctx.reply("There's nothing to export for this chat.").await?;
        return Ok(());
    }
    let text = serde_json::to_string_pretty(&Value::Object(data))?;
    ctx.send_long(chat.id, &text, false, None).await?;
    Ok(())
}

/// `/import <json>`: the inverse of `/export`. Keys naming unknown modules, or
/// modules that cannot import, are skipped.
async fn import(ctx: Arc<UpdateContext>) -> Result<(), BoxError> {
    let Some(chat) = ctx.chat() else {
        return Ok(());
    };

    let data = match serde_json::from_str::<Value>(ctx.raw_args().trim()) {
        Ok(Value::Object(data)) => data,
        _ => {
            ctx.reply("That doesn't look like exported data to me.").await?;
            return Ok(());
        }
    };

    let mut imported = 0usize;
    for (key, value) in data {
        let Some(module) = ctx.registry().lookup_with(&key, Capability::DataImport) else {
            warn!(chat_id = chat.id, module = %key, "Skipping import for unknown module");
            continue;
        };
        module.import_data(chat.id, value).await?;
        imported += 1;
    }

    info!(chat_id = chat.id, imported, "Chat data imported");
    ctx.reply(format!("Imported data for {imported} modules.")).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use gavel_core::{
        Chat, ChatKind, MemberStatus, MemoryStore, Message, ParseMode, Store, Update, UpdateKind,
    };
    use gavel_framework::testing::{MockTransport, OWNER_ID, bot_state, chat_for, text_update};
    use gavel_framework::{DispatchOutcome, Dispatcher, FloodController, Registry, UserDirectory};
    use serde_json::json;

    use super::*;
    use crate::modules::{afk, rules};

    const GROUP: i64 = -100;
    const ADMIN: i64 = 7;

    fn setup(donation_link: Option<&str>) -> (Arc<MockTransport>, Arc<dyn Store>, Dispatcher) {
        let transport = Arc::new(MockTransport::new());
        transport.set_member(GROUP, ADMIN, MemberStatus::Creator);
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let registry = Registry::build(vec![
            module(donation_link.map(str::to_string)),
            rules::module(store.clone()),
            afk::module(store.clone()),
        ])
        .unwrap();
        let dispatcher = Dispatcher::new(Arc::new(registry), transport.clone(), Arc::new(bot_state()))
            .with_flood(FloodController::new(1000, Duration::from_secs(1)))
            .with_users(UserDirectory::new(store.clone()));
        (transport, store, dispatcher)
    }

    #[tokio::test]
    async fn test_donate_in_private_and_group() {
        let (transport, _store, dispatcher) = setup(Some("https://example.com/tip"));

        dispatcher.dispatch(text_update(ADMIN, ADMIN, "/donate")).await;
        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|m| m.chat_id == ADMIN));
        assert_eq!(sent[0].parse_mode, Some(ParseMode::Markdown));
        assert!(sent[0].disable_link_preview);
        assert!(sent[1].text.ends_with("[here](https://example.com/tip)"));

        dispatcher.dispatch(text_update(GROUP, ADMIN, "/donate")).await;
        let sent = transport.sent();
        assert_eq!(sent.len(), 5);
        assert_eq!(sent[4].chat_id, GROUP);
        assert_eq!(sent[4].text, "I've PM'ed you about donating to my creator!");
    }

    #[tokio::test]
    async fn test_stats_is_sudo_only() {
        let (transport, store, dispatcher) = setup(None);
        store.put("rules", "-5", json!("be nice")).await.unwrap();

        let outcome = dispatcher.dispatch(text_update(GROUP, ADMIN, "/stats")).await;
        assert_eq!(outcome, DispatchOutcome::Denied);

        dispatcher.dispatch(text_update(OWNER_ID, OWNER_ID, "/stats")).await;
        assert_eq!(
            transport.sent_texts().last().map(String::as_str),
            Some("Current stats:\n0 users are AFK.\n1 chats have rules set.")
        );
    }

    #[tokio::test]
    async fn test_gdpr_erases_user_data() {
        let (transport, store, dispatcher) = setup(None);
        store.put("afk", "42", json!({ "reason": "away" })).await.unwrap();
        store.put("usernames", "answer", json!(42)).await.unwrap();

        dispatcher.dispatch(text_update(GROUP, 42, "/gdpr")).await;
        assert!(store.get("afk", "42").await.unwrap().is_some());
        assert_eq!(transport.sent_texts(), vec!["Please run this command in PM."]);

        dispatcher.dispatch(text_update(42, 42, "/gdpr")).await;
        assert!(store.get("afk", "42").await.unwrap().is_none());
        assert!(store.get("usernames", "answer").await.unwrap().is_none());
        assert_eq!(transport.sent_texts()[1], GDPR_DONE);
    }

    #[tokio::test]
    async fn test_info_collects_user_info() {
        let (transport, store, dispatcher) = setup(None);
        store.put("afk", "8", json!({ "reason": "napping" })).await.unwrap();

        let earlier = Message::text(3, chat_for(GROUP), Some(User::new(8, "Nap_per")), "zzz");
        let mut message = Message::text(4, chat_for(GROUP), Some(User::new(9, "Curious")), "/info");
        message.reply_to = Some(Box::new(earlier));
        dispatcher.dispatch(Update::new(2, UpdateKind::Message(message))).await;

        assert_eq!(
            transport.sent_texts(),
            vec!["*User info*:\nID: `8`\nFirst Name: Nap\\_per\n\nCurrently AFK: napping"]
        );
    }

    #[tokio::test]
    async fn test_info_by_id_username_and_sender() {
        let (transport, _store, dispatcher) = setup(None);
        let mut dave = Chat::new(42, ChatKind::Private);
        dave.first_name = Some("Dave".to_string());
        dave.username = Some("dave".to_string());
        transport.insert_chat(dave);

        dispatcher.dispatch(text_update(GROUP, ADMIN, "/info 42")).await;

        let greeting = Message::text(
            5,
            chat_for(GROUP),
            Some(User::new(42, "Dave").with_username("dave")),
            "hello",
        );
        dispatcher
            .dispatch(Update::new(3, UpdateKind::Message(greeting)))
            .await;
        dispatcher.dispatch(text_update(GROUP, ADMIN, "/info @Dave")).await;

        dispatcher.dispatch(text_update(GROUP, ADMIN, "/info")).await;
        dispatcher.dispatch(text_update(GROUP, ADMIN, "/info somebody")).await;

        let dave_info = "*User info*:\nID: `42`\nFirst Name: Dave\nUsername: @dave";
        assert_eq!(
            transport.sent_texts(),
            vec![
                dave_info,
                dave_info,
                "*User info*:\nID: `7`\nFirst Name: user",
                "I can't extract a user from this.",
            ]
        );
    }

    #[tokio::test]
    async fn test_export_then_import() {
        let (transport, store, dispatcher) = setup(None);
        store.put("rules", &GROUP.to_string(), json!("no spam")).await.unwrap();

        dispatcher.dispatch(text_update(GROUP, ADMIN, "/export")).await;
        let exported = transport.sent_texts().remove(0);
        assert_eq!(
            serde_json::from_str::<Value>(&exported).unwrap(),
            json!({ "rules": { "rules": "no spam" } })
        );

        let other = -200;
        transport.set_member(other, ADMIN, MemberStatus::Administrator);
        dispatcher
            .dispatch(text_update(other, ADMIN, &format!("/import {exported}")))
            .await;
        assert_eq!(
            store.get("rules", &other.to_string()).await.unwrap(),
            Some(json!("no spam"))
        );
        assert_eq!(
            transport.sent_texts().last().map(String::as_str),
            Some("Imported data for 1 modules.")
        );

        dispatcher.dispatch(text_update(other, ADMIN, "/import nonsense")).await;
        assert_eq!(
            transport.sent_texts().last().map(String::as_str),
            Some("That doesn't look like exported data to me.")
        );
    }

    #[tokio::test]
    async fn test_ids() {
        let (transport, _store, dispatcher) = setup(None);
        dispatcher.dispatch(text_update(GROUP, ADMIN, "/ids")).await;
        assert_eq!(
            transport.sent_texts(),
            vec!["This chat's id is `-100`.\nYour id is `7`."]
        );
    }
}
