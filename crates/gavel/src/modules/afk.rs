//! Away-from-keyboard status.
//!
//! `/afk [reason]` marks the sender as away. The next message they send
//! clears it, and replying to an away user tells the replier why they are
//! gone.

use std::sync::Arc;

use gavel_core::{Message, Store, StoreResult, UserId};
use gavel_framework::{
    BoxError, CapabilityResult, ModuleDescriptor, UpdateContext, on_command, on_message,
};
use serde_json::{Value, json};

const NAMESPACE: &str = "afk";

const HELP: &str = " - /afk <reason>: mark yourself as AFK.
 - /brb <reason>: same as /afk.

When marked as AFK, any mentions will be replied to with a message to say you're not available!";

pub fn module(store: Arc<dyn Store>) -> ModuleDescriptor {
    let (set, watch, settings) = (store.clone(), store.clone(), store.clone());
    let (info, gdpr, stats) = (store.clone(), store.clone(), store);

    ModuleDescriptor::new("AFK")
        .help(HELP)
        .handler(
            on_command("afk")
                .alias("brb")
                .handler(move |ctx| set_afk(ctx, set.clone())),
        )
        .handler(
            on_message(|message: &Message| message.from.is_some())
                .name("afk-watch")
                .handler(move |ctx| watch_afk(ctx, watch.clone())),
        )
        .on_user_settings(move |user_id| user_settings(settings.clone(), user_id))
        .on_user_info(move |user_id, _chat_id| user_info(info.clone(), user_id))
        .on_gdpr(move |user_id| erase(gdpr.clone(), user_id))
        .on_stats(move || afk_stats(stats.clone()))
}

// ─── Storage ──────────────────────────────────────────────────────────────────

/// `Some(reason)` if the user is away; the reason itself may be empty.
async fn afk_reason(store: &dyn Store, user_id: UserId) -> StoreResult<Option<String>> {
    Ok(store.get(NAMESPACE, &user_id.to_string()).await?.map(|value| {
        value
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }))
}

// ─── Capabilities ─────────────────────────────────────────────────────────────

async fn user_settings(store: Arc<dyn Store>, user_id: UserId) -> CapabilityResult<String> {
    Ok(match afk_reason(store.as_ref(), user_id).await? {
        Some(_) => "You are currently marked as AFK.".to_string(),
        None => "You are not marked as AFK.".to_string(),
    })
}

async fn user_info(store: Arc<dyn Store>, user_id: UserId) -> CapabilityResult<Option<String>> {
    Ok(afk_reason(store.as_ref(), user_id).await?.map(|reason| {
        if reason.is_empty() {
            "Currently AFK.".to_string()
        } else {
            format!("Currently AFK: {reason}")
        }
    }))
}

async fn erase(store: Arc<dyn Store>, user_id: UserId) -> CapabilityResult<()> {
    store.delete(NAMESPACE, &user_id.to_string()).await?;
    Ok(())
}

async fn afk_stats(store: Arc<dyn Store>) -> CapabilityResult<String> {
    let users = store.keys(NAMESPACE).await?.len();
    Ok(format!("{users} users are AFK."))
}

// ─── Handlers ─────────────────────────────────────────────────────────────────

async fn set_afk(ctx: Arc<UpdateContext>, store: Arc<dyn Store>) -> Result<(), BoxError> {
    let Some(user) = ctx.user() else {
        return Ok(());
    };
    let reason = ctx.raw_args().trim();
    store
        .put(NAMESPACE, &user.id.to_string(), json!({ "reason": reason }))
        .await?;
    ctx.reply(format!("{} is now AFK!", user.first_name)).await?;
    Ok(())
}

async fn watch_afk(ctx: Arc<UpdateContext>, store: Arc<dyn Store>) -> Result<(), BoxError> {
    let (Some(user), Some(message)) = (ctx.user(), ctx.message()) else {
        return Ok(());
    };

    if store.delete(NAMESPACE, &user.id.to_string()).await? {
        ctx.reply(format!("{} is no longer AFK!", user.first_name))
            .await?;
    }

    let Some(target) = message.reply_to.as_ref().and_then(|reply| reply.from.as_ref()) else {
        return Ok(());
    };
    if target.id == user.id {
        return Ok(());
    }
    if let Some(reason) = afk_reason(store.as_ref(), target.id).await? {
        let text = if reason.is_empty() {
            format!("{} is AFK!", target.first_name)
        } else {
            format!("{} is AFK! says its because of:\n{reason}", target.first_name)
        };
        ctx.reply(text).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use gavel_core::{MemoryStore, Update, UpdateKind, User};
    use gavel_framework::testing::{MockTransport, bot_state, chat_for, text_update};
    use gavel_framework::{Capability, Dispatcher, FloodController, Registry};

    use super::*;

    const CHAT: i64 = -100;

    fn setup() -> (Arc<MockTransport>, Arc<dyn Store>, Dispatcher) {
        let transport = Arc::new(MockTransport::new());
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let registry = Registry::build(vec![module(store.clone())]).unwrap();
        let dispatcher = Dispatcher::new(Arc::new(registry), transport.clone(), Arc::new(bot_state()))
            .with_flood(FloodController::new(1000, Duration::from_secs(1)));
        (transport, store, dispatcher)
    }

    fn reply_update(from: User, to: User, text: &str) -> Update {
        let earlier = Message::text(5, chat_for(CHAT), Some(to), "earlier");
        let mut message = Message::text(6, chat_for(CHAT), Some(from), text);
        message.reply_to = Some(Box::new(earlier));
        Update::new(3, UpdateKind::Message(message))
    }

    #[tokio::test]
    async fn test_afk_round_trip() {
        let (transport, store, dispatcher) = setup();

        dispatcher
            .dispatch(text_update(CHAT, 7, "/afk lunch break"))
            .await;
        assert_eq!(
            afk_reason(store.as_ref(), 7).await.unwrap().as_deref(),
            Some("lunch break")
        );

        dispatcher
            .dispatch(reply_update(
                User::new(8, "Bob"),
                User::new(7, "Alice"),
                "are you there?",
            ))
            .await;

        dispatcher.dispatch(text_update(CHAT, 7, "back!")).await;
        assert_eq!(afk_reason(store.as_ref(), 7).await.unwrap(), None);

        assert_eq!(
            transport.sent_texts(),
            vec![
                "user is now AFK!",
                "Alice is AFK! says its because of:\nlunch break",
                "user is no longer AFK!",
            ]
        );
    }

    #[tokio::test]
    async fn test_brb_alias_and_plain_messages() {
        let (transport, store, dispatcher) = setup();
        dispatcher.dispatch(text_update(CHAT, 7, "hello")).await;
        assert!(transport.sent_texts().is_empty());

        dispatcher.dispatch(text_update(CHAT, 7, "/brb")).await;
        assert_eq!(afk_reason(store.as_ref(), 7).await.unwrap().as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_capabilities() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let afk = module(store.clone());
        for capability in [
            Capability::Help,
            Capability::UserSettings,
            Capability::UserInfo,
            Capability::Gdpr,
            Capability::Stats,
        ] {
            assert!(afk.has(capability), "{capability:?}");
        }

        store
            .put(NAMESPACE, "7", json!({ "reason": "sleeping" }))
            .await
            .unwrap();
        assert_eq!(
            afk.user_info(7, None).await.unwrap().as_deref(),
            Some("Currently AFK: sleeping")
        );
        assert_eq!(
            afk.user_settings(7).await.unwrap().as_deref(),
            Some("You are currently marked as AFK.")
        );
        assert_eq!(afk.stats().await.unwrap().as_deref(), Some("1 users are AFK."));

        tokio_test::assert_ok!(afk.erase_user(7).await);
        assert_eq!(afk.user_info(7, None).await.unwrap(), None);
    }
}
