//! Per-chat rules.
//!
//! Rules are stored as one string per chat in the `rules` namespace, keyed
//! by chat id. In groups, `/rules` hands out a `/start {chat_id}` link so the
//! rules arrive in a private chat instead of cluttering the group.

use std::sync::Arc;

use gavel_core::{Chat, ChatId, InlineButton, InlineKeyboard, Store, StoreResult};
use gavel_framework::text::escape_markdown;
use gavel_framework::{
    BoxError, CapabilityResult, Guard, ModuleDescriptor, UpdateContext, on_command,
};
use serde_json::{Value, json};
use tracing::debug;

const NAMESPACE: &str = "rules";

const HELP: &str = " - /rules: get the rules for this chat.

*Admin only:*
 - /setrules <your rules here>: set the rules for this chat.
 - /clearrules: clear the rules for this chat.";

const NO_RULES: &str = "The group admins haven't set any rules for this chat yet. \
This probably doesn't mean it's lawless though...!";

pub fn module(store: Arc<dyn Store>) -> ModuleDescriptor {
    let (get, set, clear) = (store.clone(), store.clone(), store.clone());
    let (migrate, stats, settings) = (store.clone(), store.clone(), store.clone());
    let (import, export, link) = (store.clone(), store.clone(), store);

    ModuleDescriptor::new("Rules")
        .help(HELP)
        .handler(on_command("rules").handler(move |ctx| send_rules(ctx, get.clone())))
        .handler(
            on_command("setrules")
                .guard(Guard::UserAdmin)
                .handler(move |ctx| set_rules(ctx, set.clone())),
        )
        .handler(
            on_command("clearrules")
                .guard(Guard::UserAdmin)
                .handler(move |ctx| clear_rules(ctx, clear.clone())),
        )
        .on_migrate(move |old, new| {
            let store = migrate.clone();
            async move { migrate_rules(store, old, new).await }
        })
        .on_stats(move || rules_stats(stats.clone()))
        .on_chat_settings(move |chat_id, _user_id| chat_settings(settings.clone(), chat_id))
        .on_import(move |chat_id, data| import_rules(import.clone(), chat_id, data))
        .on_export(move |chat_id| export_rules(export.clone(), chat_id))
        .on_chat_link(move |chat, _user_id| rules_link(link.clone(), chat))
}

// ─── Storage ──────────────────────────────────────────────────────────────────

async fn get_rules(store: &dyn Store, chat_id: ChatId) -> StoreResult<Option<String>> {
    Ok(store
        .get(NAMESPACE, &chat_id.to_string())
        .await?
        .and_then(|value| value.as_str().map(str::to_string))
        .filter(|rules| !rules.is_empty()))
}

async fn store_rules(store: &dyn Store, chat_id: ChatId, rules: &str) -> StoreResult<()> {
    store
        .put(NAMESPACE, &chat_id.to_string(), Value::from(rules))
        .await
}

async fn migrate_rules(store: Arc<dyn Store>, old: ChatId, new: ChatId) -> CapabilityResult<()> {
    let Some(rules) = store.get(NAMESPACE, &old.to_string()).await? else {
        return Ok(());
    };
    store.put(NAMESPACE, &new.to_string(), rules).await?;
    store.delete(NAMESPACE, &old.to_string()).await?;
    debug!(old, new, "Rules migrated");
    Ok(())
}

// ─── Capabilities ─────────────────────────────────────────────────────────────

async fn rules_stats(store: Arc<dyn Store>) -> CapabilityResult<String> {
    let chats = store.keys(NAMESPACE).await?.len();
    Ok(format!("{chats} chats have rules set."))
}

async fn chat_settings(store: Arc<dyn Store>, chat_id: ChatId) -> CapabilityResult<String> {
    let has_rules = get_rules(store.as_ref(), chat_id).await?.is_some();
    Ok(format!("This chat has had its rules set: `{has_rules}`"))
}

async fn import_rules(store: Arc<dyn Store>, chat_id: ChatId, data: Value) -> CapabilityResult<()> {
    if let Some(rules) = data.get("rules").and_then(Value::as_str) {
        store_rules(store.as_ref(), chat_id, rules).await?;
    }
    Ok(())
}

async fn export_rules(store: Arc<dyn Store>, chat_id: ChatId) -> CapabilityResult<Option<Value>> {
    let rules = get_rules(store.as_ref(), chat_id).await?;
    Ok(rules.map(|rules| json!({ "rules": rules })))
}

async fn rules_link(store: Arc<dyn Store>, chat: Chat) -> CapabilityResult<Option<String>> {
    if chat.is_private() {
        return Ok(None);
    }
    let text = match get_rules(store.as_ref(), chat.id).await? {
        Some(rules) => rules_text(&chat, &rules),
        None => NO_RULES.to_string(),
    };
    Ok(Some(text))
}

fn rules_text(chat: &Chat, rules: &str) -> String {
    format!(
        "The rules for *{}* are:\n\n{rules}",
        escape_markdown(&chat.display_name())
    )
}

// ─── Handlers ─────────────────────────────────────────────────────────────────

async fn send_rules(ctx: Arc<UpdateContext>, store: Arc<dyn Store>) -> Result<(), BoxError> {
    let Some(chat) = ctx.chat() else {
        return Ok(());
    };
    match get_rules(store.as_ref(), chat.id).await? {
        Some(rules) if chat.is_private() => {
            ctx.send_long(chat.id, &rules_text(chat, &rules), true, None)
                .await?;
        }
        Some(_) => {
            let link = ctx.state().deep_link(&chat.id.to_string());
            ctx.reply_markdown(
                "Contact me in PM to get this group's rules.",
                Some(InlineKeyboard::single(InlineButton::url("Rules", link))),
            )
            .await?;
        }
        None => {
            ctx.reply(NO_RULES).await?;
        }
    }
    Ok(())
}

async fn set_rules(ctx: Arc<UpdateContext>, store: Arc<dyn Store>) -> Result<(), BoxError> {
    let Some(chat) = ctx.chat() else {
        return Ok(());
    };
    let rules = ctx.raw_args().trim();
    if rules.is_empty() {
        ctx.reply("You need to give me the rules to set!").await?;
        return Ok(());
    }
    store_rules(store.as_ref(), chat.id, rules).await?;
    ctx.reply("Successfully set rules for this group.").await?;
    Ok(())
}

async fn clear_rules(ctx: Arc<UpdateContext>, store: Arc<dyn Store>) -> Result<(), BoxError> {
    let Some(chat) = ctx.chat() else {
        return Ok(());
    };
    store.delete(NAMESPACE, &chat.id.to_string()).await?;
    ctx.reply("Successfully cleared rules!").await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use gavel_core::{ButtonAction, MemberStatus, MemoryStore};
    use gavel_framework::testing::{MockTransport, bot_state, group_chat, text_update};
    use gavel_framework::{
        Capability, DispatchOutcome, Dispatcher, FloodController, Registry, guard::NOT_ADMIN_REPLY,
    };

    use super::*;

    const CHAT: ChatId = -100;
    const ADMIN: i64 = 7;
    const MEMBER: i64 = 8;

    fn setup() -> (Arc<MockTransport>, Arc<dyn Store>, Dispatcher) {
        let transport = Arc::new(MockTransport::new());
        transport.set_member(CHAT, ADMIN, MemberStatus::Administrator);
        transport.set_member(CHAT, MEMBER, MemberStatus::Member);
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let registry = Registry::build(vec![module(store.clone())]).unwrap();
        let dispatcher = Dispatcher::new(Arc::new(registry), transport.clone(), Arc::new(bot_state()))
            .with_flood(FloodController::new(1000, Duration::from_secs(1)));
        (transport, store, dispatcher)
    }

    #[tokio::test]
    async fn test_set_get_and_clear() {
        let (transport, _store, dispatcher) = setup();

        dispatcher.dispatch(text_update(CHAT, MEMBER, "/rules")).await;
        dispatcher
            .dispatch(text_update(CHAT, ADMIN, "/setrules No spam.\nBe kind."))
            .await;
        dispatcher.dispatch(text_update(CHAT, MEMBER, "/rules")).await;
        dispatcher.dispatch(text_update(CHAT, ADMIN, "/clearrules")).await;
        dispatcher.dispatch(text_update(CHAT, MEMBER, "/rules")).await;

        let sent = transport.sent();
        let texts = transport.sent_texts();
        assert_eq!(texts[0], NO_RULES);
        assert_eq!(texts[1], "Successfully set rules for this group.");
        assert_eq!(texts[2], "Contact me in PM to get this group's rules.");
        match &sent[2].keyboard.as_ref().unwrap().buttons().next().unwrap().action {
            ButtonAction::Url(url) => assert_eq!(url, "https://t.me/gavel_bot?start=-100"),
            other => panic!("expected a link, got {other:?}"),
        }
        assert_eq!(texts[3], "Successfully cleared rules!");
        assert_eq!(texts[4], NO_RULES);
    }

    #[tokio::test]
    async fn test_start_link_sends_rules_in_private() {
        let (transport, store, dispatcher) = setup();
        let menu = Registry::build(vec![
            gavel_framework::menu::module(gavel_framework::MenuTexts::default()),
            module(store.clone()),
        ])
        .unwrap();
        let dispatcher_with_menu =
            Dispatcher::new(Arc::new(menu), transport.clone(), Arc::new(bot_state()))
                .with_flood(FloodController::new(1000, Duration::from_secs(1)));
        transport.insert_chat(group_chat(CHAT));

        dispatcher_with_menu
            .dispatch(text_update(MEMBER, MEMBER, "/start -100"))
            .await;
        dispatcher
            .dispatch(text_update(CHAT, ADMIN, "/setrules No spam."))
            .await;
        dispatcher_with_menu
            .dispatch(text_update(MEMBER, MEMBER, "/start -100"))
            .await;

        let sent = transport.sent();
        assert_eq!(sent[0].chat_id, MEMBER);
        assert_eq!(sent[0].text, NO_RULES);
        assert_eq!(sent[2].chat_id, MEMBER);
        assert_eq!(sent[2].text, "The rules for *Test Group* are:\n\nNo spam.");
    }

    #[tokio::test]
    async fn test_rules_in_private_chat_are_sent_inline() {
        let (transport, store, dispatcher) = setup();
        store_rules(store.as_ref(), MEMBER, "be nice").await.unwrap();
        dispatcher.dispatch(text_update(MEMBER, MEMBER, "/rules")).await;

        let sent = transport.sent();
        assert!(sent[0].keyboard.is_none());
        assert!(sent[0].text.ends_with("are:\n\nbe nice"));
    }

    #[tokio::test]
    async fn test_non_admin_cannot_set_rules() {
        let (transport, store, dispatcher) = setup();
        let outcome = dispatcher
            .dispatch(text_update(CHAT, MEMBER, "/setrules anarchy"))
            .await;
        assert_eq!(outcome, DispatchOutcome::Denied);
        assert_eq!(transport.sent_texts(), vec![NOT_ADMIN_REPLY]);
        assert!(store.keys(NAMESPACE).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_setrules_without_text() {
        let (transport, _store, dispatcher) = setup();
        dispatcher.dispatch(text_update(CHAT, ADMIN, "/setrules")).await;
        assert_eq!(
            transport.sent_texts(),
            vec!["You need to give me the rules to set!"]
        );
    }

    #[tokio::test]
    async fn test_capabilities() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let rules = module(store.clone());
        for capability in [
            Capability::Help,
            Capability::ChatSettings,
            Capability::Migrate,
            Capability::Stats,
            Capability::DataImport,
            Capability::DataExport,
            Capability::ChatLink,
        ] {
            assert!(rules.has(capability), "{capability:?}");
        }
        assert!(!rules.has(Capability::Gdpr));

        rules
            .import_data(-1, json!({ "rules": "be nice" }))
            .await
            .unwrap();
        assert_eq!(
            rules.export_data(-1).await.unwrap(),
            Some(json!({ "rules": "be nice" }))
        );
        assert_eq!(rules.export_data(-2).await.unwrap(), None);

        // Running the hook twice leaves the same state.
        rules.migrate(-1, -1001).await.unwrap();
        rules.migrate(-1, -1001).await.unwrap();
        assert_eq!(get_rules(store.as_ref(), -1).await.unwrap(), None);
        assert_eq!(
            get_rules(store.as_ref(), -1001).await.unwrap().as_deref(),
            Some("be nice")
        );

        assert_eq!(
            rules.stats().await.unwrap().as_deref(),
            Some("1 chats have rules set.")
        );
        assert_eq!(
            rules.chat_settings(-1001, 5).await.unwrap().as_deref(),
            Some("This chat has had its rules set: `true`")
        );
    }
}
