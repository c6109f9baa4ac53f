//! The standing `/start`, `/help` and `/settings` menus.
//!
//! Help lists every module with help text; settings list every module with a
//! chat or user settings projection. Both are paginated keyboards whose
//! buttons round-trip through [`MenuAction`]. Group invocations hand the user
//! a deep link into the private chat, where the actual menus are shown.

use std::sync::Arc;

use gavel_core::{Chat, ChatId, InlineButton, InlineKeyboard, User};
use tower::BoxError;
use tracing::debug;

use crate::context::UpdateContext;
use crate::handler::{on_callback, on_command};
use crate::module::{Capability, ModuleDescriptor};
use crate::pagination::{MenuAction, MenuItem, PAGE_SIZE, back_button, paginate};
use crate::text::escape_markdown;

const HELP_PREFIX: &str = "help";
const SETTINGS_PREFIX: &str = "stngs";

const DEFAULT_START_TEXT: &str = "Hi there! I help admins keep their groups in order. \
Hit /help to find out what I can do.";

const DEFAULT_HELP_TEXT: &str = "Hey there! I'm a modular group management bot.\n\n\
Main commands available:\n \
- /start: start the bot\n \
- /help: PMs you this message.\n \
- /help <module name>: PMs you info about that module.\n \
- /settings:\n   \
- in PM: will send you your settings for all supported modules.\n   \
- in a group: will redirect you to PM, with all that chat's settings.\n\n\
Pick a module below for its commands.";

/// The free-form texts shown by the menus.
#[derive(Debug, Clone)]
pub struct MenuTexts {
    /// Sent for `/start` without a payload in a private chat.
    pub start: String,
    /// Header above the help module list.
    pub help: String,
}

impl Default for MenuTexts {
    fn default() -> Self {
        Self {
            start: DEFAULT_START_TEXT.to_string(),
            help: DEFAULT_HELP_TEXT.to_string(),
        }
    }
}

/// Builds the menu module.
pub fn module(texts: MenuTexts) -> ModuleDescriptor {
    let texts = Arc::new(texts);
    let start_texts = texts.clone();
    let help_texts = texts.clone();
    let callback_texts = texts;

    ModuleDescriptor::new("Menu")
        .handler(on_command("start").handler(move |ctx| {
            let texts = start_texts.clone();
            async move { start(ctx, &texts).await }
        }))
        .handler(on_command("help").handler(move |ctx| {
            let texts = help_texts.clone();
            async move { help(ctx, &texts).await }
        }))
        .handler(on_command("settings").handler(settings))
        .handler(on_callback("help_").handler(move |ctx| {
            let texts = callback_texts.clone();
            async move { help_button(ctx, &texts).await }
        }))
        .handler(on_callback("stngs_").handler(settings_button))
}

// =============================================================================
// Commands
// =============================================================================

async fn start(ctx: Arc<UpdateContext>, texts: &MenuTexts) -> Result<(), BoxError> {
    let (Some(chat), Some(user)) = (ctx.chat().cloned(), ctx.user().cloned()) else {
        return Ok(());
    };
    if !chat.is_private() {
        ctx.reply("Hey there! I'm awake.").await?;
        return Ok(());
    }

    let payload = ctx.args().first().map(|arg| arg.to_lowercase());
    match payload.as_deref() {
        Some("help") => send_help_page(&ctx, chat.id, texts, 0).await,
        Some("stngs_me") => send_user_settings(&ctx, chat.id, &user).await,
        Some(payload) => match payload.strip_prefix("stngs_").map(str::parse::<ChatId>) {
            Some(Ok(target)) => start_chat_settings(&ctx, chat.id, &user, target).await,
            Some(Err(_)) => send_start(&ctx, chat.id, texts).await,
            None => match payload.parse::<ChatId>() {
                Ok(target) => start_chat_link(&ctx, chat.id, &user, target, texts).await,
                Err(_) => send_start(&ctx, chat.id, texts).await,
            },
        },
        None => send_start(&ctx, chat.id, texts).await,
    }
}

async fn send_start(ctx: &UpdateContext, chat_id: ChatId, texts: &MenuTexts) -> Result<(), BoxError> {
    ctx.send_long(chat_id, &texts.start, true, None).await?;
    Ok(())
}

/// `/start stngs_{chat}`: an admin of the target chat gets its settings
/// menu; anyone else gets their personal settings.
async fn start_chat_settings(
    ctx: &UpdateContext,
    private_chat: ChatId,
    user: &User,
    target: ChatId,
) -> Result<(), BoxError> {
    let chat = match ctx.transport().get_chat(target).await {
        Ok(chat) => chat,
        Err(e) => {
            debug!(chat_id = target, error = %e, "Settings target lookup failed");
            ctx.reply("I couldn't find that chat.").await?;
            return Ok(());
        }
    };

    if ctx.permissions().is_user_admin(&chat, user.id).await {
        send_chat_settings_menu(ctx, private_chat, &chat).await
    } else {
        send_user_settings(ctx, private_chat, user).await
    }
}

/// `/start {chat}`: every module with a chat link answers for that chat.
async fn start_chat_link(
    ctx: &UpdateContext,
    private_chat: ChatId,
    user: &User,
    target: ChatId,
    texts: &MenuTexts,
) -> Result<(), BoxError> {
    let responders = ctx.registry().all_with_capability(Capability::ChatLink);
    if responders.is_empty() {
        return send_start(ctx, private_chat, texts).await;
    }

    let chat = match ctx.transport().get_chat(target).await {
        Ok(chat) => chat,
        Err(e) => {
            debug!(chat_id = target, error = %e, "Deep-linked chat lookup failed");
            ctx.reply("I couldn't find that chat.").await?;
            return Ok(());
        }
    };
    for module in responders {
        if let Some(text) = module.chat_link(&chat, user.id).await? {
            ctx.send_long(private_chat, &text, true, None).await?;
        }
    }
    Ok(())
}

async fn help(ctx: Arc<UpdateContext>, texts: &MenuTexts) -> Result<(), BoxError> {
    let Some(chat) = ctx.chat().cloned() else {
        return Ok(());
    };

    if !chat.is_private() {
        let link = InlineButton::url("Help", ctx.state().deep_link("help"));
        ctx.reply_markdown(
            "Contact me in PM to get the list of possible commands.",
            Some(InlineKeyboard::single(link)),
        )
        .await?;
        return Ok(());
    }

    let requested = ctx
        .args()
        .first()
        .and_then(|name| ctx.registry().lookup_with(name, Capability::Help))
        .cloned();
    match requested {
        Some(module) => {
            let text = format!(
                "Here is the available help for the *{}* module:\n{}",
                escape_markdown(module.name()),
                module.help_text().unwrap_or_default()
            );
            let keyboard = InlineKeyboard::single(back_button(HELP_PREFIX, None)?);
            ctx.send_long(chat.id, &text, true, Some(keyboard)).await?;
            Ok(())
        }
        None => send_help_page(&ctx, chat.id, texts, 0).await,
    }
}

async fn settings(ctx: Arc<UpdateContext>) -> Result<(), BoxError> {
    let (Some(chat), Some(user)) = (ctx.chat().cloned(), ctx.user().cloned()) else {
        return Ok(());
    };

    if chat.is_private() {
        return send_user_settings(&ctx, chat.id, &user).await;
    }

    let (text, payload) = if ctx.permissions().is_user_admin(&chat, user.id).await {
        (
            "Click here to get this chat's settings, as well as yours.",
            format!("stngs_{}", chat.id),
        )
    } else {
        ("Click here to check your settings.", "stngs_me".to_string())
    };
    let link = InlineButton::url("Settings", ctx.state().deep_link(&payload));
    ctx.reply_markdown(text, Some(InlineKeyboard::single(link)))
        .await?;
    Ok(())
}

// =============================================================================
// Callbacks
// =============================================================================

async fn help_button(ctx: Arc<UpdateContext>, texts: &MenuTexts) -> Result<(), BoxError> {
    let (Some(data), Some(prompt)) = (ctx.callback_data(), ctx.message()) else {
        return Ok(());
    };
    let chat_id = prompt.chat.id;

    let action = match MenuAction::parse(data, HELP_PREFIX) {
        Ok(action) => action,
        Err(e) => {
            debug!(error = %e, "Ignoring help button");
            return Ok(());
        }
    };

    match action {
        MenuAction::Module { key, .. } => {
            let Some(module) = ctx.registry().lookup_with(&key, Capability::Help).cloned() else {
                debug!(module = %key, "Help requested for unknown module");
                return Ok(());
            };
            let text = format!(
                "Here is the help for the *{}* module:\n{}",
                escape_markdown(module.name()),
                module.help_text().unwrap_or_default()
            );
            let keyboard = InlineKeyboard::single(back_button(HELP_PREFIX, None)?);
            ctx.send_long(chat_id, &text, true, Some(keyboard)).await?;
            Ok(())
        }
        MenuAction::Prev { page, .. } => {
            send_help_page(&ctx, chat_id, texts, page.saturating_sub(1)).await
        }
        MenuAction::Next { page, .. } => {
            send_help_page(&ctx, chat_id, texts, page.saturating_add(1)).await
        }
        MenuAction::Back { .. } => send_help_page(&ctx, chat_id, texts, 0).await,
    }
}

async fn settings_button(ctx: Arc<UpdateContext>) -> Result<(), BoxError> {
    let (Some(data), Some(prompt), Some(query)) =
        (ctx.callback_data(), ctx.message(), ctx.callback())
    else {
        return Ok(());
    };
    let private_chat = prompt.chat.id;

    let action = match MenuAction::parse(data, SETTINGS_PREFIX) {
        Ok(action) => action,
        Err(e) => {
            debug!(error = %e, "Ignoring settings button");
            return Ok(());
        }
    };
    let Some(target) = action.scope() else {
        debug!(data, "Settings button without a chat scope");
        return Ok(());
    };

    let chat = match ctx.transport().get_chat(target).await {
        Ok(chat) => chat,
        Err(e) => {
            debug!(chat_id = target, error = %e, "Settings target lookup failed");
            ctx.transport()
                .answer_callback(&query.id, Some("I couldn't find that chat."))
                .await?;
            return Ok(());
        }
    };
    if !ctx.permissions().is_user_admin(&chat, query.from.id).await {
        ctx.transport()
            .answer_callback(&query.id, Some("You're no longer an admin there."))
            .await?;
        return Ok(());
    }

    let title = escape_markdown(&chat.display_name());
    match action {
        MenuAction::Module { key, .. } => {
            let Some(module) = ctx
                .registry()
                .lookup_with(&key, Capability::ChatSettings)
                .cloned()
            else {
                debug!(module = %key, "Settings requested for unknown module");
                return Ok(());
            };
            let settings = module
                .chat_settings(chat.id, query.from.id)
                .await?
                .unwrap_or_default();
            let text = format!(
                "*{title}* has the following settings for the *{}* module:\n\n{settings}",
                escape_markdown(module.name())
            );
            let keyboard = InlineKeyboard::single(back_button(SETTINGS_PREFIX, Some(chat.id))?);
            ctx.send_long(private_chat, &text, true, Some(keyboard))
                .await?;
        }
        MenuAction::Prev { page, .. } => {
            send_settings_page(&ctx, private_chat, &chat, page.saturating_sub(1)).await?;
        }
        MenuAction::Next { page, .. } => {
            send_settings_page(&ctx, private_chat, &chat, page.saturating_add(1)).await?;
        }
        MenuAction::Back { .. } => send_chat_settings_menu(&ctx, private_chat, &chat).await?,
    }
    Ok(())
}

// =============================================================================
// Rendering
// =============================================================================

fn menu_items(ctx: &UpdateContext, capability: Capability) -> Vec<MenuItem> {
    ctx.registry()
        .all_with_capability(capability)
        .iter()
        .map(|module| MenuItem::new(module.key(), module.name()))
        .collect()
}

async fn send_help_page(
    ctx: &UpdateContext,
    chat_id: ChatId,
    texts: &MenuTexts,
    page: usize,
) -> Result<(), BoxError> {
    let items = menu_items(ctx, Capability::Help);
    let keyboard = paginate(&items, PAGE_SIZE, page, HELP_PREFIX, None)?;
    ctx.send_long(chat_id, &texts.help, true, Some(keyboard))
        .await?;
    Ok(())
}

async fn send_user_settings(
    ctx: &UpdateContext,
    chat_id: ChatId,
    user: &User,
) -> Result<(), BoxError> {
    let mut sections = Vec::new();
    for module in ctx.registry().all_with_capability(Capability::UserSettings) {
        if let Some(text) = module.user_settings(user.id).await? {
            sections.push(format!("*{}*:\n{text}", escape_markdown(module.name())));
        }
    }

    let text = if sections.is_empty() {
        "Seems like there aren't any user specific settings available :'(".to_string()
    } else {
        format!("These are your current settings:\n\n{}", sections.join("\n\n"))
    };
    ctx.send_long(chat_id, &text, true, None).await?;
    Ok(())
}

async fn send_chat_settings_menu(
    ctx: &UpdateContext,
    private_chat: ChatId,
    chat: &Chat,
) -> Result<(), BoxError> {
    let items = menu_items(ctx, Capability::ChatSettings);
    if items.is_empty() {
        ctx.send_long(
            private_chat,
            "Seems like there aren't any chat settings available :'(",
            true,
            None,
        )
        .await?;
        return Ok(());
    }

    let text = format!(
        "Which module would you like to check {}'s settings for?",
        escape_markdown(&chat.display_name())
    );
    let keyboard = paginate(&items, PAGE_SIZE, 0, SETTINGS_PREFIX, Some(chat.id))?;
    ctx.send_long(private_chat, &text, true, Some(keyboard))
        .await?;
    Ok(())
}

async fn send_settings_page(
    ctx: &UpdateContext,
    private_chat: ChatId,
    chat: &Chat,
    page: usize,
) -> Result<(), BoxError> {
    let items = menu_items(ctx, Capability::ChatSettings);
    let text = format!(
        "Hi there! There are quite a few settings for {} - go ahead and pick what \
         you're interested in.",
        escape_markdown(&chat.display_name())
    );
    let keyboard = paginate(&items, PAGE_SIZE, page, SETTINGS_PREFIX, Some(chat.id))?;
    ctx.send_long(private_chat, &text, true, Some(keyboard))
        .await?;
    Ok(())
}
