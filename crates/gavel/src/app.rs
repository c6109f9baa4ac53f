//! Process wiring: Bot API client, store, registry, dispatcher (with its
//! username directory), worker pool and the configured update source.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use gavel_core::{OutgoingMessage, Store, Transport, Update};
use gavel_framework::{BotState, Dispatcher, Registry, UserDirectory};
use gavel_runtime::config::{GavelConfig, TransportConfig, TransportMode};
use gavel_runtime::{FileStore, GavelRuntime, PoolOptions, wait_for_shutdown};
use gavel_telegram::{
    Backoff, LongPoller, TelegramClient, TelegramResult, WebhookOptions, WebhookServer,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::modules;

const ONLINE_NOTICE: &str = "Bot is now online";

/// Runs the bot until SIGINT/SIGTERM or until the update source fails.
pub async fn run(config: GavelConfig) -> anyhow::Result<()> {
    let client = Arc::new(
        TelegramClient::new(&config.bot.token, &config.bot.api_url)
            .context("failed to build the Bot API client")?,
    );
    let me = client
        .get_me()
        .await
        .context("getMe failed, check the bot token")?;
    info!(id = me.id, username = ?me.username, "Authorized");

    let store: Arc<dyn Store> = Arc::new(
        FileStore::open(&config.storage.base_dir)
            .await
            .with_context(|| format!("failed to open storage at {}", config.storage.base_dir.display()))?,
    );
    let state = Arc::new(BotState::new(me, config.identities(), config.policy()));

    let registry = build_registry(&config, store.clone())?;
    let transport: Arc<dyn Transport> = client.clone();
    let dispatcher = Dispatcher::new(Arc::new(registry), transport.clone(), state)
        .with_flood(config.flood_controller())
        .with_handler_timeout(config.dispatch.handler_timeout())
        .with_users(UserDirectory::new(store));

    let runtime = GavelRuntime::start(Arc::new(dispatcher), PoolOptions::from(&config.dispatch))?;
    let mut source = spawn_source(
        &config.transport,
        client,
        runtime.intake(),
        runtime.shutdown_token(),
    );

    if let Some(chat_id) = config.messages.message_dump {
        if let Err(e) = transport
            .send_message(OutgoingMessage::new(chat_id, ONLINE_NOTICE))
            .await
        {
            warn!(chat_id, error = %e, "Failed to send the startup notice");
        }
    }

    let finished_early = tokio::select! {
        () = wait_for_shutdown() => None,
        joined = &mut source => Some(joined),
    };

    let report = runtime.shutdown().await;
    info!(drained = report.drained, aborted = report.aborted, "Bot stopped");

    let joined = match finished_early {
        Some(joined) => joined,
        None => source.await,
    };
    joined
        .context("update source panicked")?
        .context("update source failed")?;
    Ok(())
}

/// Applies the load/no-load filter to the feature modules and builds the
/// registry.
fn build_registry(config: &GavelConfig, store: Arc<dyn Store>) -> anyhow::Result<Registry> {
    let mut loaded = modules::core(&config.messages);
    loaded.extend(config.module_filter().apply(modules::features(store)));
    let registry = Registry::build(loaded).context("failed to register modules")?;

    let names: Vec<&str> = registry.modules().iter().map(|module| module.name()).collect();
    info!(count = names.len(), modules = ?names, "Modules loaded");
    Ok(registry)
}

fn spawn_source(
    config: &TransportConfig,
    client: Arc<TelegramClient>,
    intake: mpsc::Sender<Update>,
    token: CancellationToken,
) -> JoinHandle<TelegramResult<()>> {
    match config.mode {
        TransportMode::Polling => {
            let backoff = Backoff {
                initial: config.retry.initial_delay(),
                max: config.retry.max_delay(),
                multiplier: config.retry.backoff_multiplier,
            };
            let poller = LongPoller::new(client, Duration::from_secs(config.poll_timeout_secs))
                .with_backoff(backoff);
            tokio::spawn(poller.run(intake, token))
        }
        TransportMode::Webhook => {
            let webhook = &config.webhook;
            let options = WebhookOptions {
                public_url: webhook.public_url(),
                bind_addr: webhook.bind_addr(),
                path: webhook.path.clone(),
                certificate: webhook.cert_path.clone(),
                secret_token: webhook.secret_token.clone(),
            };
            tokio::spawn(WebhookServer::new(client, options).run(intake, token))
        }
    }
}
