//! Long-poll update source.
//!
//! Removes any webhook, then loops on `getUpdates`, pushing converted
//! updates into the runtime intake. The offset advances past every update
//! received, so nothing is delivered twice. Failed polls back off
//! exponentially; a flood-wait reply sleeps for exactly `retry_after`.

use std::sync::Arc;
use std::time::Duration;

use gavel_core::Update;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::TelegramClient;
use crate::error::TelegramResult;

/// Exponential retry delays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl Backoff {
    /// The delay after `current`, capped at `max`.
    pub fn next(&self, current: Duration) -> Duration {
        current.mul_f64(self.multiplier).min(self.max)
    }
}

/// Polls `getUpdates` until cancelled.
pub struct LongPoller {
    client: Arc<TelegramClient>,
    timeout: Duration,
    backoff: Backoff,
}

impl LongPoller {
    pub fn new(client: Arc<TelegramClient>, timeout: Duration) -> Self {
        Self {
            client,
            timeout,
            backoff: Backoff::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Runs until `token` is cancelled or the intake closes.
    ///
    /// Only the initial `deleteWebhook` failure is returned; poll failures
    /// are retried.
    pub async fn run(self, intake: mpsc::Sender<Update>, token: CancellationToken) -> TelegramResult<()> {
        self.client.delete_webhook().await?;
        info!(timeout = ?self.timeout, "Long polling started");

        let mut offset = 0i64;
        let mut delay = self.backoff.initial;

        loop {
            let polled = tokio::select! {
                biased;
                () = token.cancelled() => break,
                polled = self.client.get_updates(offset, self.timeout) => polled,
            };

            match polled {
                Ok(updates) => {
                    delay = self.backoff.initial;
                    if !updates.is_empty() {
                        debug!(count = updates.len(), offset, "Updates received");
                    }
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        if intake.send(update.into()).await.is_err() {
                            info!("Intake closed, long polling stopped");
                            return Ok(());
                        }
                    }
                }
                Err(e) => {
                    let wait = match e.retry_after() {
                        Some(seconds) => Duration::from_secs(seconds),
                        None => {
                            let wait = delay;
                            delay = self.backoff.next(delay);
                            wait
                        }
                    };
                    warn!(error = %e, retry_in = ?wait, "getUpdates failed");
                    tokio::select! {
                        () = token.cancelled() => break,
                        () = tokio::time::sleep(wait) => {}
                    }
                }
            }
        }

        info!("Long polling stopped");
        Ok(())
    }
}
