//! # Gavel Telegram
//!
//! The Telegram Bot API behind Gavel's [`Transport`](gavel_core::Transport)
//! trait, and the two ways updates get in.
//!
//! | Piece | Role |
//! |-------|------|
//! | [`TelegramClient`] | JSON-over-HTTPS Bot API client; implements `Transport` |
//! | [`LongPoller`] | `getUpdates` loop with offset tracking and backoff |
//! | [`WebhookServer`] | `setWebhook` plus an axum endpoint |
//!
//! Both update sources push into the same `mpsc::Sender<Update>` and stop on
//! the runtime's cancellation token.
//!
//! ```rust,ignore
//! let client = Arc::new(TelegramClient::new(&config.bot.token, &config.bot.api_url)?);
//! let poller = LongPoller::new(client.clone(), Duration::from_secs(30));
//! tokio::spawn(poller.run(runtime.intake(), runtime.shutdown_token()));
//! ```

pub mod client;
pub mod convert;
pub mod error;
pub mod model;
#[cfg(feature = "polling")]
pub mod polling;
#[cfg(feature = "webhook")]
pub mod webhook;

pub use client::TelegramClient;
pub use error::{TelegramError, TelegramResult};
#[cfg(feature = "polling")]
pub use polling::{Backoff, LongPoller};
#[cfg(feature = "webhook")]
pub use webhook::{WebhookOptions, WebhookServer};
