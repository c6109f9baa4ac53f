//! # Gavel
//!
//! A modular Telegram group-management bot.
//!
//! ```text
//! ┌──────────────┐    ┌─────────────┐    ┌────────────┐    ┌──────────────────┐
//! │ LongPoller / │───▶│ GavelRuntime│───▶│ Dispatcher │───▶│ module handlers  │
//! │ WebhookServer│    │ (per-chat   │    │ (flood,    │    │ (menu, basics,   │
//! └──────────────┘    │  workers)   │    │  guards)   │    │  rules, afk)     │
//!                     └─────────────┘    └────────────┘    └──────────────────┘
//! ```
//!
//! - [`core`]: platform-neutral model, transport and store traits
//! - [`framework`]: module descriptors, registry, dispatcher and menus
//! - [`runtime`]: configuration, logging, file store and worker pool
//! - [`telegram`]: the Bot API client and update sources
//! - [`modules`]: the feature modules shipped with the bot
//! - [`app`]: wires all of the above into a running process

pub use gavel_core as core;
pub use gavel_framework as framework;
pub use gavel_runtime as runtime;
pub use gavel_telegram as telegram;

pub mod app;
pub mod modules;

/// Prelude module for writing feature modules.
///
/// ```rust,ignore
/// use gavel::prelude::*;
/// ```
pub mod prelude {
    pub use gavel_core::{Chat, ChatId, Message, Store, StoreResult, Update, User, UserId};
    pub use gavel_framework::{
        BoxError, Capability, CapabilityResult, Guard, ModuleDescriptor, UpdateContext,
        on_callback, on_command, on_message,
    };
    pub use gavel_runtime::prelude::*;
}
