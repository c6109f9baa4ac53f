//! # Gavel Core
//!
//! Platform-neutral building blocks shared by every Gavel crate.
//!
//! ## Layers
//!
//! - **Model**: chats, users, messages and inbound [`Update`]s ([`model`])
//! - **Keyboards**: inline button layouts attached to outgoing messages ([`keyboard`])
//! - **Transport**: the outbound messaging capability the bot consumes ([`Transport`])
//! - **Store**: the opaque key/value surface used by feature modules ([`Store`])
//! - **Errors**: [`ApiError`] and [`StoreError`]
//!
//! Nothing in this crate talks to the network. Concrete transports live in
//! `gavel-telegram`, persistent stores in `gavel-runtime`.
//!
//! ```text
//! ┌────────────────┐   Update    ┌────────────┐   Transport   ┌──────────┐
//! │ update source  │────────────▶│ dispatcher │──────────────▶│ platform │
//! └────────────────┘             └────────────┘               └──────────┘
//! ```

pub mod error;
pub mod keyboard;
pub mod model;
pub mod store;
pub mod transport;

pub use error::{ApiError, ApiResult, StoreError, StoreResult};
pub use keyboard::{ButtonAction, InlineButton, InlineKeyboard};
pub use model::{
    CallbackQuery, Chat, ChatId, ChatKind, ChatMember, EntityKind, MemberStatus, Message,
    MessageEntity, MessageId, Update, UpdateKind, User, UserId,
};
pub use store::{MemoryStore, Store};
pub use transport::{MessageRef, OutgoingMessage, ParseMode, Transport};
