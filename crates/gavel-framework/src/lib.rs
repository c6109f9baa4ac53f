//! # Gavel Framework
//!
//! The module system and update pipeline of the Gavel bot.
//!
//! ## Building blocks
//!
//! - [`ModuleDescriptor`]: a feature module and the optional capabilities it
//!   advertises (help, settings, migration, stats, GDPR, import/export)
//! - [`Registry`]: the immutable, capability-indexed set of loaded modules
//! - [`HandlerSpec`]: a trigger, an optional [`Guard`] and a handler body
//! - [`FloodController`]: per-chat fixed-window admission
//! - [`pagination`]: inline-keyboard menus and their callback grammar
//! - [`Dispatcher`]: admit → classify → match → guard → invoke → acknowledge
//! - [`menu`]: the standing `/help`, `/settings` and `/start` menus
//! - [`extract`]: resolving the user a command targets, backed by the
//!   [`UserDirectory`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use gavel_framework::{ModuleDescriptor, Registry, Guard, on_command};
//!
//! let rules = ModuleDescriptor::new("Rules")
//!     .help(" - /rules: get the rules for this chat.")
//!     .handler(on_command("rules").handler(get_rules))
//!     .handler(on_command("setrules").guard(Guard::UserAdmin).handler(set_rules))
//!     .on_migrate(|old, new| async move { migrate_rules(old, new).await });
//!
//! let registry = Registry::build(vec![menu::module(MenuTexts::default()), rules])?;
//! let dispatcher = Dispatcher::new(Arc::new(registry), transport, state);
//! dispatcher.dispatch(update).await;
//! ```

pub mod command;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod extract;
pub mod flood;
pub mod guard;
pub mod handler;
pub mod menu;
pub mod module;
pub mod pagination;
pub mod registry;
pub mod text;
pub mod users;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use command::{ParsedCommand, parse_command};
pub use context::{BotState, Policy, UpdateContext};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use error::{PaginationError, PaginationResult, RegistryError, RegistryResult};
pub use extract::{Extraction, Target, extract_user, extract_user_and_text};
pub use flood::FloodController;
pub use guard::{Guard, Identities, PermissionGuard};
pub use handler::{HandlerBuilder, HandlerSpec, Trigger, on_callback, on_command, on_message};
pub use menu::MenuTexts;
pub use module::{Capability, CapabilityResult, ModuleDescriptor};
pub use pagination::{MenuAction, MenuItem, paginate};
pub use registry::{ModuleFilter, Registry, RegistryBuilder};
pub use users::UserDirectory;

pub use tower::BoxError;
