//! Feature modules shipped with the bot.

use std::sync::Arc;

use gavel_core::Store;
use gavel_framework::{MenuTexts, ModuleDescriptor, menu};
use gavel_runtime::config::MessagesConfig;

pub mod afk;
pub mod basics;
pub mod rules;

/// Modules that are always loaded.
pub fn core(messages: &MessagesConfig) -> Vec<ModuleDescriptor> {
    let mut texts = MenuTexts::default();
    if let Some(start) = &messages.start_text {
        texts.start = start.clone();
    }
    vec![
        menu::module(texts),
        basics::module(messages.donation_link.clone()),
    ]
}

/// Feature modules, subject to the load/no-load filter.
pub fn features(store: Arc<dyn Store>) -> Vec<ModuleDescriptor> {
    vec![rules::module(store.clone()), afk::module(store)]
}

#[cfg(test)]
mod tests {
    use gavel_core::MemoryStore;
    use gavel_framework::{Capability, Registry};

    use super::*;

    #[test]
    fn test_all_modules_register() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let mut modules = core(&MessagesConfig::default());
        modules.extend(features(store));
        let registry = Registry::build(modules).unwrap();
        assert_eq!(registry.len(), 4);

        let helpable: Vec<_> = registry
            .all_with_capability(Capability::Help)
            .iter()
            .map(|module| module.name().to_string())
            .collect();
        assert_eq!(helpable, vec!["AFK", "Rules"]);
        assert_eq!(registry.gdpr_capable().len(), 1);
        assert_eq!(registry.migrateable().len(), 1);
    }
}
