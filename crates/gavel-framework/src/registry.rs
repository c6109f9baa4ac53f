//! The capability registry.
//!
//! Built once at startup from an ordered module list and immutable afterwards,
//! so the dispatcher shares it behind an `Arc` without any locking.
//!
//! Two orderings are kept:
//!
//! | Accessor | Order |
//! |----------|-------|
//! | [`modules`](Registry::modules), [`migrateable`](Registry::migrateable), [`gdpr_capable`](Registry::gdpr_capable) | registration |
//! | [`all_with_capability`](Registry::all_with_capability) | display name, then key |
//!
//! The sorted order defines menu layout; the pagination engine relies on it
//! being stable.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{RegistryError, RegistryResult};
use crate::handler::HandlerSpec;
use crate::module::{Capability, ModuleDescriptor};

/// Longest module name that still fits a scoped callback in 64 bytes.
pub const MAX_MODULE_NAME_LEN: usize = 24;

// =============================================================================
// RegistryBuilder
// =============================================================================

/// Collects modules before freezing them into a [`Registry`].
#[derive(Default)]
pub struct RegistryBuilder {
    modules: Vec<Arc<ModuleDescriptor>>,
    by_name: HashMap<String, Arc<ModuleDescriptor>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a module, rejecting case-insensitive duplicates and names that
    /// cannot be embedded in callback data.
    pub fn register(&mut self, module: ModuleDescriptor) -> RegistryResult<()> {
        validate_name(module.name())?;

        if let Some(existing) = self.by_name.get(module.key()) {
            return Err(RegistryError::duplicate(module.name(), existing.name()));
        }

        debug!(module = %module.name(), "Registering module");
        let module = Arc::new(module);
        self.by_name.insert(module.key().to_string(), module.clone());
        self.modules.push(module);
        Ok(())
    }

    /// Freezes the collected modules and derives every index.
    pub fn build(self) -> Registry {
        let mut sorted = self.modules.clone();
        sorted.sort_by(|a, b| a.name().cmp(b.name()).then_with(|| a.key().cmp(b.key())));

        let by_capability = Capability::ALL
            .into_iter()
            .map(|capability| {
                let modules = sorted
                    .iter()
                    .filter(|module| module.has(capability))
                    .cloned()
                    .collect();
                (capability, modules)
            })
            .collect();

        let in_order = |capability| {
            self.modules
                .iter()
                .filter(|module| module.has(capability))
                .cloned()
                .collect()
        };

        Registry {
            migrateable: in_order(Capability::Migrate),
            gdpr: in_order(Capability::Gdpr),
            by_capability,
            by_name: self.by_name,
            modules: self.modules,
        }
    }
}

fn validate_name(name: &str) -> RegistryResult<()> {
    if name.is_empty() {
        return Err(RegistryError::invalid_name(name, "name is empty"));
    }
    if name.len() > MAX_MODULE_NAME_LEN {
        return Err(RegistryError::invalid_name(name, "name is longer than 24 bytes"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(RegistryError::invalid_name(
            name,
            "only ASCII letters, digits, '-' and '_' are allowed",
        ));
    }
    Ok(())
}

// =============================================================================
// Registry
// =============================================================================

/// Immutable, capability-indexed set of loaded modules.
#[derive(Debug, Clone)]
pub struct Registry {
    modules: Vec<Arc<ModuleDescriptor>>,
    by_name: HashMap<String, Arc<ModuleDescriptor>>,
    by_capability: HashMap<Capability, Vec<Arc<ModuleDescriptor>>>,
    migrateable: Vec<Arc<ModuleDescriptor>>,
    gdpr: Vec<Arc<ModuleDescriptor>>,
}

impl Registry {
    /// Builds a registry from an ordered module list.
    ///
    /// Fails on the first invalid or duplicate name; nothing is registered
    /// in that case.
    pub fn build(modules: impl IntoIterator<Item = ModuleDescriptor>) -> RegistryResult<Self> {
        let mut builder = RegistryBuilder::new();
        for module in modules {
            builder.register(module)?;
        }
        Ok(builder.build())
    }

    /// Case-insensitive lookup.
    pub fn lookup(&self, name: &str) -> Option<&Arc<ModuleDescriptor>> {
        self.by_name.get(&name.to_lowercase())
    }

    /// Lookup restricted to modules that have `capability`.
    pub fn lookup_with(&self, name: &str, capability: Capability) -> Option<&Arc<ModuleDescriptor>> {
        self.lookup(name).filter(|module| module.has(capability))
    }

    /// Modules with `capability`, sorted by display name.
    pub fn all_with_capability(&self, capability: Capability) -> &[Arc<ModuleDescriptor>] {
        self.by_capability
            .get(&capability)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Migration listeners in registration order.
    pub fn migrateable(&self) -> &[Arc<ModuleDescriptor>] {
        &self.migrateable
    }

    /// GDPR erasers in registration order.
    pub fn gdpr_capable(&self) -> &[Arc<ModuleDescriptor>] {
        &self.gdpr
    }

    /// All modules in registration order.
    pub fn modules(&self) -> &[Arc<ModuleDescriptor>] {
        &self.modules
    }

    /// Every handler, paired with its module, in match order.
    pub fn handlers(&self) -> impl Iterator<Item = (&Arc<ModuleDescriptor>, &HandlerSpec)> {
        self.modules
            .iter()
            .flat_map(|module| module.handlers().iter().map(move |handler| (module, handler)))
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

// =============================================================================
// ModuleFilter
// =============================================================================

/// Startup allow/deny list applied to the module list before building.
#[derive(Debug, Clone, Default)]
pub struct ModuleFilter {
    load: Vec<String>,
    no_load: Vec<String>,
}

impl ModuleFilter {
    /// An empty `load` list means "load everything".
    pub fn new(load: &[String], no_load: &[String]) -> Self {
        Self {
            load: load.iter().map(|name| name.to_lowercase()).collect(),
            no_load: no_load.iter().map(|name| name.to_lowercase()).collect(),
        }
    }

    pub fn allows(&self, name: &str) -> bool {
        let key = name.to_lowercase();
        (self.load.is_empty() || self.load.contains(&key)) && !self.no_load.contains(&key)
    }

    /// Drops modules this filter rejects, keeping the order of the rest.
    pub fn apply(&self, modules: Vec<ModuleDescriptor>) -> Vec<ModuleDescriptor> {
        modules
            .into_iter()
            .filter(|module| {
                let allowed = self.allows(module.name());
                if !allowed {
                    info!(module = %module.name(), "Module not loaded");
                }
                allowed
            })
            .collect()
    }
}
