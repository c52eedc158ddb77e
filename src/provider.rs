//! The frozen provider.
//!
//! A [`Provider`] is the read-mostly façade handed to application code: a
//! snapshot of the registry's registrations plus the plan and singleton
//! caches. Registry mutations after `build_provider` never touch an
//! already-built provider; the only write path left open is the purely
//! additive [`Provider::set`].

use crate::alias::AliasTable;
use crate::descriptor::{Injectable, Instance};
use crate::error::{DiError, Result};
use crate::key::TypeKey;
use crate::lifetime::Lifetime;
use crate::planner::PlanNode;
use crate::registry::{Builder, Registration, Registry};
use crate::scope::{ActivationScope, ScopeKind};
use ahash::RandomState;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::debug;

/// Shared state behind a provider handle.
///
/// The registration snapshot is immutable; the caches are concurrent maps so
/// a built provider can serve resolutions from multiple threads.
pub(crate) struct ProviderCore {
    services: HashMap<TypeKey, Registration, RandomState>,
    aliases: AliasTable,
    names: HashMap<String, Vec<TypeKey>, RandomState>,
    scope_kind: ScopeKind,
    generation: u64,
    plans: DashMap<TypeKey, Arc<PlanNode>, RandomState>,
    singletons: DashMap<TypeKey, Instance, RandomState>,
    /// Singletons appended through `set`; additive only.
    extras: DashMap<TypeKey, Instance, RandomState>,
}

impl ProviderCore {
    /// Look up a registration, consulting the additive extras as
    /// instance-singletons.
    pub(crate) fn registration_for(&self, key: &TypeKey) -> Option<Registration> {
        if let Some(registration) = self.services.get(key) {
            return Some(registration.clone());
        }
        self.extras.get(key).map(|instance| {
            Registration::new(
                key.clone(),
                Lifetime::Singleton,
                Builder::Instance(instance.value().clone()),
            )
        })
    }

    pub(crate) fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// Single registered key with the given simple name, for deferred
    /// references.
    pub(crate) fn named_key(&self, name: &str) -> Option<TypeKey> {
        match self.names.get(name).map(Vec::as_slice) {
            Some([key]) => Some(key.clone()),
            _ => None,
        }
    }

    pub(crate) fn plans(&self) -> &DashMap<TypeKey, Arc<PlanNode>, RandomState> {
        &self.plans
    }

    pub(crate) fn singletons(&self) -> &DashMap<TypeKey, Instance, RandomState> {
        &self.singletons
    }
}

/// Read-mostly handle over a frozen registration snapshot.
///
/// Cheap to clone; clones share the caches.
///
/// # Examples
///
/// ```rust
/// use wireplan::{Activatable, ArgBag, ClassSpec, Registry, Result};
///
/// struct Config {
///     debug: bool,
/// }
///
/// impl Activatable for Config {
///     fn blueprint() -> ClassSpec {
///         ClassSpec::new("Config")
///     }
///     fn assemble(_bag: &mut ArgBag) -> Result<Self> {
///         Ok(Config { debug: true })
///     }
/// }
///
/// let mut registry = Registry::new();
/// registry.add_singleton::<Config>()?;
///
/// let provider = registry.build_provider();
/// let config = provider.get::<Config>()?;
/// assert!(config.debug);
/// # Ok::<(), wireplan::DiError>(())
/// ```
#[derive(Clone)]
pub struct Provider {
    core: Arc<ProviderCore>,
}

impl Provider {
    pub(crate) fn build(registry: &Registry) -> Self {
        #[cfg(feature = "logging")]
        debug!(
            target: "wireplan",
            registered = registry.len(),
            generation = registry.generation(),
            "Building provider snapshot"
        );

        let hasher = RandomState::new;
        Self {
            core: Arc::new(ProviderCore {
                services: registry.services.clone(),
                aliases: registry.aliases.clone(),
                names: registry.names.clone(),
                scope_kind: registry.options.scope_kind,
                generation: registry.generation(),
                plans: DashMap::with_capacity_and_hasher_and_shard_amount(0, hasher(), 8),
                singletons: DashMap::with_capacity_and_hasher_and_shard_amount(0, hasher(), 8),
                extras: DashMap::with_capacity_and_hasher_and_shard_amount(0, hasher(), 8),
            }),
        }
    }

    /// Resolve a sized service.
    ///
    /// Runs inside a fresh activation scope, so scoped instances live for
    /// this one call; use [`create_scope`](Self::create_scope) to share them
    /// across calls.
    pub fn get<T: Injectable>(&self) -> Result<Arc<T>> {
        self.create_scope().get::<T>()
    }

    /// Alias for [`get`](Self::get).
    #[inline]
    pub fn resolve<T: Injectable>(&self) -> Result<Arc<T>> {
        self.get::<T>()
    }

    /// Resolve a trait-keyed service.
    pub fn get_trait<I: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<I>> {
        self.create_scope().get_trait::<I>()
    }

    /// Resolve an arbitrary key, type-erased.
    pub fn get_keyed(&self, key: &TypeKey) -> Result<Instance> {
        self.create_scope().get_keyed(key)
    }

    /// Resolve through a name alias.
    pub fn get_named<T: Injectable>(&self, name: &str) -> Result<Arc<T>> {
        self.create_scope().get_named::<T>(name)
    }

    /// Open a scope whose scoped instances are shared until it is dropped.
    pub fn create_scope(&self) -> ActivationScope {
        ActivationScope::new(self.clone())
    }

    /// Append a singleton instance under a new key.
    ///
    /// Purely additive: existing plans and singletons stay valid. A key that
    /// is already registered — under any lifetime, or by an earlier `set` —
    /// is rejected.
    pub fn set<T: Injectable>(&self, value: T) -> Result<()> {
        self.set_keyed(TypeKey::of::<T>(), Arc::new(value) as Instance)
    }

    /// Append a trait-keyed singleton instance.
    pub fn set_trait<I: ?Sized + Send + Sync + 'static>(&self, value: Arc<I>) -> Result<()> {
        self.set_keyed(TypeKey::of::<I>(), Arc::new(value) as Instance)
    }

    /// Append a singleton under an explicit key.
    pub fn set_keyed(&self, key: TypeKey, instance: Instance) -> Result<()> {
        if self.core.services.contains_key(&key) || self.core.extras.contains_key(&key) {
            return Err(DiError::OverridingService { key });
        }

        #[cfg(feature = "logging")]
        debug!(target: "wireplan", key = %key, "Appending singleton via set");

        self.core.extras.insert(key, instance);
        Ok(())
    }

    /// Whether a key is resolvable as registered (directly or via `set`).
    pub fn contains(&self, key: &TypeKey) -> bool {
        if self.core.services.contains_key(key) || self.core.extras.contains_key(key) {
            return true;
        }
        key.as_name()
            .and_then(|name| self.core.aliases.lookup(name))
            .is_some()
    }

    /// Whether a concrete type is registered.
    pub fn contains_type<T: ?Sized + 'static>(&self) -> bool {
        self.contains(&TypeKey::of::<T>())
    }

    /// Registry generation this snapshot was built from.
    pub fn generation(&self) -> u64 {
        self.core.generation
    }

    /// Number of keys resolvable through this provider.
    pub fn len(&self) -> usize {
        self.core.services.len() + self.core.extras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn core(&self) -> &ProviderCore {
        &self.core
    }

    pub(crate) fn scope_kind(&self) -> ScopeKind {
        self.core.scope_kind
    }
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("services", &self.core.services.len())
            .field("extras", &self.core.extras.len())
            .field("plans", &self.core.plans.len())
            .field("singletons", &self.core.singletons.len())
            .field("generation", &self.core.generation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Activatable, ArgBag, ClassSpec};

    struct Config;

    impl Activatable for Config {
        fn blueprint() -> ClassSpec {
            ClassSpec::new("Config")
        }
        fn assemble(_bag: &mut ArgBag) -> Result<Self> {
            Ok(Config)
        }
    }

    struct Extra;

    #[test]
    fn set_adds_new_singletons() {
        let provider = Registry::new().build_provider();
        provider.set(Extra).unwrap();

        assert!(provider.contains_type::<Extra>());
        let a = provider.get::<Extra>().unwrap();
        let b = provider.get::<Extra>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn set_rejects_existing_keys() {
        let mut registry = Registry::new();
        registry.add_transient::<Config>().unwrap();
        let provider = registry.build_provider();

        let err = provider.set(Config).unwrap_err();
        assert!(matches!(err, DiError::OverridingService { .. }));

        provider.set(Extra).unwrap();
        let err = provider.set(Extra).unwrap_err();
        assert!(matches!(err, DiError::OverridingService { .. }));
    }

    #[test]
    fn set_does_not_disturb_existing_singletons() {
        let mut registry = Registry::new();
        registry.add_singleton::<Config>().unwrap();
        let provider = registry.build_provider();

        let before = provider.get::<Config>().unwrap();
        provider.set(Extra).unwrap();
        let after = provider.get::<Config>().unwrap();
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn snapshot_ignores_later_registry_mutation() {
        struct Late;

        let mut registry = Registry::new();
        registry.add_singleton::<Config>().unwrap();
        let provider = registry.build_provider();

        registry.add_instance(Late).unwrap();
        assert!(!provider.contains_type::<Late>());
        assert!(provider.get::<Config>().is_ok());
    }
}
