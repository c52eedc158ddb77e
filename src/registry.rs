//! The mutable service registry.
//!
//! Registrations are collected here, then frozen into a [`Provider`] either
//! explicitly through [`Registry::build_provider`] or implicitly by the
//! first direct `get`. Every successful mutation advances a generation
//! counter; the internal provider is rebuilt — plans and singletons
//! discarded wholesale — the next time a stale generation is observed.

use crate::alias::AliasTable;
use crate::descriptor::{Activatable, ConcreteSpec, Factory, Injectable, Instance};
use crate::error::{DiError, Result};
use crate::key::TypeKey;
use crate::lifetime::Lifetime;
use crate::provider::Provider;
use crate::scope::{ActivationScope, ScopeKind};
use ahash::RandomState;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

#[cfg(feature = "logging")]
use tracing::debug;

/// How an instance is produced for a key.
#[derive(Clone)]
pub enum Builder {
    /// Construct a concrete type from its descriptor.
    ConcreteType(ConcreteSpec),
    /// Invoke a user factory.
    Factory(Factory),
    /// Hand out a pre-existing instance.
    Instance(Instance),
}

impl Builder {
    /// Descriptor builder for a concrete type.
    pub fn concrete<C: Activatable>() -> Self {
        Builder::ConcreteType(ConcreteSpec::of::<C>())
    }

    /// Pre-existing instance builder.
    pub fn instance<T: Injectable>(value: T) -> Self {
        Builder::Instance(Arc::new(value) as Instance)
    }
}

impl std::fmt::Debug for Builder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Builder::ConcreteType(spec) => f.debug_tuple("ConcreteType").field(spec).finish(),
            Builder::Factory(factory) => f.debug_tuple("Factory").field(factory).finish(),
            Builder::Instance(_) => f.write_str("Instance(..)"),
        }
    }
}

/// The binding of a key to a builder and a lifetime.
#[derive(Clone)]
pub struct Registration {
    key: TypeKey,
    lifetime: Lifetime,
    builder: Builder,
    /// Name scope carried by the registration, consulted first when a
    /// deferred string reference is resolved.
    locals: HashMap<&'static str, TypeKey, RandomState>,
}

impl Registration {
    pub fn new(key: TypeKey, lifetime: Lifetime, builder: Builder) -> Self {
        Self {
            key,
            lifetime,
            builder,
            locals: HashMap::default(),
        }
    }

    /// Attach captured locals for deferred-reference resolution.
    pub fn with_locals(
        mut self,
        locals: impl IntoIterator<Item = (&'static str, TypeKey)>,
    ) -> Self {
        self.locals.extend(locals);
        self
    }

    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    pub fn builder(&self) -> &Builder {
        &self.builder
    }

    pub(crate) fn local(&self, name: &str) -> Option<&TypeKey> {
        self.locals.get(name)
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("key", &self.key)
            .field("lifetime", &self.lifetime)
            .field("builder", &self.builder)
            .finish()
    }
}

/// Registry construction options.
#[derive(Debug, Clone, Default)]
pub struct RegistryOptions {
    /// Disable automatic alias derivation; only explicit
    /// [`add_alias`](Registry::add_alias) entries participate.
    pub strict: bool,
    /// Which scope implementation providers hand out.
    pub scope_kind: ScopeKind,
    /// Pre-allocated registration capacity.
    pub capacity: usize,
}

/// Mutable mapping from [`TypeKey`] to [`Registration`].
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use wireplan::{Activatable, ArgBag, ClassSpec, Registry, Result};
///
/// struct Database;
///
/// impl Activatable for Database {
///     fn blueprint() -> ClassSpec {
///         ClassSpec::new("Database")
///     }
///     fn assemble(_bag: &mut ArgBag) -> Result<Self> {
///         Ok(Database)
///     }
/// }
///
/// struct UserService {
///     db: Arc<Database>,
/// }
///
/// impl Activatable for UserService {
///     fn blueprint() -> ClassSpec {
///         ClassSpec::new("UserService").param::<Database>("db")
///     }
///     fn assemble(bag: &mut ArgBag) -> Result<Self> {
///         Ok(UserService {
///             db: bag.required::<Database>("db")?,
///         })
///     }
/// }
///
/// let mut registry = Registry::new();
/// registry.add_singleton::<Database>()?;
/// registry.add_transient::<UserService>()?;
///
/// let service = registry.get::<UserService>()?;
/// let again = registry.get::<UserService>()?;
/// assert!(Arc::ptr_eq(&service.db, &again.db)); // singleton dependency
/// # Ok::<(), wireplan::DiError>(())
/// ```
pub struct Registry {
    pub(crate) services: HashMap<TypeKey, Registration, RandomState>,
    pub(crate) order: Vec<TypeKey>,
    pub(crate) aliases: AliasTable,
    /// Simple-name index over registered keys, for deferred references.
    pub(crate) names: HashMap<String, Vec<TypeKey>, RandomState>,
    pub(crate) options: RegistryOptions,
    generation: u64,
    /// Internal provider, rebuilt when the generation advances.
    cached: Mutex<Option<Provider>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::with_options(RegistryOptions::default())
    }

    pub fn with_options(options: RegistryOptions) -> Self {
        Self {
            services: HashMap::with_capacity_and_hasher(options.capacity, RandomState::new()),
            order: Vec::with_capacity(options.capacity),
            aliases: AliasTable::new(),
            names: HashMap::default(),
            options,
            generation: 0,
            cached: Mutex::new(None),
        }
    }

    /// Registry pre-sized for an expected number of registrations.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_options(RegistryOptions {
            capacity,
            ..RegistryOptions::default()
        })
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register, failing on collision with an existing key.
    pub fn register(&mut self, registration: Registration) -> Result<()> {
        self.validate(&registration)?;
        if self.services.contains_key(registration.key()) {
            return Err(DiError::OverridingService {
                key: registration.key().clone(),
            });
        }
        self.commit(registration);
        Ok(())
    }

    /// Register, replacing an existing registration under the same key.
    pub fn register_override(&mut self, registration: Registration) -> Result<()> {
        self.validate(&registration)?;
        self.commit(registration);
        Ok(())
    }

    /// Transient concrete type under its own key.
    pub fn add_transient<C: Activatable>(&mut self) -> Result<()> {
        self.add_concrete::<C>(Lifetime::Transient)
    }

    /// Scoped concrete type under its own key.
    pub fn add_scoped<C: Activatable>(&mut self) -> Result<()> {
        self.add_concrete::<C>(Lifetime::Scoped)
    }

    /// Singleton concrete type under its own key.
    pub fn add_singleton<C: Activatable>(&mut self) -> Result<()> {
        self.add_concrete::<C>(Lifetime::Singleton)
    }

    fn add_concrete<C: Activatable>(&mut self, lifetime: Lifetime) -> Result<()> {
        self.register(Registration::new(
            TypeKey::of::<C>(),
            lifetime,
            Builder::concrete::<C>(),
        ))
    }

    /// Transient concrete type behind a trait (protocol) key. The caller
    /// supplies the unsizing coercion, making the binding compiler-checked.
    pub fn add_transient_as<I, C>(&mut self, coerce: fn(Arc<C>) -> Arc<I>) -> Result<()>
    where
        I: ?Sized + Send + Sync + 'static,
        C: Activatable,
    {
        self.add_bound::<I, C>(Lifetime::Transient, coerce)
    }

    /// Scoped variant of [`add_transient_as`](Self::add_transient_as).
    pub fn add_scoped_as<I, C>(&mut self, coerce: fn(Arc<C>) -> Arc<I>) -> Result<()>
    where
        I: ?Sized + Send + Sync + 'static,
        C: Activatable,
    {
        self.add_bound::<I, C>(Lifetime::Scoped, coerce)
    }

    /// Singleton variant of [`add_transient_as`](Self::add_transient_as).
    pub fn add_singleton_as<I, C>(&mut self, coerce: fn(Arc<C>) -> Arc<I>) -> Result<()>
    where
        I: ?Sized + Send + Sync + 'static,
        C: Activatable,
    {
        self.add_bound::<I, C>(Lifetime::Singleton, coerce)
    }

    fn add_bound<I, C>(&mut self, lifetime: Lifetime, coerce: fn(Arc<C>) -> Arc<I>) -> Result<()>
    where
        I: ?Sized + Send + Sync + 'static,
        C: Activatable,
    {
        self.register(Registration::new(
            TypeKey::of::<I>(),
            lifetime,
            Builder::ConcreteType(ConcreteSpec::bound::<I, C>(coerce)),
        ))
    }

    /// Transient service produced by a factory; the key is the factory's
    /// return type.
    pub fn add_transient_by_factory<T, F>(&mut self, factory: F) -> Result<()>
    where
        T: Injectable,
        F: Fn(&ActivationScope) -> Result<T> + Send + Sync + 'static,
    {
        self.register_factory(None, Lifetime::Transient, Factory::with_scope(factory))
    }

    /// Scoped variant of [`add_transient_by_factory`](Self::add_transient_by_factory).
    pub fn add_scoped_by_factory<T, F>(&mut self, factory: F) -> Result<()>
    where
        T: Injectable,
        F: Fn(&ActivationScope) -> Result<T> + Send + Sync + 'static,
    {
        self.register_factory(None, Lifetime::Scoped, Factory::with_scope(factory))
    }

    /// Singleton variant of [`add_transient_by_factory`](Self::add_transient_by_factory).
    pub fn add_singleton_by_factory<T, F>(&mut self, factory: F) -> Result<()>
    where
        T: Injectable,
        F: Fn(&ActivationScope) -> Result<T> + Send + Sync + 'static,
    {
        self.register_factory(None, Lifetime::Singleton, Factory::with_scope(factory))
    }

    /// Trait-keyed service produced by a factory returning the trait handle.
    pub fn add_trait_by_factory<I, F>(&mut self, lifetime: Lifetime, factory: F) -> Result<()>
    where
        I: ?Sized + Send + Sync + 'static,
        F: Fn(&ActivationScope) -> Result<Arc<I>> + Send + Sync + 'static,
    {
        self.register_factory(None, lifetime, Factory::trait_with_scope(factory))
    }

    /// Register a factory under an explicit key, or under its produced key
    /// when no explicit key is given.
    ///
    /// A factory with neither fails with a missing-type error.
    pub fn register_factory(
        &mut self,
        key: Option<TypeKey>,
        lifetime: Lifetime,
        factory: Factory,
    ) -> Result<()> {
        let key = key
            .or_else(|| factory.produces().cloned())
            .ok_or(DiError::MissingType)?;
        self.register(Registration::new(key, lifetime, Builder::Factory(factory)))
    }

    /// Singleton by existing instance; the key is the instance's type.
    pub fn add_instance<T: Injectable>(&mut self, value: T) -> Result<()> {
        self.register(Registration::new(
            TypeKey::of::<T>(),
            Lifetime::Singleton,
            Builder::instance(value),
        ))
    }

    /// Singleton trait handle by existing instance.
    pub fn add_trait_instance<I: ?Sized + Send + Sync + 'static>(
        &mut self,
        value: Arc<I>,
    ) -> Result<()> {
        self.register(Registration::new(
            TypeKey::of::<I>(),
            Lifetime::Singleton,
            Builder::Instance(Arc::new(value) as Instance),
        ))
    }

    /// Explicit alias entry; participates even in strict mode.
    pub fn add_alias(&mut self, name: impl Into<String>, key: TypeKey) {
        let name = name.into();

        #[cfg(feature = "logging")]
        debug!(target: "wireplan", alias = %name, key = %key, "Registered alias");

        self.aliases.insert(name, key);
        self.generation += 1;
    }

    fn validate(&self, registration: &Registration) -> Result<()> {
        // A concrete builder must produce the type its key names; trait
        // (protocol) bindings were already checked by the compiler.
        if let Builder::ConcreteType(spec) = registration.builder() {
            if spec.is_protocol() {
                return Ok(());
            }
            let key = registration.key();
            let foreign = key
                .concrete_id()
                .map(|id| id != spec.produces())
                .or_else(|| key.parameterized_base().map(|base| base != spec.produces()))
                .unwrap_or(false);
            if foreign {
                return Err(DiError::Mismatch {
                    key: key.clone(),
                    implementation: spec.type_name(),
                });
            }
        }
        Ok(())
    }

    fn commit(&mut self, registration: Registration) {
        let key = registration.key().clone();

        #[cfg(feature = "logging")]
        debug!(
            target: "wireplan",
            key = %key,
            lifetime = %registration.lifetime(),
            registered = self.services.len() + 1,
            "Registering service"
        );

        if self.services.insert(key.clone(), registration).is_none() {
            self.order.push(key.clone());
        }

        if let Some(simple) = key.simple_name() {
            let candidates = self.names.entry(simple.to_string()).or_default();
            if !candidates.contains(&key) {
                candidates.push(key.clone());
            }
            if !self.options.strict && key.is_concrete() {
                self.aliases.derive_for(simple, &key);
            }
        }

        self.generation += 1;
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Whether a key is registered (directly, or through an alias for name
    /// keys).
    pub fn contains(&self, key: &TypeKey) -> bool {
        if self.services.contains_key(key) {
            return true;
        }
        key.as_name()
            .and_then(|name| self.aliases.lookup(name))
            .is_some()
    }

    /// Whether a concrete type is registered.
    pub fn contains_type<T: ?Sized + 'static>(&self) -> bool {
        self.contains(&TypeKey::of::<T>())
    }

    /// Registered keys in registration order.
    pub fn keys(&self) -> &[TypeKey] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Generation counter; advances on every successful mutation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of alias names currently known.
    pub fn alias_count(&self) -> usize {
        self.aliases.len()
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Freeze the current registrations into an independent provider.
    ///
    /// Later registry mutations never affect the returned snapshot.
    pub fn build_provider(&self) -> Provider {
        Provider::build(self)
    }

    /// Resolve a sized service through the registry's internal provider.
    ///
    /// The first call freezes an internal snapshot; a mutation afterwards
    /// makes the next call rebuild it, discarding compiled plans and cached
    /// singletons.
    pub fn get<T: Injectable>(&self) -> Result<Arc<T>> {
        self.internal().get::<T>()
    }

    /// Alias for [`get`](Self::get).
    #[inline]
    pub fn resolve<T: Injectable>(&self) -> Result<Arc<T>> {
        self.get::<T>()
    }

    /// Resolve a trait-keyed service.
    pub fn get_trait<I: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<I>> {
        self.internal().get_trait::<I>()
    }

    /// Resolve an arbitrary key, type-erased.
    pub fn get_keyed(&self, key: &TypeKey) -> Result<Instance> {
        self.internal().get_keyed(key)
    }

    /// Resolve through a name alias.
    pub fn get_named<T: Injectable>(&self, name: &str) -> Result<Arc<T>> {
        self.internal().get_named::<T>(name)
    }

    fn internal(&self) -> Provider {
        let mut cached = self
            .cached
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(provider) = cached.as_ref() {
            if provider.generation() == self.generation {
                return provider.clone();
            }
        }
        let provider = Provider::build(self);
        *cached = Some(provider.clone());
        provider
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("registered", &self.services.len())
            .field("aliases", &self.aliases.len())
            .field("generation", &self.generation)
            .field("strict", &self.options.strict)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ArgBag, ClassSpec};

    struct Database;

    impl Activatable for Database {
        fn blueprint() -> ClassSpec {
            ClassSpec::new("Database")
        }
        fn assemble(_bag: &mut ArgBag) -> Result<Self> {
            Ok(Database)
        }
    }

    struct Cache;

    impl Activatable for Cache {
        fn blueprint() -> ClassSpec {
            ClassSpec::new("Cache")
        }
        fn assemble(_bag: &mut ArgBag) -> Result<Self> {
            Ok(Cache)
        }
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = Registry::new();
        registry.add_transient::<Database>().unwrap();

        let err = registry.add_transient::<Database>().unwrap_err();
        assert!(matches!(err, DiError::OverridingService { .. }));
    }

    #[test]
    fn override_replaces() {
        let mut registry = Registry::new();
        registry.add_transient::<Database>().unwrap();
        registry
            .register_override(Registration::new(
                TypeKey::of::<Database>(),
                Lifetime::Singleton,
                Builder::concrete::<Database>(),
            ))
            .unwrap();

        assert_eq!(registry.len(), 1);
        let a = registry.get::<Database>().unwrap();
        let b = registry.get::<Database>().unwrap();
        assert!(Arc::ptr_eq(&a, &b)); // now a singleton
    }

    #[test]
    fn concrete_under_foreign_key_is_a_mismatch() {
        let mut registry = Registry::new();
        let err = registry
            .register(Registration::new(
                TypeKey::of::<Cache>(),
                Lifetime::Transient,
                Builder::concrete::<Database>(),
            ))
            .unwrap_err();
        assert!(matches!(err, DiError::Mismatch { .. }));
    }

    #[test]
    fn parameterized_key_requires_erased_base() {
        let mut registry = Registry::new();
        let wrong_base = TypeKey::parameterized::<Cache>([TypeKey::of::<Database>()]);
        let err = registry
            .register(Registration::new(
                wrong_base,
                Lifetime::Transient,
                Builder::concrete::<Database>(),
            ))
            .unwrap_err();
        assert!(matches!(err, DiError::Mismatch { .. }));

        let right_base = TypeKey::parameterized::<Database>([TypeKey::of::<Cache>()]);
        registry
            .register(Registration::new(
                right_base,
                Lifetime::Transient,
                Builder::concrete::<Database>(),
            ))
            .unwrap();
    }

    #[test]
    fn erased_factory_without_key_is_missing_type() {
        let mut registry = Registry::new();
        let err = registry
            .register_factory(
                None,
                Lifetime::Transient,
                Factory::erased(|_| Ok(Arc::new(Database) as Instance)),
            )
            .unwrap_err();
        assert!(matches!(err, DiError::MissingType));
    }

    #[test]
    fn mutations_advance_the_generation() {
        let mut registry = Registry::new();
        let g0 = registry.generation();

        registry.add_transient::<Database>().unwrap();
        let g1 = registry.generation();
        assert!(g1 > g0);

        registry.add_alias("db", TypeKey::of::<Database>());
        assert!(registry.generation() > g1);

        // A failed registration leaves the generation alone.
        let before = registry.generation();
        let _ = registry.add_transient::<Database>();
        assert_eq!(registry.generation(), before);
    }

    #[test]
    fn registration_order_is_tracked() {
        let mut registry = Registry::new();
        registry.add_transient::<Database>().unwrap();
        registry.add_transient::<Cache>().unwrap();

        assert_eq!(
            registry.keys(),
            &[TypeKey::of::<Database>(), TypeKey::of::<Cache>()]
        );
    }

    #[test]
    fn contains_sees_aliases_for_name_keys() {
        let mut registry = Registry::new();
        registry.add_transient::<Database>().unwrap();

        assert!(registry.contains_type::<Database>());
        assert!(registry.contains(&TypeKey::name("database")));
        assert!(!registry.contains(&TypeKey::name("missing")));
    }

    #[test]
    fn strict_mode_disables_derived_aliases() {
        let mut registry = Registry::with_options(RegistryOptions {
            strict: true,
            ..RegistryOptions::default()
        });
        registry.add_transient::<Database>().unwrap();
        assert!(!registry.contains(&TypeKey::name("database")));

        registry.add_alias("db", TypeKey::of::<Database>());
        assert!(registry.contains(&TypeKey::name("db")));
    }
}
