//! Activation scopes.
//!
//! An [`ActivationScope`] is the per-resolution context: it owns the scoped
//! instance cache, keeps the stack of currently-activating keys, and gives
//! factories access back into the provider. Scopes are single-threaded by
//! construction (`Rc`/`RefCell`), which is exactly the sharing rule for
//! scoped caches.

use crate::descriptor::{downcast_shared, downcast_sized, Injectable, Instance};
use crate::error::Result;
use crate::key::TypeKey;
use crate::provider::Provider;
use crate::{activator, planner};
use ahash::RandomState;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::debug;

/// Which scope implementation a provider hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScopeKind {
    /// Independent scope per `create_scope` / per top-level resolve.
    #[default]
    Plain,
    /// Experimental: nested scopes on the same thread transparently share
    /// the outermost scope's cache through a thread-local ambient slot.
    Tracking,
}

type ScopedMap = HashMap<TypeKey, Instance, RandomState>;
type SharedCache = Rc<RefCell<ScopedMap>>;

thread_local! {
    /// Ambient cache stack for [`ScopeKind::Tracking`].
    static AMBIENT: RefCell<Vec<SharedCache>> = const { RefCell::new(Vec::new()) };
}

enum ScopeRole {
    Plain,
    AmbientOwner,
    AmbientShared,
}

/// Per-resolution context owning the scoped cache.
///
/// Obtained from [`Provider::create_scope`]; every resolution method on the
/// provider or registry also runs inside a short-lived scope of its own.
/// Dropping the scope clears its cache, releasing the scoped instances.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use wireplan::{Activatable, ArgBag, ClassSpec, Registry, Result};
///
/// struct Connection;
///
/// impl Activatable for Connection {
///     fn blueprint() -> ClassSpec {
///         ClassSpec::new("Connection")
///     }
///     fn assemble(_bag: &mut ArgBag) -> Result<Self> {
///         Ok(Connection)
///     }
/// }
///
/// let mut registry = Registry::new();
/// registry.add_scoped::<Connection>()?;
/// let provider = registry.build_provider();
///
/// let scope = provider.create_scope();
/// let a = scope.get::<Connection>()?;
/// let b = scope.get::<Connection>()?;
/// assert!(Arc::ptr_eq(&a, &b)); // shared within the scope
///
/// let other = provider.create_scope();
/// let c = other.get::<Connection>()?;
/// assert!(!Arc::ptr_eq(&a, &c)); // distinct across scopes
/// # Ok::<(), wireplan::DiError>(())
/// ```
pub struct ActivationScope {
    provider: Provider,
    cache: SharedCache,
    stack: RefCell<Vec<TypeKey>>,
    role: ScopeRole,
}

impl ActivationScope {
    pub(crate) fn new(provider: Provider) -> Self {
        let (cache, role) = match provider.scope_kind() {
            ScopeKind::Plain => (
                Rc::new(RefCell::new(ScopedMap::default())),
                ScopeRole::Plain,
            ),
            ScopeKind::Tracking => AMBIENT.with(|ambient| {
                let enclosing = ambient.borrow().last().cloned();
                match enclosing {
                    Some(shared) => (shared, ScopeRole::AmbientShared),
                    None => {
                        let cache = Rc::new(RefCell::new(ScopedMap::default()));
                        ambient.borrow_mut().push(cache.clone());
                        (cache, ScopeRole::AmbientOwner)
                    }
                }
            }),
        };

        #[cfg(feature = "logging")]
        debug!(
            target: "wireplan",
            shared = matches!(role, ScopeRole::AmbientShared),
            "Creating activation scope"
        );

        Self {
            provider,
            cache,
            stack: RefCell::new(Vec::new()),
            role,
        }
    }

    /// The provider this scope resolves against.
    #[inline]
    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    /// Resolve a sized service within this scope.
    pub fn get<T: Injectable>(&self) -> Result<Arc<T>> {
        let key = TypeKey::of::<T>();
        let instance = self.get_keyed(&key)?;
        downcast_sized(&key, instance)
    }

    /// Resolve a trait-keyed service within this scope.
    pub fn get_trait<I: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<I>> {
        let key = TypeKey::of::<I>();
        let instance = self.get_keyed(&key)?;
        downcast_shared(&key, instance)
    }

    /// Resolve an arbitrary key within this scope, type-erased.
    pub fn get_keyed(&self, key: &TypeKey) -> Result<Instance> {
        let plan = planner::plan(self.provider.core(), key)?;
        activator::activate(&plan, self)
    }

    /// Resolve through a name alias within this scope.
    pub fn get_named<T: Injectable>(&self, name: &str) -> Result<Arc<T>> {
        let key = TypeKey::name(name);
        let instance = self.get_keyed(&key)?;
        downcast_sized(&key, instance)
    }

    /// The nearest currently-activating key, if any. Inside a factory this
    /// is the key whose plan invoked it; outside activation it is `None`.
    pub fn activating_type(&self) -> Option<TypeKey> {
        self.stack.borrow().last().cloned()
    }

    /// Number of instances currently held in the scoped cache.
    pub fn scoped_count(&self) -> usize {
        self.cache.borrow().len()
    }

    pub(crate) fn scoped_get(&self, key: &TypeKey) -> Option<Instance> {
        self.cache.borrow().get(key).cloned()
    }

    pub(crate) fn scoped_insert(&self, key: TypeKey, instance: Instance) -> Instance {
        self.cache
            .borrow_mut()
            .entry(key)
            .or_insert(instance)
            .clone()
    }

    pub(crate) fn push_activating(&self, key: TypeKey) {
        self.stack.borrow_mut().push(key);
    }

    pub(crate) fn pop_activating(&self) {
        self.stack.borrow_mut().pop();
    }
}

impl Drop for ActivationScope {
    fn drop(&mut self) {
        match self.role {
            ScopeRole::Plain => {
                self.cache.borrow_mut().clear();
            }
            ScopeRole::AmbientOwner => {
                AMBIENT.with(|ambient| {
                    ambient.borrow_mut().pop();
                });
                self.cache.borrow_mut().clear();
            }
            // The outermost scope owns the shared cache.
            ScopeRole::AmbientShared => {}
        }
    }
}

impl std::fmt::Debug for ActivationScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivationScope")
            .field("scoped_count", &self.scoped_count())
            .field("activating", &self.activating_type())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    struct Widget;

    #[test]
    fn fresh_scope_is_empty() {
        let provider = Registry::new().build_provider();
        let scope = provider.create_scope();
        assert_eq!(scope.scoped_count(), 0);
        assert!(scope.activating_type().is_none());
    }

    #[test]
    fn scoped_insert_keeps_first_instance() {
        let provider = Registry::new().build_provider();
        let scope = provider.create_scope();

        let key = TypeKey::of::<Widget>();
        let first = scope.scoped_insert(key.clone(), Arc::new(Widget) as Instance);
        let second = scope.scoped_insert(key.clone(), Arc::new(Widget) as Instance);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(scope.scoped_get(&key).is_some());
    }

    #[test]
    fn activating_stack_tracks_nesting() {
        let provider = Registry::new().build_provider();
        let scope = provider.create_scope();

        scope.push_activating(TypeKey::of::<Widget>());
        assert_eq!(scope.activating_type(), Some(TypeKey::of::<Widget>()));
        scope.pop_activating();
        assert!(scope.activating_type().is_none());
    }
}
