//! Plan execution.
//!
//! The activator walks a compiled plan against an [`ActivationScope`],
//! honoring the three lifetimes: singletons land in the provider cache,
//! scoped instances in the scope cache, transients are built fresh every
//! time. Within one activation a shared Scoped or Singleton sub-node is
//! materialized once and observed at every edge.

use crate::descriptor::{none_instance, ArgBag, AssembleFn, FactoryCall, Instance};
use crate::error::Result;
use crate::lifetime::Lifetime;
use crate::planner::{BuildStep, EdgeMode, PlanNode};
use crate::scope::ActivationScope;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::trace;

/// Materialize `node` in `scope`, consulting the lifetime caches.
pub(crate) fn activate(node: &Arc<PlanNode>, scope: &ActivationScope) -> Result<Instance> {
    match node.lifetime {
        Lifetime::Singleton => {
            let singletons = scope.provider().core().singletons();
            if let Some(hit) = singletons.get(&node.key) {
                #[cfg(feature = "logging")]
                trace!(target: "wireplan", key = %node.key, cache = "singleton", "Cache hit");
                return Ok(hit.value().clone());
            }
            let built = build(node, scope)?;
            // First insert wins, so every caller observes one instance.
            Ok(singletons.entry(node.key.clone()).or_insert(built).clone())
        }
        Lifetime::Scoped => {
            if let Some(hit) = scope.scoped_get(&node.key) {
                #[cfg(feature = "logging")]
                trace!(target: "wireplan", key = %node.key, cache = "scoped", "Cache hit");
                return Ok(hit);
            }
            let built = build(node, scope)?;
            Ok(scope.scoped_insert(node.key.clone(), built))
        }
        Lifetime::Transient => build(node, scope),
    }
}

fn build(node: &Arc<PlanNode>, scope: &ActivationScope) -> Result<Instance> {
    #[cfg(feature = "logging")]
    trace!(target: "wireplan", key = %node.key, lifetime = %node.lifetime, "Building instance");

    match &node.step {
        BuildStep::Instance(instance) => Ok(instance.clone()),
        BuildStep::Nothing => Ok(none_instance()),
        BuildStep::Factory(factory) => {
            // The factory's second argument is the key that required it;
            // nested `scope.get` calls made by the factory see the factory's
            // own key as the nearest activating type.
            let parent = scope.activating_type();
            scope.push_activating(node.key.clone());
            let result = match factory.call() {
                FactoryCall::Nullary(call) => (call.as_ref())(),
                FactoryCall::WithScope(call) => (call.as_ref())(scope),
                FactoryCall::WithContext(call) => (call.as_ref())(scope, parent.as_ref()),
            };
            scope.pop_activating();
            result
        }
        BuildStep::Assemble { assemble, edges } => {
            scope.push_activating(node.key.clone());
            let result = assemble_edges(node, edges, assemble, scope);
            scope.pop_activating();
            result
        }
    }
}

/// Materialize edges in site order (parameters first, then attributes) and
/// hand the resolved slots to the type's assembly.
fn assemble_edges(
    node: &Arc<PlanNode>,
    edges: &[EdgeMode],
    assemble: &AssembleFn,
    scope: &ActivationScope,
) -> Result<Instance> {
    let mut slots = Vec::with_capacity(edges.len());
    for edge in edges {
        match edge {
            EdgeMode::Required(child) => slots.push(Some(activate(child, scope)?)),
            EdgeMode::OptionalNone | EdgeMode::Defaulted => slots.push(None),
        }
    }
    let mut bag = ArgBag::new(node.key.clone(), slots);
    (assemble.as_ref())(&mut bag)
}

#[cfg(test)]
mod tests {
    use crate::descriptor::{Activatable, ArgBag, ClassSpec};
    use crate::error::Result;
    use crate::registry::Registry;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    static BUILT: AtomicU32 = AtomicU32::new(0);

    struct Counter(u32);

    impl Activatable for Counter {
        fn blueprint() -> ClassSpec {
            ClassSpec::new("Counter")
        }
        fn assemble(_bag: &mut ArgBag) -> Result<Self> {
            Ok(Counter(BUILT.fetch_add(1, Ordering::SeqCst)))
        }
    }

    #[test]
    fn transient_builds_fresh_every_time() {
        let mut registry = Registry::new();
        registry.add_transient::<Counter>().unwrap();
        let provider = registry.build_provider();

        let a = provider.get::<Counter>().unwrap();
        let b = provider.get::<Counter>().unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_ne!(a.0, b.0);
    }

    #[test]
    fn singleton_is_built_once() {
        struct Lazy;
        static CREATED: AtomicU32 = AtomicU32::new(0);
        impl Activatable for Lazy {
            fn blueprint() -> ClassSpec {
                ClassSpec::new("Lazy")
            }
            fn assemble(_bag: &mut ArgBag) -> Result<Self> {
                CREATED.fetch_add(1, Ordering::SeqCst);
                Ok(Lazy)
            }
        }

        let mut registry = Registry::new();
        registry.add_singleton::<Lazy>().unwrap();
        let provider = registry.build_provider();

        assert_eq!(CREATED.load(Ordering::SeqCst), 0);
        let a = provider.get::<Lazy>().unwrap();
        let b = provider.get::<Lazy>().unwrap();
        assert_eq!(CREATED.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a, &b));
    }
}
