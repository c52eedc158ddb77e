//! Activation-plan compilation.
//!
//! The planner walks declared dependencies from a root key and produces an
//! activation plan: a DAG of build steps the activator executes. All
//! structural errors — missing registrations, unresolvable sites, deferred
//! references without context, cycles — surface here, on the first resolve
//! of a root, so activation itself can only fail inside user factories.
//!
//! Compiled nodes land in the provider's plan cache; for a fixed registry
//! generation, planning is a pure function of the key.

use crate::descriptor::{AssembleFn, DepRef, Factory, Instance};
use crate::error::{DiError, Result};
use crate::key::TypeKey;
use crate::lifetime::Lifetime;
use crate::provider::ProviderCore;
use crate::registry::{Builder, Registration};
use ahash::RandomState;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::debug;

/// One node of a compiled activation plan.
pub(crate) struct PlanNode {
    pub(crate) key: TypeKey,
    pub(crate) lifetime: Lifetime,
    pub(crate) step: BuildStep,
}

impl std::fmt::Debug for PlanNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanNode")
            .field("key", &self.key)
            .field("lifetime", &self.lifetime)
            .field("step", &self.step)
            .finish()
    }
}

/// How a node's instance is produced.
pub(crate) enum BuildStep {
    /// Pre-existing instance; a leaf.
    Instance(Instance),
    /// User factory; a leaf — factories self-serve through the scope.
    Factory(Factory),
    /// Construct from descriptor edges, parameters first, then attributes.
    Assemble {
        assemble: AssembleFn,
        edges: Vec<EdgeMode>,
    },
    /// The constant none-sentinel of an unsatisfied optional root.
    Nothing,
}

impl std::fmt::Debug for BuildStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildStep::Instance(_) => f.write_str("Instance(..)"),
            BuildStep::Factory(factory) => f.debug_tuple("Factory").field(factory).finish(),
            BuildStep::Assemble { edges, .. } => f
                .debug_struct("Assemble")
                .field("edges", edges)
                .finish(),
            BuildStep::Nothing => f.write_str("Nothing"),
        }
    }
}

/// One dependency edge of an assemble step, in site order.
pub(crate) enum EdgeMode {
    /// Materialize the child node.
    Required(Arc<PlanNode>),
    /// Optional site with an unregistered inner type: the slot stays empty.
    OptionalNone,
    /// By-name site with no alias candidate: the default supplies the value.
    Defaulted,
}

impl std::fmt::Debug for EdgeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EdgeMode::Required(node) => f.debug_tuple("Required").field(node).finish(),
            EdgeMode::OptionalNone => f.write_str("OptionalNone"),
            EdgeMode::Defaulted => f.write_str("Defaulted"),
        }
    }
}

/// Compile (or fetch from cache) the plan for `root`.
pub(crate) fn plan(core: &ProviderCore, root: &TypeKey) -> Result<Arc<PlanNode>> {
    if let Some(hit) = core.plans().get(root) {
        return Ok(hit.value().clone());
    }

    let mut context = PlanContext {
        core,
        visiting: HashSet::default(),
        path: Vec::new(),
        memo: HashMap::default(),
    };
    let node = context.visit(root)?;

    #[cfg(feature = "logging")]
    debug!(
        target: "wireplan",
        key = %root,
        lifetime = %node.lifetime,
        "Compiled activation plan"
    );

    Ok(node)
}

struct PlanContext<'c> {
    core: &'c ProviderCore,
    visiting: HashSet<TypeKey, RandomState>,
    /// Current DFS path, for cycle and resolution error chains.
    path: Vec<TypeKey>,
    /// Keys compiled within this invocation; gives the plan its DAG sharing.
    memo: HashMap<TypeKey, Arc<PlanNode>, RandomState>,
}

impl PlanContext<'_> {
    fn visit(&mut self, key: &TypeKey) -> Result<Arc<PlanNode>> {
        if let Some(hit) = self.core.plans().get(key) {
            return Ok(hit.value().clone());
        }
        if let Some(hit) = self.memo.get(key) {
            return Ok(hit.clone());
        }
        if self.visiting.contains(key) {
            let start = self.path.iter().position(|k| k == key).unwrap_or(0);
            let mut chain = self.path[start..].to_vec();
            chain.push(key.clone());
            return Err(DiError::CircularDependency { chain });
        }

        let Some(registration) = self.core.registration_for(key) else {
            return self.fallback(key);
        };

        self.visiting.insert(key.clone());
        self.path.push(key.clone());
        let compiled = self.compile(key, &registration);
        self.path.pop();
        self.visiting.remove(key);

        self.install(key, compiled?)
    }

    /// Key resolution when no registration exists: optional redirection,
    /// then alias names, then failure.
    fn fallback(&mut self, key: &TypeKey) -> Result<Arc<PlanNode>> {
        if let Some(inner) = key.optional_inner() {
            let inner = inner.clone();
            if self.core.registration_for(&inner).is_some() {
                let node = self.visit(&inner)?;
                return self.install(key, node);
            }
            let node = Arc::new(PlanNode {
                key: key.clone(),
                lifetime: Lifetime::Transient,
                step: BuildStep::Nothing,
            });
            return self.install(key, node);
        }

        if let Some(name) = key.as_name() {
            if let Some(target) = self.core.aliases().lookup(name).cloned() {
                let node = self.visit(&target)?;
                return self.install(key, node);
            }
        }

        Err(DiError::CannotResolveType {
            key: key.clone(),
            chain: self.path.clone(),
        })
    }

    fn compile(&mut self, key: &TypeKey, registration: &Registration) -> Result<Arc<PlanNode>> {
        let step = match registration.builder() {
            Builder::Instance(instance) => BuildStep::Instance(instance.clone()),
            Builder::Factory(factory) => BuildStep::Factory(factory.clone()),
            Builder::ConcreteType(concrete) => {
                let class = concrete.spec();
                let mut edges = Vec::with_capacity(class.params().len() + class.attrs().len());
                for param in class.params() {
                    edges.push(self.edge(
                        key,
                        registration,
                        param.name,
                        &param.target,
                        param.has_default,
                    )?);
                }
                for attr in class.attrs() {
                    // Constructor wins over a same-named attribute.
                    if class.params().iter().any(|p| p.name == attr.name) {
                        continue;
                    }
                    edges.push(self.edge(key, registration, attr.name, &attr.target, false)?);
                }
                BuildStep::Assemble {
                    assemble: concrete.assemble_fn(),
                    edges,
                }
            }
        };

        Ok(Arc::new(PlanNode {
            key: key.clone(),
            lifetime: registration.lifetime(),
            step,
        }))
    }

    fn edge(
        &mut self,
        owner: &TypeKey,
        registration: &Registration,
        site: &'static str,
        target: &DepRef,
        has_default: bool,
    ) -> Result<EdgeMode> {
        match target {
            DepRef::Key(key) => {
                if let Some(inner) = key.optional_inner() {
                    if self.core.registration_for(key).is_none()
                        && self.core.registration_for(inner).is_none()
                    {
                        return Ok(EdgeMode::OptionalNone);
                    }
                }
                Ok(EdgeMode::Required(self.visit(key)?))
            }
            DepRef::ByName => match self.core.aliases().lookup(site).cloned() {
                Some(key) => Ok(EdgeMode::Required(self.visit(&key)?)),
                None if has_default => Ok(EdgeMode::Defaulted),
                None => Err(DiError::CannotResolveParameter {
                    owner: owner.clone(),
                    parameter: site,
                    chain: self.path.clone(),
                }),
            },
            DepRef::Deferred(reference) => {
                let reference = *reference;
                let key = registration
                    .local(reference)
                    .cloned()
                    .or_else(|| self.core.named_key(reference))
                    .ok_or_else(|| DiError::FactoryMissingContext {
                        owner: owner.clone(),
                        reference,
                    })?;
                Ok(EdgeMode::Required(self.visit(&key)?))
            }
        }
    }

    fn install(&mut self, key: &TypeKey, node: Arc<PlanNode>) -> Result<Arc<PlanNode>> {
        self.memo.insert(key.clone(), node.clone());
        self.core.plans().insert(key.clone(), node.clone());
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Activatable, ArgBag, ClassSpec};
    use crate::registry::Registry;

    #[derive(Debug)]
    struct Chicken;
    struct Egg;

    impl Activatable for Chicken {
        fn blueprint() -> ClassSpec {
            ClassSpec::new("Chicken").attr::<Egg>("egg")
        }
        fn assemble(bag: &mut ArgBag) -> Result<Self> {
            bag.required::<Egg>("egg")?;
            Ok(Chicken)
        }
    }

    impl Activatable for Egg {
        fn blueprint() -> ClassSpec {
            ClassSpec::new("Egg").attr::<Chicken>("chicken")
        }
        fn assemble(bag: &mut ArgBag) -> Result<Self> {
            bag.required::<Chicken>("chicken")?;
            Ok(Egg)
        }
    }

    #[test]
    fn cycle_is_detected_with_full_chain() {
        let mut registry = Registry::new();
        registry.add_transient::<Chicken>().unwrap();
        registry.add_transient::<Egg>().unwrap();
        let provider = registry.build_provider();

        let err = plan(provider.core(), &TypeKey::of::<Chicken>()).unwrap_err();
        match err {
            DiError::CircularDependency { chain } => {
                assert!(chain.len() >= 3);
                assert_eq!(chain.first(), chain.last());
            }
            other => panic!("expected CircularDependency, got {other:?}"),
        }
    }

    #[test]
    fn missing_registration_reports_requirer() {
        #[derive(Debug)]
        struct Farm;
        impl Activatable for Farm {
            fn blueprint() -> ClassSpec {
                ClassSpec::new("Farm").param::<Chicken>("chicken")
            }
            fn assemble(bag: &mut ArgBag) -> Result<Self> {
                bag.required::<Chicken>("chicken")?;
                Ok(Farm)
            }
        }

        let mut registry = Registry::new();
        registry.add_transient::<Farm>().unwrap();
        let provider = registry.build_provider();

        let err = plan(provider.core(), &TypeKey::of::<Farm>()).unwrap_err();
        match err {
            DiError::CannotResolveType { key, chain } => {
                assert_eq!(key, TypeKey::of::<Chicken>());
                assert_eq!(chain, vec![TypeKey::of::<Farm>()]);
            }
            other => panic!("expected CannotResolveType, got {other:?}"),
        }
    }

    #[test]
    fn planning_is_cached_per_generation() {
        struct Solo;
        impl Activatable for Solo {
            fn blueprint() -> ClassSpec {
                ClassSpec::new("Solo")
            }
            fn assemble(_bag: &mut ArgBag) -> Result<Self> {
                Ok(Solo)
            }
        }

        let mut registry = Registry::new();
        registry.add_transient::<Solo>().unwrap();
        let provider = registry.build_provider();

        let first = plan(provider.core(), &TypeKey::of::<Solo>()).unwrap();
        let second = plan(provider.core(), &TypeKey::of::<Solo>()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn constructor_shadows_same_named_attribute() {
        struct Twice;
        impl Activatable for Twice {
            fn blueprint() -> ClassSpec {
                // Same site name declared both ways; only the parameter edge
                // survives planning.
                ClassSpec::new("Twice")
                    .param::<Egg>("egg")
                    .attr::<Chicken>("egg")
            }
            fn assemble(bag: &mut ArgBag) -> Result<Self> {
                bag.required::<Egg>("egg")?;
                Ok(Twice)
            }
        }

        struct PlainEgg;
        let mut registry = Registry::new();
        registry.add_transient::<Twice>().unwrap();
        registry
            .register_factory(
                Some(TypeKey::of::<Egg>()),
                Lifetime::Transient,
                Factory::with_scope(|_| Ok(PlainEgg)),
            )
            .unwrap();
        let provider = registry.build_provider();

        let node = plan(provider.core(), &TypeKey::of::<Twice>()).unwrap();
        match &node.step {
            BuildStep::Assemble { edges, .. } => assert_eq!(edges.len(), 1),
            _ => panic!("expected an assemble step"),
        }
    }
}
