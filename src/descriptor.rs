//! Compile-time dependency descriptors.
//!
//! Rust has no runtime reflection, so the wiring information a reflective
//! container would read off constructors and class attributes is declared
//! here instead: a type implements [`Activatable`] (by hand or through
//! `#[derive(Activatable)]` from the `derive` feature) and publishes a
//! [`ClassSpec`] listing its dependency sites. The planner consumes the
//! descriptor; the activator feeds resolved values back through an
//! [`ArgBag`].

use crate::error::{DiError, Result};
use crate::key::{NoneSentinel, TypeKey};
use crate::scope::ActivationScope;
use once_cell::sync::OnceCell;
use std::any::{type_name, Any, TypeId};
use std::sync::Arc;

/// Marker trait for types that can live in the container.
///
/// Automatically implemented for everything `Send + Sync + 'static`; you
/// never implement it manually.
pub trait Injectable: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Injectable for T {}

/// Type-erased instance currency.
///
/// Sized services are stored as `Arc<T>`; trait-keyed services are stored as
/// the sized handle `Arc<dyn Trait>` (wrapped once more for erasure). All
/// downcasts are checked.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// How a dependency site names its target.
#[derive(Debug, Clone)]
pub enum DepRef {
    /// A declared type key.
    Key(TypeKey),
    /// A deferred string reference, resolved at planning time against the
    /// registration's locals and the registered simple names.
    Deferred(&'static str),
    /// No declaration; the alias table is consulted with the site name.
    ByName,
}

/// A constructor-parameter dependency site.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: &'static str,
    pub target: DepRef,
    /// When true and the site has no declaration and no alias candidate, the
    /// edge is omitted and the default supplies the value.
    pub has_default: bool,
}

/// An attribute dependency site, materialized after all parameter sites.
#[derive(Debug, Clone)]
pub struct AttrSpec {
    pub name: &'static str,
    pub target: DepRef,
}

/// Descriptor of a concrete type's dependency sites.
///
/// Built fluently; the derive macro emits exactly these calls.
///
/// # Examples
///
/// ```rust
/// use wireplan::ClassSpec;
///
/// struct Database;
/// struct Cache;
///
/// let spec = ClassSpec::new("UserService")
///     .param::<Database>("db")
///     .optional_param::<Cache>("cache")
///     .attr::<Database>("audit_db");
///
/// assert_eq!(spec.params().len(), 2);
/// assert_eq!(spec.attrs().len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct ClassSpec {
    name: &'static str,
    params: Vec<ParamSpec>,
    attrs: Vec<AttrSpec>,
}

impl ClassSpec {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            params: Vec::new(),
            attrs: Vec::new(),
        }
    }

    /// Required parameter with a declared type.
    pub fn param<T: ?Sized + 'static>(self, name: &'static str) -> Self {
        self.param_keyed(name, TypeKey::of::<T>())
    }

    /// Parameter declared as `Optional(T)`.
    pub fn optional_param<T: ?Sized + 'static>(self, name: &'static str) -> Self {
        self.param_keyed(name, TypeKey::optional_of::<T>())
    }

    /// Parameter with an explicit key (union, parameterized, collection...).
    pub fn param_keyed(mut self, name: &'static str, key: TypeKey) -> Self {
        self.params.push(ParamSpec {
            name,
            target: DepRef::Key(key),
            has_default: false,
        });
        self
    }

    /// Parameter without a declaration; resolved through the alias table by
    /// site name.
    pub fn param_by_name(mut self, name: &'static str) -> Self {
        self.params.push(ParamSpec {
            name,
            target: DepRef::ByName,
            has_default: false,
        });
        self
    }

    /// Like [`param_by_name`](Self::param_by_name) but with a default value:
    /// if no alias candidate exists the edge is omitted.
    pub fn param_by_name_or_default(mut self, name: &'static str) -> Self {
        self.params.push(ParamSpec {
            name,
            target: DepRef::ByName,
            has_default: true,
        });
        self
    }

    /// Parameter declared through a deferred string reference.
    pub fn param_deferred(mut self, name: &'static str, reference: &'static str) -> Self {
        self.params.push(ParamSpec {
            name,
            target: DepRef::Deferred(reference),
            has_default: false,
        });
        self
    }

    /// Required attribute with a declared type.
    pub fn attr<T: ?Sized + 'static>(self, name: &'static str) -> Self {
        self.attr_keyed(name, TypeKey::of::<T>())
    }

    /// Attribute declared as `Optional(T)`.
    pub fn optional_attr<T: ?Sized + 'static>(self, name: &'static str) -> Self {
        self.attr_keyed(name, TypeKey::optional_of::<T>())
    }

    /// Attribute with an explicit key.
    pub fn attr_keyed(mut self, name: &'static str, key: TypeKey) -> Self {
        self.attrs.push(AttrSpec {
            name,
            target: DepRef::Key(key),
        });
        self
    }

    /// Attribute without a declaration, resolved by name.
    pub fn attr_by_name(mut self, name: &'static str) -> Self {
        self.attrs.push(AttrSpec {
            name,
            target: DepRef::ByName,
        });
        self
    }

    /// Attribute declared through a deferred string reference.
    pub fn attr_deferred(mut self, name: &'static str, reference: &'static str) -> Self {
        self.attrs.push(AttrSpec {
            name,
            target: DepRef::Deferred(reference),
        });
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn attrs(&self) -> &[AttrSpec] {
        &self.attrs
    }
}

/// A type the container can construct from its descriptor.
///
/// `blueprint` lists the dependency sites; `assemble` consumes the resolved
/// values in site order (parameters first, then attributes) and builds the
/// value. Implement by hand or derive with `#[derive(Activatable)]`.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use wireplan::{Activatable, ArgBag, ClassSpec, Result};
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
/// ```
pub trait Activatable: Injectable + Sized {
    fn blueprint() -> ClassSpec;
    fn assemble(bag: &mut ArgBag) -> Result<Self>;
}

/// Resolved dependency values, handed to [`Activatable::assemble`] in site
/// order: parameters in declaration order, then attributes.
///
/// Every accessor performs a checked downcast and consumes one slot.
pub struct ArgBag {
    owner: TypeKey,
    slots: std::vec::IntoIter<Option<Instance>>,
}

impl ArgBag {
    pub(crate) fn new(owner: TypeKey, slots: Vec<Option<Instance>>) -> Self {
        Self {
            owner,
            slots: slots.into_iter(),
        }
    }

    fn take(&mut self, site: &'static str) -> Result<Option<Instance>> {
        self.slots.next().ok_or_else(|| {
            DiError::creation_failed(
                self.owner.clone(),
                format!("descriptor and assembly disagree: no slot left for `{site}`"),
            )
        })
    }

    /// Required sized dependency.
    pub fn required<T: Injectable>(&mut self, site: &'static str) -> Result<Arc<T>> {
        let instance = self.take(site)?.ok_or_else(|| {
            DiError::creation_failed(
                self.owner.clone(),
                format!("dependency site `{site}` was not materialized"),
            )
        })?;
        self.unwrap_sized(site, instance)
    }

    /// Required sized dependency with a by-name-or-default site: when the
    /// edge was omitted, `T::default()` supplies the value.
    pub fn required_or_default<T: Injectable + Default>(
        &mut self,
        site: &'static str,
    ) -> Result<Arc<T>> {
        match self.take(site)? {
            Some(instance) => self.unwrap_sized(site, instance),
            None => Ok(Arc::new(T::default())),
        }
    }

    /// Optional sized dependency.
    pub fn optional<T: Injectable>(&mut self, site: &'static str) -> Result<Option<Arc<T>>> {
        match self.take(site)? {
            None => Ok(None),
            Some(instance) => {
                if instance.clone().downcast::<NoneSentinel>().is_ok() {
                    return Ok(None);
                }
                if let Ok(value) = instance.clone().downcast::<T>() {
                    return Ok(Some(value));
                }
                if let Ok(wrapped) = instance.clone().downcast::<Option<Arc<T>>>() {
                    return Ok((*wrapped).clone());
                }
                Err(self.mismatch::<T>())
            }
        }
    }

    /// Required trait-keyed dependency.
    pub fn required_trait<I: ?Sized + Send + Sync + 'static>(
        &mut self,
        site: &'static str,
    ) -> Result<Arc<I>> {
        let instance = self.take(site)?.ok_or_else(|| {
            DiError::creation_failed(
                self.owner.clone(),
                format!("dependency site `{site}` was not materialized"),
            )
        })?;
        instance
            .downcast::<Arc<I>>()
            .map(|handle| (*handle).clone())
            .map_err(|_| DiError::TypeMismatch {
                key: self.owner.clone(),
                expected: type_name::<I>(),
            })
    }

    /// Optional trait-keyed dependency.
    pub fn optional_trait<I: ?Sized + Send + Sync + 'static>(
        &mut self,
        site: &'static str,
    ) -> Result<Option<Arc<I>>> {
        match self.take(site)? {
            None => Ok(None),
            Some(instance) => {
                if instance.clone().downcast::<NoneSentinel>().is_ok() {
                    return Ok(None);
                }
                if let Ok(handle) = instance.clone().downcast::<Arc<I>>() {
                    return Ok(Some((*handle).clone()));
                }
                if let Ok(wrapped) = instance.clone().downcast::<Option<Arc<I>>>() {
                    return Ok((*wrapped).clone());
                }
                Err(DiError::TypeMismatch {
                    key: self.owner.clone(),
                    expected: type_name::<I>(),
                })
            }
        }
    }

    /// Required raw instance, left type-erased. Useful for union- or
    /// collection-keyed sites where the consumer inspects the value itself.
    pub fn raw(&mut self, site: &'static str) -> Result<Instance> {
        self.take(site)?.ok_or_else(|| {
            DiError::creation_failed(
                self.owner.clone(),
                format!("dependency site `{site}` was not materialized"),
            )
        })
    }

    fn unwrap_sized<T: Injectable>(&self, _site: &'static str, instance: Instance) -> Result<Arc<T>> {
        if let Ok(value) = instance.clone().downcast::<T>() {
            return Ok(value);
        }
        if let Ok(wrapped) = instance.downcast::<Option<Arc<T>>>() {
            return match (*wrapped).clone() {
                Some(value) => Ok(value),
                None => Err(DiError::creation_failed(
                    self.owner.clone(),
                    "required dependency resolved to none",
                )),
            };
        }
        Err(self.mismatch::<T>())
    }

    fn mismatch<T: ?Sized + 'static>(&self) -> DiError {
        DiError::TypeMismatch {
            key: self.owner.clone(),
            expected: type_name::<T>(),
        }
    }
}

// Checked downcast helpers shared by the provider, scope, and activator.

pub(crate) fn downcast_sized<T: Injectable>(key: &TypeKey, instance: Instance) -> Result<Arc<T>> {
    instance
        .downcast::<T>()
        .map_err(|_| DiError::TypeMismatch {
            key: key.clone(),
            expected: type_name::<T>(),
        })
}

pub(crate) fn downcast_shared<I: ?Sized + Send + Sync + 'static>(
    key: &TypeKey,
    instance: Instance,
) -> Result<Arc<I>> {
    instance
        .downcast::<Arc<I>>()
        .map(|handle| (*handle).clone())
        .map_err(|_| DiError::TypeMismatch {
            key: key.clone(),
            expected: type_name::<I>(),
        })
}

pub(crate) fn none_instance() -> Instance {
    Arc::new(NoneSentinel)
}

// =============================================================================
// Builders
// =============================================================================

pub(crate) type AssembleFn = Arc<dyn Fn(&mut ArgBag) -> Result<Instance> + Send + Sync>;

/// Concrete-type builder: descriptor plus erased assembly.
#[derive(Clone)]
pub struct ConcreteSpec {
    type_name: &'static str,
    produces: TypeId,
    protocol: bool,
    blueprint: fn() -> ClassSpec,
    assemble: AssembleFn,
    cached: OnceCell<ClassSpec>,
}

impl ConcreteSpec {
    /// Builder constructing `C` under its own key.
    pub fn of<C: Activatable>() -> Self {
        Self {
            type_name: type_name::<C>(),
            produces: TypeId::of::<C>(),
            protocol: false,
            blueprint: C::blueprint,
            assemble: Arc::new(|bag| Ok(Arc::new(C::assemble(bag)?) as Instance)),
            cached: OnceCell::new(),
        }
    }

    /// Builder constructing `C` behind a trait (protocol) key. The unsizing
    /// coercion is supplied by the caller, which makes the binding a
    /// compile-time check.
    pub fn bound<I, C>(coerce: fn(Arc<C>) -> Arc<I>) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
        C: Activatable,
    {
        Self {
            type_name: type_name::<C>(),
            produces: TypeId::of::<C>(),
            protocol: true,
            blueprint: C::blueprint,
            assemble: Arc::new(move |bag| {
                let built = Arc::new(C::assemble(bag)?);
                Ok(Arc::new(coerce(built)) as Instance)
            }),
            cached: OnceCell::new(),
        }
    }

    /// The descriptor, computed once.
    pub(crate) fn spec(&self) -> &ClassSpec {
        self.cached.get_or_init(self.blueprint)
    }

    pub(crate) fn assemble_fn(&self) -> AssembleFn {
        self.assemble.clone()
    }

    pub(crate) fn produces(&self) -> TypeId {
        self.produces
    }

    pub(crate) fn is_protocol(&self) -> bool {
        self.protocol
    }

    pub(crate) fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl std::fmt::Debug for ConcreteSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcreteSpec")
            .field("type_name", &self.type_name)
            .field("protocol", &self.protocol)
            .finish()
    }
}

pub(crate) type NullaryFn = dyn Fn() -> Result<Instance> + Send + Sync;
pub(crate) type ScopeFn = dyn Fn(&ActivationScope) -> Result<Instance> + Send + Sync;
pub(crate) type ContextFn =
    dyn Fn(&ActivationScope, Option<&TypeKey>) -> Result<Instance> + Send + Sync;

/// The three accepted factory shapes.
#[derive(Clone)]
pub(crate) enum FactoryCall {
    Nullary(Arc<NullaryFn>),
    WithScope(Arc<ScopeFn>),
    WithContext(Arc<ContextFn>),
}

/// A user factory plus the key it produces (the return-type declaration).
///
/// Only three call shapes exist: `() -> T`, `(scope) -> T`, and
/// `(scope, activating-key) -> T`; the enum makes any other shape
/// unrepresentable.
#[derive(Clone)]
pub struct Factory {
    call: FactoryCall,
    produces: Option<TypeKey>,
}

impl Factory {
    /// Zero-argument factory.
    pub fn nullary<T, F>(factory: F) -> Self
    where
        T: Injectable,
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        let call: Arc<NullaryFn> = Arc::new(move || Ok(Arc::new(factory()?) as Instance));
        Self {
            call: FactoryCall::Nullary(call),
            produces: Some(TypeKey::of::<T>()),
        }
    }

    /// Factory receiving the activation scope.
    pub fn with_scope<T, F>(factory: F) -> Self
    where
        T: Injectable,
        F: Fn(&ActivationScope) -> Result<T> + Send + Sync + 'static,
    {
        let call: Arc<ScopeFn> =
            Arc::new(move |scope| Ok(Arc::new(factory(scope)?) as Instance));
        Self {
            call: FactoryCall::WithScope(call),
            produces: Some(TypeKey::of::<T>()),
        }
    }

    /// Factory receiving the scope and the activating parent key.
    pub fn with_context<T, F>(factory: F) -> Self
    where
        T: Injectable,
        F: Fn(&ActivationScope, Option<&TypeKey>) -> Result<T> + Send + Sync + 'static,
    {
        let call: Arc<ContextFn> =
            Arc::new(move |scope, parent| Ok(Arc::new(factory(scope, parent)?) as Instance));
        Self {
            call: FactoryCall::WithContext(call),
            produces: Some(TypeKey::of::<T>()),
        }
    }

    /// Scope factory producing a trait handle.
    pub fn trait_with_scope<I, F>(factory: F) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
        F: Fn(&ActivationScope) -> Result<Arc<I>> + Send + Sync + 'static,
    {
        let call: Arc<ScopeFn> =
            Arc::new(move |scope| Ok(Arc::new(factory(scope)?) as Instance));
        Self {
            call: FactoryCall::WithScope(call),
            produces: Some(TypeKey::of::<I>()),
        }
    }

    /// Fully erased factory with no produced-key hint. Registering one
    /// without an explicit key fails with a missing-type error.
    pub fn erased<F>(factory: F) -> Self
    where
        F: Fn(&ActivationScope) -> Result<Instance> + Send + Sync + 'static,
    {
        let call: Arc<ScopeFn> = Arc::new(factory);
        Self {
            call: FactoryCall::WithScope(call),
            produces: None,
        }
    }

    pub(crate) fn produces(&self) -> Option<&TypeKey> {
        self.produces.as_ref()
    }

    pub(crate) fn call(&self) -> &FactoryCall {
        &self.call
    }
}

impl std::fmt::Debug for Factory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let arity = match &self.call {
            FactoryCall::Nullary(_) => 0,
            FactoryCall::WithScope(_) => 1,
            FactoryCall::WithContext(_) => 2,
        };
        f.debug_struct("Factory")
            .field("arity", &arity)
            .field("produces", &self.produces)
            .finish()
    }
}
