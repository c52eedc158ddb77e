//! Service identity keys.
//!
//! A [`TypeKey`] is the identity under which a service is registered and
//! looked up. Beyond plain concrete types it supports parameterized generic
//! forms, union keys (with `Optional` as sugar), string-name aliases,
//! collection shapes, and free type-variable placeholders.
//!
//! Keys are structural values: two keys are equal iff they were built from
//! the same pieces. A request for `Concrete(T)` never matches a registration
//! under `Optional(T)`, `Union({T, U})`, or `Parameterized(T, ...)` — those
//! are deliberately distinct contracts.

use std::any::{type_name, TypeId};
use std::fmt;

/// Recognized container shapes for collection keys.
///
/// A collection key is satisfied as a whole (typically by a factory
/// returning the collection value); the planner never assembles a collection
/// out of element registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CollectionKind {
    /// Ordered sequence (`Vec`-like).
    Sequence,
    /// Unordered unique elements.
    Set,
    /// Key-value mapping.
    Mapping,
    /// Anything iterable.
    Iterable,
    /// Fixed-arity tuple.
    Tuple,
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CollectionKind::Sequence => "Sequence",
            CollectionKind::Set => "Set",
            CollectionKind::Mapping => "Mapping",
            CollectionKind::Iterable => "Iterable",
            CollectionKind::Tuple => "Tuple",
        };
        f.write_str(name)
    }
}

/// Private sentinel standing in for "no value" inside optional keys.
///
/// `Optional(T)` is `Union({T, none-sentinel})`; the sentinel only ever
/// equals itself, so an optional key never collides with a plain union.
pub(crate) struct NoneSentinel;

/// Identity of a registered or requested service.
///
/// Built through constructor methods so canonical forms (sorted union
/// members, the optional sentinel) are enforced; the representation stays
/// private.
///
/// # Examples
///
/// ```rust
/// use wireplan::TypeKey;
///
/// struct Database;
///
/// let plain = TypeKey::of::<Database>();
/// let optional = TypeKey::optional_of::<Database>();
///
/// assert!(optional.is_optional());
/// assert_ne!(plain, optional);
/// assert_eq!(optional.optional_inner(), Some(&plain));
/// ```
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeKey {
    repr: Repr,
}

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Repr {
    Concrete {
        id: TypeId,
        name: &'static str,
    },
    Parameterized {
        id: TypeId,
        name: &'static str,
        args: Vec<TypeKey>,
    },
    /// Canonical: sorted and deduplicated, so derived equality is set equality.
    Union(Vec<TypeKey>),
    Name(String),
    Collection {
        kind: CollectionKind,
        element: Box<TypeKey>,
    },
    Var(&'static str),
}

impl TypeKey {
    /// Key for a concrete type. `T` may be unsized, so `dyn Trait` keys use
    /// the same constructor.
    ///
    /// ```rust
    /// use wireplan::TypeKey;
    ///
    /// trait Logger: Send + Sync {}
    ///
    /// let by_type = TypeKey::of::<String>();
    /// let by_trait = TypeKey::of::<dyn Logger>();
    /// assert_ne!(by_type, by_trait);
    /// ```
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            repr: Repr::Concrete {
                id: TypeId::of::<T>(),
                name: type_name::<T>(),
            },
        }
    }

    /// Parameterized generic key: an erased base plus an argument tuple.
    ///
    /// Two parameterized keys are equal iff their base and all arguments are
    /// pairwise equal. The base registered for such a key is the erased
    /// concrete type; argument substitution is never attempted during lookup.
    ///
    /// ```rust
    /// use wireplan::TypeKey;
    ///
    /// struct Repo;
    /// struct Product;
    /// struct Customer;
    ///
    /// let products = TypeKey::parameterized::<Repo>([TypeKey::of::<Product>()]);
    /// let customers = TypeKey::parameterized::<Repo>([TypeKey::of::<Customer>()]);
    /// assert_ne!(products, customers);
    /// assert_ne!(products, TypeKey::of::<Repo>());
    /// ```
    pub fn parameterized<B: ?Sized + 'static>(args: impl IntoIterator<Item = TypeKey>) -> Self {
        Self {
            repr: Repr::Parameterized {
                id: TypeId::of::<B>(),
                name: type_name::<B>(),
                args: args.into_iter().collect(),
            },
        }
    }

    /// Union key over an unordered member set.
    ///
    /// Member order carries no meaning; duplicates collapse.
    ///
    /// ```rust
    /// use wireplan::TypeKey;
    ///
    /// let ab = TypeKey::union([TypeKey::of::<u32>(), TypeKey::of::<String>()]);
    /// let ba = TypeKey::union([TypeKey::of::<String>(), TypeKey::of::<u32>()]);
    /// assert_eq!(ab, ba);
    /// assert_ne!(ab, TypeKey::of::<u32>());
    /// ```
    pub fn union(members: impl IntoIterator<Item = TypeKey>) -> Self {
        let mut members: Vec<TypeKey> = members.into_iter().collect();
        members.sort();
        members.dedup();
        Self {
            repr: Repr::Union(members),
        }
    }

    /// `Optional(inner)`: sugar for `Union({inner, none-sentinel})`.
    pub fn optional(inner: TypeKey) -> Self {
        Self::union([inner, Self::nothing()])
    }

    /// `Optional(T)` for a concrete type.
    #[inline]
    pub fn optional_of<T: ?Sized + 'static>() -> Self {
        Self::optional(Self::of::<T>())
    }

    /// String alias key, matched only through the alias table.
    #[inline]
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            repr: Repr::Name(name.into()),
        }
    }

    /// Collection key for a container shape over an element key.
    pub fn collection(kind: CollectionKind, element: TypeKey) -> Self {
        Self {
            repr: Repr::Collection {
                kind,
                element: Box::new(element),
            },
        }
    }

    /// Free type-variable placeholder. Equal only to an identical
    /// placeholder, never to a concrete substitution.
    #[inline]
    pub fn var(name: &'static str) -> Self {
        Self {
            repr: Repr::Var(name),
        }
    }

    /// The none-sentinel member of optional keys.
    #[inline]
    pub fn nothing() -> Self {
        Self {
            repr: Repr::Concrete {
                id: TypeId::of::<NoneSentinel>(),
                name: "None",
            },
        }
    }

    /// `TypeId` of a concrete key (including trait-object keys).
    pub(crate) fn concrete_id(&self) -> Option<TypeId> {
        match &self.repr {
            Repr::Concrete { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// Erased-base `TypeId` of a parameterized key.
    pub(crate) fn parameterized_base(&self) -> Option<TypeId> {
        match &self.repr {
            Repr::Parameterized { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// The alias name of a `Name` key.
    pub fn as_name(&self) -> Option<&str> {
        match &self.repr {
            Repr::Name(name) => Some(name),
            _ => None,
        }
    }

    /// Whether this is `Optional(T)`: a two-member union containing the
    /// none-sentinel.
    pub fn is_optional(&self) -> bool {
        self.optional_inner().is_some()
    }

    /// The `T` of an `Optional(T)` key.
    pub fn optional_inner(&self) -> Option<&TypeKey> {
        match &self.repr {
            Repr::Union(members) if members.len() == 2 => {
                let nothing = Self::nothing();
                match (&members[0] == &nothing, &members[1] == &nothing) {
                    (true, false) => Some(&members[1]),
                    (false, true) => Some(&members[0]),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Union members, if this is a union key.
    pub fn union_members(&self) -> Option<&[TypeKey]> {
        match &self.repr {
            Repr::Union(members) => Some(members),
            _ => None,
        }
    }

    /// Whether this key can carry auto-derived aliases (plain concretes only).
    pub(crate) fn is_concrete(&self) -> bool {
        matches!(&self.repr, Repr::Concrete { .. })
    }

    /// Path- and generics-stripped name, used for alias derivation and
    /// deferred-reference lookup. `my_app::services::UserService` becomes
    /// `UserService`.
    pub fn simple_name(&self) -> Option<&str> {
        let full = match &self.repr {
            Repr::Concrete { name, .. } | Repr::Parameterized { name, .. } => *name,
            _ => return None,
        };
        let full = full.split('<').next().unwrap_or(full);
        let full = full.rsplit("::").next().unwrap_or(full);
        Some(full.trim_start_matches("dyn "))
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::Concrete { name, .. } => f.write_str(name),
            Repr::Parameterized { name, args, .. } => {
                write!(f, "{name}<")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ">")
            }
            Repr::Union(members) => {
                if let Some(inner) = self.optional_inner() {
                    return write!(f, "Optional<{inner}>");
                }
                write!(f, "Union<")?;
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{member}")?;
                }
                write!(f, ">")
            }
            Repr::Name(name) => write!(f, "@{name}"),
            Repr::Collection { kind, element } => write!(f, "{kind}<{element}>"),
            Repr::Var(name) => write!(f, "${name}"),
        }
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({self})")
    }
}
