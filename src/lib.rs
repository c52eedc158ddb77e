//! # wireplan - Plan-Compiling Dependency Injection for Rust
//!
//! A non-intrusive dependency-injection container: a registry and resolver
//! that, given a type key, constructs a fully-wired object graph by
//! recursively satisfying the declared dependencies of registered types.
//!
//! ## Features
//!
//! - **Non-intrusive** - resolved types carry no framework base type; wiring
//!   comes from a small compile-time descriptor (`Activatable`, derivable)
//! - **Compiled plans** - the dependency graph of a root key is analyzed
//!   once; missing registrations, unresolvable parameters, and cycles all
//!   surface before anything is constructed
//! - **Three lifetimes** - `Transient`, `Scoped`, and `Singleton`, with
//!   per-provider and per-scope caches
//! - **Rich keys** - concrete types, trait objects, parameterized generics,
//!   union/optional keys, name aliases, and collection shapes
//! - **Frozen providers** - registries stay mutable; providers are cheap,
//!   thread-shareable snapshots with an additive `set` escape hatch
//! - **Observable** - optional `tracing` integration with JSON or pretty
//!   output
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use wireplan::{Activatable, ArgBag, ClassSpec, Registry, Result};
//!
//! struct Database {
//!     url: String,
//! }
//!
//! impl Activatable for Database {
//!     fn blueprint() -> ClassSpec {
//!         ClassSpec::new("Database")
//!     }
//!     fn assemble(_bag: &mut ArgBag) -> Result<Self> {
//!         Ok(Database { url: "postgres://localhost".into() })
//!     }
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! impl Activatable for UserService {
//!     fn blueprint() -> ClassSpec {
//!         ClassSpec::new("UserService").param::<Database>("db")
//!     }
//!     fn assemble(bag: &mut ArgBag) -> Result<Self> {
//!         Ok(UserService { db: bag.required::<Database>("db")? })
//!     }
//! }
//!
//! let mut registry = Registry::new();
//! registry.add_singleton::<Database>()?;
//! registry.add_transient::<UserService>()?;
//!
//! let provider = registry.build_provider();
//! let users = provider.get::<UserService>()?;
//! assert_eq!(users.db.url, "postgres://localhost");
//! # Ok::<(), wireplan::DiError>(())
//! ```
//!
//! ## Service Lifetimes
//!
//! ```rust
//! use wireplan::{Activatable, ArgBag, ClassSpec, Registry, Result};
//! # struct Config; impl Activatable for Config {
//! #     fn blueprint() -> ClassSpec { ClassSpec::new("Config") }
//! #     fn assemble(_b: &mut ArgBag) -> Result<Self> { Ok(Config) }
//! # }
//! # struct Request; impl Activatable for Request {
//! #     fn blueprint() -> ClassSpec { ClassSpec::new("Request") }
//! #     fn assemble(_b: &mut ArgBag) -> Result<Self> { Ok(Request) }
//! # }
//! # struct Audit; impl Activatable for Audit {
//! #     fn blueprint() -> ClassSpec { ClassSpec::new("Audit") }
//! #     fn assemble(_b: &mut ArgBag) -> Result<Self> { Ok(Audit) }
//! # }
//!
//! let mut registry = Registry::new();
//!
//! // Singleton - one instance per provider
//! registry.add_singleton::<Config>()?;
//!
//! // Scoped - one instance per activation scope
//! registry.add_scoped::<Request>()?;
//!
//! // Transient - fresh instance on every resolve
//! registry.add_transient::<Audit>()?;
//! # Ok::<(), wireplan::DiError>(())
//! ```
//!
//! ## Scopes
//!
//! ```rust
//! # use std::sync::Arc;
//! # use wireplan::{Activatable, ArgBag, ClassSpec, Registry, Result};
//! # struct Connection; impl Activatable for Connection {
//! #     fn blueprint() -> ClassSpec { ClassSpec::new("Connection") }
//! #     fn assemble(_b: &mut ArgBag) -> Result<Self> { Ok(Connection) }
//! # }
//! let mut registry = Registry::new();
//! registry.add_scoped::<Connection>()?;
//! let provider = registry.build_provider();
//!
//! let scope = provider.create_scope();
//! let a = scope.get::<Connection>()?;
//! let b = scope.get::<Connection>()?;
//! assert!(Arc::ptr_eq(&a, &b)); // shared within the scope
//! drop(scope); // scoped instances released here
//! # Ok::<(), wireplan::DiError>(())
//! ```

mod activator;
mod alias;
mod descriptor;
mod error;
mod key;
mod lifetime;
#[cfg(feature = "logging")]
pub mod logging;
mod planner;
mod provider;
mod registry;
mod scope;

pub use descriptor::{
    Activatable, ArgBag, AttrSpec, ClassSpec, ConcreteSpec, DepRef, Factory, Injectable, Instance,
    ParamSpec,
};
pub use error::{DiError, Result};
pub use key::{CollectionKind, TypeKey};
pub use lifetime::Lifetime;
pub use provider::Provider;
pub use registry::{Builder, Registration, Registry, RegistryOptions};
pub use scope::{ActivationScope, ScopeKind};

/// Derive `Activatable` from `#[dep]`-annotated fields.
#[cfg(feature = "derive")]
pub use wireplan_derive::Activatable;

// Re-export tracing macros for convenience when logging is enabled
#[cfg(feature = "logging")]
pub use tracing::{debug, error, info, trace, warn};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        Activatable, ActivationScope, ArgBag, Builder, ClassSpec, DiError, Factory, Injectable,
        Lifetime, Provider, Registration, Registry, RegistryOptions, Result, ScopeKind, TypeKey,
    };
    pub use std::sync::Arc;
}
