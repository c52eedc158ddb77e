//! Error types for registration, planning, and activation.

use crate::key::TypeKey;
use thiserror::Error;

/// Errors surfaced by the container.
///
/// All structural problems (missing registrations, unresolvable parameters,
/// cycles, bad deferred references) are detected while the plan for a root
/// key is compiled, before any construction happens. Only factory failures
/// can occur mid-activation, and those propagate as-is.
#[derive(Error, Debug)]
pub enum DiError {
    /// A requested key (root or transitive) has no registration, no viable
    /// alias, and is not an optional of an unregistered type.
    #[error("cannot resolve type {}{}", .key, required_by(.chain))]
    CannotResolveType { key: TypeKey, chain: Vec<TypeKey> },

    /// A dependency site of a planned type could not be satisfied: no
    /// resolvable declaration, no alias candidate, no default.
    #[error("cannot resolve parameter `{}` of {}{}", .parameter, .owner, required_by(.chain))]
    CannotResolveParameter {
        owner: TypeKey,
        parameter: &'static str,
        chain: Vec<TypeKey>,
    },

    /// The planner revisited a key already on its stack.
    #[error("circular dependency detected: {}", join_chain(.chain))]
    CircularDependency { chain: Vec<TypeKey> },

    /// A factory was registered without an explicit key and without a
    /// produced-key hint.
    #[error("factory registered without an explicit key or a return-type hint")]
    MissingType,

    /// A deferred (string) type reference could not be resolved at planning
    /// time against the registration's locals or the registered names.
    #[error("unresolved deferred reference `{reference}` in {owner}")]
    FactoryMissingContext {
        owner: TypeKey,
        reference: &'static str,
    },

    /// A registration collided with an existing one and no override was
    /// requested, or a provider `set` targeted an existing key.
    #[error("service already registered under {key}")]
    OverridingService { key: TypeKey },

    /// A concrete builder was registered under a key it cannot produce.
    #[error("registration mismatch: {implementation} cannot be registered under {key}")]
    Mismatch {
        key: TypeKey,
        implementation: &'static str,
    },

    /// A user factory or an assembly step failed; the cause is preserved
    /// verbatim.
    #[error("failed to build {key}: {reason}")]
    CreationFailed { key: TypeKey, reason: String },

    /// A resolved instance did not have the type the caller asked for.
    #[error("type mismatch for {key}: expected {expected}")]
    TypeMismatch {
        key: TypeKey,
        expected: &'static str,
    },
}

impl DiError {
    /// Shorthand for a [`DiError::CreationFailed`] raised from inside a
    /// factory or assembly step.
    pub fn creation_failed(key: TypeKey, reason: impl std::fmt::Display) -> Self {
        DiError::CreationFailed {
            key,
            reason: reason.to_string(),
        }
    }
}

fn join_chain(chain: &[TypeKey]) -> String {
    chain
        .iter()
        .map(|key| key.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn required_by(chain: &[TypeKey]) -> String {
    if chain.is_empty() {
        String::new()
    } else {
        format!(" (required by {})", join_chain(chain))
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DiError>;

#[cfg(test)]
mod tests {
    use super::*;

    struct Chicken;
    struct Egg;

    #[test]
    fn circular_message_carries_full_chain() {
        let err = DiError::CircularDependency {
            chain: vec![
                TypeKey::of::<Chicken>(),
                TypeKey::of::<Egg>(),
                TypeKey::of::<Chicken>(),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("Chicken"));
        assert!(msg.contains("Egg"));
        assert!(msg.contains(" -> "));
    }

    #[test]
    fn not_found_names_the_key_and_requirer() {
        let err = DiError::CannotResolveType {
            key: TypeKey::of::<Egg>(),
            chain: vec![TypeKey::of::<Chicken>()],
        };
        let msg = err.to_string();
        assert!(msg.contains("Egg"));
        assert!(msg.contains("required by"));
        assert!(msg.contains("Chicken"));
    }

    #[test]
    fn parameter_error_names_site_and_owner() {
        let err = DiError::CannotResolveParameter {
            owner: TypeKey::of::<Chicken>(),
            parameter: "shell",
            chain: vec![],
        };
        let msg = err.to_string();
        assert!(msg.contains("`shell`"));
        assert!(msg.contains("Chicken"));
        assert!(!msg.contains("required by"));
    }
}
