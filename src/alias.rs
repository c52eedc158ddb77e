//! Name-to-key alias index.
//!
//! The alias table is a fallback index consulted only when a dependency
//! site carries no type declaration (a by-name site) or when a request uses
//! a [`TypeKey::name`](crate::TypeKey::name) key. It never shadows a direct
//! key lookup.
//!
//! Unless the registry runs in strict mode, every registered concrete type
//! with simple name `N` contributes three derived entries: `N`,
//! `lowercase(N)`, and `snake_case(N)`.

use crate::key::TypeKey;
use ahash::RandomState;
use std::collections::HashMap;

/// Secondary index from names to candidate keys.
///
/// A name with more than one distinct candidate is ambiguous and yields
/// nothing; the caller reports the resolution failure.
#[derive(Clone, Default)]
pub(crate) struct AliasTable {
    entries: HashMap<String, Vec<TypeKey>, RandomState>,
}

impl AliasTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record `name -> key`. Duplicate pairs collapse; a second distinct key
    /// under the same name makes the name ambiguous.
    pub(crate) fn insert(&mut self, name: impl Into<String>, key: TypeKey) {
        let candidates = self.entries.entry(name.into()).or_default();
        if !candidates.contains(&key) {
            candidates.push(key);
        }
    }

    /// Derive the automatic entries for a registered concrete type.
    pub(crate) fn derive_for(&mut self, simple_name: &str, key: &TypeKey) {
        self.insert(simple_name, key.clone());
        self.insert(simple_name.to_lowercase(), key.clone());
        self.insert(snake_case(simple_name), key.clone());
    }

    /// Look up a site name: exact form first, lowercased second. Returns a
    /// key only when exactly one candidate is recorded.
    pub(crate) fn lookup(&self, name: &str) -> Option<&TypeKey> {
        self.single(name)
            .or_else(|| self.single(&name.to_lowercase()))
    }

    fn single(&self, name: &str) -> Option<&TypeKey> {
        match self.entries.get(name).map(Vec::as_slice) {
            Some([key]) => Some(key),
            _ => None,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Convert a type's simple name to snake_case.
///
/// An underscore goes before an uppercase that follows a lowercase letter or
/// a digit, and before the last uppercase of an uppercase run followed by a
/// lowercase. Digits attach to the preceding word.
pub(crate) fn snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower)
            {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UserService;
    struct Clock;

    #[test]
    fn snake_case_simple() {
        assert_eq!(snake_case("UserService"), "user_service");
        assert_eq!(snake_case("Clock"), "clock");
        assert_eq!(snake_case("already_snake"), "already_snake");
    }

    #[test]
    fn snake_case_uppercase_runs() {
        assert_eq!(snake_case("HTTPServer"), "http_server");
        assert_eq!(snake_case("XMLDB"), "xmldb");
    }

    #[test]
    fn snake_case_digits_attach_to_previous_word() {
        assert_eq!(snake_case("OAuth2Token"), "o_auth2_token");
        assert_eq!(snake_case("Sha256Digest"), "sha256_digest");
    }

    #[test]
    fn derive_produces_three_forms() {
        let mut table = AliasTable::new();
        table.derive_for("UserService", &TypeKey::of::<UserService>());

        for name in ["UserService", "userservice", "user_service"] {
            assert_eq!(table.lookup(name), Some(&TypeKey::of::<UserService>()));
        }
    }

    #[test]
    fn lowercase_fallback() {
        let mut table = AliasTable::new();
        table.derive_for("Clock", &TypeKey::of::<Clock>());
        assert_eq!(table.lookup("CLOCK"), Some(&TypeKey::of::<Clock>()));
    }

    #[test]
    fn ambiguous_names_yield_nothing() {
        let mut table = AliasTable::new();
        table.insert("service", TypeKey::of::<UserService>());
        table.insert("service", TypeKey::of::<Clock>());
        assert_eq!(table.lookup("service"), None);
    }

    #[test]
    fn duplicate_pairs_collapse() {
        let mut table = AliasTable::new();
        table.insert("clock", TypeKey::of::<Clock>());
        table.insert("clock", TypeKey::of::<Clock>());
        assert_eq!(table.lookup("clock"), Some(&TypeKey::of::<Clock>()));
    }
}
