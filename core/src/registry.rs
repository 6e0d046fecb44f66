//! Do-not-merge registry.
//!
//! Names registered here are exempt from normalization: both the canonical
//! and the comparable form of an exempt name is the name itself, so records
//! carrying it never fold into another record by fuzzy match.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, error};

use crate::names::{make_canonical_name, make_comparable_name};

/// The same name was registered with two different targets.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "do-not-merge name \"{name}\" registered as \"{existing_target}\" by {existing_owner} and as \"{target}\" by {owner}"
)]
pub struct DoNotMergeConflict {
    pub name: String,
    pub existing_target: String,
    pub existing_owner: String,
    pub target: String,
    pub owner: String,
}

#[derive(Debug, Clone)]
struct Exemption {
    target: String,
    owner: String,
}

/// Mapping from exempt name to its preserved form.
///
/// # Examples
///
/// ```
/// use catalog_merge_core::DoNotMergeRegistry;
///
/// let mut registry = DoNotMergeRegistry::default();
/// registry.register("merge-control", "IBM Cloud Foo", "IBM Cloud Foo").unwrap();
///
/// assert!(registry.is_exempt("IBM Cloud Foo"));
/// assert_eq!(registry.make_comparable_name("IBM Cloud Foo"), "IBM Cloud Foo");
/// assert_eq!(registry.make_comparable_name("IBM Cloud Bar"), "bar");
/// ```
#[derive(Debug, Clone, Default)]
pub struct DoNotMergeRegistry {
    exemptions: HashMap<String, Exemption>,
}

impl DoNotMergeRegistry {
    /// Registers `name` as exempt, preserved as `target`.
    ///
    /// Registering the same name and target again is a no-op, whoever the
    /// owner is.
    ///
    /// # Errors
    ///
    /// Returns [`DoNotMergeConflict`] if `name` is already registered with a
    /// different target. The existing registration is kept.
    pub fn register(
        &mut self,
        owner: &str,
        name: &str,
        target: &str,
    ) -> Result<(), DoNotMergeConflict> {
        match self.exemptions.get(name) {
            Some(existing) if existing.target == target => Ok(()),
            Some(existing) => Err(DoNotMergeConflict {
                name: name.to_string(),
                existing_target: existing.target.clone(),
                existing_owner: existing.owner.clone(),
                target: target.to_string(),
                owner: owner.to_string(),
            }),
            None => {
                debug!(owner, name, "registered do-not-merge name");
                self.exemptions.insert(
                    name.to_string(),
                    Exemption {
                        target: target.to_string(),
                        owner: owner.to_string(),
                    },
                );
                Ok(())
            }
        }
    }

    /// Registers each name as exempt with itself as the target.
    ///
    /// Conflicts are logged and returned; registration continues past them.
    pub fn register_names<'a>(
        &mut self,
        owner: &str,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Vec<DoNotMergeConflict> {
        let mut conflicts = Vec::new();
        for name in names {
            if let Err(conflict) = self.register(owner, name, name) {
                error!(%conflict, "do-not-merge registration conflict");
                conflicts.push(conflict);
            }
        }
        conflicts
    }

    pub fn is_exempt(&self, name: &str) -> bool {
        self.exemptions.contains_key(name)
    }

    /// Returns the preserved form of an exempt name.
    pub fn target(&self, name: &str) -> Option<&str> {
        self.exemptions.get(name).map(|e| e.target.as_str())
    }

    /// Canonical form of `raw`, or `raw` itself when it is exempt.
    pub fn make_canonical_name(&self, raw: &str) -> String {
        match self.target(raw) {
            Some(target) => target.to_string(),
            None => make_canonical_name(raw),
        }
    }

    /// Comparable form of `raw`, or `raw` itself when it is exempt.
    pub fn make_comparable_name(&self, raw: &str) -> String {
        match self.target(raw) {
            Some(target) => target.to_string(),
            None => make_comparable_name(raw),
        }
    }

    /// Exempt names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.exemptions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.exemptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exemptions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_idempotent() {
        let mut registry = DoNotMergeRegistry::default();
        registry.register("a", "foo", "foo").unwrap();
        registry.register("b", "foo", "foo").unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.is_exempt("foo"));
        assert!(!registry.is_exempt("Foo"));
    }

    #[test]
    fn test_register_conflict_keeps_first_target() {
        let mut registry = DoNotMergeRegistry::default();
        registry.register("a", "foo", "foo").unwrap();
        let conflict = registry.register("b", "foo", "bar").unwrap_err();

        assert_eq!(conflict.existing_owner, "a");
        assert_eq!(conflict.owner, "b");
        assert_eq!(registry.target("foo"), Some("foo"));
    }

    #[test]
    fn test_register_names_collects_conflicts() {
        let mut registry = DoNotMergeRegistry::default();
        registry.register("a", "foo", "other").unwrap();
        let conflicts = registry.register_names("b", ["foo", "bar"]);

        assert_eq!(conflicts.len(), 1);
        assert!(registry.is_exempt("bar"));
        assert_eq!(registry.names(), vec!["bar", "foo"]);
    }

    #[test]
    fn test_exempt_names_bypass_normalization() {
        let mut registry = DoNotMergeRegistry::default();
        registry.register_names("a", ["IBM Foo Service"]);

        assert_eq!(registry.make_canonical_name("IBM Foo Service"), "IBM Foo Service");
        assert_eq!(registry.make_comparable_name("IBM Foo Service"), "IBM Foo Service");
        assert_eq!(registry.make_canonical_name("IBM Bar"), "ibm-bar");
        assert_eq!(registry.make_comparable_name("IBM Bar"), "bar");
    }
}
