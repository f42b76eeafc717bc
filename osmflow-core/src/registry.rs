//! Named orderings available to pipeline configuration.
//!
//! The registry is an ordinary value: build one (usually with
//! [`OrderingRegistry::standard`]), optionally register more names, and hand
//! it to whatever resolves orderings from configuration.

use std::collections::BTreeMap;

use crate::{ChangeOrdering, EntityOrdering};

/// Name of [`EntityOrdering::KindThenId`] in the standard registry.
pub const KIND_THEN_ID: &str = "kind-then-id";
/// Name of [`EntityOrdering::KindThenIdThenVersion`] in the standard registry.
pub const KIND_THEN_ID_THEN_VERSION: &str = "kind-then-id-then-version";
/// Name of [`EntityOrdering::Version`] in the standard registry.
pub const VERSION: &str = "version";
/// Name of [`ChangeOrdering::STREAMABLE`] in the standard registry.
pub const STREAMABLE: &str = "streamable";
/// Name of [`ChangeOrdering::Weighted`] in the standard registry.
pub const SEEKABLE: &str = "seekable";

/// Lookup table from configuration names to orderings.
///
/// # Examples
/// ```
/// use osmflow_core::{ChangeOrdering, EntityOrdering, OrderingRegistry};
///
/// let mut registry = OrderingRegistry::standard();
/// registry.register_entity("history", EntityOrdering::KindThenIdThenVersion);
///
/// assert_eq!(registry.entity("kind-then-id"), Some(EntityOrdering::KindThenId));
/// assert_eq!(registry.entity("history"), Some(EntityOrdering::KindThenIdThenVersion));
/// assert_eq!(registry.change("seekable"), Some(ChangeOrdering::Weighted));
/// assert_eq!(registry.entity("unknown"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderingRegistry {
    entity: BTreeMap<String, EntityOrdering>,
    change: BTreeMap<String, ChangeOrdering>,
}

impl OrderingRegistry {
    /// A registry without any names.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry holding the built-in orderings under their standard names.
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register_entity(KIND_THEN_ID, EntityOrdering::KindThenId);
        registry.register_entity(
            KIND_THEN_ID_THEN_VERSION,
            EntityOrdering::KindThenIdThenVersion,
        );
        registry.register_entity(VERSION, EntityOrdering::Version);
        registry.register_change(STREAMABLE, ChangeOrdering::STREAMABLE);
        registry.register_change(SEEKABLE, ChangeOrdering::Weighted);
        registry
    }

    /// Register (or replace) an element ordering name.
    pub fn register_entity(&mut self, name: impl Into<String>, ordering: EntityOrdering) {
        self.entity.insert(name.into(), ordering);
    }

    /// Register (or replace) a change ordering name.
    pub fn register_change(&mut self, name: impl Into<String>, ordering: ChangeOrdering) {
        self.change.insert(name.into(), ordering);
    }

    /// Resolve an element ordering name.
    #[must_use]
    pub fn entity(&self, name: &str) -> Option<EntityOrdering> {
        self.entity.get(name).copied()
    }

    /// Resolve a change ordering name.
    #[must_use]
    pub fn change(&self, name: &str) -> Option<ChangeOrdering> {
        self.change.get(name).copied()
    }

    /// Registered element ordering names, sorted.
    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entity.keys().map(String::as_str)
    }

    /// Registered change ordering names, sorted.
    pub fn change_names(&self) -> impl Iterator<Item = &str> {
        self.change.keys().map(String::as_str)
    }
}
