//! Change records: an element plus what to do with it.

use crate::{ChangeAction, EntityContainer, EntityIdentity, EntityKind};

/// An element tagged with a [`ChangeAction`].
///
/// For [`ChangeAction::Delete`] the element is the last known revision of the
/// removed element; only its identity is significant.
///
/// # Examples
/// ```
/// use chrono::{TimeZone, Utc};
/// use geo::Coord;
/// use osmflow_core::{ChangeAction, ChangeContainer, Entity, EntityContainer, EntityMeta, Node};
///
/// let node = EntityContainer::new(Entity::Node(Node {
///     meta: EntityMeta::new(2, 2, Utc.timestamp_opt(60, 0).unwrap()),
///     location: Coord { x: 0.0, y: 0.0 },
/// }));
/// let change = ChangeContainer::new(ChangeAction::Modify, node);
///
/// assert_eq!(change.action(), ChangeAction::Modify);
/// assert_eq!(change.entity().version(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChangeContainer {
    action: ChangeAction,
    entity: EntityContainer,
}

impl ChangeContainer {
    /// Pair an element with an action.
    #[must_use]
    pub const fn new(action: ChangeAction, entity: EntityContainer) -> Self {
        Self { action, entity }
    }

    /// The action to apply.
    #[must_use]
    pub const fn action(&self) -> ChangeAction {
        self.action
    }

    /// The element the action applies to.
    #[must_use]
    pub const fn entity(&self) -> &EntityContainer {
        &self.entity
    }

    /// Kind of the wrapped element.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.entity.kind()
    }

    /// Identity of the wrapped element.
    #[must_use]
    pub fn identity(&self) -> EntityIdentity {
        self.entity.identity()
    }

    /// Split into action and element.
    #[must_use]
    pub fn into_parts(self) -> (ChangeAction, EntityContainer) {
        (self.action, self.entity)
    }
}
