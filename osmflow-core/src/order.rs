//! Total orders over elements and change records.
//!
//! Merge-join stages assume their inputs are strictly ascending under
//! [`EntityOrdering::KindThenId`]. The change orderings decide the sequence in
//! which a change stream can be written to a destination without breaking
//! referential integrity.

use std::cmp::Ordering;

use crate::{ChangeAction, ChangeContainer, Entity, EntityContainer, EntityKind};

/// A total order over stream items.
///
/// Implementations must be consistent: `compare(a, b)` is the reverse of
/// `compare(b, a)` and transitive across calls.
pub trait StreamOrder<T: ?Sized>: Send + Sync {
    /// Compare two items.
    fn compare(&self, lhs: &T, rhs: &T) -> Ordering;
}

/// Orders over plain element streams.
///
/// # Examples
/// ```
/// use std::cmp::Ordering;
/// use chrono::{TimeZone, Utc};
/// use geo::Coord;
/// use osmflow_core::{Entity, EntityMeta, EntityOrdering, Node, StreamOrder, Way};
///
/// let at = Utc.timestamp_opt(0, 0).unwrap();
/// let node = Entity::Node(Node { meta: EntityMeta::new(50, 1, at), location: Coord { x: 0.0, y: 0.0 } });
/// let way = Entity::Way(Way { meta: EntityMeta::new(1, 1, at), node_refs: vec![50] });
///
/// // Kind rank dominates the identifier.
/// assert_eq!(EntityOrdering::KindThenId.compare(&node, &way), Ordering::Less);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EntityOrdering {
    /// Kind rank, then identifier. The canonical stream order.
    #[default]
    KindThenId,
    /// Kind rank, identifier, then version; orders full revision histories.
    KindThenIdThenVersion,
    /// Version only; orders the revisions of a single element.
    Version,
}

impl EntityOrdering {
    /// Compare two elements.
    #[must_use]
    pub fn compare_entities(self, lhs: &Entity, rhs: &Entity) -> Ordering {
        match self {
            Self::KindThenId => kind_then_id(lhs, rhs),
            Self::KindThenIdThenVersion => {
                kind_then_id(lhs, rhs).then_with(|| lhs.version().cmp(&rhs.version()))
            }
            Self::Version => lhs.version().cmp(&rhs.version()),
        }
    }
}

fn kind_then_id(lhs: &Entity, rhs: &Entity) -> Ordering {
    lhs.kind()
        .rank()
        .cmp(&rhs.kind().rank())
        .then_with(|| lhs.id().cmp(&rhs.id()))
}

impl StreamOrder<Entity> for EntityOrdering {
    fn compare(&self, lhs: &Entity, rhs: &Entity) -> Ordering {
        self.compare_entities(lhs, rhs)
    }
}

impl StreamOrder<EntityContainer> for EntityOrdering {
    fn compare(&self, lhs: &EntityContainer, rhs: &EntityContainer) -> Ordering {
        self.compare_entities(lhs.entity(), rhs.entity())
    }
}

/// Orders over change streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeOrdering {
    /// Order by the wrapped element only, ignoring the action.
    ///
    /// Safe only for append-only destinations such as a linear dump, where
    /// interleaving creates, modifies and deletes cannot corrupt anything.
    AsEntity(EntityOrdering),
    /// Order by [`change_weight`], then identifier, then version.
    ///
    /// Creates precede modifies precede deletes; referenced elements are
    /// created before their referrers and deleted after them. Required for
    /// random-access destinations such as a database.
    Weighted,
}

impl ChangeOrdering {
    /// The append-only ordering used to feed merge-join stages.
    pub const STREAMABLE: Self = Self::AsEntity(EntityOrdering::KindThenId);

    /// Compare two change records.
    #[must_use]
    pub fn compare_changes(self, lhs: &ChangeContainer, rhs: &ChangeContainer) -> Ordering {
        match self {
            Self::AsEntity(ordering) => {
                ordering.compare_entities(lhs.entity().entity(), rhs.entity().entity())
            }
            Self::Weighted => change_weight(lhs.kind(), lhs.action())
                .cmp(&change_weight(rhs.kind(), rhs.action()))
                .then_with(|| lhs.entity().id().cmp(&rhs.entity().id()))
                .then_with(|| lhs.entity().version().cmp(&rhs.entity().version())),
        }
    }
}

impl Default for ChangeOrdering {
    fn default() -> Self {
        Self::STREAMABLE
    }
}

impl StreamOrder<ChangeContainer> for ChangeOrdering {
    fn compare(&self, lhs: &ChangeContainer, rhs: &ChangeContainer) -> Ordering {
        self.compare_changes(lhs, rhs)
    }
}

/// Position of a (kind, action) pair in the change application sequence.
///
/// | Kind     | Create | Modify | Delete |
/// |----------|--------|--------|--------|
/// | Bound    | 1      | 8      | 12     |
/// | Node     | 2      | 7      | 11     |
/// | Way      | 3      | 6      | 10     |
/// | Relation | 4      | 5      | 9      |
///
/// The match is exhaustive, so every pair has a weight.
///
/// # Examples
/// ```
/// use osmflow_core::{ChangeAction, EntityKind, change_weight};
///
/// assert_eq!(change_weight(EntityKind::Node, ChangeAction::Create), 2);
/// assert_eq!(change_weight(EntityKind::Bound, ChangeAction::Delete), 12);
/// ```
#[must_use]
pub const fn change_weight(kind: EntityKind, action: ChangeAction) -> u8 {
    match (kind, action) {
        (EntityKind::Bound, ChangeAction::Create) => 1,
        (EntityKind::Node, ChangeAction::Create) => 2,
        (EntityKind::Way, ChangeAction::Create) => 3,
        (EntityKind::Relation, ChangeAction::Create) => 4,
        (EntityKind::Relation, ChangeAction::Modify) => 5,
        (EntityKind::Way, ChangeAction::Modify) => 6,
        (EntityKind::Node, ChangeAction::Modify) => 7,
        (EntityKind::Bound, ChangeAction::Modify) => 8,
        (EntityKind::Relation, ChangeAction::Delete) => 9,
        (EntityKind::Way, ChangeAction::Delete) => 10,
        (EntityKind::Node, ChangeAction::Delete) => 11,
        (EntityKind::Bound, ChangeAction::Delete) => 12,
    }
}
