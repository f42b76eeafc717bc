//! Terse element builders for unit and behaviour tests.
//!
//! Every builder stamps elements relative to the Unix epoch so tests can
//! reason about timestamps as small integers.

use chrono::{DateTime, TimeDelta, Utc};
use geo::{Coord, Rect};

use crate::{
    Bound, ChangeAction, ChangeContainer, Entity, EntityContainer, EntityMeta, Node, Relation,
    Way,
};

/// The Unix epoch shifted by `seconds`.
#[must_use]
pub fn epoch_plus(seconds: i64) -> DateTime<Utc> {
    DateTime::<Utc>::default() + TimeDelta::seconds(seconds)
}

/// A bound covering the given rectangle.
#[must_use]
pub fn bound(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> EntityContainer {
    EntityContainer::new(Entity::Bound(Bound::new(
        Rect::new(Coord { x: min_x, y: min_y }, Coord { x: max_x, y: max_y }),
        "test",
    )))
}

/// A node at the origin stamped at the epoch.
#[must_use]
pub fn node(id: i64, version: u32) -> EntityContainer {
    node_at(id, version, 0)
}

/// A node at the origin stamped `seconds` after the epoch.
#[must_use]
pub fn node_at(id: i64, version: u32, seconds: i64) -> EntityContainer {
    EntityContainer::new(Entity::Node(Node {
        meta: EntityMeta::new(id, version, epoch_plus(seconds)),
        location: Coord { x: 0.0, y: 0.0 },
    }))
}

/// A way over `node_refs` stamped at the epoch.
#[must_use]
pub fn way(id: i64, version: u32, node_refs: &[i64]) -> EntityContainer {
    EntityContainer::new(Entity::Way(Way {
        meta: EntityMeta::new(id, version, epoch_plus(0)),
        node_refs: node_refs.to_vec(),
    }))
}

/// A relation without members stamped at the epoch.
#[must_use]
pub fn relation(id: i64, version: u32) -> EntityContainer {
    EntityContainer::new(Entity::Relation(Relation {
        meta: EntityMeta::new(id, version, epoch_plus(0)),
        members: Vec::new(),
    }))
}

/// A change record.
#[must_use]
pub const fn change(action: ChangeAction, entity: EntityContainer) -> ChangeContainer {
    ChangeContainer::new(action, entity)
}
