//! Immutable element snapshots.
//!
//! [`Entity`] is a sum type over the four element kinds. Stages receive it
//! wrapped in an [`EntityContainer`], a shared handle that never exposes
//! mutable access, so a container handed downstream stays exactly as it was
//! when it left the producer.

use std::{collections::BTreeMap, fmt, sync::Arc};

use chrono::{DateTime, Utc};
use geo::{Coord, Rect};

use crate::EntityKind;

/// OpenStreetMap-style free-form key/value tags.
pub type Tags = BTreeMap<String, String>;

/// Attributes shared by nodes, ways and relations.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntityMeta {
    /// Element identifier, unique within its kind.
    pub id: i64,
    /// Revision number of the element.
    pub version: u32,
    /// When this revision was created.
    pub timestamp: DateTime<Utc>,
    /// Descriptive tags.
    #[cfg_attr(feature = "serde", serde(default))]
    pub tags: Tags,
}

impl EntityMeta {
    /// Construct metadata without tags.
    ///
    /// # Examples
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use osmflow_core::EntityMeta;
    ///
    /// let meta = EntityMeta::new(7, 2, Utc.timestamp_opt(0, 0).unwrap());
    /// assert_eq!(meta.id, 7);
    /// assert!(meta.tags.is_empty());
    /// ```
    #[must_use]
    pub fn new(id: i64, version: u32, timestamp: DateTime<Utc>) -> Self {
        Self {
            id,
            version,
            timestamp,
            tags: Tags::new(),
        }
    }

    /// Replace the tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }
}

/// The extent covered by a dataset.
///
/// Coordinates are WGS84 with `x = longitude`, `y = latitude`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bound {
    /// Covered rectangle.
    pub rect: Rect<f64>,
    /// Free-form description of where the data came from.
    #[cfg_attr(feature = "serde", serde(default))]
    pub origin: String,
}

impl Bound {
    /// Construct a bound from a rectangle and origin string.
    #[must_use]
    pub fn new(rect: Rect<f64>, origin: impl Into<String>) -> Self {
        Self {
            rect,
            origin: origin.into(),
        }
    }

    /// Smallest bound covering both `self` and `other`, keeping `self`'s origin.
    ///
    /// # Examples
    /// ```
    /// use geo::{Coord, Rect};
    /// use osmflow_core::Bound;
    ///
    /// let west = Bound::new(Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 1.0 }), "a");
    /// let east = Bound::new(Rect::new(Coord { x: 2.0, y: -1.0 }, Coord { x: 3.0, y: 0.5 }), "b");
    /// let both = west.union(&east);
    ///
    /// assert_eq!(both.rect.min(), Coord { x: 0.0, y: -1.0 });
    /// assert_eq!(both.rect.max(), Coord { x: 3.0, y: 1.0 });
    /// assert_eq!(both.origin, "a");
    /// ```
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let min = Coord {
            x: self.rect.min().x.min(other.rect.min().x),
            y: self.rect.min().y.min(other.rect.min().y),
        };
        let max = Coord {
            x: self.rect.max().x.max(other.rect.max().x),
            y: self.rect.max().y.max(other.rect.max().y),
        };
        Self {
            rect: Rect::new(min, max),
            origin: self.origin.clone(),
        }
    }
}

/// A single point.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Node {
    /// Identity, revision and tags.
    pub meta: EntityMeta,
    /// WGS84 position (`x = longitude`, `y = latitude`).
    pub location: Coord<f64>,
}

/// An ordered list of node references.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Way {
    /// Identity, revision and tags.
    pub meta: EntityMeta,
    /// Referenced node identifiers in path order.
    #[cfg_attr(feature = "serde", serde(default))]
    pub node_refs: Vec<i64>,
}

/// A member entry of a [`Relation`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RelationMember {
    /// Kind of the referenced element.
    pub kind: EntityKind,
    /// Identifier of the referenced element.
    pub id: i64,
    /// Role the member plays in the relation.
    #[cfg_attr(feature = "serde", serde(default))]
    pub role: String,
}

/// A grouping of other elements.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Relation {
    /// Identity, revision and tags.
    pub meta: EntityMeta,
    /// Members in declaration order.
    #[cfg_attr(feature = "serde", serde(default))]
    pub members: Vec<RelationMember>,
}

/// One OpenStreetMap element of any kind.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "lowercase"))]
pub enum Entity {
    /// Dataset extent.
    Bound(Bound),
    /// Point element.
    Node(Node),
    /// Path element.
    Way(Way),
    /// Grouping element.
    Relation(Relation),
}

impl Entity {
    /// The element's kind.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Bound(_) => EntityKind::Bound,
            Self::Node(_) => EntityKind::Node,
            Self::Way(_) => EntityKind::Way,
            Self::Relation(_) => EntityKind::Relation,
        }
    }

    /// Shared metadata; bounds carry none.
    #[must_use]
    pub const fn meta(&self) -> Option<&EntityMeta> {
        match self {
            Self::Bound(_) => None,
            Self::Node(node) => Some(&node.meta),
            Self::Way(way) => Some(&way.meta),
            Self::Relation(relation) => Some(&relation.meta),
        }
    }

    /// Identifier within the kind. Bounds always report `0`.
    #[must_use]
    pub fn id(&self) -> i64 {
        self.meta().map_or(0, |meta| meta.id)
    }

    /// Revision number. Bounds always report `0`.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.meta().map_or(0, |meta| meta.version)
    }

    /// Revision timestamp. Bounds carry none.
    #[must_use]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.meta().map(|meta| meta.timestamp)
    }

    /// The identifying fields of this element.
    #[must_use]
    pub fn identity(&self) -> EntityIdentity {
        EntityIdentity {
            kind: self.kind(),
            id: self.id(),
            version: self.version(),
            timestamp: self.timestamp(),
        }
    }
}

/// The identifying fields of an element, detached from its payload.
///
/// Used in diagnostics, where the payload is irrelevant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityIdentity {
    /// Element kind.
    pub kind: EntityKind,
    /// Identifier within the kind.
    pub id: i64,
    /// Revision number.
    pub version: u32,
    /// Revision timestamp, absent for bounds.
    pub timestamp: Option<DateTime<Utc>>,
}

impl fmt::Display for EntityIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} v{}", self.kind, self.id, self.version)
    }
}

/// Shared, read-only handle to an [`Entity`].
///
/// Cloning a container is cheap and yields the same snapshot; there is no way
/// to obtain `&mut Entity` from it.
///
/// # Examples
/// ```
/// use chrono::{TimeZone, Utc};
/// use geo::Coord;
/// use osmflow_core::{Entity, EntityContainer, EntityKind, EntityMeta, Node};
///
/// let node = Node {
///     meta: EntityMeta::new(1, 1, Utc.timestamp_opt(0, 0).unwrap()),
///     location: Coord { x: 13.4, y: 52.5 },
/// };
/// let container = EntityContainer::new(Entity::Node(node));
/// let shared = container.clone();
///
/// assert_eq!(shared.kind(), EntityKind::Node);
/// assert!(EntityContainer::ptr_eq(&container, &shared));
/// ```
#[derive(Clone, PartialEq)]
pub struct EntityContainer(Arc<Entity>);

impl EntityContainer {
    /// Wrap an entity for hand-off.
    #[must_use]
    pub fn new(entity: Entity) -> Self {
        Self(Arc::new(entity))
    }

    /// Borrow the wrapped entity.
    #[must_use]
    pub fn entity(&self) -> &Entity {
        &self.0
    }

    /// The wrapped entity's kind.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.0.kind()
    }

    /// The wrapped entity's identifier.
    #[must_use]
    pub fn id(&self) -> i64 {
        self.0.id()
    }

    /// The wrapped entity's revision number.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.0.version()
    }

    /// The wrapped entity's revision timestamp.
    #[must_use]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.0.timestamp()
    }

    /// The wrapped entity's identifying fields.
    #[must_use]
    pub fn identity(&self) -> EntityIdentity {
        self.0.identity()
    }

    /// Whether both handles share one snapshot.
    #[must_use]
    pub fn ptr_eq(lhs: &Self, rhs: &Self) -> bool {
        Arc::ptr_eq(&lhs.0, &rhs.0)
    }
}

impl From<Entity> for EntityContainer {
    fn from(entity: Entity) -> Self {
        Self::new(entity)
    }
}

impl fmt::Debug for EntityContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntityContainer").field(self.entity()).finish()
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for EntityContainer {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.entity().serialize(serializer)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for EntityContainer {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Entity::deserialize(deserializer).map(Self::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{bound, epoch_plus, node, relation, way};
    use rstest::rstest;

    #[rstest]
    fn bounds_report_zero_identity() {
        let container = bound(0.0, 0.0, 1.0, 1.0);
        let identity = container.identity();
        assert_eq!(identity.kind, EntityKind::Bound);
        assert_eq!(identity.id, 0);
        assert_eq!(identity.version, 0);
        assert_eq!(identity.timestamp, None);
    }

    #[rstest]
    #[case(node(4, 2), EntityKind::Node)]
    #[case(way(4, 2, &[1, 2]), EntityKind::Way)]
    #[case(relation(4, 2), EntityKind::Relation)]
    fn containers_expose_identity(#[case] container: EntityContainer, #[case] kind: EntityKind) {
        assert_eq!(container.kind(), kind);
        assert_eq!(container.id(), 4);
        assert_eq!(container.version(), 2);
        assert_eq!(container.timestamp(), Some(epoch_plus(0)));
    }

    #[rstest]
    fn identity_display_names_kind_id_and_version() {
        assert_eq!(way(10, 3, &[]).identity().to_string(), "way 10 v3");
    }

    #[rstest]
    fn clones_share_the_snapshot() {
        let original = node(1, 1);
        let copy = original.clone();
        assert!(EntityContainer::ptr_eq(&original, &copy));
        assert_eq!(original, copy);
    }

    #[cfg(feature = "serde")]
    #[rstest]
    fn containers_serialise_as_tagged_entities() {
        let container = way(10, 1, &[1, 2]);
        let json = serde_json::to_value(&container).expect("serialise way");
        assert_eq!(json["kind"], "way");
        assert_eq!(json["meta"]["id"], 10);
        let restored: EntityContainer = serde_json::from_value(json).expect("deserialise way");
        assert_eq!(restored, container);
    }
}
