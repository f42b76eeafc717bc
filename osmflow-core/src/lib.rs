//! Element model and ordering contracts for the osmflow pipeline.
//!
//! Responsibilities:
//! - Model OpenStreetMap elements as an immutable sum type.
//! - Define change records and the actions they carry.
//! - Define the total orders merge-join stages rely on.
//!
//! Invariants:
//! - Elements are never mutated after being wrapped in a container.
//! - Every (kind, action) pair has a change-application weight.
//! - No global mutable state; orderings are resolved through an explicit
//!   [`OrderingRegistry`] value.
#![forbid(unsafe_code)]

mod change;
mod entity;
mod kind;
mod order;
pub mod registry;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use change::ChangeContainer;
pub use entity::{
    Bound, Entity, EntityContainer, EntityIdentity, EntityMeta, Node, Relation, RelationMember,
    Tags, Way,
};
pub use kind::{ChangeAction, EntityKind, ParseActionError, ParseKindError};
pub use order::{ChangeOrdering, EntityOrdering, StreamOrder, change_weight};
pub use registry::OrderingRegistry;
