//! What travels along a pipe.
//!
//! Pipes carry either elements or change records. [`PipeKind`] is the
//! capability a stage declares per port; [`PipeSink`] is a type-erased input
//! endpoint the graph hands from consumer to producer; [`PipeItem`] ties the
//! two container types to their kind, canonical ordering, and identity.

use std::fmt;

use osmflow_core::{
    ChangeContainer, ChangeOrdering, EntityContainer, EntityIdentity, EntityOrdering,
    OrderingRegistry, StreamOrder,
};

use crate::Sink;

/// The kind of item a pipe carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum PipeKind {
    /// Element containers.
    Entity,
    /// Change records.
    Change,
}

impl fmt::Display for PipeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Entity => "entity",
            Self::Change => "change",
        })
    }
}

/// An input endpoint of either kind.
pub enum PipeSink {
    /// Accepts elements.
    Entity(Box<dyn Sink<EntityContainer>>),
    /// Accepts change records.
    Change(Box<dyn Sink<ChangeContainer>>),
}

impl PipeSink {
    /// The kind of item this endpoint accepts.
    #[must_use]
    pub const fn kind(&self) -> PipeKind {
        match self {
            Self::Entity(_) => PipeKind::Entity,
            Self::Change(_) => PipeKind::Change,
        }
    }
}

impl fmt::Debug for PipeSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PipeSink").field(&self.kind()).finish()
    }
}

/// An item type that can flow through a pipeline.
pub trait PipeItem: Clone + Send + 'static {
    /// The pipe capability this item type needs.
    const KIND: PipeKind;

    /// Orderings applicable to streams of this item.
    ///
    /// The default value is the canonical order merge stages require.
    type Order: StreamOrder<Self> + Copy + Default + fmt::Debug + 'static;

    /// The element this item carries; merge stages join on it.
    fn element(&self) -> &EntityContainer;

    /// Kind, identifier, and version for error reports.
    fn identity(&self) -> EntityIdentity;

    /// Look up a named ordering for this item type.
    fn resolve_order(registry: &OrderingRegistry, name: &str) -> Option<Self::Order>;

    /// Recover a typed sink from an endpoint, or hand the endpoint back.
    fn typed_sink(sink: PipeSink) -> Result<Box<dyn Sink<Self>>, PipeSink>;

    /// Erase a typed sink into an endpoint.
    fn erase_sink(sink: Box<dyn Sink<Self>>) -> PipeSink;
}

impl PipeItem for EntityContainer {
    const KIND: PipeKind = PipeKind::Entity;
    type Order = EntityOrdering;

    fn element(&self) -> &EntityContainer {
        self
    }

    fn identity(&self) -> EntityIdentity {
        Self::identity(self)
    }

    fn resolve_order(registry: &OrderingRegistry, name: &str) -> Option<Self::Order> {
        registry.entity(name)
    }

    fn typed_sink(sink: PipeSink) -> Result<Box<dyn Sink<Self>>, PipeSink> {
        match sink {
            PipeSink::Entity(inner) => Ok(inner),
            other @ PipeSink::Change(_) => Err(other),
        }
    }

    fn erase_sink(sink: Box<dyn Sink<Self>>) -> PipeSink {
        PipeSink::Entity(sink)
    }
}

impl PipeItem for ChangeContainer {
    const KIND: PipeKind = PipeKind::Change;
    type Order = ChangeOrdering;

    fn element(&self) -> &EntityContainer {
        self.entity()
    }

    fn identity(&self) -> EntityIdentity {
        Self::identity(self)
    }

    fn resolve_order(registry: &OrderingRegistry, name: &str) -> Option<Self::Order> {
        registry.change(name)
    }

    fn typed_sink(sink: PipeSink) -> Result<Box<dyn Sink<Self>>, PipeSink> {
        match sink {
            PipeSink::Change(inner) => Ok(inner),
            other @ PipeSink::Entity(_) => Err(other),
        }
    }

    fn erase_sink(sink: Box<dyn Sink<Self>>) -> PipeSink {
        PipeSink::Change(sink)
    }
}
