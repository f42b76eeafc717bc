//! Facade crate for the osmflow change-processing engine.
//!
//! This crate re-exports the element model and the streaming pipeline so
//! embedders depend on one crate. Serialisation support sits behind the
//! `serde` feature.

#![forbid(unsafe_code)]

pub use osmflow_core::{
    Bound, ChangeAction, ChangeContainer, ChangeOrdering, Entity, EntityContainer,
    EntityIdentity, EntityKind, EntityMeta, EntityOrdering, Node, OrderingRegistry, Relation,
    RelationMember, StreamOrder, Tags, Way, change_weight,
};

pub use osmflow_pipeline::{
    ActiveTask, CancelToken, ChangeApplier, ChangeDeriver, ChangeMerger, ChangeSink,
    CollectHandle, CollectSink, ConfigError, ConflictResolutionMethod, EntityMerger, EntitySink,
    GraphBuilder, IterSource, MergeJoin, OrderValidator, OrderViolation, PipeItem, PipeKind,
    PipeRef, Pipeline, PipelineConfig, PipelineError, QueueError, Sink, StageFactory, TaskGroup,
    handoff_queue,
};
