//! Streaming merge-join pipeline for OpenStreetMap element and change streams.
//!
//! Responsibilities:
//! - Define the push contract between stages ([`Sink`]).
//! - Decouple pushing producers from pulling merge stages with bounded
//!   handoff queues.
//! - Provide the merge-join stages: change application, snapshot merging,
//!   change derivation, and change merging.
//! - Wire stages into a graph and run active stages under one task group.
//!
//! Invariants:
//! - Every merge input is validated to be strictly ascending in kind then
//!   identifier before it is queued.
//! - Every stage endpoint is released on every exit path; a failing stage
//!   aborts its input queues so blocked producers never hang.
//! - The first root-cause failure is the pipeline's failure; cancellations it
//!   triggers are never reported in its place.
#![forbid(unsafe_code)]

mod config;
mod error;
mod graph;
mod item;
mod memory;
mod merge;
mod queue;
mod sink;
mod task;
mod validate;

pub use config::PipelineConfig;
pub use error::{ConfigError, OrderViolation, PipelineError, QueueError};
pub use graph::{GraphBuilder, Materialised, PipeRef, Pipeline, StageFactory};
pub use item::{PipeItem, PipeKind, PipeSink};
pub use memory::{CollectHandle, CollectSink, IterSource};
pub use merge::{
    ChangeApplier, ChangeDeriver, ChangeMerger, ConflictResolutionMethod, EntityMerger,
    MergeInput, MergeInputs, MergeJoin, MergeStage,
};
pub use queue::{
    DEFAULT_QUEUE_CAPACITY, QueueAbortHandle, QueueConsumer, QueueProducer, handoff_queue,
};
pub use sink::{ChangeSink, EntitySink, Sink, drain_into};
pub use task::{ActiveTask, CancelToken, TaskGroup};
pub use validate::OrderValidator;
