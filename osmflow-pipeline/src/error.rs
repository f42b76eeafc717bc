//! Error types raised while wiring or running a pipeline.

use std::error::Error as StdError;

use osmflow_core::EntityIdentity;
use thiserror::Error;

use crate::PipeKind;

/// Problems detected before any data flows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The conflict resolution method name is not recognised.
    #[error("unknown conflict resolution method `{value}` (expected `timestamp` or `latest-source`)")]
    UnknownConflictResolution {
        /// The rejected spelling.
        value: String,
    },
    /// Handoff queues need room for at least one item.
    #[error("queue capacity must be positive")]
    ZeroQueueCapacity,
    /// The ordering name is absent from the registry.
    #[error("unknown ordering `{name}`")]
    UnknownOrdering {
        /// Name looked up in the registry.
        name: String,
    },
    /// Two stages were registered under the same name.
    #[error("stage name `{stage}` is used more than once")]
    DuplicateStage {
        /// The repeated stage name.
        stage: String,
    },
    /// A stage asked for a named pipe nobody produced.
    #[error("stage `{stage}` reads pipe `{pipe}`, which no earlier stage produces")]
    UnknownPipe {
        /// Stage being registered.
        stage: String,
        /// Name of the missing pipe.
        pipe: String,
    },
    /// A named pipe was already taken by another stage.
    #[error("stage `{stage}` reads pipe `{pipe}`, which another stage already consumes")]
    PipeAlreadyConsumed {
        /// Stage being registered.
        stage: String,
        /// Name of the taken pipe.
        pipe: String,
    },
    /// A stage asked for a default pipe but none were left.
    #[error("stage `{stage}` reads a default pipe, but no unconsumed default pipes remain")]
    NoDefaultPipe {
        /// Stage being registered.
        stage: String,
    },
    /// Two stages produced a pipe with the same name.
    #[error("stage `{stage}` produces pipe `{pipe}`, which is already produced elsewhere")]
    DuplicatePipe {
        /// Stage being registered.
        stage: String,
        /// The repeated pipe name.
        pipe: String,
    },
    /// A stage declared a different number of pipes than it has endpoints.
    #[error("stage `{stage}` declares {declared} {direction} pipe(s) but has {expected}")]
    PortCount {
        /// Stage being registered or built.
        stage: String,
        /// `input` or `output`.
        direction: &'static str,
        /// Pipes named at registration.
        declared: usize,
        /// Endpoints the stage actually has.
        expected: usize,
    },
    /// The producer's output cannot feed the consumer's input.
    #[error(
        "stage `{stage}` expects {expected} items on pipe `{pipe}`, but the pipe carries {produced} items"
    )]
    CapabilityMismatch {
        /// The consuming stage.
        stage: String,
        /// Label of the offending pipe.
        pipe: String,
        /// What the producer emits.
        produced: PipeKind,
        /// What the consumer accepts.
        expected: PipeKind,
    },
    /// Pipes were produced but never consumed.
    #[error("pipes were never consumed: {}", join_names(.pipes))]
    DanglingPipes {
        /// Labels of the unconsumed pipes, in production order.
        pipes: Vec<String>,
    },
    /// There is nothing to run.
    #[error("pipeline has no active stages")]
    NoActiveStages,
}

fn join_names(names: &[String]) -> String {
    names
        .iter()
        .map(|name| format!("`{name}`"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A stream delivered two adjacent items out of order.
///
/// Raised on the second item of the pair. Never retried: the upstream sort is
/// wrong and must be fixed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("stream is not sorted: {current} arrived after {previous}")]
pub struct OrderViolation {
    /// The item accepted last.
    pub previous: EntityIdentity,
    /// The item that broke the order.
    pub current: EntityIdentity,
}

/// Handoff queue misuse or a terminated peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum QueueError {
    /// The producer kept writing after `complete`.
    #[error("item offered after the producer completed")]
    PutAfterComplete,
    /// The producer completed twice.
    #[error("producer completed more than once")]
    CompletedTwice,
    /// The consumer failed; the producer must stop.
    #[error("consumer aborted; no further items are accepted")]
    OutputAborted,
    /// The producer went away without completing.
    #[error("producer released the queue without completing")]
    UpstreamAborted,
    /// The consumer asked for an item without one being available.
    #[error("no item is available; check `has_next` first")]
    Empty,
}

/// Any failure raised while a pipeline runs.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PipelineError {
    /// Wiring was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// An input stream was not sorted.
    #[error(transparent)]
    OrderViolation(#[from] OrderViolation),
    /// A handoff queue refused an operation.
    #[error(transparent)]
    Queue(#[from] QueueError),
    /// The stage stopped because another stage failed.
    #[error("stage `{stage}` was cancelled after a failure elsewhere in the pipeline")]
    Cancelled {
        /// The stage that stopped.
        stage: String,
    },
    /// The stage's thread could not be started.
    #[error("failed to spawn thread for stage `{stage}`")]
    Spawn {
        /// The stage left without a thread.
        stage: String,
        /// Error from the thread builder.
        #[source]
        source: std::io::Error,
    },
    /// The stage's thread panicked.
    #[error("stage `{stage}` panicked: {message}")]
    TaskPanicked {
        /// The stage whose thread panicked.
        stage: String,
        /// Text of the panic payload.
        message: String,
    },
    /// A stage-specific failure, such as an I/O error in a writer.
    #[error("stage `{stage}` failed: {source}")]
    Stage {
        /// The stage that raised the error.
        stage: String,
        /// The collaborator's error.
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl PipelineError {
    /// Wrap a collaborator's error with the name of the stage that raised it.
    pub fn stage<E>(stage: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Stage {
            stage: stage.into(),
            source: Box::new(source),
        }
    }

    /// Whether the error only reflects another stage's failure.
    ///
    /// Secondary errors are cancellations and aborted queues; they are never
    /// reported in preference to the failure that caused them.
    #[must_use]
    pub const fn is_secondary(&self) -> bool {
        matches!(
            self,
            Self::Cancelled { .. }
                | Self::Queue(QueueError::OutputAborted | QueueError::UpstreamAborted)
        )
    }
}
