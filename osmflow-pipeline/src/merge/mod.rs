//! Two-input merge-join stages.
//!
//! Every stage here reads two streams sorted by kind then identifier, each
//! through its own handoff queue, and walks them in lockstep on one thread.
//! A [`MergeJoin`] decides what to emit for an element seen on the left only,
//! the right only, or both; [`MergeStage`] supplies the loop, the drain phase,
//! and the failure handling shared by all of them.

mod apply;
mod changes;
mod derive;
mod entities;
mod policy;

use std::{cmp::Ordering, num::NonZeroUsize};

use log::debug;
use osmflow_core::{EntityOrdering, StreamOrder};

use crate::{
    ActiveTask, CancelToken, OrderValidator, PipeItem, PipelineError, QueueAbortHandle,
    QueueConsumer, QueueError, QueueProducer, Sink, handoff_queue,
};

pub use apply::ChangeApplier;
pub use changes::ChangeMerger;
pub use derive::ChangeDeriver;
pub use entities::EntityMerger;
pub use policy::ConflictResolutionMethod;

/// Per-element decisions of a merge-join.
pub trait MergeJoin: Send + 'static {
    /// Items read from the first input.
    type Left: PipeItem;
    /// Items read from the second input.
    type Right: PipeItem;
    /// Items emitted downstream.
    type Output: PipeItem;

    /// An element present on the first input only.
    fn left_only(&mut self, left: Self::Left) -> Option<Self::Output>;

    /// An element present on the second input only.
    fn right_only(&mut self, right: Self::Right) -> Option<Self::Output>;

    /// An element present on both inputs.
    fn matched(&mut self, left: Self::Left, right: Self::Right) -> Option<Self::Output>;
}

/// An input endpoint of a merge stage: validates order, then enqueues.
pub type MergeInput<T> = OrderValidator<T, QueueProducer<T>>;

/// The two input endpoints of a merge stage.
#[derive(Debug)]
pub struct MergeInputs<L: PipeItem, R: PipeItem> {
    /// Feeds the first input.
    pub left: MergeInput<L>,
    /// Feeds the second input.
    pub right: MergeInput<R>,
}

/// One input with a lazily refilled pending slot.
#[derive(Debug)]
struct InputCursor<T> {
    queue: QueueConsumer<T>,
    pending: Option<T>,
    exhausted: bool,
}

impl<T> InputCursor<T> {
    const fn new(queue: QueueConsumer<T>) -> Self {
        Self {
            queue,
            pending: None,
            exhausted: false,
        }
    }

    fn peek(&mut self) -> Result<Option<&T>, QueueError> {
        if self.pending.is_none() && !self.exhausted {
            self.pending = self.queue.pull()?;
            self.exhausted = self.pending.is_none();
        }
        Ok(self.pending.as_ref())
    }

    fn take(&mut self) -> Result<T, QueueError> {
        self.pending.take().ok_or(QueueError::Empty)
    }

    fn abort(&self) {
        self.queue.set_output_error();
    }

    fn abort_handle(&self) -> QueueAbortHandle
    where
        T: Send + 'static,
    {
        self.queue.abort_handle()
    }
}

/// Active stage running a [`MergeJoin`] over two queued inputs.
///
/// # Examples
/// ```
/// use std::num::NonZeroUsize;
/// use osmflow_core::{ChangeAction, EntityContainer};
/// use osmflow_core::test_support::{change, node};
/// use osmflow_pipeline::{ChangeApplier, CollectSink, MergeStage, TaskGroup, drain_into};
///
/// let (sink, applied) = CollectSink::<EntityContainer>::new();
/// let (stage, inputs) =
///     MergeStage::new("apply", ChangeApplier, NonZeroUsize::MIN, Box::new(sink));
///
/// let mut group = TaskGroup::new();
/// group.spawn(Box::new(stage))?;
/// drain_into([node(1, 1)], inputs.left)?;
/// drain_into([change(ChangeAction::Create, node(2, 1))], inputs.right)?;
/// group.join()?;
///
/// assert_eq!(applied.items(), vec![node(1, 1), node(2, 1)]);
/// # Ok::<(), osmflow_pipeline::PipelineError>(())
/// ```
pub struct MergeStage<J: MergeJoin> {
    name: String,
    join: J,
    left: InputCursor<J::Left>,
    right: InputCursor<J::Right>,
    output: Box<dyn Sink<J::Output>>,
}

impl<J: MergeJoin> MergeStage<J> {
    /// Build a stage writing to `output` and the endpoints feeding it.
    ///
    /// Each input queue holds at most `capacity` items; every endpoint
    /// rejects input that is not in canonical order.
    pub fn new(
        name: impl Into<String>,
        join: J,
        capacity: NonZeroUsize,
        output: Box<dyn Sink<J::Output>>,
    ) -> (Self, MergeInputs<J::Left, J::Right>) {
        let (left_producer, left_consumer) = handoff_queue(capacity);
        let (right_producer, right_consumer) = handoff_queue(capacity);
        let stage = Self {
            name: name.into(),
            join,
            left: InputCursor::new(left_consumer),
            right: InputCursor::new(right_consumer),
            output,
        };
        let inputs = MergeInputs {
            left: OrderValidator::canonical(left_producer),
            right: OrderValidator::canonical(right_producer),
        };
        (stage, inputs)
    }

    fn merge(&mut self, cancel: &CancelToken) -> Result<usize, PipelineError> {
        let mut emitted = 0_usize;
        loop {
            cancel.check(&self.name)?;
            let step = match (self.left.peek()?, self.right.peek()?) {
                (Some(left), Some(right)) => {
                    EntityOrdering::KindThenId.compare(left.element(), right.element())
                }
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => break,
            };
            let produced = match step {
                Ordering::Less => self.join.left_only(self.left.take()?),
                Ordering::Greater => self.join.right_only(self.right.take()?),
                Ordering::Equal => {
                    let left = self.left.take()?;
                    let right = self.right.take()?;
                    self.join.matched(left, right)
                }
            };
            if let Some(item) = produced {
                self.output.process(item)?;
                emitted += 1;
            }
        }
        self.output.complete()?;
        Ok(emitted)
    }
}

impl<J: MergeJoin> ActiveTask for MergeStage<J> {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(mut self: Box<Self>, cancel: &CancelToken) -> Result<(), PipelineError> {
        cancel.guard(self.left.abort_handle());
        cancel.guard(self.right.abort_handle());
        let outcome = self.merge(cancel);
        if outcome.is_err() {
            self.left.abort();
            self.right.abort();
        }
        self.output.release();
        let emitted = outcome?;
        debug!("merge `{}` emitted {emitted} item(s)", self.name);
        Ok(())
    }
}

impl<J: MergeJoin + std::fmt::Debug> std::fmt::Debug for MergeStage<J> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeStage")
            .field("name", &self.name)
            .field("join", &self.join)
            .finish_non_exhaustive()
    }
}
