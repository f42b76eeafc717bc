//! The push contract every stage boundary follows.
//!
//! A producer calls [`Sink::process`] once per item, then [`Sink::complete`]
//! exactly once if it succeeded, and finally [`Sink::release`] whatever
//! happened. Downstream stages see the same sequence from their producers.

use osmflow_core::{ChangeContainer, EntityContainer};

use crate::PipelineError;

/// Receives a stream of items pushed by the caller's thread.
pub trait Sink<T>: Send {
    /// Accept the next item.
    fn process(&mut self, item: T) -> Result<(), PipelineError>;

    /// Signal that the stream ended successfully.
    fn complete(&mut self) -> Result<(), PipelineError>;

    /// Free resources. Called on every exit path; must be idempotent.
    fn release(&mut self);
}

/// A boxed sink of elements.
pub type EntitySink = Box<dyn Sink<EntityContainer>>;

/// A boxed sink of change records.
pub type ChangeSink = Box<dyn Sink<ChangeContainer>>;

impl<T, S> Sink<T> for Box<S>
where
    S: Sink<T> + ?Sized,
{
    fn process(&mut self, item: T) -> Result<(), PipelineError> {
        (**self).process(item)
    }

    fn complete(&mut self) -> Result<(), PipelineError> {
        (**self).complete()
    }

    fn release(&mut self) {
        (**self).release();
    }
}

/// Push every item of `items` into `sink`, completing on success and
/// releasing on every path.
///
/// # Examples
/// ```
/// use osmflow_core::EntityContainer;
/// use osmflow_core::test_support::node;
/// use osmflow_pipeline::{CollectSink, drain_into};
///
/// let (sink, collected) = CollectSink::<EntityContainer>::new();
/// drain_into([node(1, 1), node(2, 1)], sink)?;
///
/// assert_eq!(collected.items().len(), 2);
/// assert!(collected.is_completed());
/// # Ok::<(), osmflow_pipeline::PipelineError>(())
/// ```
pub fn drain_into<T, I, S>(items: I, mut sink: S) -> Result<(), PipelineError>
where
    I: IntoIterator<Item = T>,
    S: Sink<T>,
{
    let outcome = items
        .into_iter()
        .try_for_each(|item| sink.process(item))
        .and_then(|()| sink.complete());
    sink.release();
    outcome
}
