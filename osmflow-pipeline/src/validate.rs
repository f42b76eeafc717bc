//! Passive stage rejecting streams that are not strictly ascending.
//!
//! Merge-join stages produce wrong output, not errors, when fed unsorted
//! input, so a validator sits directly in front of every merge input.

use osmflow_core::StreamOrder;
use std::cmp::Ordering;

use crate::{OrderViolation, PipeItem, PipelineError, Sink};

/// Forwards items while each is strictly greater than the one before.
///
/// # Examples
/// ```
/// use osmflow_core::{EntityContainer, EntityOrdering};
/// use osmflow_core::test_support::node;
/// use osmflow_pipeline::{CollectSink, OrderValidator, PipelineError, Sink};
///
/// let (sink, _) = CollectSink::<EntityContainer>::new();
/// let mut validator = OrderValidator::new(EntityOrdering::KindThenId, sink);
///
/// validator.process(node(5, 1))?;
/// let err = validator.process(node(3, 1)).unwrap_err();
/// assert!(matches!(err, PipelineError::OrderViolation(_)));
/// # Ok::<(), PipelineError>(())
/// ```
#[derive(Debug)]
pub struct OrderValidator<T: PipeItem, S> {
    order: T::Order,
    previous: Option<T>,
    downstream: S,
}

impl<T: PipeItem, S: Sink<T>> OrderValidator<T, S> {
    /// Validate against `order` before forwarding to `downstream`.
    pub const fn new(order: T::Order, downstream: S) -> Self {
        Self {
            order,
            previous: None,
            downstream,
        }
    }

    /// Validate against the canonical kind-then-id order.
    pub fn canonical(downstream: S) -> Self {
        Self::new(T::Order::default(), downstream)
    }

    /// The stage items are forwarded to.
    pub const fn downstream(&self) -> &S {
        &self.downstream
    }
}

impl<T: PipeItem, S: Sink<T>> Sink<T> for OrderValidator<T, S> {
    fn process(&mut self, item: T) -> Result<(), PipelineError> {
        if let Some(previous) = &self.previous {
            if self.order.compare(previous, &item) != Ordering::Less {
                return Err(OrderViolation {
                    previous: previous.identity(),
                    current: item.identity(),
                }
                .into());
            }
        }
        self.previous = Some(item.clone());
        self.downstream.process(item)
    }

    fn complete(&mut self) -> Result<(), PipelineError> {
        self.downstream.complete()
    }

    fn release(&mut self) {
        self.previous = None;
        self.downstream.release();
    }
}
