//! Bounded single-producer/single-consumer handoff between two threads.
//!
//! A producer blocks in [`QueueProducer::put`] while the queue is full, which
//! bounds the memory held per merge input to the queue capacity. Either end
//! can force an error state that wakes the other end: a consumer calls
//! [`QueueConsumer::set_output_error`] so blocked producers abort, a producer
//! that goes away without completing makes the consumer see
//! [`QueueError::UpstreamAborted`].
//!
//! Both ends release the queue on drop, so every exit path (including a
//! panic unwinding through a stage) leaves the peer able to make progress.

use std::{
    collections::VecDeque,
    num::NonZeroUsize,
    sync::{Arc, Weak},
};

use parking_lot::{Condvar, Mutex};

use crate::{PipelineError, QueueError, Sink};

/// Queue capacity used when configuration does not say otherwise.
pub const DEFAULT_QUEUE_CAPACITY: NonZeroUsize = NonZeroUsize::MIN.saturating_add(9);

#[derive(Debug)]
struct State<T> {
    buffer: VecDeque<T>,
    completed: bool,
    output_error: bool,
    input_error: bool,
    producer_released: bool,
    consumer_released: bool,
}

#[derive(Debug)]
struct Shared<T> {
    capacity: usize,
    state: Mutex<State<T>>,
    not_full: Condvar,
    not_empty: Condvar,
}

impl<T> Shared<T> {
    fn set_output_error(&self) {
        let mut state = self.state.lock();
        state.output_error = true;
        state.buffer.clear();
        drop(state);
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    fn set_input_error(&self) {
        let mut state = self.state.lock();
        state.input_error = true;
        drop(state);
        self.not_empty.notify_all();
    }
}

/// Create a queue holding at most `capacity` items.
///
/// # Examples
/// ```
/// use std::num::NonZeroUsize;
/// use std::thread;
/// use osmflow_pipeline::handoff_queue;
///
/// let (mut producer, mut consumer) = handoff_queue::<u32>(NonZeroUsize::MIN);
/// let writer = thread::spawn(move || -> Result<(), osmflow_pipeline::QueueError> {
///     for value in 0..3 {
///         producer.put(value)?;
///     }
///     producer.complete()
/// });
///
/// let mut received = Vec::new();
/// while consumer.has_next()? {
///     received.push(consumer.get_next()?);
/// }
/// writer.join().expect("writer thread")?;
/// assert_eq!(received, vec![0, 1, 2]);
/// # Ok::<(), osmflow_pipeline::QueueError>(())
/// ```
#[must_use]
pub fn handoff_queue<T>(capacity: NonZeroUsize) -> (QueueProducer<T>, QueueConsumer<T>) {
    let shared = Arc::new(Shared {
        capacity: capacity.get(),
        state: Mutex::new(State {
            buffer: VecDeque::with_capacity(capacity.get()),
            completed: false,
            output_error: false,
            input_error: false,
            producer_released: false,
            consumer_released: false,
        }),
        not_full: Condvar::new(),
        not_empty: Condvar::new(),
    });
    (
        QueueProducer {
            shared: Arc::clone(&shared),
        },
        QueueConsumer { shared },
    )
}

/// Writing end of a handoff queue.
///
/// Also the adapter that lets a push-driven upstream stage feed a pull-driven
/// merge stage: it implements [`Sink`] by forwarding into the queue.
#[derive(Debug)]
pub struct QueueProducer<T> {
    shared: Arc<Shared<T>>,
}

impl<T> QueueProducer<T> {
    /// Append an item, blocking while the queue is full.
    ///
    /// Fails with [`QueueError::OutputAborted`] once the consumer has
    /// signalled an error or gone away, including while blocked.
    pub fn put(&mut self, item: T) -> Result<(), QueueError> {
        let mut state = self.shared.state.lock();
        loop {
            if state.output_error || state.consumer_released {
                return Err(QueueError::OutputAborted);
            }
            if state.completed || state.producer_released {
                return Err(QueueError::PutAfterComplete);
            }
            if state.buffer.len() < self.shared.capacity {
                break;
            }
            self.shared.not_full.wait(&mut state);
        }
        state.buffer.push_back(item);
        drop(state);
        self.shared.not_empty.notify_one();
        Ok(())
    }

    /// Mark the end of the stream. Must be called exactly once.
    pub fn complete(&mut self) -> Result<(), QueueError> {
        let mut state = self.shared.state.lock();
        if state.completed {
            return Err(QueueError::CompletedTwice);
        }
        if state.output_error || state.consumer_released {
            return Err(QueueError::OutputAborted);
        }
        state.completed = true;
        drop(state);
        self.shared.not_empty.notify_all();
        Ok(())
    }

    /// Tell the consumer the stream failed upstream.
    pub fn set_input_error(&self) {
        self.shared.set_input_error();
    }

    /// Give up the writing end. Idempotent.
    ///
    /// Releasing without a prior [`complete`](Self::complete) is an upstream
    /// failure; the consumer observes [`QueueError::UpstreamAborted`].
    pub fn release(&mut self) {
        let mut state = self.shared.state.lock();
        if state.producer_released {
            return;
        }
        state.producer_released = true;
        if !state.completed {
            state.input_error = true;
        }
        drop(state);
        self.shared.not_empty.notify_all();
    }
}

impl<T> Drop for QueueProducer<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T: Send> Sink<T> for QueueProducer<T> {
    fn process(&mut self, item: T) -> Result<(), PipelineError> {
        self.put(item).map_err(PipelineError::from)
    }

    fn complete(&mut self) -> Result<(), PipelineError> {
        Self::complete(self).map_err(PipelineError::from)
    }

    fn release(&mut self) {
        Self::release(self);
    }
}

/// Reading end of a handoff queue.
#[derive(Debug)]
pub struct QueueConsumer<T> {
    shared: Arc<Shared<T>>,
}

impl<T> QueueConsumer<T> {
    /// Whether another item is available, blocking while the queue is empty
    /// and the producer is still running.
    ///
    /// Returns `Ok(false)` once every item was taken and the producer
    /// completed.
    pub fn has_next(&mut self) -> Result<bool, QueueError> {
        let mut state = self.shared.state.lock();
        loop {
            if state.output_error || state.consumer_released {
                return Err(QueueError::OutputAborted);
            }
            if !state.buffer.is_empty() {
                return Ok(true);
            }
            if state.completed {
                return Ok(false);
            }
            if state.input_error {
                return Err(QueueError::UpstreamAborted);
            }
            self.shared.not_empty.wait(&mut state);
        }
    }

    /// Take the oldest item. Call [`has_next`](Self::has_next) first.
    pub fn get_next(&mut self) -> Result<T, QueueError> {
        let mut state = self.shared.state.lock();
        let item = state.buffer.pop_front().ok_or(QueueError::Empty)?;
        drop(state);
        self.shared.not_full.notify_one();
        Ok(item)
    }

    /// Take the next item, or `None` at the end of the stream.
    pub fn pull(&mut self) -> Result<Option<T>, QueueError> {
        if self.has_next()? {
            self.get_next().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Put the queue into the error state so the producer stops, including
    /// a producer currently blocked in [`QueueProducer::put`].
    pub fn set_output_error(&self) {
        self.shared.set_output_error();
    }

    /// A handle that can trip this queue's error state from another thread
    /// without owning the reading end.
    #[must_use]
    pub fn abort_handle(&self) -> QueueAbortHandle
    where
        T: Send + 'static,
    {
        let shared: Weak<dyn Trip> = Arc::downgrade(&self.shared) as Weak<dyn Trip>;
        QueueAbortHandle { shared }
    }

    /// Give up the reading end. Idempotent.
    ///
    /// Releasing before the stream was fully drained aborts the producer.
    pub fn release(&mut self) {
        let mut state = self.shared.state.lock();
        if state.consumer_released {
            return;
        }
        state.consumer_released = true;
        let drained = state.completed && state.buffer.is_empty();
        if !drained {
            state.output_error = true;
            state.buffer.clear();
        }
        drop(state);
        self.shared.not_full.notify_all();
    }
}

impl<T> Drop for QueueConsumer<T> {
    fn drop(&mut self) {
        self.release();
    }
}

trait Trip: Send + Sync {
    fn trip(&self);
}

impl<T: Send> Trip for Shared<T> {
    fn trip(&self) {
        self.set_output_error();
    }
}

/// Trips a queue's error state; does nothing once the queue is gone.
#[derive(Clone)]
pub struct QueueAbortHandle {
    shared: Weak<dyn Trip>,
}

impl QueueAbortHandle {
    /// Force the queue into the error state, waking both ends.
    pub fn abort(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.trip();
        }
    }
}

impl std::fmt::Debug for QueueAbortHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueAbortHandle")
            .field("live", &(self.shared.strong_count() > 0))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use std::{sync::mpsc, thread, time::Duration};

    const SETTLE: Duration = Duration::from_millis(100);
    const BOUND: Duration = Duration::from_secs(5);

    #[fixture]
    fn capacity() -> NonZeroUsize {
        NonZeroUsize::MIN.saturating_add(2)
    }

    #[rstest]
    fn preserves_insertion_order(capacity: NonZeroUsize) {
        let (mut producer, mut consumer) = handoff_queue(capacity);
        producer.put(1).expect("first put");
        producer.put(2).expect("second put");
        producer.complete().expect("complete");
        assert_eq!(consumer.pull(), Ok(Some(1)));
        assert_eq!(consumer.pull(), Ok(Some(2)));
        assert_eq!(consumer.pull(), Ok(None));
    }

    #[rstest]
    fn full_queue_blocks_until_an_item_is_taken(capacity: NonZeroUsize) {
        let (mut producer, mut consumer) = handoff_queue(capacity);
        let (tx, rx) = mpsc::channel();
        let writer = thread::spawn(move || {
            for value in 0..capacity.get() {
                producer.put(value).expect("buffered put");
            }
            tx.send("filled").expect("report fill");
            producer.put(capacity.get()).expect("blocked put");
            tx.send("overflowed").expect("report overflow");
            producer.complete().expect("complete");
        });

        assert_eq!(rx.recv_timeout(BOUND), Ok("filled"));
        assert!(
            rx.recv_timeout(SETTLE).is_err(),
            "put must wait while the queue is full"
        );
        assert_eq!(consumer.pull(), Ok(Some(0)));
        assert_eq!(rx.recv_timeout(BOUND), Ok("overflowed"));

        let mut rest = Vec::new();
        while let Some(value) = consumer.pull().expect("drain") {
            rest.push(value);
        }
        writer.join().expect("writer thread");
        assert_eq!(rest, (1..=capacity.get()).collect::<Vec<_>>());
    }

    #[rstest]
    fn output_error_unblocks_a_waiting_producer() {
        let (mut producer, consumer) = handoff_queue(NonZeroUsize::MIN);
        let (tx, rx) = mpsc::channel();
        let writer = thread::spawn(move || {
            producer.put(1).expect("buffered put");
            let blocked = producer.put(2);
            tx.send(blocked).expect("report outcome");
        });

        assert!(rx.recv_timeout(SETTLE).is_err(), "second put must block");
        consumer.set_output_error();
        assert_eq!(rx.recv_timeout(BOUND), Ok(Err(QueueError::OutputAborted)));
        writer.join().expect("writer thread");
    }

    #[rstest]
    fn abort_handle_trips_the_queue(capacity: NonZeroUsize) {
        let (mut producer, consumer) = handoff_queue::<u8>(capacity);
        let handle = consumer.abort_handle();
        handle.abort();
        assert_eq!(producer.put(1), Err(QueueError::OutputAborted));
        drop(consumer);
        handle.abort();
    }

    #[rstest]
    fn releasing_without_completing_aborts_the_consumer(capacity: NonZeroUsize) {
        let (mut producer, mut consumer) = handoff_queue(capacity);
        producer.put(7).expect("put");
        drop(producer);
        assert_eq!(consumer.pull(), Ok(Some(7)));
        assert_eq!(consumer.has_next(), Err(QueueError::UpstreamAborted));
    }

    #[rstest]
    fn completed_release_is_a_clean_end(capacity: NonZeroUsize) {
        let (mut producer, mut consumer) = handoff_queue::<u8>(capacity);
        producer.complete().expect("complete");
        producer.release();
        producer.release();
        assert_eq!(consumer.has_next(), Ok(false));
    }

    #[rstest]
    fn misuse_after_complete_is_rejected(capacity: NonZeroUsize) {
        let (mut producer, _consumer) = handoff_queue(capacity);
        producer.complete().expect("complete");
        assert_eq!(producer.put(1), Err(QueueError::PutAfterComplete));
        assert_eq!(producer.complete(), Err(QueueError::CompletedTwice));
    }

    #[rstest]
    fn dropping_the_consumer_early_aborts_the_producer(capacity: NonZeroUsize) {
        let (mut producer, consumer) = handoff_queue(capacity);
        producer.put(1).expect("put");
        drop(consumer);
        assert_eq!(producer.put(2), Err(QueueError::OutputAborted));
        assert_eq!(producer.complete(), Err(QueueError::OutputAborted));
    }

    #[rstest]
    fn get_without_an_item_is_reported(capacity: NonZeroUsize) {
        let (_producer, mut consumer) = handoff_queue::<u8>(capacity);
        assert_eq!(consumer.get_next(), Err(QueueError::Empty));
    }

    #[rstest]
    fn default_capacity_is_ten() {
        assert_eq!(DEFAULT_QUEUE_CAPACITY.get(), 10);
    }
}
