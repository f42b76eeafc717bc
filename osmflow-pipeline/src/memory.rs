//! In-memory endpoints: a source feeding an iterator and a sink collecting
//! into a shared buffer.

use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::{ActiveTask, CancelToken, PipelineError, Sink};

/// Active stage pushing every item of an iterator into its output.
pub struct IterSource<I: Iterator> {
    name: String,
    items: I,
    output: Box<dyn Sink<I::Item>>,
}

impl<I> IterSource<I>
where
    I: Iterator + Send + 'static,
    I::Item: Send + 'static,
{
    /// A source named `name` that feeds `items` into `output`.
    pub fn new(
        name: impl Into<String>,
        items: impl IntoIterator<IntoIter = I>,
        output: Box<dyn Sink<I::Item>>,
    ) -> Self {
        Self {
            name: name.into(),
            items: items.into_iter(),
            output,
        }
    }

    fn feed(&mut self, cancel: &CancelToken) -> Result<usize, PipelineError> {
        let mut count = 0_usize;
        for item in self.items.by_ref() {
            cancel.check(&self.name)?;
            self.output.process(item)?;
            count += 1;
        }
        self.output.complete()?;
        Ok(count)
    }
}

impl<I> ActiveTask for IterSource<I>
where
    I: Iterator + Send + 'static,
    I::Item: Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(mut self: Box<Self>, cancel: &CancelToken) -> Result<(), PipelineError> {
        let outcome = self.feed(cancel);
        self.output.release();
        let count = outcome?;
        debug!("source `{}` produced {count} item(s)", self.name);
        Ok(())
    }
}

impl<I: Iterator> std::fmt::Debug for IterSource<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IterSource")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct Collected<T> {
    items: Vec<T>,
    completed: bool,
    released: bool,
}

/// Terminal stage storing everything it receives.
#[derive(Debug)]
pub struct CollectSink<T> {
    shared: Arc<Mutex<Collected<T>>>,
}

/// Read access to what a [`CollectSink`] received, usable after the sink
/// moved into a pipeline.
#[derive(Debug)]
pub struct CollectHandle<T> {
    shared: Arc<Mutex<Collected<T>>>,
}

impl<T> CollectSink<T> {
    /// A sink and the handle observing it.
    #[must_use]
    pub fn new() -> (Self, CollectHandle<T>) {
        let shared = Arc::new(Mutex::new(Collected {
            items: Vec::new(),
            completed: false,
            released: false,
        }));
        (
            Self {
                shared: Arc::clone(&shared),
            },
            CollectHandle { shared },
        )
    }
}

impl<T: Send> Sink<T> for CollectSink<T> {
    fn process(&mut self, item: T) -> Result<(), PipelineError> {
        self.shared.lock().items.push(item);
        Ok(())
    }

    fn complete(&mut self) -> Result<(), PipelineError> {
        self.shared.lock().completed = true;
        Ok(())
    }

    fn release(&mut self) {
        self.shared.lock().released = true;
    }
}

impl<T> CollectHandle<T> {
    /// A copy of the items received so far.
    #[must_use]
    pub fn items(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.shared.lock().items.clone()
    }

    /// Move the received items out, leaving the buffer empty.
    #[must_use]
    pub fn take_items(&self) -> Vec<T> {
        std::mem::take(&mut self.shared.lock().items)
    }

    /// Whether the producer signalled a successful end of stream.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.shared.lock().completed
    }

    /// Whether the producer released the sink.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.shared.lock().released
    }
}

impl<T> Clone for CollectHandle<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::QueueError;
    use rstest::rstest;

    struct Failing;

    impl Sink<u8> for Failing {
        fn process(&mut self, _item: u8) -> Result<(), PipelineError> {
            Err(QueueError::OutputAborted.into())
        }

        fn complete(&mut self) -> Result<(), PipelineError> {
            Ok(())
        }

        fn release(&mut self) {}
    }

    #[rstest]
    fn source_completes_and_releases_its_output() {
        let (sink, collected) = CollectSink::<u8>::new();
        let source = IterSource::new("numbers", 1_u8..=3, Box::new(sink));
        Box::new(source)
            .run(&CancelToken::new())
            .expect("source succeeds");
        assert_eq!(collected.items(), vec![1, 2, 3]);
        assert!(collected.is_completed());
        assert!(collected.is_released());
    }

    #[rstest]
    fn cancelled_source_stops_without_completing() {
        let (sink, collected) = CollectSink::<u8>::new();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = Box::new(IterSource::new("numbers", 1_u8..=3, Box::new(sink)))
            .run(&cancel)
            .expect_err("cancelled");
        assert!(matches!(err, PipelineError::Cancelled { .. }));
        assert!(collected.items().is_empty());
        assert!(!collected.is_completed());
        assert!(collected.is_released());
    }

    #[rstest]
    fn output_failure_propagates() {
        let source = IterSource::new("numbers", [1_u8], Box::new(Failing));
        let err = Box::new(source)
            .run(&CancelToken::new())
            .expect_err("output fails");
        assert!(err.is_secondary());
    }

    #[rstest]
    fn handle_can_take_items() {
        let (mut sink, collected) = CollectSink::new();
        sink.process("a").expect("process");
        assert_eq!(collected.take_items(), vec!["a"]);
        assert!(collected.items().is_empty());
    }
}
