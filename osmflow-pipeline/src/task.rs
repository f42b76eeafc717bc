//! Structured concurrency for active stages.
//!
//! A [`TaskGroup`] owns one named thread per active stage. All threads share a
//! [`CancelToken`]; the first failure cancels the token, which trips every
//! handoff queue registered with it so blocked stages wake up and abort.
//! [`TaskGroup::join`] waits for every thread and reports the root-cause
//! failure rather than the cancellations it triggered.

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
};

use log::{debug, warn};
use parking_lot::Mutex;

use crate::{PipelineError, QueueAbortHandle};

/// A stage that needs its own thread.
pub trait ActiveTask: Send + 'static {
    /// Stage name used for the thread name and error reports.
    fn name(&self) -> &str;

    /// Drive the stage to completion.
    ///
    /// Implementations must check `cancel` between items and register the
    /// queues they read from with [`CancelToken::guard`].
    fn run(self: Box<Self>, cancel: &CancelToken) -> Result<(), PipelineError>;
}

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    guarded: Mutex<Vec<QueueAbortHandle>>,
}

/// Shared cancellation signal for the stages of one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    state: Arc<CancelState>,
}

impl CancelToken {
    /// A fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the run and trip every guarded queue. Idempotent.
    pub fn cancel(&self) {
        if self.state.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        let guarded = std::mem::take(&mut *self.state.guarded.lock());
        for handle in guarded {
            handle.abort();
        }
    }

    /// Whether [`cancel`](Self::cancel) was called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Acquire)
    }

    /// Fail with [`PipelineError::Cancelled`] once the run was cancelled.
    pub fn check(&self, stage: &str) -> Result<(), PipelineError> {
        if self.is_cancelled() {
            Err(PipelineError::Cancelled {
                stage: stage.to_owned(),
            })
        } else {
            Ok(())
        }
    }

    /// Trip `handle` when the run is cancelled, or immediately if it
    /// already was.
    pub fn guard(&self, handle: QueueAbortHandle) {
        let mut guarded = self.state.guarded.lock();
        if self.is_cancelled() {
            drop(guarded);
            handle.abort();
        } else {
            guarded.push(handle);
        }
    }
}

/// Keeps the most relevant failure seen so far.
#[derive(Debug, Default)]
struct FailureSlot(Mutex<Option<PipelineError>>);

impl FailureSlot {
    fn record(&self, err: PipelineError) {
        let mut slot = self.0.lock();
        let replace = match slot.as_ref() {
            None => true,
            Some(existing) => existing.is_secondary() && !err.is_secondary(),
        };
        if replace {
            *slot = Some(err);
        }
    }

    fn take(&self) -> Option<PipelineError> {
        self.0.lock().take()
    }
}

/// Runs active stages on their own threads and joins them together.
///
/// # Examples
/// ```
/// use osmflow_pipeline::{ActiveTask, CancelToken, PipelineError, TaskGroup};
///
/// struct Fails;
///
/// impl ActiveTask for Fails {
///     fn name(&self) -> &str {
///         "fails"
///     }
///
///     fn run(self: Box<Self>, _cancel: &CancelToken) -> Result<(), PipelineError> {
///         Err(PipelineError::Cancelled { stage: "upstream".into() })
///     }
/// }
///
/// let mut group = TaskGroup::new();
/// group.spawn(Box::new(Fails))?;
/// assert!(group.join().is_err());
/// # Ok::<(), PipelineError>(())
/// ```
#[derive(Debug, Default)]
pub struct TaskGroup {
    cancel: CancelToken,
    failure: Arc<FailureSlot>,
    handles: Vec<(String, JoinHandle<()>)>,
}

impl TaskGroup {
    /// An empty group with its own cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The token shared by every task in the group.
    #[must_use]
    pub const fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Start `task` on a new thread named after it.
    ///
    /// A spawn failure cancels the tasks already running.
    pub fn spawn(&mut self, task: Box<dyn ActiveTask>) -> Result<(), PipelineError> {
        let name = task.name().to_owned();
        let cancel = self.cancel.clone();
        let failure = Arc::clone(&self.failure);
        let stage = name.clone();
        let spawned = thread::Builder::new()
            .name(format!("osmflow-{name}"))
            .spawn(move || run_task(&stage, task, &cancel, &failure));
        match spawned {
            Ok(handle) => {
                debug!("started stage `{name}`");
                self.handles.push((name, handle));
                Ok(())
            }
            Err(source) => {
                self.cancel.cancel();
                Err(PipelineError::Spawn { stage: name, source })
            }
        }
    }

    /// Wait for every task and report the first root-cause failure.
    pub fn join(mut self) -> Result<(), PipelineError> {
        self.join_all();
        self.failure.take().map_or(Ok(()), Err)
    }

    fn join_all(&mut self) {
        for (name, handle) in self.handles.drain(..) {
            if handle.join().is_err() {
                // `run_task` catches panics, so this only happens if recording
                // the failure itself panicked.
                self.failure.record(PipelineError::TaskPanicked {
                    stage: name,
                    message: "thread terminated abnormally".to_owned(),
                });
            }
        }
    }
}

impl Drop for TaskGroup {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            self.cancel.cancel();
            self.join_all();
        }
    }
}

fn run_task(stage: &str, task: Box<dyn ActiveTask>, cancel: &CancelToken, failure: &FailureSlot) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| task.run(cancel)))
        .unwrap_or_else(|payload| {
            Err(PipelineError::TaskPanicked {
                stage: stage.to_owned(),
                message: panic_message(payload.as_ref()),
            })
        });
    match outcome {
        Ok(()) => debug!("stage `{stage}` finished"),
        Err(err) => {
            if err.is_secondary() {
                debug!("stage `{stage}` stopped: {err}");
            } else {
                warn!("stage `{stage}` failed: {err}");
            }
            failure.record(err);
            cancel.cancel();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{QueueError, handoff_queue};
    use rstest::rstest;
    use std::{
        num::NonZeroUsize,
        sync::atomic::AtomicUsize,
        time::{Duration, Instant},
    };

    struct Task<F> {
        name: &'static str,
        body: F,
    }

    impl<F> ActiveTask for Task<F>
    where
        F: FnOnce(&CancelToken) -> Result<(), PipelineError> + Send + 'static,
    {
        fn name(&self) -> &str {
            self.name
        }

        fn run(self: Box<Self>, cancel: &CancelToken) -> Result<(), PipelineError> {
            (self.body)(cancel)
        }
    }

    fn task<F>(name: &'static str, body: F) -> Box<dyn ActiveTask>
    where
        F: FnOnce(&CancelToken) -> Result<(), PipelineError> + Send + 'static,
    {
        Box::new(Task { name, body })
    }

    #[rstest]
    fn joins_every_successful_task() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut group = TaskGroup::new();
        for name in ["a", "b", "c"] {
            let seen = Arc::clone(&counter);
            group
                .spawn(task(name, move |_| {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }))
                .expect("spawn");
        }
        group.join().expect("all tasks succeed");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[rstest]
    fn root_cause_wins_over_cancellations() {
        let mut group = TaskGroup::new();
        group
            .spawn(task("waits", |cancel| {
                let started = Instant::now();
                while !cancel.is_cancelled() && started.elapsed() < Duration::from_secs(5) {
                    thread::sleep(Duration::from_millis(5));
                }
                cancel.check("waits")
            }))
            .expect("spawn waiter");
        group
            .spawn(task("fails", |_| {
                thread::sleep(Duration::from_millis(20));
                Err(PipelineError::Queue(QueueError::PutAfterComplete))
            }))
            .expect("spawn failing task");

        let err = group.join().expect_err("failure must surface");
        assert!(matches!(
            err,
            PipelineError::Queue(QueueError::PutAfterComplete)
        ));
    }

    #[rstest]
    fn panics_become_errors() {
        let mut group = TaskGroup::new();
        group
            .spawn(task("explodes", |_| panic!("boom")))
            .expect("spawn");
        let err = group.join().expect_err("panic must surface");
        match err {
            PipelineError::TaskPanicked { stage, message } => {
                assert_eq!(stage, "explodes");
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[rstest]
    fn cancelling_trips_guarded_queues() {
        let (mut producer, consumer) = handoff_queue::<u8>(NonZeroUsize::MIN);
        let token = CancelToken::new();
        token.guard(consumer.abort_handle());
        producer.put(1).expect("buffered put");

        let writer = thread::spawn(move || producer.put(2));
        thread::sleep(Duration::from_millis(20));
        token.cancel();

        assert_eq!(
            writer.join().expect("writer thread"),
            Err(QueueError::OutputAborted)
        );
        assert!(matches!(
            token.check("reader"),
            Err(PipelineError::Cancelled { stage }) if stage == "reader"
        ));
    }

    #[rstest]
    fn guarding_after_cancellation_trips_at_once() {
        let (mut producer, consumer) = handoff_queue::<u8>(NonZeroUsize::MIN);
        let token = CancelToken::new();
        token.cancel();
        token.guard(consumer.abort_handle());
        assert_eq!(producer.put(1), Err(QueueError::OutputAborted));
    }
}
