//! Stage factories behind the [`GraphBuilder`](super::GraphBuilder)
//! convenience methods.

use std::marker::PhantomData;

use crate::{
    ActiveTask, ConfigError, MergeInputs, MergeJoin, MergeStage, PipeItem, PipeKind, PipeSink,
    PipelineConfig, Sink,
};

/// Endpoints and optional thread body produced for one stage.
pub struct Materialised {
    /// Input endpoints, in declaration order.
    pub inputs: Vec<PipeSink>,
    /// Body to run on the stage's own thread; `None` for passive stages.
    pub task: Option<Box<dyn ActiveTask>>,
}

impl std::fmt::Debug for Materialised {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Materialised")
            .field("inputs", &self.inputs)
            .field("active", &self.task.is_some())
            .finish()
    }
}

/// Describes a stage's ports and builds it once its outputs exist.
pub trait StageFactory {
    /// Capability required on each input port.
    fn input_kinds(&self) -> Vec<PipeKind>;

    /// Capability provided on each output port.
    fn output_kinds(&self) -> Vec<PipeKind>;

    /// Build the stage around the endpoints its outputs feed.
    ///
    /// `outputs` matches [`output_kinds`](Self::output_kinds) in order and
    /// kind; the returned inputs must match
    /// [`input_kinds`](Self::input_kinds).
    fn materialise(
        self: Box<Self>,
        stage: &str,
        outputs: Vec<PipeSink>,
        config: &PipelineConfig,
    ) -> Result<Materialised, ConfigError>;
}

/// Take the only output endpoint, typed for `T`.
pub(super) fn single_output<T: PipeItem>(
    stage: &str,
    outputs: Vec<PipeSink>,
) -> Result<Box<dyn Sink<T>>, ConfigError> {
    let declared = outputs.len();
    let mut outputs = outputs.into_iter();
    let (Some(output), None) = (outputs.next(), outputs.next()) else {
        return Err(ConfigError::PortCount {
            stage: stage.to_owned(),
            direction: "output",
            declared,
            expected: 1,
        });
    };
    T::typed_sink(output).map_err(|other| ConfigError::CapabilityMismatch {
        stage: stage.to_owned(),
        pipe: "output".to_owned(),
        produced: T::KIND,
        expected: other.kind(),
    })
}

pub(super) struct SourceFactory<T, F> {
    make: F,
    item: PhantomData<fn() -> T>,
}

impl<T, F> SourceFactory<T, F>
where
    T: PipeItem,
    F: FnOnce(Box<dyn Sink<T>>) -> Box<dyn ActiveTask> + 'static,
{
    pub(super) const fn new(make: F) -> Self {
        Self {
            make,
            item: PhantomData,
        }
    }
}

impl<T, F> StageFactory for SourceFactory<T, F>
where
    T: PipeItem,
    F: FnOnce(Box<dyn Sink<T>>) -> Box<dyn ActiveTask> + 'static,
{
    fn input_kinds(&self) -> Vec<PipeKind> {
        Vec::new()
    }

    fn output_kinds(&self) -> Vec<PipeKind> {
        vec![T::KIND]
    }

    fn materialise(
        self: Box<Self>,
        stage: &str,
        outputs: Vec<PipeSink>,
        _config: &PipelineConfig,
    ) -> Result<Materialised, ConfigError> {
        let output = single_output::<T>(stage, outputs)?;
        Ok(Materialised {
            inputs: Vec::new(),
            task: Some((self.make)(output)),
        })
    }
}

pub(super) struct FilterFactory<T, F> {
    make: F,
    item: PhantomData<fn() -> T>,
}

impl<T, F, S> FilterFactory<T, F>
where
    T: PipeItem,
    F: FnOnce(Box<dyn Sink<T>>) -> S + 'static,
    S: Sink<T> + 'static,
{
    pub(super) const fn new(make: F) -> Self {
        Self {
            make,
            item: PhantomData,
        }
    }
}

impl<T, F, S> StageFactory for FilterFactory<T, F>
where
    T: PipeItem,
    F: FnOnce(Box<dyn Sink<T>>) -> S + 'static,
    S: Sink<T> + 'static,
{
    fn input_kinds(&self) -> Vec<PipeKind> {
        vec![T::KIND]
    }

    fn output_kinds(&self) -> Vec<PipeKind> {
        vec![T::KIND]
    }

    fn materialise(
        self: Box<Self>,
        stage: &str,
        outputs: Vec<PipeSink>,
        _config: &PipelineConfig,
    ) -> Result<Materialised, ConfigError> {
        let output = single_output::<T>(stage, outputs)?;
        let filter = (self.make)(output);
        Ok(Materialised {
            inputs: vec![T::erase_sink(Box::new(filter))],
            task: None,
        })
    }
}

pub(super) struct SinkFactory<T, S> {
    sink: S,
    item: PhantomData<fn() -> T>,
}

impl<T: PipeItem, S: Sink<T> + 'static> SinkFactory<T, S> {
    pub(super) const fn new(sink: S) -> Self {
        Self {
            sink,
            item: PhantomData,
        }
    }
}

impl<T: PipeItem, S: Sink<T> + 'static> StageFactory for SinkFactory<T, S> {
    fn input_kinds(&self) -> Vec<PipeKind> {
        vec![T::KIND]
    }

    fn output_kinds(&self) -> Vec<PipeKind> {
        Vec::new()
    }

    fn materialise(
        self: Box<Self>,
        _stage: &str,
        _outputs: Vec<PipeSink>,
        _config: &PipelineConfig,
    ) -> Result<Materialised, ConfigError> {
        Ok(Materialised {
            inputs: vec![T::erase_sink(Box::new(self.sink))],
            task: None,
        })
    }
}

pub(super) struct MergeFactory<J> {
    join: J,
}

impl<J: MergeJoin> MergeFactory<J> {
    pub(super) const fn new(join: J) -> Self {
        Self { join }
    }
}

impl<J: MergeJoin> StageFactory for MergeFactory<J> {
    fn input_kinds(&self) -> Vec<PipeKind> {
        vec![
            <J::Left as PipeItem>::KIND,
            <J::Right as PipeItem>::KIND,
        ]
    }

    fn output_kinds(&self) -> Vec<PipeKind> {
        vec![<J::Output as PipeItem>::KIND]
    }

    fn materialise(
        self: Box<Self>,
        stage: &str,
        outputs: Vec<PipeSink>,
        config: &PipelineConfig,
    ) -> Result<Materialised, ConfigError> {
        let output = single_output::<J::Output>(stage, outputs)?;
        let (merge, MergeInputs { left, right }) =
            MergeStage::new(stage, self.join, config.queue_capacity, output);
        Ok(Materialised {
            inputs: vec![
                <J::Left as PipeItem>::erase_sink(Box::new(left)),
                <J::Right as PipeItem>::erase_sink(Box::new(right)),
            ],
            task: Some(Box::new(merge)),
        })
    }
}
