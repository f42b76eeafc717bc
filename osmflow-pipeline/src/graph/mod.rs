//! Declarative wiring of stages into a runnable [`Pipeline`].
//!
//! Stages are registered in data-flow order. Each input names the pipe it
//! reads, either explicitly or by popping the most recently produced unnamed
//! pipe; every lookup, capability check, and dangling-pipe check happens
//! before any thread starts. [`GraphBuilder::build`] then materialises stages
//! from last to first, so each producer is built around the endpoints of
//! the consumers it feeds.

mod stages;

use std::collections::{HashMap, HashSet};

use log::{debug, info};
use osmflow_core::OrderingRegistry;

use crate::{
    ActiveTask, ConfigError, IterSource, MergeJoin, OrderValidator, PipeItem, PipeKind, PipeSink,
    PipelineConfig, PipelineError, Sink, TaskGroup,
};

pub use stages::{Materialised, StageFactory};
use stages::{FilterFactory, MergeFactory, SinkFactory, SourceFactory};

/// How a stage port refers to a pipe.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PipeRef {
    /// A pipe with an explicit name.
    Named(String),
    /// An unnamed pipe, matched by production order.
    Default,
}

impl PipeRef {
    /// A reference to the pipe called `name`.
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }
}

impl From<&str> for PipeRef {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl From<String> for PipeRef {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

type PipeId = usize;

#[derive(Debug)]
struct Pipe {
    label: String,
    kind: PipeKind,
    consumed: bool,
}

struct StageEntry {
    name: String,
    factory: Box<dyn StageFactory>,
    inputs: Vec<PipeId>,
    outputs: Vec<PipeId>,
}

/// Collects stages and their connections.
///
/// # Examples
/// ```
/// use osmflow_core::{ChangeAction, EntityContainer};
/// use osmflow_core::test_support::{change, node};
/// use osmflow_pipeline::{ChangeApplier, CollectSink, GraphBuilder, PipeRef};
///
/// let (sink, applied) = CollectSink::<EntityContainer>::new();
/// let mut graph = GraphBuilder::default();
/// graph
///     .source("base", "base", vec![node(1, 1), node(2, 1)])?
///     .source("changes", "changes", vec![change(ChangeAction::Delete, node(2, 1))])?
///     .merge("apply", ChangeApplier, ["base".into(), "changes".into()], PipeRef::Default)?
///     .sink("collect", PipeRef::Default, sink)?;
/// graph.build()?.run()?;
///
/// assert_eq!(applied.items(), vec![node(1, 1)]);
/// # Ok::<(), osmflow_pipeline::PipelineError>(())
/// ```
pub struct GraphBuilder {
    registry: OrderingRegistry,
    config: PipelineConfig,
    stages: Vec<StageEntry>,
    stage_names: HashSet<String>,
    pipes: Vec<Pipe>,
    named: HashMap<String, PipeId>,
    defaults: Vec<PipeId>,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new(OrderingRegistry::standard(), PipelineConfig::default())
    }
}

impl GraphBuilder {
    /// An empty graph resolving orderings through `registry`.
    #[must_use]
    pub fn new(registry: OrderingRegistry, config: PipelineConfig) -> Self {
        Self {
            registry,
            config,
            stages: Vec::new(),
            stage_names: HashSet::new(),
            pipes: Vec::new(),
            named: HashMap::new(),
            defaults: Vec::new(),
        }
    }

    /// Settings stages will be built with.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Register an arbitrary stage.
    ///
    /// Default inputs pop the unnamed pipe stack: the first default input
    /// takes the most recently produced pipe, the next one the pipe before
    /// it, and so on.
    pub fn stage(
        &mut self,
        name: impl Into<String>,
        inputs: Vec<PipeRef>,
        outputs: Vec<PipeRef>,
        factory: Box<dyn StageFactory>,
    ) -> Result<&mut Self, ConfigError> {
        let name = name.into();
        if self.stage_names.contains(&name) {
            return Err(ConfigError::DuplicateStage { stage: name });
        }
        let input_kinds = factory.input_kinds();
        let output_kinds = factory.output_kinds();
        check_port_count(&name, "input", inputs.len(), input_kinds.len())?;
        check_port_count(&name, "output", outputs.len(), output_kinds.len())?;

        let input_ids = self.resolve_inputs(&name, &inputs, &input_kinds)?;
        let new_pipes = self.declare_outputs(&name, &outputs, &output_kinds)?;

        // Everything is checked; commit.
        for &id in &input_ids {
            if let Some(pipe) = self.pipes.get_mut(id) {
                pipe.consumed = true;
            }
            self.defaults.retain(|&pending| pending != id);
        }
        let mut output_ids = Vec::with_capacity(new_pipes.len());
        for (reference, pipe) in new_pipes {
            let id = self.pipes.len();
            match reference {
                PipeRef::Named(pipe_name) => {
                    self.named.insert(pipe_name, id);
                }
                PipeRef::Default => self.defaults.push(id),
            }
            self.pipes.push(pipe);
            output_ids.push(id);
        }
        debug!(
            "registered stage `{name}` with {} input(s) and {} output(s)",
            input_ids.len(),
            output_ids.len()
        );
        self.stage_names.insert(name.clone());
        self.stages.push(StageEntry {
            name,
            factory,
            inputs: input_ids,
            outputs: output_ids,
        });
        Ok(self)
    }

    fn resolve_inputs(
        &self,
        stage: &str,
        inputs: &[PipeRef],
        kinds: &[PipeKind],
    ) -> Result<Vec<PipeId>, ConfigError> {
        // Last produced, first consumed.
        let mut defaults = self.defaults.iter().rev().copied();
        let mut seen = HashSet::new();

        let mut resolved = Vec::with_capacity(inputs.len());
        for (input, &expected) in inputs.iter().zip(kinds) {
            let id = match input {
                PipeRef::Named(pipe) => {
                    let id = *self.named.get(pipe).ok_or_else(|| ConfigError::UnknownPipe {
                        stage: stage.to_owned(),
                        pipe: pipe.clone(),
                    })?;
                    let consumed = self.pipes.get(id).is_some_and(|candidate| candidate.consumed);
                    if consumed || !seen.insert(id) {
                        return Err(ConfigError::PipeAlreadyConsumed {
                            stage: stage.to_owned(),
                            pipe: pipe.clone(),
                        });
                    }
                    id
                }
                PipeRef::Default => defaults.next().ok_or_else(|| ConfigError::NoDefaultPipe {
                    stage: stage.to_owned(),
                })?,
            };
            let pipe = self.pipe(id)?;
            if pipe.kind != expected {
                return Err(ConfigError::CapabilityMismatch {
                    stage: stage.to_owned(),
                    pipe: pipe.label.clone(),
                    produced: pipe.kind,
                    expected,
                });
            }
            resolved.push(id);
        }
        Ok(resolved)
    }

    fn declare_outputs(
        &self,
        stage: &str,
        outputs: &[PipeRef],
        kinds: &[PipeKind],
    ) -> Result<Vec<(PipeRef, Pipe)>, ConfigError> {
        let mut declared = Vec::with_capacity(outputs.len());
        let mut seen = HashSet::new();
        for (index, (output, &kind)) in outputs.iter().zip(kinds).enumerate() {
            let label = match output {
                PipeRef::Named(pipe) => {
                    if self.named.contains_key(pipe) || !seen.insert(pipe.as_str()) {
                        return Err(ConfigError::DuplicatePipe {
                            stage: stage.to_owned(),
                            pipe: pipe.clone(),
                        });
                    }
                    pipe.clone()
                }
                PipeRef::Default => format!("{stage}#{index}"),
            };
            declared.push((
                output.clone(),
                Pipe {
                    label,
                    kind,
                    consumed: false,
                },
            ));
        }
        Ok(declared)
    }

    fn pipe(&self, id: PipeId) -> Result<&Pipe, ConfigError> {
        self.pipes.get(id).ok_or_else(|| ConfigError::UnknownPipe {
            stage: String::new(),
            pipe: format!("#{id}"),
        })
    }

    /// Register an active source feeding `items` into its output.
    pub fn source<T, I>(
        &mut self,
        name: impl Into<String>,
        output: impl Into<PipeRef>,
        items: I,
    ) -> Result<&mut Self, ConfigError>
    where
        T: PipeItem,
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        let name = name.into();
        let stage = name.clone();
        let items = items.into_iter();
        self.source_with(name, output, move |sink: Box<dyn Sink<T>>| {
            Box::new(IterSource::new(stage, items, sink)) as Box<dyn ActiveTask>
        })
    }

    /// Register an active source built around its output endpoint.
    pub fn source_with<T, F>(
        &mut self,
        name: impl Into<String>,
        output: impl Into<PipeRef>,
        make: F,
    ) -> Result<&mut Self, ConfigError>
    where
        T: PipeItem,
        F: FnOnce(Box<dyn Sink<T>>) -> Box<dyn ActiveTask> + 'static,
    {
        self.stage(
            name,
            Vec::new(),
            vec![output.into()],
            Box::new(SourceFactory::new(make)),
        )
    }

    /// Register a passive single-input, single-output stage.
    pub fn filter<T, F, S>(
        &mut self,
        name: impl Into<String>,
        input: impl Into<PipeRef>,
        output: impl Into<PipeRef>,
        make: F,
    ) -> Result<&mut Self, ConfigError>
    where
        T: PipeItem,
        F: FnOnce(Box<dyn Sink<T>>) -> S + 'static,
        S: Sink<T> + 'static,
    {
        self.stage(
            name,
            vec![input.into()],
            vec![output.into()],
            Box::new(FilterFactory::new(make)),
        )
    }

    /// Register an order validator using the registry's `ordering`.
    pub fn validate<T: PipeItem>(
        &mut self,
        name: impl Into<String>,
        ordering: &str,
        input: impl Into<PipeRef>,
        output: impl Into<PipeRef>,
    ) -> Result<&mut Self, ConfigError> {
        let order = T::resolve_order(&self.registry, ordering).ok_or_else(|| {
            ConfigError::UnknownOrdering {
                name: ordering.to_owned(),
            }
        })?;
        self.filter(name, input, output, move |sink: Box<dyn Sink<T>>| {
            OrderValidator::new(order, sink)
        })
    }

    /// Register a passive terminal stage.
    pub fn sink<T, S>(
        &mut self,
        name: impl Into<String>,
        input: impl Into<PipeRef>,
        sink: S,
    ) -> Result<&mut Self, ConfigError>
    where
        T: PipeItem,
        S: Sink<T> + 'static,
    {
        self.stage(
            name,
            vec![input.into()],
            Vec::new(),
            Box::new(SinkFactory::new(sink)),
        )
    }

    /// Register an active two-input merge stage.
    ///
    /// Both inputs are order-validated and queued with the configured
    /// capacity.
    pub fn merge<J: MergeJoin>(
        &mut self,
        name: impl Into<String>,
        join: J,
        inputs: [PipeRef; 2],
        output: impl Into<PipeRef>,
    ) -> Result<&mut Self, ConfigError> {
        self.stage(
            name,
            inputs.into(),
            vec![output.into()],
            Box::new(MergeFactory::new(join)),
        )
    }

    /// Check that every pipe is consumed and build every stage.
    pub fn build(self) -> Result<Pipeline, ConfigError> {
        let dangling: Vec<String> = self
            .pipes
            .iter()
            .filter(|pipe| !pipe.consumed)
            .map(|pipe| pipe.label.clone())
            .collect();
        if !dangling.is_empty() {
            return Err(ConfigError::DanglingPipes { pipes: dangling });
        }

        let Self {
            config,
            stages,
            pipes,
            ..
        } = self;
        let mut endpoints: HashMap<PipeId, PipeSink> = HashMap::new();
        let mut tasks = Vec::new();
        for stage in stages.into_iter().rev() {
            let outputs = stage
                .outputs
                .iter()
                .map(|id| {
                    endpoints.remove(id).ok_or_else(|| ConfigError::DanglingPipes {
                        pipes: vec![label_of(&pipes, *id)],
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            let built = stage.factory.materialise(&stage.name, outputs, &config)?;
            check_port_count(&stage.name, "input", stage.inputs.len(), built.inputs.len())?;
            for (&id, endpoint) in stage.inputs.iter().zip(built.inputs) {
                let produced = pipes.get(id).map_or(endpoint.kind(), |pipe| pipe.kind);
                if endpoint.kind() != produced {
                    return Err(ConfigError::CapabilityMismatch {
                        stage: stage.name.clone(),
                        pipe: label_of(&pipes, id),
                        produced,
                        expected: endpoint.kind(),
                    });
                }
                endpoints.insert(id, endpoint);
            }
            if let Some(task) = built.task {
                tasks.push(task);
            }
        }
        if tasks.is_empty() {
            return Err(ConfigError::NoActiveStages);
        }
        tasks.reverse();
        Ok(Pipeline { tasks })
    }
}

impl std::fmt::Debug for GraphBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stages: Vec<&str> = self.stages.iter().map(|stage| stage.name.as_str()).collect();
        f.debug_struct("GraphBuilder")
            .field("config", &self.config)
            .field("stages", &stages)
            .field("pipes", &self.pipes)
            .finish_non_exhaustive()
    }
}

fn label_of(pipes: &[Pipe], id: PipeId) -> String {
    pipes
        .get(id)
        .map_or_else(|| format!("#{id}"), |pipe| pipe.label.clone())
}

fn check_port_count(
    stage: &str,
    direction: &'static str,
    declared: usize,
    expected: usize,
) -> Result<(), ConfigError> {
    if declared == expected {
        Ok(())
    } else {
        Err(ConfigError::PortCount {
            stage: stage.to_owned(),
            direction,
            declared,
            expected,
        })
    }
}

/// A fully wired pipeline, ready to run once.
pub struct Pipeline {
    tasks: Vec<Box<dyn ActiveTask>>,
}

impl Pipeline {
    /// Names of the stages that will get their own thread.
    pub fn active_stages(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|task| task.name())
    }

    /// Start every active stage and wait for all of them.
    ///
    /// Returns the first root-cause failure; the other stages are cancelled
    /// and joined before this returns.
    pub fn run(self) -> Result<(), PipelineError> {
        info!("starting pipeline with {} active stage(s)", self.tasks.len());
        let mut group = TaskGroup::new();
        for task in self.tasks {
            group.spawn(task)?;
        }
        group.join()?;
        info!("pipeline finished");
        Ok(())
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("active_stages", &self.active_stages().collect::<Vec<_>>())
            .finish()
    }
}
