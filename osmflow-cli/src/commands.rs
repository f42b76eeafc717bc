//! Subcommand arguments, their layered configuration, and the pipelines they
//! run.
//!
//! Every subcommand reads two JSON Lines inputs, joins them with one merge
//! stage and writes the result as JSON Lines. Both inputs pass through the
//! merge stage's order validators, so an unsorted file fails the run.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::fs_utf8::File;
use clap::Parser;
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use osmflow_core::OrderingRegistry;
use osmflow_pipeline::{
    ActiveTask, ChangeApplier, ChangeDeriver, ChangeMerger, ConflictResolutionMethod,
    EntityMerger, GraphBuilder, MergeJoin, PipeRef, PipelineConfig, Sink,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::fs::{create_utf8_file, file_is_file, open_utf8_file};
use crate::jsonl::{JsonLinesSink, JsonLinesSource};
use crate::{
    ARG_BASE, ARG_CHANGE, ARG_CONFLICT_RESOLUTION, ARG_FIRST, ARG_FROM, ARG_OUTPUT,
    ARG_QUEUE_CAPACITY, ARG_SECOND, ARG_TO, CliError, ENV_APPLY_BASE, ENV_APPLY_CHANGE,
    ENV_APPLY_OUTPUT, ENV_DERIVE_FROM, ENV_DERIVE_OUTPUT, ENV_DERIVE_TO, ENV_MERGE_CHANGE_FIRST,
    ENV_MERGE_CHANGE_OUTPUT, ENV_MERGE_CHANGE_SECOND, ENV_MERGE_FIRST, ENV_MERGE_OUTPUT,
    ENV_MERGE_SECOND,
};

/// Flag and environment variable naming one file of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Port {
    pub(crate) field: &'static str,
    pub(crate) env: &'static str,
}

/// The files a command reads and writes, and the name of its merge stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct JobPorts {
    pub(crate) stage: &'static str,
    pub(crate) left: Port,
    pub(crate) right: Port,
    pub(crate) output: Port,
}

pub(crate) const APPLY_CHANGE_PORTS: JobPorts = JobPorts {
    stage: "apply-change",
    left: Port {
        field: ARG_BASE,
        env: ENV_APPLY_BASE,
    },
    right: Port {
        field: ARG_CHANGE,
        env: ENV_APPLY_CHANGE,
    },
    output: Port {
        field: ARG_OUTPUT,
        env: ENV_APPLY_OUTPUT,
    },
};

pub(crate) const MERGE_PORTS: JobPorts = JobPorts {
    stage: "merge",
    left: Port {
        field: ARG_FIRST,
        env: ENV_MERGE_FIRST,
    },
    right: Port {
        field: ARG_SECOND,
        env: ENV_MERGE_SECOND,
    },
    output: Port {
        field: ARG_OUTPUT,
        env: ENV_MERGE_OUTPUT,
    },
};

pub(crate) const DERIVE_CHANGE_PORTS: JobPorts = JobPorts {
    stage: "derive-change",
    left: Port {
        field: ARG_FROM,
        env: ENV_DERIVE_FROM,
    },
    right: Port {
        field: ARG_TO,
        env: ENV_DERIVE_TO,
    },
    output: Port {
        field: ARG_OUTPUT,
        env: ENV_DERIVE_OUTPUT,
    },
};

pub(crate) const MERGE_CHANGE_PORTS: JobPorts = JobPorts {
    stage: "merge-change",
    left: Port {
        field: ARG_FIRST,
        env: ENV_MERGE_CHANGE_FIRST,
    },
    right: Port {
        field: ARG_SECOND,
        env: ENV_MERGE_CHANGE_SECOND,
    },
    output: Port {
        field: ARG_OUTPUT,
        env: ENV_MERGE_CHANGE_OUTPUT,
    },
};

/// CLI arguments for the `apply-change` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Apply a change stream to an element snapshot. Both inputs \
                 are JSON Lines files sorted by kind then identifier; paths \
                 can come from CLI flags, configuration files, or environment \
                 variables.",
    about = "Apply a change stream to an element snapshot"
)]
#[ortho_config(prefix = "OSMFLOW")]
pub(crate) struct ApplyChangeArgs {
    /// Path to the base snapshot (JSON Lines of elements).
    #[arg(long = ARG_BASE, value_name = "path")]
    #[serde(default)]
    pub(crate) base: Option<Utf8PathBuf>,
    /// Path to the change stream (JSON Lines of changes).
    #[arg(long = ARG_CHANGE, value_name = "path")]
    #[serde(default)]
    pub(crate) change: Option<Utf8PathBuf>,
    /// Where to write the resulting snapshot.
    #[arg(long = ARG_OUTPUT, value_name = "path")]
    #[serde(default)]
    pub(crate) output: Option<Utf8PathBuf>,
    /// Items buffered per merge input (default 10).
    #[arg(long = ARG_QUEUE_CAPACITY, value_name = "count")]
    #[serde(default)]
    pub(crate) queue_capacity: Option<usize>,
}

/// CLI arguments for the `merge` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Merge two element snapshots. Where both contain an element, \
                 the conflict resolution method picks the survivor: \
                 `timestamp` keeps the newer one (the second on ties), \
                 `latest-source` always keeps the second.",
    about = "Merge two element snapshots"
)]
#[ortho_config(prefix = "OSMFLOW")]
pub(crate) struct MergeArgs {
    /// Path to the first snapshot.
    #[arg(long = ARG_FIRST, value_name = "path")]
    #[serde(default)]
    pub(crate) first: Option<Utf8PathBuf>,
    /// Path to the second snapshot.
    #[arg(long = ARG_SECOND, value_name = "path")]
    #[serde(default)]
    pub(crate) second: Option<Utf8PathBuf>,
    /// Where to write the merged snapshot.
    #[arg(long = ARG_OUTPUT, value_name = "path")]
    #[serde(default)]
    pub(crate) output: Option<Utf8PathBuf>,
    /// Items buffered per merge input (default 10).
    #[arg(long = ARG_QUEUE_CAPACITY, value_name = "count")]
    #[serde(default)]
    pub(crate) queue_capacity: Option<usize>,
    /// `timestamp` (default) or `latest-source`.
    #[arg(long = ARG_CONFLICT_RESOLUTION, value_name = "method")]
    #[serde(default)]
    pub(crate) conflict_resolution: Option<ConflictResolutionMethod>,
}

/// CLI arguments for the `derive-change` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Compare two element snapshots and write the changes that \
                 turn the first into the second.",
    about = "Derive a change stream between two snapshots"
)]
#[ortho_config(prefix = "OSMFLOW")]
pub(crate) struct DeriveChangeArgs {
    /// Path to the older snapshot.
    #[arg(long = ARG_FROM, value_name = "path")]
    #[serde(default)]
    pub(crate) from: Option<Utf8PathBuf>,
    /// Path to the newer snapshot.
    #[arg(long = ARG_TO, value_name = "path")]
    #[serde(default)]
    pub(crate) to: Option<Utf8PathBuf>,
    /// Where to write the derived change stream.
    #[arg(long = ARG_OUTPUT, value_name = "path")]
    #[serde(default)]
    pub(crate) output: Option<Utf8PathBuf>,
    /// Items buffered per merge input (default 10).
    #[arg(long = ARG_QUEUE_CAPACITY, value_name = "count")]
    #[serde(default)]
    pub(crate) queue_capacity: Option<usize>,
}

/// CLI arguments for the `merge-change` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Merge two change streams. Where both touch the same \
                 element, the conflict resolution method picks which change \
                 survives.",
    about = "Merge two change streams"
)]
#[ortho_config(prefix = "OSMFLOW")]
pub(crate) struct MergeChangeArgs {
    /// Path to the first change stream.
    #[arg(long = ARG_FIRST, value_name = "path")]
    #[serde(default)]
    pub(crate) first: Option<Utf8PathBuf>,
    /// Path to the second change stream.
    #[arg(long = ARG_SECOND, value_name = "path")]
    #[serde(default)]
    pub(crate) second: Option<Utf8PathBuf>,
    /// Where to write the merged change stream.
    #[arg(long = ARG_OUTPUT, value_name = "path")]
    #[serde(default)]
    pub(crate) output: Option<Utf8PathBuf>,
    /// Items buffered per merge input (default 10).
    #[arg(long = ARG_QUEUE_CAPACITY, value_name = "count")]
    #[serde(default)]
    pub(crate) queue_capacity: Option<usize>,
    /// `timestamp` (default) or `latest-source`.
    #[arg(long = ARG_CONFLICT_RESOLUTION, value_name = "method")]
    #[serde(default)]
    pub(crate) conflict_resolution: Option<ConflictResolutionMethod>,
}

/// Resolved configuration for one two-input command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct JobConfig {
    pub(crate) ports: JobPorts,
    pub(crate) left: Utf8PathBuf,
    pub(crate) right: Utf8PathBuf,
    pub(crate) output: Utf8PathBuf,
    pub(crate) pipeline: PipelineConfig,
}

impl JobConfig {
    fn resolve(
        ports: JobPorts,
        [left, right, output]: [Option<Utf8PathBuf>; 3],
        queue_capacity: Option<usize>,
        conflict_resolution: Option<ConflictResolutionMethod>,
    ) -> Result<Self, CliError> {
        let left = required(left, ports.left)?;
        let right = required(right, ports.right)?;
        let output = required(output, ports.output)?;
        let mut pipeline = PipelineConfig::default();
        if let Some(capacity) = queue_capacity {
            pipeline = pipeline.with_queue_capacity(capacity)?;
        }
        if let Some(method) = conflict_resolution {
            pipeline = pipeline.with_conflict_resolution(method);
        }
        Ok(Self {
            ports,
            left,
            right,
            output,
            pipeline,
        })
    }

    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        Self::require_existing(&self.left, self.ports.left.field)?;
        Self::require_existing(&self.right, self.ports.right.field)?;
        Ok(())
    }

    fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
        match file_is_file(path) {
            Ok(true) => Ok(()),
            Ok(false) => Err(CliError::SourcePathNotFile {
                field,
                path: path.to_path_buf(),
            }),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                Err(CliError::MissingSourceFile {
                    field,
                    path: path.to_path_buf(),
                })
            }
            Err(source) => Err(CliError::InspectSourcePath {
                field,
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

fn required(value: Option<Utf8PathBuf>, port: Port) -> Result<Utf8PathBuf, CliError> {
    value.ok_or(CliError::MissingArgument {
        field: port.field,
        env: port.env,
    })
}

impl TryFrom<ApplyChangeArgs> for JobConfig {
    type Error = CliError;

    fn try_from(args: ApplyChangeArgs) -> Result<Self, Self::Error> {
        Self::resolve(
            APPLY_CHANGE_PORTS,
            [args.base, args.change, args.output],
            args.queue_capacity,
            None,
        )
    }
}

impl TryFrom<MergeArgs> for JobConfig {
    type Error = CliError;

    fn try_from(args: MergeArgs) -> Result<Self, Self::Error> {
        Self::resolve(
            MERGE_PORTS,
            [args.first, args.second, args.output],
            args.queue_capacity,
            args.conflict_resolution,
        )
    }
}

impl TryFrom<DeriveChangeArgs> for JobConfig {
    type Error = CliError;

    fn try_from(args: DeriveChangeArgs) -> Result<Self, Self::Error> {
        Self::resolve(
            DERIVE_CHANGE_PORTS,
            [args.from, args.to, args.output],
            args.queue_capacity,
            None,
        )
    }
}

impl TryFrom<MergeChangeArgs> for JobConfig {
    type Error = CliError;

    fn try_from(args: MergeChangeArgs) -> Result<Self, Self::Error> {
        Self::resolve(
            MERGE_CHANGE_PORTS,
            [args.first, args.second, args.output],
            args.queue_capacity,
            args.conflict_resolution,
        )
    }
}

/// Merge the configuration layers behind `args` and resolve the job.
pub(crate) fn resolve_job<A>(args: A) -> Result<JobConfig, CliError>
where
    A: SubcmdConfigMerge + Serialize + Default,
    JobConfig: TryFrom<A, Error = CliError>,
{
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let config = JobConfig::try_from(merged)?;
    config.validate_sources()?;
    Ok(config)
}

pub(crate) fn run_apply_change(args: ApplyChangeArgs) -> Result<(), CliError> {
    let config = resolve_job(args)?;
    execute(&config, ChangeApplier)
}

pub(crate) fn run_merge(args: MergeArgs) -> Result<(), CliError> {
    let config = resolve_job(args)?;
    let join = EntityMerger::new(config.pipeline.conflict_resolution);
    execute(&config, join)
}

pub(crate) fn run_derive_change(args: DeriveChangeArgs) -> Result<(), CliError> {
    let config = resolve_job(args)?;
    execute(&config, ChangeDeriver)
}

pub(crate) fn run_merge_change(args: MergeChangeArgs) -> Result<(), CliError> {
    let config = resolve_job(args)?;
    let join = ChangeMerger::new(config.pipeline.conflict_resolution);
    execute(&config, join)
}

/// Wire reader, merge and writer stages for `config` and run them.
pub(crate) fn execute<J>(config: &JobConfig, join: J) -> Result<(), CliError>
where
    J: MergeJoin,
    J::Left: DeserializeOwned,
    J::Right: DeserializeOwned,
    J::Output: Serialize,
{
    let ports = config.ports;
    let left = open_input(&config.left, ports.left.field)?;
    let right = open_input(&config.right, ports.right.field)?;
    let (writer, output) = JsonLinesSink::<J::Output>::deferred(&config.output);

    let mut graph = GraphBuilder::new(OrderingRegistry::standard(), config.pipeline);
    graph
        .source_with(
            reader_stage(ports.left),
            ports.left.field,
            reader::<J::Left>(reader_stage(ports.left), config.left.clone(), left),
        )?
        .source_with(
            reader_stage(ports.right),
            ports.right.field,
            reader::<J::Right>(reader_stage(ports.right), config.right.clone(), right),
        )?
        .merge(
            ports.stage,
            join,
            [
                PipeRef::named(ports.left.field),
                PipeRef::named(ports.right.field),
            ],
            PipeRef::Default,
        )?
        .sink("write", PipeRef::Default, writer)?;
    let pipeline = graph.build()?;
    output.fill(
        create_utf8_file(&config.output).map_err(|source| CliError::CreateOutput {
            path: config.output.clone(),
            source,
        })?,
    );

    info!(
        "{}: {} + {} -> {}",
        ports.stage, config.left, config.right, config.output
    );
    pipeline.run()?;
    info!("{}: finished writing {}", ports.stage, config.output);
    Ok(())
}

fn reader_stage(port: Port) -> String {
    format!("read-{}", port.field)
}

fn reader<T>(
    stage: String,
    path: Utf8PathBuf,
    file: File,
) -> impl FnOnce(Box<dyn Sink<T>>) -> Box<dyn ActiveTask> + 'static
where
    T: DeserializeOwned + Send + 'static,
{
    move |sink: Box<dyn Sink<T>>| -> Box<dyn ActiveTask> {
        Box::new(JsonLinesSource::new(stage, &path, file, sink))
    }
}

fn open_input(path: &Utf8Path, field: &'static str) -> Result<File, CliError> {
    open_utf8_file(path).map_err(|source| CliError::OpenInput {
        field,
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
pub(crate) fn apply_change_config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<JobConfig, CliError> {
    let merged = ApplyChangeArgs::merge_from_layers(layers).map_err(CliError::from)?;
    JobConfig::try_from(merged)
}

#[cfg(test)]
pub(crate) fn merge_config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<JobConfig, CliError> {
    let merged = MergeArgs::merge_from_layers(layers).map_err(CliError::from)?;
    JobConfig::try_from(merged)
}
