//! Test helpers for writing JSON Lines fixtures and resolving commands
//! without consulting the process environment.

use super::*;
use crate::commands::JobConfig;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Serialize, de::DeserializeOwned};
use std::fs;
use tempfile::TempDir;

/// A temporary directory addressed with UTF-8 paths.
#[derive(Debug)]
pub(super) struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root =
            Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace path");
        Self { _dir: dir, root }
    }

    pub(super) fn path(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }
}

pub(super) fn write_jsonl<T: Serialize>(path: &Utf8Path, records: &[T]) {
    let mut contents = String::new();
    for record in records {
        contents.push_str(&serde_json::to_string(record).expect("encode record"));
        contents.push('\n');
    }
    fs::write(path, contents).expect("write JSON Lines fixture");
}

pub(super) fn read_jsonl<T: DeserializeOwned>(path: &Utf8Path) -> Vec<T> {
    fs::read_to_string(path)
        .expect("read JSON Lines output")
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("decode record"))
        .collect()
}

/// Parse `argv`, resolve the job from CLI values alone, and check inputs.
pub(super) fn parse_job(argv: &[&str]) -> Result<(Command, JobConfig), CliError> {
    let cli = Cli::try_parse_from(argv).map_err(CliError::ArgumentParsing)?;
    let config = match cli.command.clone() {
        Command::ApplyChange(args) => JobConfig::try_from(args),
        Command::Merge(args) => JobConfig::try_from(args),
        Command::DeriveChange(args) => JobConfig::try_from(args),
        Command::MergeChange(args) => JobConfig::try_from(args),
    }?;
    config.validate_sources()?;
    Ok((cli.command, config))
}

/// Run a parsed command against its resolved job.
pub(super) fn run_job(command: &Command, config: &JobConfig) -> Result<(), CliError> {
    use osmflow_pipeline::{ChangeApplier, ChangeDeriver, ChangeMerger, EntityMerger};

    let method = config.pipeline.conflict_resolution;
    match command {
        Command::ApplyChange(_) => commands::execute(config, ChangeApplier),
        Command::Merge(_) => commands::execute(config, EntityMerger::new(method)),
        Command::DeriveChange(_) => commands::execute(config, ChangeDeriver),
        Command::MergeChange(_) => commands::execute(config, ChangeMerger::new(method)),
    }
}

/// Parse and run `argv` end to end.
pub(super) fn invoke(argv: &[&str]) -> Result<(), CliError> {
    let (command, config) = parse_job(argv)?;
    run_job(&command, &config)
}
