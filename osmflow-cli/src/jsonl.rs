//! JSON Lines readers and writers for element and change streams.
//!
//! Each line holds one serialised `EntityContainer` or `ChangeContainer`.
//! Blank lines are skipped so hand-edited files with trailing newlines load.

use std::{
    io::{self, BufRead, BufReader, BufWriter, Lines, Write},
    marker::PhantomData,
    sync::Arc,
};

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::fs_utf8::File;
use log::debug;
use osmflow_pipeline::{ActiveTask, CancelToken, PipelineError, Sink};
use parking_lot::Mutex;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

/// Failures raised while streaming a JSON Lines file.
#[derive(Debug, Error)]
pub enum JsonLinesError {
    /// Reading a line failed.
    #[error("failed to read line {line} of {path:?}")]
    Read {
        path: Utf8PathBuf,
        line: usize,
        #[source]
        source: io::Error,
    },
    /// A line did not decode into the expected record.
    #[error("failed to decode line {line} of {path:?}")]
    Decode {
        path: Utf8PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    /// A record could not be encoded.
    #[error("failed to encode record for {path:?}")]
    Encode {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// Writing to the output failed.
    #[error("failed to write {path:?}")]
    Write {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    /// The sink was used before its output file was handed over.
    #[error("no output file was provided for {path:?}")]
    Unopened { path: Utf8PathBuf },
}

/// Active stage decoding one record per line into its output.
pub struct JsonLinesSource<T> {
    stage: String,
    path: Utf8PathBuf,
    lines: Lines<BufReader<File>>,
    output: Box<dyn Sink<T>>,
}

impl<T> JsonLinesSource<T>
where
    T: DeserializeOwned + Send + 'static,
{
    /// A source named `stage` reading the already opened `file`.
    pub fn new(
        stage: impl Into<String>,
        path: &Utf8Path,
        file: File,
        output: Box<dyn Sink<T>>,
    ) -> Self {
        Self {
            stage: stage.into(),
            path: path.to_path_buf(),
            lines: BufReader::new(file).lines(),
            output,
        }
    }

    fn feed(&mut self, cancel: &CancelToken) -> Result<usize, PipelineError> {
        let mut count = 0_usize;
        for (index, line) in self.lines.by_ref().enumerate() {
            cancel.check(&self.stage)?;
            let number = index + 1;
            let text = line.map_err(|source| {
                PipelineError::stage(
                    self.stage.as_str(),
                    JsonLinesError::Read {
                        path: self.path.clone(),
                        line: number,
                        source,
                    },
                )
            })?;
            if text.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(&text).map_err(|source| {
                PipelineError::stage(
                    self.stage.as_str(),
                    JsonLinesError::Decode {
                        path: self.path.clone(),
                        line: number,
                        source,
                    },
                )
            })?;
            self.output.process(record)?;
            count += 1;
        }
        self.output.complete()?;
        Ok(count)
    }
}

impl<T> ActiveTask for JsonLinesSource<T>
where
    T: DeserializeOwned + Send + 'static,
{
    fn name(&self) -> &str {
        &self.stage
    }

    fn run(mut self: Box<Self>, cancel: &CancelToken) -> Result<(), PipelineError> {
        let outcome = self.feed(cancel);
        self.output.release();
        let count = outcome?;
        debug!("read {count} record(s) from {}", self.path);
        Ok(())
    }
}

/// Hands a [`JsonLinesSink`] its file once the pipeline around it is built.
#[derive(Debug, Clone, Default)]
pub struct OutputSlot(Arc<Mutex<Option<File>>>);

impl OutputSlot {
    /// Give the sink the file it writes to.
    pub fn fill(&self, file: File) {
        *self.0.lock() = Some(file);
    }

    fn take(&self) -> Option<File> {
        self.0.lock().take()
    }
}

/// Terminal stage writing one record per line.
///
/// The output is flushed on `complete`; records written before a failure
/// elsewhere in the pipeline may be left behind in a partial file.
pub struct JsonLinesSink<T> {
    path: Utf8PathBuf,
    slot: OutputSlot,
    out: Option<BufWriter<File>>,
    written: usize,
    item: PhantomData<fn(T)>,
}

impl<T: Serialize> JsonLinesSink<T> {
    /// A sink writing to the already created `file`.
    pub fn new(path: &Utf8Path, file: File) -> Self {
        let (sink, slot) = Self::deferred(path);
        slot.fill(file);
        sink
    }

    /// A sink whose file arrives later through the returned slot.
    ///
    /// Lets a caller wire and validate a pipeline before creating (and
    /// truncating) its output.
    pub fn deferred(path: &Utf8Path) -> (Self, OutputSlot) {
        let slot = OutputSlot::default();
        let sink = Self {
            path: path.to_path_buf(),
            slot: slot.clone(),
            out: None,
            written: 0,
            item: PhantomData,
        };
        (sink, slot)
    }
}

fn write_failure(error: JsonLinesError) -> PipelineError {
    PipelineError::stage("write", error)
}

fn open_writer<'a>(
    path: &Utf8Path,
    slot: &OutputSlot,
    out: &'a mut Option<BufWriter<File>>,
) -> Result<&'a mut BufWriter<File>, PipelineError> {
    let unopened = || {
        write_failure(JsonLinesError::Unopened {
            path: path.to_path_buf(),
        })
    };
    if out.is_none() {
        let file = slot.take().ok_or_else(unopened)?;
        *out = Some(BufWriter::new(file));
    }
    out.as_mut().ok_or_else(unopened)
}

impl<T: Serialize> Sink<T> for JsonLinesSink<T> {
    fn process(&mut self, item: T) -> Result<(), PipelineError> {
        let Self {
            path,
            slot,
            out,
            written,
            ..
        } = self;
        let out = open_writer(path, slot, out)?;
        serde_json::to_writer(&mut *out, &item).map_err(|source| {
            write_failure(JsonLinesError::Encode {
                path: path.clone(),
                source,
            })
        })?;
        out.write_all(b"\n").map_err(|source| {
            write_failure(JsonLinesError::Write {
                path: path.clone(),
                source,
            })
        })?;
        *written += 1;
        Ok(())
    }

    fn complete(&mut self) -> Result<(), PipelineError> {
        let out = open_writer(&self.path, &self.slot, &mut self.out)?;
        out.flush().map_err(|source| {
            write_failure(JsonLinesError::Write {
                path: self.path.clone(),
                source,
            })
        })?;
        debug!("wrote {} record(s) to {}", self.written, self.path);
        Ok(())
    }

    fn release(&mut self) {}
}
