//! Append-only Parquet event log
//!
//! **Append-only write pattern**:
//! - Events are buffered and written as immutable segments
//!   `events-<seq>.parquet`; a segment is never rewritten
//! - A segment is written under a temporary name and renamed into place, so
//!   readers only ever see complete segments
//! - Loading reads every segment in sequence order into a
//!   [`MemoryEventStore`] snapshot; later writes are not observed until the
//!   run is loaded again
//!
//! Segment schema:
//!
//! ```text
//! category  Utf8     plugin label
//! tag       Utf8
//! step      UInt64
//! wall_time Int64    microseconds since the Unix epoch
//! kind      Utf8     scalar | image | tensor
//! scalar    Float64  nullable, set for scalar events
//! payload   Binary   nullable, MessagePack body for image and tensor events
//! ```

use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, BinaryArray, Float64Array, Int64Array, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use chrono::DateTime;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use tracing::{debug, error, info, warn};

use super::{EventWriter, MemoryEventStore};
use crate::config::TelemetryConfig;
use crate::event::{Event, Payload, PayloadKind};
use crate::taxonomy::Category;
use crate::{Error, Result};

/// File name prefix of every segment.
pub const SEGMENT_PREFIX: &str = "events-";

const SEGMENT_EXTENSION: &str = ".parquet";
const PARTIAL_EXTENSION: &str = ".partial";

/// Event log persisted as Parquet segments in one run directory.
///
/// # Example
///
/// ```rust,no_run
/// use drlvis::event::{Event, Payload};
/// use drlvis::store::{EventWriter, ParquetEventLog};
/// use drlvis::taxonomy::Category;
///
/// # fn main() -> drlvis::Result<()> {
/// let mut log = ParquetEventLog::open("runs/cartpole")?;
/// log.put(Event::new(Category::Scalars, "episode-rewards", 0, Payload::Scalar(12.0)))?;
/// log.flush()?;
///
/// let snapshot = ParquetEventLog::load_snapshot("runs/cartpole")?;
/// assert_eq!(snapshot.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ParquetEventLog {
    dir: PathBuf,
    buffer: Vec<Event>,
    flush_threshold: usize,
    next_segment: u64,
}

impl ParquetEventLog {
    /// Open (creating if needed) the run directory named by the config.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the directory cannot be created or listed.
    pub fn create(config: &TelemetryConfig) -> Result<Self> {
        let dir = config.log_dir().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| {
            Error::StoreUnavailable(format!("cannot create {}: {e}", dir.display()))
        })?;

        let next_segment = segment_paths(&dir)?
            .last()
            .map_or(0, |(seq, _)| seq + 1);

        debug!(dir = %dir.display(), next_segment, "opened event log");
        Ok(Self {
            dir,
            buffer: Vec::new(),
            flush_threshold: config.flush_threshold().max(1),
            next_segment,
        })
    }

    /// Open a run directory with default settings.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the directory cannot be created or listed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        Self::create(&TelemetryConfig::builder(dir.as_ref()).build())
    }

    /// Run directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Events waiting for the next segment.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Load every segment of a run into an immutable snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the directory is missing or a segment
    /// cannot be read.
    pub fn load_snapshot(dir: impl AsRef<Path>) -> Result<MemoryEventStore> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(Error::StoreUnavailable(format!(
                "{} is not a directory",
                dir.display()
            )));
        }

        let segments = segment_paths(dir)?;
        if segments.is_empty() {
            warn!(dir = %dir.display(), "run directory holds no event segments");
        }

        let store = MemoryEventStore::new();
        for (_, path) in &segments {
            for event in read_segment(path)? {
                store.insert(event);
            }
        }

        info!(
            dir = %dir.display(),
            segments = segments.len(),
            events = store.len(),
            "loaded run snapshot"
        );
        Ok(store)
    }

    fn write_segment(&mut self) -> Result<()> {
        let batch = events_to_batch(&self.buffer)?;
        let name = format!("{SEGMENT_PREFIX}{:06}{SEGMENT_EXTENSION}", self.next_segment);
        let path = self.dir.join(&name);
        let partial = self.dir.join(format!("{name}{PARTIAL_EXTENSION}"));

        let written = write_partial(&partial, &batch)
            .and_then(|()| fs::rename(&partial, &path).map_err(Error::from));
        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(&partial) {
                if cleanup.kind() != io::ErrorKind::NotFound {
                    warn!(
                        segment = %partial.display(),
                        error = %cleanup,
                        "left partial segment behind"
                    );
                }
            }
            return Err(e);
        }

        debug!(segment = %path.display(), events = batch.num_rows(), "wrote event segment");
        self.next_segment += 1;
        self.buffer.clear();
        Ok(())
    }
}

fn write_partial(path: &Path, batch: &RecordBatch) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

impl EventWriter for ParquetEventLog {
    /// Buffer an event, writing a segment once the threshold is reached.
    ///
    /// If that write fails the event is not kept, so retrying the same
    /// `put` cannot persist it twice.
    fn put(&mut self, event: Event) -> Result<()> {
        self.buffer.push(event);
        if self.buffer.len() >= self.flush_threshold {
            if let Err(e) = self.write_segment() {
                self.buffer.pop();
                return Err(e);
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.write_segment()
    }
}

impl Drop for ParquetEventLog {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            error!(
                dir = %self.dir.display(),
                lost = self.buffer.len(),
                error = %e,
                "failed to flush event log on drop"
            );
        }
    }
}

fn segment_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("category", DataType::Utf8, false),
        Field::new("tag", DataType::Utf8, false),
        Field::new("step", DataType::UInt64, false),
        Field::new("wall_time", DataType::Int64, false),
        Field::new("kind", DataType::Utf8, false),
        Field::new("scalar", DataType::Float64, true),
        Field::new("payload", DataType::Binary, true),
    ]))
}

/// Sorted `(sequence, path)` of the complete segments in `dir`.
fn segment_paths(dir: &Path) -> Result<Vec<(u64, PathBuf)>> {
    let entries = fs::read_dir(dir).map_err(|e| {
        Error::StoreUnavailable(format!("cannot list {}: {e}", dir.display()))
    })?;

    let mut segments = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let seq = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.strip_prefix(SEGMENT_PREFIX))
            .and_then(|rest| rest.strip_suffix(SEGMENT_EXTENSION))
            .and_then(|digits| digits.parse::<u64>().ok());
        if let Some(seq) = seq {
            segments.push((seq, path));
        }
    }
    segments.sort_by_key(|(seq, _)| *seq);
    Ok(segments)
}

fn events_to_batch(events: &[Event]) -> Result<RecordBatch> {
    let bodies = events
        .iter()
        .map(|event| match event.payload() {
            Payload::Scalar(_) => Ok(None),
            Payload::Image(image) => rmp_serde::to_vec_named(image).map(Some),
            Payload::Tensor(tensor) => rmp_serde::to_vec_named(tensor).map(Some),
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let categories = StringArray::from_iter_values(events.iter().map(|e| e.category().as_str()));
    let tags = StringArray::from_iter_values(events.iter().map(Event::tag));
    let steps = UInt64Array::from_iter_values(events.iter().map(Event::step));
    let wall_times =
        Int64Array::from_iter_values(events.iter().map(|e| e.wall_time().timestamp_micros()));
    let kinds = StringArray::from_iter_values(events.iter().map(|e| e.payload().kind().as_str()));
    let scalars: Float64Array = events.iter().map(|e| e.payload().as_scalar()).collect();
    let payloads: BinaryArray = bodies.iter().map(Option::as_deref).collect();

    Ok(RecordBatch::try_new(
        segment_schema(),
        vec![
            Arc::new(categories),
            Arc::new(tags),
            Arc::new(steps),
            Arc::new(wall_times),
            Arc::new(kinds),
            Arc::new(scalars),
            Arc::new(payloads),
        ],
    )?)
}

fn read_segment(path: &Path) -> Result<Vec<Event>> {
    let file = File::open(path).map_err(|e| unavailable(path, e))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .and_then(|builder| builder.build())
        .map_err(|e| unavailable(path, e))?;

    let mut events = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| unavailable(path, e))?;
        events.extend(batch_to_events(&batch).map_err(|e| unavailable(path, e))?);
    }
    Ok(events)
}

fn unavailable(path: &Path, e: impl fmt::Display) -> Error {
    Error::StoreUnavailable(format!("segment {}: {e}", path.display()))
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|array| array.as_any().downcast_ref::<T>())
        .ok_or_else(|| Error::StorageError(format!("segment column '{name}' is missing or mistyped")))
}

fn batch_to_events(batch: &RecordBatch) -> Result<Vec<Event>> {
    let categories = column::<StringArray>(batch, "category")?;
    let tags = column::<StringArray>(batch, "tag")?;
    let steps = column::<UInt64Array>(batch, "step")?;
    let wall_times = column::<Int64Array>(batch, "wall_time")?;
    let kinds = column::<StringArray>(batch, "kind")?;
    let scalars = column::<Float64Array>(batch, "scalar")?;
    let payloads = column::<BinaryArray>(batch, "payload")?;

    (0..batch.num_rows())
        .map(|row| {
            let kind = PayloadKind::from_label(kinds.value(row)).ok_or_else(|| {
                Error::StorageError(format!("unknown payload kind '{}'", kinds.value(row)))
            })?;
            let body = || {
                if payloads.is_null(row) {
                    Err(Error::StorageError(format!("row {row} has no payload body")))
                } else {
                    Ok(payloads.value(row))
                }
            };
            let payload = match kind {
                PayloadKind::Scalar if scalars.is_null(row) => {
                    return Err(Error::StorageError(format!("row {row} has no scalar value")));
                }
                PayloadKind::Scalar => Payload::Scalar(scalars.value(row)),
                PayloadKind::Image => Payload::Image(rmp_serde::from_slice(body()?)?),
                PayloadKind::Tensor => Payload::Tensor(rmp_serde::from_slice(body()?)?),
            };
            let wall_time = DateTime::from_timestamp_micros(wall_times.value(row))
                .ok_or_else(|| Error::StorageError(format!("row {row} has an invalid wall time")))?;

            Ok(Event::builder(
                Category::from_label(categories.value(row)),
                tags.value(row),
                steps.value(row),
                payload,
            )
            .wall_time(wall_time)
            .build())
        })
        .collect()
}
