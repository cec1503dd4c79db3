//! In-memory event store using `DashMap`.
//!
//! Used directly by tests and short-lived tools, and as the loaded snapshot
//! of a persisted run (see `ParquetEventLog::load_snapshot`).

use std::collections::BTreeSet;

use dashmap::DashMap;

use super::{EventReader, EventWriter};
use crate::event::{
    BlobField, BlobKey, BlobReference, BlobSequence, Event, ScalarPoint, TensorPoint,
};
use crate::taxonomy::Category;
use crate::{Error, Result};

type SeriesKey = (Category, String);

/// In-memory event store indexed by `(category, tag)`.
///
/// Thread-safe: readers can share it behind an `Arc` while it is loaded.
///
/// # Example
///
/// ```rust
/// use drlvis::event::{Event, Payload};
/// use drlvis::store::{EventReader, EventWriter, MemoryEventStore};
/// use drlvis::taxonomy::Category;
///
/// # fn main() -> drlvis::Result<()> {
/// let mut store = MemoryEventStore::new();
/// store.put(Event::new(Category::Scalars, "episode-rewards", 0, Payload::Scalar(1.0)))?;
/// assert!(store.list_tags(&Category::Scalars)?.contains("episode-rewards"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    series: DashMap<SeriesKey, Vec<Event>>,
}

impl MemoryEventStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.series.iter().map(|entry| entry.value().len()).sum()
    }

    /// Check if the store holds no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Number of distinct `(category, tag)` series.
    #[must_use]
    pub fn series_count(&self) -> usize {
        self.series.len()
    }

    /// Append an event through a shared reference.
    pub fn insert(&self, event: Event) {
        let key = (event.category().clone(), event.tag().to_string());
        self.series.entry(key).or_default().push(event);
    }

    /// Events of one series, ordered by step (stable for equal steps).
    ///
    /// # Errors
    ///
    /// `NotFound` if the series does not exist.
    pub fn series(&self, category: &Category, tag: &str) -> Result<Vec<Event>> {
        let entry = self
            .series
            .get(&(category.clone(), tag.to_string()))
            .ok_or_else(|| not_found(category, tag))?;
        let mut events = entry.value().clone();
        events.sort_by_key(Event::step);
        Ok(events)
    }
}

fn not_found(category: &Category, tag: &str) -> Error {
    Error::NotFound {
        category: category.clone(),
        tag: tag.to_string(),
    }
}

impl EventWriter for MemoryEventStore {
    fn put(&mut self, event: Event) -> Result<()> {
        self.insert(event);
        Ok(())
    }
}

impl EventReader for MemoryEventStore {
    fn list_tags(&self, category: &Category) -> Result<BTreeSet<String>> {
        let tags: BTreeSet<String> = self
            .series
            .iter()
            .filter(|entry| &entry.key().0 == category)
            .map(|entry| entry.key().1.clone())
            .collect();
        if tags.is_empty() {
            return Err(not_found(category, "*"));
        }
        Ok(tags)
    }

    fn list_categories(&self) -> Result<BTreeSet<Category>> {
        Ok(self
            .series
            .iter()
            .map(|entry| entry.key().0.clone())
            .collect())
    }

    fn read_scalars(&self, tag: &str) -> Result<Vec<ScalarPoint>> {
        let points: Vec<ScalarPoint> = self
            .series(&Category::Scalars, tag)?
            .iter()
            .filter_map(|event| {
                event.payload().as_scalar().map(|value| ScalarPoint {
                    step: event.step(),
                    value,
                })
            })
            .collect();
        if points.is_empty() {
            return Err(not_found(&Category::Scalars, tag));
        }
        Ok(points)
    }

    fn read_tensors(&self, category: &Category, tag: &str) -> Result<Vec<TensorPoint>> {
        let points: Vec<TensorPoint> = self
            .series(category, tag)?
            .into_iter()
            .filter_map(|event| {
                let step = event.step();
                event.payload().as_tensor().cloned().map(|tensor| TensorPoint { step, tensor })
            })
            .collect();
        if points.is_empty() {
            return Err(not_found(category, tag));
        }
        Ok(points)
    }

    fn read_blob_sequences(&self, category: &Category, tag: &str) -> Result<Vec<BlobSequence>> {
        let sequences: Vec<BlobSequence> = self
            .series(category, tag)?
            .iter()
            .enumerate()
            .filter_map(|(sequence, event)| {
                let image = event.payload().as_image()?;
                let values = (0..image.field_count())
                    .map(|index| BlobReference {
                        key: BlobKey {
                            category: category.clone(),
                            tag: tag.to_string(),
                            step: event.step(),
                            sequence,
                            index,
                        },
                        field: BlobField::at(index),
                    })
                    .collect();
                Some(BlobSequence {
                    step: event.step(),
                    wall_time: event.wall_time(),
                    values,
                })
            })
            .collect();
        if sequences.is_empty() {
            return Err(not_found(category, tag));
        }
        Ok(sequences)
    }

    fn read_blob(&self, key: &BlobKey) -> Result<Vec<u8>> {
        self.series(&key.category, &key.tag)?
            .get(key.sequence)
            .filter(|event| event.step() == key.step)
            .and_then(|event| event.payload().as_image()?.field(key.index))
            .ok_or_else(|| not_found(&key.category, &key.to_string()))
    }
}
