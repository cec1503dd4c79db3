//! Event store interface
//!
//! The write path and the read path only see these two traits:
//! - [`EventWriter`]: single-producer append
//! - [`EventReader`]: lookups over an immutable snapshot of one run
//!
//! Backends:
//! - [`MemoryEventStore`]: `DashMap`-indexed events, also the loaded form of
//!   a persisted run
//! - [`ParquetEventLog`]: append-only Parquet segments in a run directory
//!
//! # Example
//!
//! ```rust
//! use drlvis::event::{Event, Payload};
//! use drlvis::store::{EventReader, EventWriter, MemoryEventStore};
//! use drlvis::taxonomy::Category;
//!
//! # fn main() -> drlvis::Result<()> {
//! let mut store = MemoryEventStore::new();
//! store.put(Event::new(Category::Scalars, "loss", 1, Payload::Scalar(0.4)))?;
//! store.put(Event::new(Category::Scalars, "loss", 0, Payload::Scalar(0.9)))?;
//!
//! let series = store.read_scalars("loss")?;
//! assert_eq!(series[0].step, 0);
//! # Ok(())
//! # }
//! ```

mod memory;
mod segments;

pub use memory::MemoryEventStore;
pub use segments::{ParquetEventLog, SEGMENT_PREFIX};

use std::collections::BTreeSet;

use crate::event::{BlobKey, BlobSequence, Event, ScalarPoint, TensorPoint};
use crate::taxonomy::Category;
use crate::Result;

/// Append side of the store.
pub trait EventWriter {
    /// Append one event.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot accept the write.
    fn put(&mut self, event: Event) -> Result<()>;

    /// Make buffered events durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot persist the buffer.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<W: EventWriter + ?Sized> EventWriter for &mut W {
    fn put(&mut self, event: Event) -> Result<()> {
        (**self).put(event)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// Read side of the store.
///
/// Absent tags and categories are reported as `Error::NotFound`; callers
/// decide whether that is fatal. Series come back ordered by step, with
/// equal steps kept in write order.
pub trait EventReader: Send + Sync {
    /// Tags written under a category.
    ///
    /// # Errors
    ///
    /// `NotFound` if nothing was written under the category.
    fn list_tags(&self, category: &Category) -> Result<BTreeSet<String>>;

    /// Every category that holds at least one event.
    ///
    /// # Errors
    ///
    /// Backend failures only.
    fn list_categories(&self) -> Result<BTreeSet<Category>>;

    /// Scalar series for a tag in the `scalars` category.
    ///
    /// # Errors
    ///
    /// `NotFound` if the tag holds no scalars.
    fn read_scalars(&self, tag: &str) -> Result<Vec<ScalarPoint>>;

    /// Tensor series for a tag.
    ///
    /// # Errors
    ///
    /// `NotFound` if the tag holds no tensors.
    fn read_tensors(&self, category: &Category, tag: &str) -> Result<Vec<TensorPoint>>;

    /// Blob sequences for an image tag.
    ///
    /// # Errors
    ///
    /// `NotFound` if the tag holds no images.
    fn read_blob_sequences(&self, category: &Category, tag: &str) -> Result<Vec<BlobSequence>>;

    /// Bytes of one blob.
    ///
    /// # Errors
    ///
    /// `NotFound` if the key does not resolve.
    fn read_blob(&self, key: &BlobKey) -> Result<Vec<u8>>;
}

impl<R: EventReader + ?Sized> EventReader for std::sync::Arc<R> {
    fn list_tags(&self, category: &Category) -> Result<BTreeSet<String>> {
        (**self).list_tags(category)
    }

    fn list_categories(&self) -> Result<BTreeSet<Category>> {
        (**self).list_categories()
    }

    fn read_scalars(&self, tag: &str) -> Result<Vec<ScalarPoint>> {
        (**self).read_scalars(tag)
    }

    fn read_tensors(&self, category: &Category, tag: &str) -> Result<Vec<TensorPoint>> {
        (**self).read_tensors(category, tag)
    }

    fn read_blob_sequences(&self, category: &Category, tag: &str) -> Result<Vec<BlobSequence>> {
        (**self).read_blob_sequences(category, tag)
    }

    fn read_blob(&self, key: &BlobKey) -> Result<Vec<u8>> {
        (**self).read_blob(key)
    }
}
