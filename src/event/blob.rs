//! Blob sequence view of image events

use std::fmt;

use chrono::{DateTime, Utc};

use super::IMAGE_FIELD_INDEX;
use crate::taxonomy::Category;

/// Address of one blob field inside the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobKey {
    /// Category of the image event
    pub category: Category,
    /// Tag of the image event
    pub tag: String,
    /// Step of the image event
    pub step: u64,
    /// Position of the event in its step-ordered series; tells apart
    /// image events logged at the same step
    pub sequence: usize,
    /// Field position within the step
    pub index: usize,
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}#{}/{}",
            self.category, self.tag, self.step, self.sequence, self.index
        )
    }
}

/// Meaning of a blob field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlobField {
    /// ASCII width
    Width,
    /// ASCII height
    Height,
    /// Encoded image bytes
    Image,
}

impl BlobField {
    /// Field meaning for a position.
    #[must_use]
    pub const fn at(index: usize) -> Self {
        match index {
            0 => Self::Width,
            1 => Self::Height,
            _ => Self::Image,
        }
    }
}

/// Reference to one blob field; fetch the bytes with `EventReader::read_blob`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobReference {
    /// Where the blob lives
    pub key: BlobKey,
    /// What the blob holds
    pub field: BlobField,
}

/// The blob fields logged at one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobSequence {
    /// Step
    pub step: u64,
    /// Wall time of the image event
    pub wall_time: DateTime<Utc>,
    /// Fields in order: width, height, images...
    pub values: Vec<BlobReference>,
}

impl BlobSequence {
    /// Reference to the first image field.
    #[must_use]
    pub fn image(&self) -> Option<&BlobReference> {
        self.values.get(IMAGE_FIELD_INDEX)
    }
}
