//! Event schema
//!
//! An event is one immutable `(category, tag, step, payload)` write.
//!
//! ```text
//! Event ──┬── Payload::Scalar(f64)
//!         ├── Payload::Image(ImagePayload)  → read back as a BlobSequence
//!         └── Payload::Tensor(Tensor)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use drlvis::event::{Event, Payload};
//! use drlvis::taxonomy::{Category, EPISODE_REWARDS};
//!
//! let event = Event::new(Category::Scalars, EPISODE_REWARDS, 3, Payload::Scalar(21.0));
//! assert_eq!(event.step(), 3);
//! assert_eq!(event.payload().as_scalar(), Some(21.0));
//! ```

mod blob;
mod frame;
mod record;

pub use blob::{BlobField, BlobKey, BlobReference, BlobSequence};
pub use frame::{Frame, ImagePayload, IMAGE_FIELD_INDEX, MAX_IMAGE_OUTPUTS};
pub use record::{Event, EventBuilder, Payload, PayloadKind, ScalarPoint, TensorPoint};
