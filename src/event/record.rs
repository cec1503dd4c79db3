//! Event Record - one immutable write to the log

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use super::ImagePayload;
use crate::taxonomy::Category;
use crate::tensor::Tensor;

/// Body of an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    /// Single float
    Scalar(f64),
    /// PNG-encoded frames of one shape
    Image(ImagePayload),
    /// Dense tensor
    Tensor(Tensor),
}

/// Discriminant of a [`Payload`], as stored in the `kind` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    /// `scalar`
    Scalar,
    /// `image`
    Image,
    /// `tensor`
    Tensor,
}

impl PayloadKind {
    /// Stored label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::Image => "image",
            Self::Tensor => "tensor",
        }
    }

    /// Parse a stored label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "scalar" => Some(Self::Scalar),
            "image" => Some(Self::Image),
            "tensor" => Some(Self::Tensor),
            _ => None,
        }
    }
}

impl Payload {
    /// Kind of this payload.
    #[must_use]
    pub const fn kind(&self) -> PayloadKind {
        match self {
            Self::Scalar(_) => PayloadKind::Scalar,
            Self::Image(_) => PayloadKind::Image,
            Self::Tensor(_) => PayloadKind::Tensor,
        }
    }

    /// Scalar value, if any.
    #[must_use]
    pub const fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(value) => Some(*value),
            _ => None,
        }
    }

    /// Tensor body, if any.
    #[must_use]
    pub const fn as_tensor(&self) -> Option<&Tensor> {
        match self {
            Self::Tensor(tensor) => Some(tensor),
            _ => None,
        }
    }

    /// Image body, if any.
    #[must_use]
    pub const fn as_image(&self) -> Option<&ImagePayload> {
        match self {
            Self::Image(image) => Some(image),
            _ => None,
        }
    }
}

/// Event Record represents one write to the telemetry log.
///
/// Events are partitioned by `category` + `tag` and ordered by `step`.
/// `wall_time` records when the event was produced and is kept for
/// correlating series; it never participates in ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    category: Category,
    tag: String,
    step: u64,
    payload: Payload,
    wall_time: DateTime<Utc>,
}

impl Event {
    /// Create a new event stamped with the current time (microsecond
    /// resolution).
    ///
    /// # Arguments
    ///
    /// * `category` - Plugin label
    /// * `tag` - Tag string, normally produced by [`crate::taxonomy::Tag::name`]
    /// * `step` - Episode, timestep or 0 depending on the tag's scope
    /// * `payload` - Event body
    #[must_use]
    pub fn new(category: Category, tag: impl Into<String>, step: u64, payload: Payload) -> Self {
        Self {
            category,
            tag: tag.into(),
            step,
            payload,
            wall_time: now(),
        }
    }

    /// Create a builder for constructing an event with optional fields.
    #[must_use]
    pub fn builder(
        category: Category,
        tag: impl Into<String>,
        step: u64,
        payload: Payload,
    ) -> EventBuilder {
        EventBuilder::new(category, tag, step, payload)
    }

    /// Get the category.
    #[must_use]
    pub const fn category(&self) -> &Category {
        &self.category
    }

    /// Get the tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Get the step.
    #[must_use]
    pub const fn step(&self) -> u64 {
        self.step
    }

    /// Get the payload.
    #[must_use]
    pub const fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Get the wall-clock time the event was produced.
    #[must_use]
    pub const fn wall_time(&self) -> DateTime<Utc> {
        self.wall_time
    }
}

/// Builder for `Event`.
#[derive(Debug)]
pub struct EventBuilder {
    category: Category,
    tag: String,
    step: u64,
    payload: Payload,
    wall_time: DateTime<Utc>,
}

impl EventBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(category: Category, tag: impl Into<String>, step: u64, payload: Payload) -> Self {
        Self {
            category,
            tag: tag.into(),
            step,
            payload,
            wall_time: now(),
        }
    }

    /// Set a custom wall time (used when replaying stored segments).
    #[must_use]
    pub const fn wall_time(mut self, wall_time: DateTime<Utc>) -> Self {
        self.wall_time = wall_time;
        self
    }

    /// Build the `Event`.
    #[must_use]
    pub fn build(self) -> Event {
        Event {
            category: self.category,
            tag: self.tag,
            step: self.step,
            payload: self.payload,
            wall_time: self.wall_time,
        }
    }
}

/// Current time at the resolution segments store (microseconds).
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// One point of a scalar series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalarPoint {
    /// Step
    pub step: u64,
    /// Value
    pub value: f64,
}

/// One point of a tensor series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorPoint {
    /// Step
    pub step: u64,
    /// Tensor logged at this step
    pub tensor: Tensor,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_new() {
        let event = Event::new(Category::Scalars, "loss", 4, Payload::Scalar(0.5));
        assert_eq!(event.category(), &Category::Scalars);
        assert_eq!(event.tag(), "loss");
        assert_eq!(event.step(), 4);
        assert_eq!(event.payload().kind(), PayloadKind::Scalar);
        assert!(event.wall_time().timestamp() > 0);
    }

    #[test]
    fn test_builder_wall_time() {
        let then = DateTime::from_timestamp(1_600_000_000, 0).unwrap();
        let event = Event::builder(Category::Weights, "weights-episode-0", 0, Payload::Scalar(1.0))
            .wall_time(then)
            .build();
        assert_eq!(event.wall_time(), then);
    }

    #[test]
    fn test_payload_kind_labels() {
        for kind in [PayloadKind::Scalar, PayloadKind::Image, PayloadKind::Tensor] {
            assert_eq!(PayloadKind::from_label(kind.as_str()), Some(kind));
        }
        assert_eq!(PayloadKind::from_label("histogram"), None);
    }
}
