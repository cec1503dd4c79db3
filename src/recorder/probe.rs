//! Confidence probe input

use crate::event::Frame;

/// Sampled states of one confidence probe.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeStates {
    /// One feature vector per state
    Features(Vec<Vec<f64>>),
    /// One frame per state; logged as probe frames and flattened for the
    /// projection
    Frames(Vec<Frame>),
}

impl ProbeStates {
    /// Number of sampled states.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Features(rows) => rows.len(),
            Self::Frames(frames) => frames.len(),
        }
    }

    /// Check if no states were sampled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One confidence probe taken at the end of an episode.
///
/// # Example
///
/// ```rust
/// use drlvis::recorder::{ExperimentProbe, ProbeStates};
///
/// let probe = ExperimentProbe::builder(
///     5,
///     ProbeStates::Features(vec![vec![0.1, 0.2], vec![0.3, -0.4]]),
///     vec![vec![0.9, 0.1], vec![0.4, 0.6]],
/// )
/// .bounds(vec![-1.0, -1.0], vec![1.0, 1.0])
/// .build();
///
/// assert_eq!(probe.episode(), 5);
/// assert!(!probe.apply_softmax());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentProbe {
    episode: u64,
    states: ProbeStates,
    predictions: Vec<Vec<f64>>,
    min_state: Vec<f64>,
    max_state: Vec<f64>,
    apply_softmax: bool,
}

impl ExperimentProbe {
    /// Create a builder with the required fields.
    #[must_use]
    pub fn builder(
        episode: u64,
        states: ProbeStates,
        predictions: Vec<Vec<f64>>,
    ) -> ExperimentProbeBuilder {
        ExperimentProbeBuilder::new(episode, states, predictions)
    }

    /// Episode the probe was taken at.
    #[must_use]
    pub const fn episode(&self) -> u64 {
        self.episode
    }

    /// Sampled states.
    #[must_use]
    pub const fn states(&self) -> &ProbeStates {
        &self.states
    }

    /// Predicted distribution (or logits) per state.
    #[must_use]
    pub fn predictions(&self) -> &[Vec<f64>] {
        &self.predictions
    }

    /// Per-dimension observation minimum.
    #[must_use]
    pub fn min_state(&self) -> &[f64] {
        &self.min_state
    }

    /// Per-dimension observation maximum.
    #[must_use]
    pub fn max_state(&self) -> &[f64] {
        &self.max_state
    }

    /// Whether predictions are logits.
    #[must_use]
    pub const fn apply_softmax(&self) -> bool {
        self.apply_softmax
    }
}

/// Builder for `ExperimentProbe`.
#[derive(Debug)]
pub struct ExperimentProbeBuilder {
    episode: u64,
    states: ProbeStates,
    predictions: Vec<Vec<f64>>,
    min_state: Vec<f64>,
    max_state: Vec<f64>,
    apply_softmax: bool,
}

impl ExperimentProbeBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub const fn new(episode: u64, states: ProbeStates, predictions: Vec<Vec<f64>>) -> Self {
        Self {
            episode,
            states,
            predictions,
            min_state: Vec::new(),
            max_state: Vec::new(),
            apply_softmax: false,
        }
    }

    /// Set the observation bounds.
    #[must_use]
    pub fn bounds(mut self, min_state: Vec<f64>, max_state: Vec<f64>) -> Self {
        self.min_state = min_state;
        self.max_state = max_state;
        self
    }

    /// Treat predictions as logits.
    #[must_use]
    pub const fn apply_softmax(mut self, apply_softmax: bool) -> Self {
        self.apply_softmax = apply_softmax;
        self
    }

    /// Build the `ExperimentProbe`.
    #[must_use]
    pub fn build(self) -> ExperimentProbe {
        ExperimentProbe {
            episode: self.episode,
            states: self.states,
            predictions: self.predictions,
            min_state: self.min_state,
            max_state: self.max_state,
            apply_softmax: self.apply_softmax,
        }
    }
}
