//! Write path: one operation per training signal
//!
//! [`TelemetryRecorder`] turns raw training-time values into events that
//! follow the tag taxonomy and appends them to an [`EventWriter`]. Any
//! pre-aggregation (softmax, divergence, entropy, projection, histogram)
//! happens here, before the write. Malformed input is rejected before
//! anything reaches the writer.
//!
//! # Example
//!
//! ```rust
//! use drlvis::recorder::TelemetryRecorder;
//! use drlvis::store::{EventReader, MemoryEventStore};
//!
//! # fn main() -> drlvis::Result<()> {
//! let mut recorder = TelemetryRecorder::new(MemoryEventStore::new());
//! recorder.record_episode_return(10.0, 0)?;
//! recorder.record_custom_timestep_scalar(0.5, 0, 0, "q-value")?;
//!
//! let store = recorder.into_inner();
//! assert_eq!(store.read_scalars("q-value-e0")?.len(), 1);
//! # Ok(())
//! # }
//! ```

mod probe;

pub use probe::{ExperimentProbe, ExperimentProbeBuilder, ProbeStates};

use std::slice;

use tracing::{debug, warn};

use crate::analytics::{
    argmax, entropy, histogram, kl_divergence_bits, row_width, smoothed_prior, softmax,
    softmax_rows, standardize, NeighborhoodProjector,
};
use crate::config::TelemetryConfig;
use crate::event::{Event, Frame, ImagePayload, Payload};
use crate::store::EventWriter;
use crate::taxonomy::{
    split_timestep_suffix, Category, EpisodeFamily, Tag, ACTION_DISTRIBUTIONS, ACTION_MEANINGS,
    ACTION_DIVERGENCES, EPISODE_REWARDS,
};
use crate::tensor::{Tensor, TensorData};
use crate::{Error, Result};

/// Encodes training signals into events.
#[derive(Debug)]
pub struct TelemetryRecorder<W: EventWriter> {
    writer: W,
    projector: NeighborhoodProjector,
}

impl<W: EventWriter> TelemetryRecorder<W> {
    /// Create a recorder with default projection settings.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            projector: NeighborhoodProjector::default(),
        }
    }

    /// Create a recorder using the projection settings of a run config.
    pub fn with_config(writer: W, config: &TelemetryConfig) -> Self {
        Self {
            writer,
            projector: NeighborhoodProjector::new(*config.projection()),
        }
    }

    /// Underlying writer.
    pub const fn writer(&self) -> &W {
        &self.writer
    }

    /// Take back the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Flush the writer.
    ///
    /// # Errors
    ///
    /// Propagates writer failures.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()
    }

    fn put(&mut self, category: Category, tag: &Tag, step: u64, payload: Payload) -> Result<()> {
        debug!(category = %category, tag = %tag, step, kind = payload.kind().as_str(), "record");
        self.writer.put(Event::new(category, tag.name(), step, payload))
    }

    /// Log the return of an episode under `episode-rewards`.
    ///
    /// # Errors
    ///
    /// Propagates writer failures.
    pub fn record_episode_return(&mut self, value: f64, episode: u64) -> Result<()> {
        self.put(
            Category::Scalars,
            &Tag::global(EPISODE_REWARDS),
            episode,
            Payload::Scalar(value),
        )
    }

    /// Log one frame of an episode.
    ///
    /// # Errors
    ///
    /// `ImageEncoding` if the frame cannot be encoded, or writer failures.
    pub fn record_frame(&mut self, frame: &Frame, episode: u64, timestep: u64) -> Result<()> {
        self.record_frames(slice::from_ref(frame), episode, timestep)
    }

    /// Log a batch of frames for one timestep; only the first three are kept.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an empty or mixed-shape batch, `ImageEncoding`, or
    /// writer failures.
    pub fn record_frames(&mut self, frames: &[Frame], episode: u64, timestep: u64) -> Result<()> {
        let payload = ImagePayload::encode(frames)?;
        self.put(
            Category::Images,
            &Tag::episode(EpisodeFamily::Frames, episode),
            timestep,
            Payload::Image(payload),
        )
    }

    /// Log how far this episode's action distribution moved from the last
    /// one, as KL divergence in bits. Returns the logged value.
    ///
    /// `current` and `previous` hold one probability vector (or logit
    /// vector with `apply_softmax`) per timestep. The prior is the mean of
    /// `previous` smoothed by `1e-4` and renormalized. Every timestep of
    /// `current` is compared to the prior and the divergences are summed.
    ///
    /// # Errors
    ///
    /// `MissingPriorEpisode` if `previous` is empty, `InvalidInput` or
    /// `ShapeMismatch` for malformed vectors, or writer failures.
    pub fn record_action_divergence(
        &mut self,
        current: &[Vec<f64>],
        previous: &[Vec<f64>],
        episode: u64,
        apply_softmax: bool,
    ) -> Result<f64> {
        if previous.is_empty() {
            return Err(Error::MissingPriorEpisode { episode });
        }
        if current.is_empty() {
            return Err(Error::InvalidInput(format!(
                "no action probabilities for episode {episode}"
            )));
        }

        let (current, previous) = if apply_softmax {
            (softmax_rows(current), softmax_rows(previous))
        } else {
            (current.to_vec(), previous.to_vec())
        };
        let prior = smoothed_prior(&previous)?;
        row_width(&current, "current action probabilities")?;
        let divergence = current
            .iter()
            .map(|row| kl_divergence_bits(row, &prior))
            .sum::<Result<f64>>()?;

        self.put(
            Category::Scalars,
            &Tag::global(ACTION_DIVERGENCES),
            episode,
            Payload::Scalar(divergence),
        )?;
        Ok(divergence)
    }

    /// Log the predicted action probabilities of one timestep.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an empty vector, or writer failures.
    pub fn record_action_probs(
        &mut self,
        predictions: &[f64],
        episode: u64,
        timestep: u64,
        apply_softmax: bool,
    ) -> Result<()> {
        if predictions.is_empty() {
            return Err(Error::InvalidInput(
                "action probability vector is empty".to_string(),
            ));
        }
        let probabilities = if apply_softmax {
            softmax(predictions)
        } else {
            predictions.to_vec()
        };
        self.put(
            Category::ActionProbs,
            &Tag::episode(EpisodeFamily::ActionProbs, episode),
            timestep,
            Payload::Tensor(Tensor::vector(probabilities)),
        )
    }

    /// Log a confidence probe: observation bounds plus a table of projected
    /// states with their predicted action and entropy.
    ///
    /// Table columns: `x, y, action, entropy, state...`. Frame states are
    /// also logged as probe frames, and their state columns are two zero
    /// columns.
    ///
    /// # Errors
    ///
    /// `InvalidInput` or `ShapeMismatch` for malformed probes, or writer
    /// failures.
    #[allow(clippy::cast_precision_loss)]
    pub fn record_experiment_snapshot(&mut self, probe: &ExperimentProbe) -> Result<()> {
        let episode = probe.episode();
        let samples = probe.states().len();
        if samples == 0 {
            return Err(Error::InvalidInput(format!(
                "confidence probe for episode {episode} has no states"
            )));
        }
        if probe.predictions().len() != samples {
            return Err(Error::ShapeMismatch {
                context: "confidence probe predictions".to_string(),
                expected: format!("{samples} rows"),
                actual: format!("{} rows", probe.predictions().len()),
            });
        }
        if row_width(probe.predictions(), "confidence probe predictions")? == 0 {
            return Err(Error::InvalidInput(
                "confidence probe has an empty prediction".to_string(),
            ));
        }
        if let ProbeStates::Features(rows) = probe.states() {
            row_width(rows, "confidence probe states")?;
        }
        if probe.min_state().len() != probe.max_state().len() {
            return Err(Error::ShapeMismatch {
                context: "confidence probe bounds".to_string(),
                expected: format!("{} maximum values", probe.min_state().len()),
                actual: format!("{} maximum values", probe.max_state().len()),
            });
        }

        let predictions = if probe.apply_softmax() {
            softmax_rows(probe.predictions())
        } else {
            probe.predictions().to_vec()
        };
        let actions = predictions
            .iter()
            .map(|row| {
                argmax(row).map(|a| a as f64).ok_or_else(|| {
                    Error::InvalidInput("confidence probe has an empty prediction".to_string())
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        let entropies: Vec<f64> = predictions.iter().map(|row| entropy(row)).collect();

        let (features, state_columns) = match probe.states() {
            ProbeStates::Features(rows) => (rows.clone(), rows.clone()),
            ProbeStates::Frames(frames) => (
                frames.iter().map(Frame::to_features).collect(),
                vec![vec![0.0; 2]; frames.len()],
            ),
        };
        let coordinates = self.projector.fit_transform(&standardize(&features)?)?;

        if let ProbeStates::Frames(frames) = probe.states() {
            let tag = Tag::episode(EpisodeFamily::ProbeFrames, episode);
            for (index, frame) in (0_u64..).zip(frames) {
                let payload = ImagePayload::encode(slice::from_ref(frame))?;
                self.put(Category::Images, &tag, index, Payload::Image(payload))?;
            }
        }

        let table: Vec<Vec<f64>> = coordinates
            .iter()
            .zip(&actions)
            .zip(&entropies)
            .zip(&state_columns)
            .map(|((([x, y], &action), &spread), state)| {
                let mut row = Vec::with_capacity(4 + state.len());
                row.extend([*x, *y, action, spread]);
                row.extend_from_slice(state);
                row
            })
            .collect();

        let bounds = Tensor::matrix(&[probe.min_state().to_vec(), probe.max_state().to_vec()])?;
        self.put(
            Category::ExperimentBounds,
            &Tag::episode(EpisodeFamily::SnapshotBounds, episode),
            0,
            Payload::Tensor(bounds),
        )?;
        self.put(
            Category::ExperimentSnapshot,
            &Tag::episode(EpisodeFamily::Snapshot, episode),
            0,
            Payload::Tensor(Tensor::matrix(&table)?),
        )
    }

    /// Log a weight matrix at one timestep of an episode.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an empty matrix, `ShapeMismatch` for ragged rows,
    /// or writer failures.
    pub fn record_weights(&mut self, weights: &[Vec<f64>], timestep: u64, episode: u64) -> Result<()> {
        if weights.is_empty() {
            return Err(Error::InvalidInput("weight matrix is empty".to_string()));
        }
        self.put(
            Category::Weights,
            &Tag::episode(EpisodeFamily::Weights, episode),
            timestep,
            Payload::Tensor(Tensor::matrix(weights)?),
        )
    }

    /// Log what every action index means. Written once per run.
    ///
    /// # Errors
    ///
    /// Propagates writer failures.
    pub fn record_action_meanings<I, S>(&mut self, meanings: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let meanings = meanings.into_iter().map(Into::into).collect();
        self.put(
            Category::ActionMeanings,
            &Tag::global(ACTION_MEANINGS),
            0,
            Payload::Tensor(Tensor::text(meanings)),
        )
    }

    /// Log a user scalar once per episode.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an empty tag, or writer failures.
    pub fn record_custom_episode_scalar(&mut self, value: f64, episode: u64, tag: &str) -> Result<()> {
        if tag.is_empty() {
            return Err(Error::InvalidInput("scalar tag is empty".to_string()));
        }
        let tag = Tag::global(tag);
        if tag.is_reserved_scalar() {
            warn!(tag = %tag, "custom scalar written under a reserved tag");
        } else if let Some((base, suffix_episode)) = split_timestep_suffix(&tag.name()) {
            warn!(
                tag = %tag,
                base,
                suffix_episode,
                "episode scalar name ends in -e<digits> and will be read back as a timestep series"
            );
        }
        self.put(Category::Scalars, &tag, episode, Payload::Scalar(value))
    }

    /// Log a user scalar at one timestep of an episode, as `<tag>-e<episode>`.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an empty tag, or writer failures.
    pub fn record_custom_timestep_scalar(
        &mut self,
        value: f64,
        timestep: u64,
        episode: u64,
        tag: &str,
    ) -> Result<()> {
        if tag.is_empty() {
            return Err(Error::InvalidInput("scalar tag is empty".to_string()));
        }
        self.put(
            Category::Scalars,
            &Tag::timestep(tag, episode),
            timestep,
            Payload::Scalar(value),
        )
    }

    /// Log a histogram of the actions taken in an episode.
    ///
    /// # Errors
    ///
    /// Propagates writer failures.
    pub fn record_action_distribution(&mut self, actions: &[f64], episode: u64) -> Result<()> {
        self.write_distribution(Category::ActionDistributions, ACTION_DISTRIBUTIONS, actions, episode)
    }

    /// Log a histogram of arbitrary values under a user category.
    ///
    /// # Errors
    ///
    /// `InvalidInput` if the name is empty or collides with a built-in
    /// category, or writer failures.
    pub fn record_custom_distribution(&mut self, values: &[f64], name: &str, episode: u64) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidInput("distribution name is empty".to_string()));
        }
        let category = Category::from_label(name);
        if !category.is_distribution() {
            return Err(Error::InvalidInput(format!(
                "'{name}' is a built-in category and cannot hold a custom distribution"
            )));
        }
        self.write_distribution(category, name, values, episode)
    }

    #[allow(clippy::cast_precision_loss)]
    fn write_distribution(
        &mut self,
        category: Category,
        name: &str,
        values: &[f64],
        episode: u64,
    ) -> Result<()> {
        let rows: Vec<Vec<f64>> = histogram(values)
            .into_iter()
            .map(|(value, count)| vec![value, count as f64])
            .collect();
        let tensor = if rows.is_empty() {
            Tensor::from_shape(vec![0, 2], TensorData::Float(Vec::new()))?
        } else {
            Tensor::matrix(&rows)?
        };
        self.put(category, &Tag::global(name), episode, Payload::Tensor(tensor))
    }
}
