//! Read path: typed dashboard views over one run
//!
//! Every operation is read-only and idempotent over the loaded snapshot.
//!
//! ## Missing data
//!
//! A tag, episode or category that was never logged is not an error. The
//! operation logs a warning and returns an empty (or partially filled)
//! view, so one absent signal never fails a whole dashboard request. Any
//! other store failure is returned to the caller.
//!
//! ## Derived values
//!
//! Trend curves and confidence scores are recomputed on every read and never
//! written back.

mod views;

pub use views::{
    ActionMeanings, ConfidenceFrames, ExperimentSnapshot, FirstEpisode, Frames, LogTags,
    NamedValue, ScalarSeries, SnapshotColumns, TimestepLogTags, TrendPoint, WeightCell,
};

use std::collections::{BTreeMap, BTreeSet};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::warn;

use crate::analytics::{confidence, TrendFit, TREND_DEGREE};
use crate::config::TelemetryConfig;
use crate::event::{BlobSequence, ScalarPoint, TensorPoint};
use crate::store::EventReader;
use crate::taxonomy::{
    Category, EpisodeFamily, Tag, ACTION_DISTRIBUTIONS, ACTION_DIVERGENCES, ACTION_MEANINGS,
    EPISODE_REWARDS, REWARD_FAMILY,
};
use crate::Result;

/// Per-step distribution entries, keyed by episode.
pub type DistributionSeries = BTreeMap<u64, Vec<NamedValue>>;

/// Answers dashboard queries against an [`EventReader`].
///
/// `Send + Sync` whenever the reader is, so one engine can serve
/// concurrent requests behind an `Arc`.
///
/// # Example
///
/// ```rust
/// use drlvis::query::QueryEngine;
/// use drlvis::recorder::TelemetryRecorder;
/// use drlvis::store::MemoryEventStore;
///
/// # fn main() -> drlvis::Result<()> {
/// let mut recorder = TelemetryRecorder::new(MemoryEventStore::new());
/// recorder.record_episode_return(10.0, 0)?;
/// recorder.record_episode_return(20.0, 1)?;
///
/// let engine = QueryEngine::new(recorder.into_inner());
/// let series = engine.episode_returns()?;
/// assert_eq!(series[&1].raw(), 20.0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct QueryEngine<R> {
    reader: R,
    trend_degree: usize,
}

impl<R: EventReader> QueryEngine<R> {
    /// Create an engine with the default trend degree.
    pub const fn new(reader: R) -> Self {
        Self {
            reader,
            trend_degree: TREND_DEGREE,
        }
    }

    /// Create an engine using the trend degree of a run config.
    pub const fn with_config(reader: R, config: &TelemetryConfig) -> Self {
        Self {
            reader,
            trend_degree: config.trend_degree(),
        }
    }

    /// Underlying reader.
    pub const fn reader(&self) -> &R {
        &self.reader
    }

    /// Scalar tags usable as episode series: no timestep families and
    /// neither reserved tag.
    ///
    /// # Errors
    ///
    /// Store failures other than missing data.
    pub fn list_global_tags(&self) -> Result<LogTags> {
        let log_tags = self
            .scalar_tags()?
            .into_iter()
            .filter(|tag| matches!(tag, Tag::Global(_)) && !tag.is_reserved_scalar())
            .map(|tag| tag.name())
            .collect();
        Ok(LogTags { log_tags })
    }

    /// Base names of the per-timestep scalar families, without the reward
    /// family (served by [`Self::rewards`]).
    ///
    /// # Errors
    ///
    /// Store failures other than missing data.
    pub fn list_timestep_tag_families(&self) -> Result<TimestepLogTags> {
        let families: BTreeSet<String> = self
            .scalar_tags()?
            .into_iter()
            .filter_map(|tag| match tag {
                Tag::TimestepScoped { base, .. } if !base.contains(REWARD_FAMILY) => Some(base),
                _ => None,
            })
            .collect();
        Ok(TimestepLogTags {
            timestep_log_tags: families.into_iter().collect(),
        })
    }

    /// Raw scalar series of a tag with its trend curve, keyed by step.
    ///
    /// Repeated steps keep the last value written.
    ///
    /// # Errors
    ///
    /// Store failures other than missing data.
    pub fn fetch_series(&self, tag: &str) -> Result<ScalarSeries> {
        let points = missing_as_empty(self.reader.read_scalars(tag), &Category::Scalars, tag)?;

        let mut deduped: Vec<ScalarPoint> = Vec::with_capacity(points.len());
        for point in points {
            match deduped.last_mut() {
                Some(last) if last.step == point.step => *last = point,
                _ => deduped.push(point),
            }
        }

        let values: Vec<f64> = deduped.iter().map(|p| p.value).collect();
        let fit = TrendFit::fit(&values, self.trend_degree);
        Ok(deduped
            .iter()
            .zip(fit.fitted())
            .map(|(point, &fitted)| (point.step, TrendPoint(point.value, fitted)))
            .collect())
    }

    /// Episode returns with their trend.
    ///
    /// # Errors
    ///
    /// Store failures other than missing data.
    pub fn episode_returns(&self) -> Result<ScalarSeries> {
        self.fetch_series(EPISODE_REWARDS)
    }

    /// Action divergences with their trend.
    ///
    /// # Errors
    ///
    /// Store failures other than missing data.
    pub fn action_divergences(&self) -> Result<ScalarSeries> {
        self.fetch_series(ACTION_DIVERGENCES)
    }

    /// Per-timestep rewards of one episode (`reward-e<episode>`).
    ///
    /// # Errors
    ///
    /// Store failures other than missing data.
    pub fn rewards(&self, episode: u64) -> Result<ScalarSeries> {
        self.fetch_series(&Tag::timestep(REWARD_FAMILY, episode).name())
    }

    /// Episodes with a confidence probe, ascending.
    ///
    /// # Errors
    ///
    /// Store failures other than missing data.
    pub fn snapshot_episodes(&self) -> Result<Vec<u64>> {
        let category = Category::ExperimentSnapshot;
        let tags = missing_as_empty(self.reader.list_tags(&category), &category, "*")?;
        let episodes: BTreeSet<u64> = tags
            .iter()
            .filter_map(|name| match Tag::parse(name, &category) {
                Tag::EpisodeScoped {
                    family: EpisodeFamily::Snapshot,
                    episode,
                } => Some(episode),
                _ => None,
            })
            .collect();
        Ok(episodes.into_iter().collect())
    }

    /// First probed episode, `-1` if there is none.
    ///
    /// # Errors
    ///
    /// Store failures other than missing data.
    pub fn first_snapshot_episode(&self) -> Result<FirstEpisode> {
        let episode = self
            .snapshot_episodes()?
            .first()
            .and_then(|&e| i64::try_from(e).ok())
            .unwrap_or(-1);
        Ok(FirstEpisode { episode })
    }

    /// Confidence probe of one episode, with entropy turned into confidence.
    ///
    /// # Errors
    ///
    /// Store failures other than missing data.
    pub fn experiment_snapshot(&self, episode: u64) -> Result<ExperimentSnapshot> {
        let mut snapshot = ExperimentSnapshot::default();

        let episodes = self.snapshot_episodes()?;
        let (Some(&first), Some(&last)) = (episodes.first(), episodes.last()) else {
            return Ok(snapshot);
        };
        snapshot.min_episode = Some(first);
        snapshot.max_episode = Some(last);
        snapshot.step = Some(match episodes.as_slice() {
            [a, b, ..] => b - a,
            _ => 0,
        });

        let bounds_tag = Tag::episode(EpisodeFamily::SnapshotBounds, episode).name();
        let Some(bounds) = self.first_tensor(&Category::ExperimentBounds, &bounds_tag)? else {
            return Ok(snapshot);
        };
        match bounds.tensor.rows().as_deref() {
            Some([min, max]) => {
                snapshot.min_state = Some(min.to_vec());
                snapshot.max_state = Some(max.to_vec());
            }
            _ => {
                warn!(tag = %bounds_tag, shape = ?bounds.tensor.shape(), "probe bounds are not 2 rows");
                return Ok(snapshot);
            }
        }

        let data_tag = Tag::episode(EpisodeFamily::Snapshot, episode).name();
        let Some(data) = self.first_tensor(&Category::ExperimentSnapshot, &data_tag)? else {
            return Ok(snapshot);
        };
        let Some(columns) = SnapshotColumns::split(&data.tensor) else {
            warn!(tag = %data_tag, shape = ?data.tensor.shape(), "probe table has fewer than 4 columns");
            return Ok(snapshot);
        };
        snapshot.values = Some(columns.rows_with(&confidence(&columns.entropy)));
        Ok(snapshot)
    }

    /// Base64 frames logged during one episode, one per timestep.
    ///
    /// # Errors
    ///
    /// Store failures other than missing data.
    pub fn episode_frames(&self, episode: u64) -> Result<Frames> {
        let tag = Tag::episode(EpisodeFamily::Frames, episode).name();
        let sequences = self.blob_sequences(&tag)?;
        let frames = sequences
            .iter()
            .map(|sequence| self.encode_image(sequence))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect();
        Ok(Frames { frames })
    }

    /// Base64 image of probe sample `index` of one episode.
    ///
    /// # Errors
    ///
    /// Store failures other than missing data.
    pub fn confidence_frame(&self, episode: u64, index: usize) -> Result<ConfidenceFrames> {
        let tag = Tag::episode(EpisodeFamily::ProbeFrames, episode).name();
        let sequences = self.blob_sequences(&tag)?;
        let Some(sequence) = sequences.get(index) else {
            if !sequences.is_empty() {
                warn!(tag = %tag, index, samples = sequences.len(), "probe sample out of range");
            }
            return Ok(ConfidenceFrames::default());
        };
        Ok(ConfidenceFrames {
            confidence_frames: self.encode_image(sequence)?.into_iter().collect(),
        })
    }

    /// Action probabilities of one episode, keyed by timestep position.
    ///
    /// # Errors
    ///
    /// Store failures other than missing data.
    pub fn action_probabilities(&self, episode: u64) -> Result<BTreeMap<usize, Vec<NamedValue>>> {
        let tag = Tag::episode(EpisodeFamily::ActionProbs, episode).name();
        let points = self.tensors(&Category::ActionProbs, &tag)?;
        Ok(points
            .iter()
            .enumerate()
            .filter_map(|(position, point)| {
                let probabilities = point.tensor.as_floats()?;
                let named = probabilities
                    .iter()
                    .enumerate()
                    .map(|(action, &value)| NamedValue {
                        name: format!("action{action}"),
                        value,
                    })
                    .collect();
                Some((position, named))
            })
            .collect())
    }

    /// Weight matrices of one episode as flat `{"i,j": w}` lists, keyed by
    /// timestep position.
    ///
    /// # Errors
    ///
    /// Store failures other than missing data.
    pub fn weights(&self, episode: u64) -> Result<BTreeMap<usize, Vec<WeightCell>>> {
        let tag = Tag::episode(EpisodeFamily::Weights, episode).name();
        let points = self.tensors(&Category::Weights, &tag)?;
        let mut by_position = BTreeMap::new();
        for (position, point) in points.iter().enumerate() {
            let Some(rows) = point.tensor.rows() else {
                warn!(tag = %tag, step = point.step, "weight tensor is not 2-D");
                continue;
            };
            let cells = rows
                .iter()
                .enumerate()
                .flat_map(|(row, values)| {
                    values.iter().enumerate().map(move |(col, &weight)| WeightCell {
                        row,
                        col,
                        weight,
                    })
                })
                .collect();
            by_position.insert(position, cells);
        }
        Ok(by_position)
    }

    /// Action meaning table.
    ///
    /// # Errors
    ///
    /// Store failures other than missing data.
    pub fn action_meanings(&self) -> Result<ActionMeanings> {
        let action_meanings = self
            .first_tensor(&Category::ActionMeanings, ACTION_MEANINGS)?
            .and_then(|point| point.tensor.as_text().map(<[String]>::to_vec))
            .unwrap_or_default();
        Ok(ActionMeanings { action_meanings })
    }

    /// Action histograms per episode, entries named `action<value>`.
    ///
    /// # Errors
    ///
    /// Store failures other than missing data.
    pub fn action_distributions(&self) -> Result<DistributionSeries> {
        self.distribution(&Category::ActionDistributions, ACTION_DISTRIBUTIONS, "action")
    }

    /// Histograms of a user distribution per episode, entries named by value.
    ///
    /// # Errors
    ///
    /// Store failures other than missing data.
    pub fn custom_distribution(&self, name: &str) -> Result<DistributionSeries> {
        self.distribution(&Category::from_label(name), name, "")
    }

    /// User-defined distribution categories.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn distribution_tags(&self) -> Result<LogTags> {
        let log_tags = self
            .reader
            .list_categories()?
            .into_iter()
            .filter(Category::is_distribution)
            .map(String::from)
            .collect();
        Ok(LogTags { log_tags })
    }

    /// Every category with its tags.
    ///
    /// # Errors
    ///
    /// Store failures other than missing data.
    pub fn catalog(&self) -> Result<BTreeMap<String, Vec<String>>> {
        let mut catalog = BTreeMap::new();
        for category in self.reader.list_categories()? {
            let tags = missing_as_empty(self.reader.list_tags(&category), &category, "*")?;
            catalog.insert(category.to_string(), tags.into_iter().collect());
        }
        Ok(catalog)
    }

    fn scalar_tags(&self) -> Result<Vec<Tag>> {
        let category = Category::Scalars;
        let names = missing_as_empty(self.reader.list_tags(&category), &category, "*")?;
        Ok(names.iter().map(|name| Tag::parse(name, &category)).collect())
    }

    fn tensors(&self, category: &Category, tag: &str) -> Result<Vec<TensorPoint>> {
        missing_as_empty(self.reader.read_tensors(category, tag), category, tag)
    }

    fn first_tensor(&self, category: &Category, tag: &str) -> Result<Option<TensorPoint>> {
        Ok(self.tensors(category, tag)?.into_iter().next())
    }

    fn blob_sequences(&self, tag: &str) -> Result<Vec<BlobSequence>> {
        let category = Category::Images;
        missing_as_empty(self.reader.read_blob_sequences(&category, tag), &category, tag)
    }

    fn encode_image(&self, sequence: &BlobSequence) -> Result<Option<String>> {
        let Some(reference) = sequence.image() else {
            return Ok(None);
        };
        match self.reader.read_blob(&reference.key) {
            Ok(bytes) => Ok(Some(STANDARD.encode(bytes))),
            Err(e) if e.is_missing_data() => {
                warn!(blob = %reference.key, "image blob is missing");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn distribution(&self, category: &Category, tag: &str, prefix: &str) -> Result<DistributionSeries> {
        let mut series = BTreeMap::new();
        for point in self.tensors(category, tag)? {
            let Some(rows) = point.tensor.rows() else {
                warn!(category = %category, step = point.step, "histogram tensor is not 2-D");
                continue;
            };
            let entries = rows
                .iter()
                .filter_map(|row| match row {
                    [value, count] => Some(NamedValue {
                        name: format!("{prefix}{value}"),
                        value: *count,
                    }),
                    _ => None,
                })
                .collect();
            series.insert(point.step, entries);
        }
        Ok(series)
    }
}

/// Turn "nothing logged here" into an empty value, with a warning.
fn missing_as_empty<T: Default>(result: Result<T>, category: &Category, tag: &str) -> Result<T> {
    match result {
        Err(e) if e.is_missing_data() => {
            warn!(category = %category, tag, "no data logged");
            Ok(T::default())
        }
        other => other,
    }
}
