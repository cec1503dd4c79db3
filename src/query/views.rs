//! Dashboard-ready structures returned by the query engine
//!
//! Field names on the wire follow the dashboard's expectations
//! (`logTags`, `minEpisode`, ...), hence the serde renames.

use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::tensor::Tensor;

/// Tag listing: `{"logTags": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogTags {
    /// Tags
    #[serde(rename = "logTags")]
    pub log_tags: Vec<String>,
}

/// Timestep family listing: `{"timestepLogTags": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestepLogTags {
    /// Family base names
    #[serde(rename = "timestepLogTags")]
    pub timestep_log_tags: Vec<String>,
}

/// Raw value and trend value at one step, serialized as `[raw, fitted]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint(pub f64, pub f64);

impl TrendPoint {
    /// Logged value.
    #[must_use]
    pub const fn raw(&self) -> f64 {
        self.0
    }

    /// Trend curve value.
    #[must_use]
    pub const fn fitted(&self) -> f64 {
        self.1
    }
}

/// `{step: [raw, fitted]}`
pub type ScalarSeries = BTreeMap<u64, TrendPoint>;

/// Base64 PNG frames of one episode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frames {
    /// One entry per logged timestep
    pub frames: Vec<String>,
}

/// Base64 PNG image of one probe sample.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceFrames {
    /// Zero or one entry
    #[serde(rename = "confidenceFrames")]
    pub confidence_frames: Vec<String>,
}

/// `{"name": ..., "value": ...}` chart entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedValue {
    /// Label
    pub name: String,
    /// Value
    pub value: f64,
}

/// One weight, serialized as `{"<row>,<col>": weight}`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightCell {
    /// Row index
    pub row: usize,
    /// Column index
    pub col: usize,
    /// Weight
    pub weight: f64,
}

impl Serialize for WeightCell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&format!("{},{}", self.row, self.col), &self.weight)?;
        map.end()
    }
}

/// Action meaning table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionMeanings {
    /// Meaning per action index
    pub action_meanings: Vec<String>,
}

/// First episode with a confidence probe, `-1` if there is none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirstEpisode {
    /// Episode index or -1
    pub episode: i64,
}

/// Confidence probe view.
///
/// Fields are filled in order and left out once a piece is missing, so a
/// run with probes but no bounds still reports its episode range.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentSnapshot {
    /// First probed episode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_episode: Option<u64>,
    /// Last probed episode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_episode: Option<u64>,
    /// Episodes between the first two probes, 0 with fewer than two
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<u64>,
    /// Observation minimum per dimension
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_state: Option<Vec<f64>>,
    /// Observation maximum per dimension
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_state: Option<Vec<f64>>,
    /// Rows of `[x, y, action, confidence, state...]`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Vec<f64>>>,
}

/// Column view of a stored probe table.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotColumns {
    /// Projected x
    pub x: Vec<f64>,
    /// Projected y
    pub y: Vec<f64>,
    /// Predicted action
    pub actions: Vec<f64>,
    /// Prediction entropy
    pub entropy: Vec<f64>,
    /// Remaining state columns, row-major
    pub states: Vec<Vec<f64>>,
}

impl SnapshotColumns {
    /// Split a probe table; `None` unless it is 2-D with at least 4 columns.
    #[must_use]
    pub fn split(table: &Tensor) -> Option<Self> {
        let rows = table.rows()?;
        if rows.iter().any(|row| row.len() < 4) {
            return None;
        }
        Some(Self {
            x: rows.iter().map(|row| row[0]).collect(),
            y: rows.iter().map(|row| row[1]).collect(),
            actions: rows.iter().map(|row| row[2]).collect(),
            entropy: rows.iter().map(|row| row[3]).collect(),
            states: rows.iter().map(|row| row[4..].to_vec()).collect(),
        })
    }

    /// Rebuild rows with `score` in place of the entropy column.
    #[must_use]
    pub fn rows_with(&self, score: &[f64]) -> Vec<Vec<f64>> {
        (0..self.x.len())
            .map(|i| {
                let mut row = vec![self.x[i], self.y[i], self.actions[i], score[i]];
                row.extend_from_slice(&self.states[i]);
                row
            })
            .collect()
    }
}
