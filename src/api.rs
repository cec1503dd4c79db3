//! Request surface: the dashboard's routes over a [`QueryEngine`]
//!
//! Each route takes at most one query parameter (`user` on the wire) and
//! answers with a JSON body.
//!
//! | Path | `user` |
//! |---|---|
//! | `episode-rewards`, `action-divergences` | - |
//! | `get-frames`, `get-probs`, `get-rewards` | episode |
//! | `get-experiment-random-states-data`, `get-weights-for-episode` | episode |
//! | `get-confidence-frame` | `episode,index` |
//! | `get-confidence-exp-first-episode`, `get-action-distributions` | - |
//! | `get-action-meanings`, `get-log-tags`, `get-timestep-log-tags` | - |
//! | `get-distribution-log-tags` | - |
//! | `get-tag-scalars` | tag |
//! | `get-custom-distribution` | distribution name |
//!
//! A bad parameter or unknown path answers 400, a store failure 500, both
//! with an `{"error": ...}` body.

use serde::Serialize;
use serde_json::{json, Value};
use tracing::error;

use crate::query::QueryEngine;
use crate::store::EventReader;
use crate::{Error, Result};

/// Content type of every response.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A parsed dashboard request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `episode-rewards`
    EpisodeRewards,
    /// `action-divergences`
    ActionDivergences,
    /// `get-frames`
    Frames {
        /// Episode
        episode: u64,
    },
    /// `get-probs`
    ActionProbs {
        /// Episode
        episode: u64,
    },
    /// `get-rewards`
    Rewards {
        /// Episode
        episode: u64,
    },
    /// `get-experiment-random-states-data`
    ExperimentSnapshot {
        /// Episode
        episode: u64,
    },
    /// `get-confidence-frame`
    ConfidenceFrame {
        /// Episode
        episode: u64,
        /// Probe sample
        index: usize,
    },
    /// `get-confidence-exp-first-episode`
    FirstConfidenceEpisode,
    /// `get-action-distributions`
    ActionDistributions,
    /// `get-weights-for-episode`
    Weights {
        /// Episode
        episode: u64,
    },
    /// `get-action-meanings`
    ActionMeanings,
    /// `get-log-tags`
    LogTags,
    /// `get-tag-scalars`
    TagScalars {
        /// Scalar tag
        tag: String,
    },
    /// `get-timestep-log-tags`
    TimestepLogTags,
    /// `get-custom-distribution`
    CustomDistribution {
        /// Distribution category
        name: String,
    },
    /// `get-distribution-log-tags`
    DistributionLogTags,
}

impl Route {
    /// Parse a path (leading `/` optional) and its `user` parameter.
    ///
    /// # Errors
    ///
    /// `BadRequest` for an unknown path or a missing or malformed parameter.
    pub fn parse(path: &str, user: Option<&str>) -> Result<Self> {
        let path = path.trim_start_matches('/');
        let route = match path {
            "episode-rewards" => Self::EpisodeRewards,
            "action-divergences" => Self::ActionDivergences,
            "get-frames" => Self::Frames {
                episode: episode_param(path, user)?,
            },
            "get-probs" => Self::ActionProbs {
                episode: episode_param(path, user)?,
            },
            "get-rewards" => Self::Rewards {
                episode: episode_param(path, user)?,
            },
            "get-experiment-random-states-data" => Self::ExperimentSnapshot {
                episode: episode_param(path, user)?,
            },
            "get-confidence-frame" => {
                let raw = required(path, user)?;
                let (episode, index) = raw.split_once(',').ok_or_else(|| {
                    Error::BadRequest(format!("{path} expects 'episode,index', got '{raw}'"))
                })?;
                Self::ConfidenceFrame {
                    episode: number(path, episode)?,
                    index: number(path, index)?,
                }
            }
            "get-confidence-exp-first-episode" => Self::FirstConfidenceEpisode,
            "get-action-distributions" => Self::ActionDistributions,
            "get-weights-for-episode" => Self::Weights {
                episode: episode_param(path, user)?,
            },
            "get-action-meanings" => Self::ActionMeanings,
            "get-log-tags" => Self::LogTags,
            "get-tag-scalars" => Self::TagScalars {
                tag: required(path, user)?.to_string(),
            },
            "get-timestep-log-tags" => Self::TimestepLogTags,
            "get-custom-distribution" => Self::CustomDistribution {
                name: required(path, user)?.to_string(),
            },
            "get-distribution-log-tags" => Self::DistributionLogTags,
            other => return Err(Error::BadRequest(format!("unknown route '/{other}'"))),
        };
        Ok(route)
    }

    /// Path of this route, without the leading `/`.
    #[must_use]
    pub const fn path(&self) -> &'static str {
        match self {
            Self::EpisodeRewards => "episode-rewards",
            Self::ActionDivergences => "action-divergences",
            Self::Frames { .. } => "get-frames",
            Self::ActionProbs { .. } => "get-probs",
            Self::Rewards { .. } => "get-rewards",
            Self::ExperimentSnapshot { .. } => "get-experiment-random-states-data",
            Self::ConfidenceFrame { .. } => "get-confidence-frame",
            Self::FirstConfidenceEpisode => "get-confidence-exp-first-episode",
            Self::ActionDistributions => "get-action-distributions",
            Self::Weights { .. } => "get-weights-for-episode",
            Self::ActionMeanings => "get-action-meanings",
            Self::LogTags => "get-log-tags",
            Self::TagScalars { .. } => "get-tag-scalars",
            Self::TimestepLogTags => "get-timestep-log-tags",
            Self::CustomDistribution { .. } => "get-custom-distribution",
            Self::DistributionLogTags => "get-distribution-log-tags",
        }
    }
}

fn required<'a>(path: &str, user: Option<&'a str>) -> Result<&'a str> {
    user.map(str::trim)
        .ok_or_else(|| Error::BadRequest(format!("{path} requires the 'user' parameter")))
}

fn number<T: std::str::FromStr>(path: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| Error::BadRequest(format!("{path} expects a non-negative integer, got '{raw}'")))
}

fn episode_param(path: &str, user: Option<&str>) -> Result<u64> {
    number(path, required(path, user)?)
}

/// Status, content type and JSON body of one answered request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Always [`JSON_CONTENT_TYPE`]
    pub content_type: &'static str,
    /// Response body
    pub body: Value,
}

impl ApiResponse {
    /// 200 with a body.
    #[must_use]
    pub const fn ok(body: Value) -> Self {
        Self {
            status: 200,
            content_type: JSON_CONTENT_TYPE,
            body,
        }
    }

    /// Error response with an `{"error": ...}` body.
    #[must_use]
    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            content_type: JSON_CONTENT_TYPE,
            body: json!({ "error": message.into() }),
        }
    }
}

impl<R: EventReader> QueryEngine<R> {
    /// JSON body for a route.
    ///
    /// # Errors
    ///
    /// Store failures other than missing data.
    pub fn respond(&self, route: &Route) -> Result<Value> {
        match route {
            Route::EpisodeRewards => to_json(&self.episode_returns()?),
            Route::ActionDivergences => to_json(&self.action_divergences()?),
            Route::Frames { episode } => to_json(&self.episode_frames(*episode)?),
            Route::ActionProbs { episode } => to_json(&self.action_probabilities(*episode)?),
            Route::Rewards { episode } => to_json(&self.rewards(*episode)?),
            Route::ExperimentSnapshot { episode } => to_json(&self.experiment_snapshot(*episode)?),
            Route::ConfidenceFrame { episode, index } => {
                to_json(&self.confidence_frame(*episode, *index)?)
            }
            Route::FirstConfidenceEpisode => to_json(&self.first_snapshot_episode()?),
            Route::ActionDistributions => to_json(&self.action_distributions()?),
            Route::Weights { episode } => to_json(&self.weights(*episode)?),
            Route::ActionMeanings => to_json(&self.action_meanings()?),
            Route::LogTags => to_json(&self.list_global_tags()?),
            Route::TagScalars { tag } => to_json(&self.fetch_series(tag)?),
            Route::TimestepLogTags => to_json(&self.list_timestep_tag_families()?),
            Route::CustomDistribution { name } => to_json(&self.custom_distribution(name)?),
            Route::DistributionLogTags => to_json(&self.distribution_tags()?),
        }
    }

    /// Answer a raw request.
    #[must_use]
    pub fn handle(&self, path: &str, user: Option<&str>) -> ApiResponse {
        let route = match Route::parse(path, user) {
            Ok(route) => route,
            Err(e) => return ApiResponse::error(400, e.to_string()),
        };
        match self.respond(&route) {
            Ok(body) => ApiResponse::ok(body),
            Err(e) => {
                error!(route = route.path(), error = %e, "request failed");
                ApiResponse::error(500, e.to_string())
            }
        }
    }
}

fn to_json<T: Serialize>(view: &T) -> Result<Value> {
    Ok(serde_json::to_value(view)?)
}
