//! Tag taxonomy: how signals are named in the event log
//!
//! Every event is addressed by a `(category, tag)` pair. The category is the
//! plugin label (`scalars`, `images`, `weights`, ...). The tag encodes which
//! episode and which signal the series belongs to.
//!
//! ## Scopes
//!
//! ```text
//! GlobalOnce          step is always 0            action_meanings_, experiment-episode-7
//! PerEpisode          step = episode index        episode-rewards, loss, action_distributions
//! PerEpisodeTimestep  step = timestep in episode  q-value-e12, episode12, weights-episode-12
//! ```
//!
//! For scalars, a trailing `-e<digits>` is the only thing that separates a
//! per-timestep family from an episode series. A user scalar that happens to
//! end in `-e<digits>` is therefore read back as a timestep family; that
//! ambiguity cannot be resolved from the log alone. Episode numbers are
//! only recognized in the form the recorder writes them, so `loss-e04` and
//! `episode04` stay plain names.
//!
//! Tags are built and parsed only through [`Tag`]; nothing else in the crate
//! matches on tag strings.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Scalar tag holding the return of every episode.
pub const EPISODE_REWARDS: &str = "episode-rewards";

/// Scalar tag holding the action divergence between successive episodes.
pub const ACTION_DIVERGENCES: &str = "action-divergences";

/// Singleton tag for the action meaning table.
pub const ACTION_MEANINGS: &str = "action_meanings_";

/// Tag (and category) used for per-episode action histograms.
pub const ACTION_DISTRIBUTIONS: &str = "action_distributions";

/// Base name of the per-timestep reward family served by `get-rewards`.
pub const REWARD_FAMILY: &str = "reward";

/// Scalar tags that have dedicated endpoints and never show up in tag listings.
pub const RESERVED_SCALAR_TAGS: [&str; 2] = [ACTION_DIVERGENCES, EPISODE_REWARDS];

/// Category label left behind by older loggers for state-name tables.
const LEGACY_STATE_MEANINGS: &str = "experiment_random_states_state_meanings";

const TIMESTEP_MARKER: &str = "-e";
const BOUNDS_SUFFIX: &str = "-bounds";

/// Plugin label carried as metadata on every event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Category {
    /// Scalar series (default plugin)
    Scalars,
    /// Image blob sequences (default plugin)
    Images,
    /// Per-timestep action probability vectors
    ActionProbs,
    /// Action index → meaning table
    ActionMeanings,
    /// Weight matrices
    Weights,
    /// Observation bounds of a confidence probe
    ExperimentBounds,
    /// Projected probe states with predictions
    ExperimentSnapshot,
    /// Per-episode action histograms
    ActionDistributions,
    /// User-defined distribution, named by the caller
    Custom(String),
}

impl Category {
    /// Label as written to the store.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Scalars => "scalars",
            Self::Images => "images",
            Self::ActionProbs => "action_probs",
            Self::ActionMeanings => "action_meanings",
            Self::Weights => "weights",
            Self::ExperimentBounds => "experiment_random_states_bounds",
            Self::ExperimentSnapshot => "experiment_random_states",
            Self::ActionDistributions => ACTION_DISTRIBUTIONS,
            Self::Custom(label) => label,
        }
    }

    /// Map a stored label back to a category.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label {
            "scalars" => Self::Scalars,
            "images" => Self::Images,
            "action_probs" => Self::ActionProbs,
            "action_meanings" => Self::ActionMeanings,
            "weights" => Self::Weights,
            "experiment_random_states_bounds" => Self::ExperimentBounds,
            "experiment_random_states" => Self::ExperimentSnapshot,
            ACTION_DISTRIBUTIONS => Self::ActionDistributions,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Scalars and images are the store's built-in plugins.
    #[must_use]
    pub const fn is_default(&self) -> bool {
        matches!(self, Self::Scalars | Self::Images)
    }

    /// Categories owned by a dedicated signal kind.
    #[must_use]
    pub fn is_reserved(&self) -> bool {
        match self {
            Self::Scalars | Self::Images => false,
            Self::Custom(label) => label == LEGACY_STATE_MEANINGS,
            _ => true,
        }
    }

    /// Anything that is neither a default nor a reserved category holds a
    /// user-defined distribution.
    #[must_use]
    pub fn is_distribution(&self) -> bool {
        !self.is_default() && !self.is_reserved()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.as_str().to_string()
    }
}

impl From<String> for Category {
    fn from(label: String) -> Self {
        Self::from_label(&label)
    }
}

/// How the `step` of a series should be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagScope {
    /// Written once; step is 0 (or a sample index inside one probe)
    GlobalOnce,
    /// One value per episode; step is the episode index
    PerEpisode,
    /// One value per timestep of one episode; step is the timestep
    PerEpisodeTimestep,
}

/// Artifact families whose tag embeds an episode number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EpisodeFamily {
    /// Environment frames, `episode<N>`
    Frames,
    /// Probe state images, `random-state-ep-<N>`
    ProbeFrames,
    /// Action probabilities, `e<N>`
    ActionProbs,
    /// Weight matrices, `weights-episode-<N>`
    Weights,
    /// Probe data table, `experiment-episode-<N>`
    Snapshot,
    /// Probe bounds, `experiment-episode-<N>-bounds`
    SnapshotBounds,
}

impl EpisodeFamily {
    /// Category every tag of this family is written under.
    #[must_use]
    pub const fn category(self) -> Category {
        match self {
            Self::Frames | Self::ProbeFrames => Category::Images,
            Self::ActionProbs => Category::ActionProbs,
            Self::Weights => Category::Weights,
            Self::Snapshot => Category::ExperimentSnapshot,
            Self::SnapshotBounds => Category::ExperimentBounds,
        }
    }

    const fn prefix(self) -> &'static str {
        match self {
            Self::Frames => "episode",
            Self::ProbeFrames => "random-state-ep-",
            Self::ActionProbs => "e",
            Self::Weights => "weights-episode-",
            Self::Snapshot | Self::SnapshotBounds => "experiment-episode-",
        }
    }

    const fn suffix(self) -> &'static str {
        match self {
            Self::SnapshotBounds => BOUNDS_SUFFIX,
            _ => "",
        }
    }

    const fn scope(self) -> TagScope {
        match self {
            Self::Frames | Self::ActionProbs | Self::Weights => TagScope::PerEpisodeTimestep,
            Self::ProbeFrames | Self::Snapshot | Self::SnapshotBounds => TagScope::GlobalOnce,
        }
    }

    fn families_for(category: &Category) -> &'static [Self] {
        match category {
            Category::Images => &[Self::ProbeFrames, Self::Frames],
            Category::ActionProbs => &[Self::ActionProbs],
            Category::Weights => &[Self::Weights],
            Category::ExperimentSnapshot => &[Self::Snapshot],
            Category::ExperimentBounds => &[Self::SnapshotBounds],
            _ => &[],
        }
    }

    fn parse(self, name: &str) -> Option<u64> {
        let digits = name
            .strip_prefix(self.prefix())?
            .strip_suffix(self.suffix())?;
        parse_episode(digits)
    }
}

/// A decoded tag.
///
/// ```rust
/// use drlvis::taxonomy::{Category, Tag, TagScope};
///
/// let tag = Tag::timestep("q-value", 3);
/// assert_eq!(tag.name(), "q-value-e3");
///
/// let parsed = Tag::parse("q-value-e3", &Category::Scalars);
/// assert_eq!(parsed, tag);
/// assert_eq!(parsed.scope(&Category::Scalars), TagScope::PerEpisodeTimestep);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Plain name: an episode series or a singleton artifact
    Global(String),
    /// Artifact family tagged with the episode it belongs to
    EpisodeScoped {
        /// Which artifact family
        family: EpisodeFamily,
        /// Episode index
        episode: u64,
    },
    /// User scalar family `<base>-e<episode>`
    TimestepScoped {
        /// Family name without the episode suffix
        base: String,
        /// Episode index
        episode: u64,
    },
}

impl Tag {
    /// Plain tag.
    #[must_use]
    pub fn global(name: impl Into<String>) -> Self {
        Self::Global(name.into())
    }

    /// Tag for one episode of an artifact family.
    #[must_use]
    pub const fn episode(family: EpisodeFamily, episode: u64) -> Self {
        Self::EpisodeScoped { family, episode }
    }

    /// Per-timestep scalar tag for one episode.
    #[must_use]
    pub fn timestep(base: impl Into<String>, episode: u64) -> Self {
        Self::TimestepScoped {
            base: base.into(),
            episode,
        }
    }

    /// Decode a stored tag name within its category.
    #[must_use]
    pub fn parse(name: &str, category: &Category) -> Self {
        if *category == Category::Scalars {
            if let Some((base, episode)) = split_timestep_suffix(name) {
                return Self::timestep(base, episode);
            }
            return Self::global(name);
        }

        EpisodeFamily::families_for(category)
            .iter()
            .find_map(|family| family.parse(name).map(|episode| Self::episode(*family, episode)))
            .unwrap_or_else(|| Self::global(name))
    }

    /// Tag string as written to the store.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Global(name) => name.clone(),
            Self::EpisodeScoped { family, episode } => {
                format!("{}{episode}{}", family.prefix(), family.suffix())
            }
            Self::TimestepScoped { base, episode } => format!("{base}{TIMESTEP_MARKER}{episode}"),
        }
    }

    /// Episode encoded in the tag, if any.
    #[must_use]
    pub const fn episode_index(&self) -> Option<u64> {
        match self {
            Self::Global(_) => None,
            Self::EpisodeScoped { episode, .. } | Self::TimestepScoped { episode, .. } => {
                Some(*episode)
            }
        }
    }

    /// Scope of the series this tag names.
    #[must_use]
    pub fn scope(&self, category: &Category) -> TagScope {
        match self {
            Self::TimestepScoped { .. } => TagScope::PerEpisodeTimestep,
            Self::EpisodeScoped { family, .. } => family.scope(),
            Self::Global(_) if *category == Category::ActionMeanings => TagScope::GlobalOnce,
            Self::Global(_) => TagScope::PerEpisode,
        }
    }

    /// One of the two scalar tags with a dedicated endpoint.
    #[must_use]
    pub fn is_reserved_scalar(&self) -> bool {
        matches!(self, Self::Global(name) if RESERVED_SCALAR_TAGS.contains(&name.as_str()))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Classify a stored tag name.
#[must_use]
pub fn classify(name: &str, category: &Category) -> TagScope {
    Tag::parse(name, category).scope(category)
}

/// Split `<base>-e<digits>` into its base name and episode.
///
/// The base must be non-empty and the suffix must be a canonical episode
/// number: ASCII digits without leading zeros.
#[must_use]
pub fn split_timestep_suffix(name: &str) -> Option<(&str, u64)> {
    let (base, digits) = name.rsplit_once(TIMESTEP_MARKER)?;
    if base.is_empty() {
        return None;
    }
    parse_episode(digits).map(|episode| (base, episode))
}

/// Episode number exactly as `u64` formats it, so decoded tags render back
/// to the same name.
fn parse_episode(digits: &str) -> Option<u64> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestep_suffix_split() {
        assert_eq!(split_timestep_suffix("reward-e0"), Some(("reward", 0)));
        assert_eq!(split_timestep_suffix("q-value-e12"), Some(("q-value", 12)));
        assert_eq!(split_timestep_suffix("loss"), None);
        assert_eq!(split_timestep_suffix("loss-e"), None);
        assert_eq!(split_timestep_suffix("loss-e1x"), None);
        assert_eq!(split_timestep_suffix("-e4"), None);
        assert_eq!(split_timestep_suffix("loss-e04"), None);
        assert_eq!(split_timestep_suffix("loss-e0"), Some(("loss", 0)));
    }

    #[test]
    fn test_episode_family_names() {
        assert_eq!(Tag::episode(EpisodeFamily::Frames, 4).name(), "episode4");
        assert_eq!(Tag::episode(EpisodeFamily::ProbeFrames, 4).name(), "random-state-ep-4");
        assert_eq!(Tag::episode(EpisodeFamily::ActionProbs, 4).name(), "e4");
        assert_eq!(Tag::episode(EpisodeFamily::Weights, 4).name(), "weights-episode-4");
        assert_eq!(Tag::episode(EpisodeFamily::Snapshot, 4).name(), "experiment-episode-4");
        assert_eq!(
            Tag::episode(EpisodeFamily::SnapshotBounds, 4).name(),
            "experiment-episode-4-bounds"
        );
    }

    #[test]
    fn test_parse_inverts_name() {
        let tags = [
            Tag::episode(EpisodeFamily::Frames, 2),
            Tag::episode(EpisodeFamily::ProbeFrames, 9),
            Tag::episode(EpisodeFamily::ActionProbs, 0),
            Tag::episode(EpisodeFamily::Weights, 31),
            Tag::episode(EpisodeFamily::Snapshot, 100),
            Tag::episode(EpisodeFamily::SnapshotBounds, 100),
        ];
        for tag in tags {
            let Tag::EpisodeScoped { family, .. } = &tag else {
                panic!("expected an episode-scoped tag");
            };
            assert_eq!(Tag::parse(&tag.name(), &family.category()), tag);
        }
    }

    #[test]
    fn test_snapshot_and_bounds_do_not_collide() {
        assert_eq!(
            Tag::parse("experiment-episode-5-bounds", &Category::ExperimentSnapshot),
            Tag::global("experiment-episode-5-bounds")
        );
        assert_eq!(
            Tag::parse("experiment-episode-5", &Category::ExperimentBounds),
            Tag::global("experiment-episode-5")
        );
    }

    #[test]
    fn test_scope_classification() {
        assert_eq!(classify(EPISODE_REWARDS, &Category::Scalars), TagScope::PerEpisode);
        assert_eq!(classify("reward-e3", &Category::Scalars), TagScope::PerEpisodeTimestep);
        assert_eq!(classify(ACTION_MEANINGS, &Category::ActionMeanings), TagScope::GlobalOnce);
        assert_eq!(
            classify("experiment-episode-3", &Category::ExperimentSnapshot),
            TagScope::GlobalOnce
        );
        assert_eq!(classify("weights-episode-3", &Category::Weights), TagScope::PerEpisodeTimestep);
        assert_eq!(classify("episode3", &Category::Images), TagScope::PerEpisodeTimestep);
        assert_eq!(
            classify("rewards", &Category::Custom("rewards".into())),
            TagScope::PerEpisode
        );
    }

    #[test]
    fn test_category_labels_round_trip() {
        let categories = [
            Category::Scalars,
            Category::Images,
            Category::ActionProbs,
            Category::ActionMeanings,
            Category::Weights,
            Category::ExperimentBounds,
            Category::ExperimentSnapshot,
            Category::ActionDistributions,
            Category::Custom("step_rewards".into()),
        ];
        for category in categories {
            assert_eq!(Category::from_label(category.as_str()), category);
        }
    }

    #[test]
    fn test_distribution_categories() {
        assert!(Category::Custom("rewards".into()).is_distribution());
        assert!(!Category::Scalars.is_distribution());
        assert!(!Category::Images.is_distribution());
        assert!(!Category::ActionDistributions.is_distribution());
        assert!(!Category::Weights.is_distribution());
        assert!(!Category::from_label(LEGACY_STATE_MEANINGS).is_distribution());
    }

    #[test]
    fn test_reserved_scalars() {
        assert!(Tag::global(EPISODE_REWARDS).is_reserved_scalar());
        assert!(Tag::global(ACTION_DIVERGENCES).is_reserved_scalar());
        assert!(!Tag::global("loss").is_reserved_scalar());
    }
}
