//! Tag taxonomy tests against what the recorder actually writes

use drlvis::event::Frame;
use drlvis::recorder::{ExperimentProbe, ProbeStates, TelemetryRecorder};
use drlvis::store::{EventReader, MemoryEventStore};
use drlvis::taxonomy::{classify, Category, EpisodeFamily, Tag, TagScope};

/// Every `(category, tag)` the store holds, with its scope.
fn scopes(store: &MemoryEventStore) -> Vec<(Category, String, TagScope)> {
    let mut scoped = Vec::new();
    for category in store.list_categories().unwrap() {
        for tag in store.list_tags(&category).unwrap() {
            let scope = classify(&tag, &category);
            scoped.push((category.clone(), tag, scope));
        }
    }
    scoped
}

#[test]
fn test_recorder_tags_have_expected_scopes() {
    let mut recorder = TelemetryRecorder::new(MemoryEventStore::new());
    let frame = Frame::new(1, 1, vec![0, 0, 0]).unwrap();

    recorder.record_episode_return(1.0, 7).unwrap();
    recorder.record_custom_episode_scalar(0.3, 7, "loss").unwrap();
    recorder.record_custom_timestep_scalar(0.3, 2, 7, "q-value").unwrap();
    recorder.record_frame(&frame, 7, 2).unwrap();
    recorder.record_action_probs(&[0.5, 0.5], 7, 2, false).unwrap();
    recorder.record_weights(&[vec![1.0]], 2, 7).unwrap();
    recorder.record_action_meanings(["LEFT", "RIGHT"]).unwrap();
    recorder.record_action_distribution(&[0.0, 1.0], 7).unwrap();
    recorder.record_custom_distribution(&[0.0], "rewards", 7).unwrap();
    recorder
        .record_experiment_snapshot(
            &ExperimentProbe::builder(
                7,
                ProbeStates::Features(vec![vec![0.0], vec![1.0]]),
                vec![vec![0.5, 0.5], vec![0.9, 0.1]],
            )
            .bounds(vec![0.0], vec![1.0])
            .build(),
        )
        .unwrap();

    let store = recorder.into_inner();
    let scoped = scopes(&store);
    let scope_of = |category: Category, tag: &str| {
        scoped
            .iter()
            .find(|(c, t, _)| *c == category && t == tag)
            .map(|(_, _, scope)| *scope)
            .unwrap_or_else(|| panic!("{category}/{tag} not written"))
    };

    assert_eq!(scope_of(Category::Scalars, "episode-rewards"), TagScope::PerEpisode);
    assert_eq!(scope_of(Category::Scalars, "loss"), TagScope::PerEpisode);
    assert_eq!(scope_of(Category::Scalars, "q-value-e7"), TagScope::PerEpisodeTimestep);
    assert_eq!(scope_of(Category::Images, "episode7"), TagScope::PerEpisodeTimestep);
    assert_eq!(scope_of(Category::ActionProbs, "e7"), TagScope::PerEpisodeTimestep);
    assert_eq!(scope_of(Category::Weights, "weights-episode-7"), TagScope::PerEpisodeTimestep);
    assert_eq!(scope_of(Category::ActionMeanings, "action_meanings_"), TagScope::GlobalOnce);
    assert_eq!(
        scope_of(Category::ActionDistributions, "action_distributions"),
        TagScope::PerEpisode
    );
    assert_eq!(scope_of(Category::Custom("rewards".into()), "rewards"), TagScope::PerEpisode);
    assert_eq!(
        scope_of(Category::ExperimentSnapshot, "experiment-episode-7"),
        TagScope::GlobalOnce
    );
    assert_eq!(
        scope_of(Category::ExperimentBounds, "experiment-episode-7-bounds"),
        TagScope::GlobalOnce
    );
    assert_eq!(scoped.len(), 11);
}

#[test]
fn test_episode_index_recovered_from_tags() {
    let cases = [
        ("episode12", Category::Images, Some(12)),
        ("random-state-ep-3", Category::Images, Some(3)),
        ("e0", Category::ActionProbs, Some(0)),
        ("weights-episode-40", Category::Weights, Some(40)),
        ("experiment-episode-5", Category::ExperimentSnapshot, Some(5)),
        ("experiment-episode-5-bounds", Category::ExperimentBounds, Some(5)),
        ("reward-e9", Category::Scalars, Some(9)),
        ("loss", Category::Scalars, None),
        ("action_meanings_", Category::ActionMeanings, None),
    ];
    for (name, category, episode) in cases {
        assert_eq!(Tag::parse(name, &category).episode_index(), episode, "{name}");
    }
}

#[test]
fn test_probe_frames_are_not_episode_frames() {
    assert_eq!(
        Tag::parse("random-state-ep-3", &Category::Images),
        Tag::episode(EpisodeFamily::ProbeFrames, 3)
    );
    assert_eq!(
        Tag::parse("episode3", &Category::Images),
        Tag::episode(EpisodeFamily::Frames, 3)
    );
}

#[test]
fn test_timestep_base_keeps_inner_markers() {
    // Only the last -e<digits> is the episode suffix
    assert_eq!(
        Tag::parse("loss-e2-e5", &Category::Scalars),
        Tag::timestep("loss-e2", 5)
    );
    assert_eq!(Tag::timestep("loss-e2", 5).name(), "loss-e2-e5");
}

#[test]
fn test_ambiguous_episode_scalar_reads_as_timestep() {
    let mut recorder = TelemetryRecorder::new(MemoryEventStore::new());
    recorder.record_custom_episode_scalar(1.0, 0, "stage-e2").unwrap();
    let store = recorder.into_inner();

    assert_eq!(classify("stage-e2", &Category::Scalars), TagScope::PerEpisodeTimestep);
    assert_eq!(store.read_scalars("stage-e2").unwrap().len(), 1);
}

#[test]
fn test_unknown_names_fall_back_to_global() {
    assert_eq!(Tag::parse("episodeX", &Category::Images), Tag::global("episodeX"));
    assert_eq!(Tag::parse("e", &Category::ActionProbs), Tag::global("e"));
    assert_eq!(
        Tag::parse("weights-episode-", &Category::Weights),
        Tag::global("weights-episode-")
    );
}

#[test]
fn test_leading_zero_episodes_round_trip() {
    for (name, category) in [
        ("episode04", Category::Images),
        ("e007", Category::ActionProbs),
        ("weights-episode-00", Category::Weights),
        ("loss-e04", Category::Scalars),
    ] {
        let tag = Tag::parse(name, &category);
        assert_eq!(tag, Tag::global(name));
        assert_eq!(tag.name(), name);
        assert_eq!(tag.episode_index(), None);
    }
    assert_eq!(classify("loss-e04", &Category::Scalars), TagScope::PerEpisode);
    assert_eq!(Tag::parse("episode0", &Category::Images).name(), "episode0");
}
