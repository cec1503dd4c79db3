//! End-to-end tests: record through `TelemetryRecorder`, read back through
//! `QueryEngine`, both over one in-memory store.

use drlvis::event::Frame;
use drlvis::query::QueryEngine;
use drlvis::recorder::{ExperimentProbe, ProbeStates, TelemetryRecorder};
use drlvis::store::MemoryEventStore;
use drlvis::Error;

fn recorder() -> TelemetryRecorder<MemoryEventStore> {
    TelemetryRecorder::new(MemoryEventStore::new())
}

fn engine(recorder: TelemetryRecorder<MemoryEventStore>) -> QueryEngine<MemoryEventStore> {
    QueryEngine::new(recorder.into_inner())
}

fn solid_frame(shade: u8) -> Frame {
    Frame::new(2, 2, vec![shade; 12]).unwrap()
}

// ============================================================================
// Scalar series
// ============================================================================

#[test]
fn test_episode_rewards_round_trip() {
    let mut recorder = recorder();
    recorder.record_episode_return(10.0, 0).unwrap();
    recorder.record_episode_return(20.0, 1).unwrap();
    let engine = engine(recorder);

    let series = engine.fetch_series("episode-rewards").unwrap();
    assert_eq!(series.keys().copied().collect::<Vec<_>>(), vec![0, 1]);
    assert_eq!(series[&0].raw(), 10.0);
    assert_eq!(series[&1].raw(), 20.0);
    assert!((series[&0].fitted() - 10.0).abs() < 1e-9);
    assert!((series[&1].fitted() - 20.0).abs() < 1e-9);

    assert_eq!(engine.episode_returns().unwrap(), series);
}

#[test]
fn test_timestep_rewards_and_families() {
    let mut recorder = recorder();
    recorder.record_custom_timestep_scalar(1.0, 0, 0, "reward").unwrap();
    recorder.record_custom_timestep_scalar(2.0, 1, 0, "reward").unwrap();
    recorder.record_custom_timestep_scalar(0.3, 0, 0, "q-value").unwrap();
    recorder.record_custom_timestep_scalar(0.4, 0, 1, "q-value").unwrap();
    let engine = engine(recorder);

    let tagged = engine.fetch_series("reward-e0").unwrap();
    assert_eq!(tagged.len(), 2);
    assert_eq!(tagged[&0].raw(), 1.0);
    assert_eq!(tagged[&1].raw(), 2.0);
    assert_eq!(engine.rewards(0).unwrap(), tagged);
    assert!(engine.rewards(1).unwrap().is_empty());

    let families = engine.list_timestep_tag_families().unwrap();
    assert_eq!(families.timestep_log_tags, vec!["q-value"]);
    assert!(engine.list_global_tags().unwrap().log_tags.is_empty());
}

#[test]
fn test_global_tags_hide_reserved_scalars() {
    let mut recorder = recorder();
    recorder.record_episode_return(1.0, 0).unwrap();
    recorder.record_custom_episode_scalar(0.9, 0, "loss").unwrap();
    recorder.record_custom_episode_scalar(0.1, 0, "epsilon").unwrap();
    recorder
        .record_action_divergence(&[vec![0.5, 0.5]], &[vec![0.5, 0.5]], 1, false)
        .unwrap();
    let engine = engine(recorder);

    assert_eq!(engine.list_global_tags().unwrap().log_tags, vec!["epsilon", "loss"]);
}

// ============================================================================
// Action divergence
// ============================================================================

#[test]
fn test_identical_distributions_have_no_divergence() {
    let mut recorder = recorder();
    let probs = vec![vec![0.2, 0.3, 0.5], vec![0.2, 0.3, 0.5]];
    let divergence = recorder.record_action_divergence(&probs, &probs, 1, false).unwrap();
    assert!(divergence.abs() < 1e-3, "divergence {divergence}");

    let engine = engine(recorder);
    let series = engine.action_divergences().unwrap();
    assert_eq!(series.len(), 1);
    assert!((series[&1].raw() - divergence).abs() < f64::EPSILON);
}

#[test]
fn test_divergence_grows_with_policy_shift() {
    let mut recorder = recorder();
    let previous = vec![vec![0.9, 0.1]];
    let small = recorder
        .record_action_divergence(&[vec![0.8, 0.2]], &previous, 1, false)
        .unwrap();
    let large = recorder
        .record_action_divergence(&[vec![0.1, 0.9]], &previous, 2, false)
        .unwrap();
    assert!(small > 0.0);
    assert!(large > small);
}

#[test]
fn test_first_episode_divergence_is_rejected() {
    let mut recorder = recorder();
    let err = recorder
        .record_action_divergence(&[vec![0.5, 0.5]], &[], 0, true)
        .unwrap_err();
    assert!(matches!(err, Error::MissingPriorEpisode { episode: 0 }));
    assert!(engine(recorder).action_divergences().unwrap().is_empty());
}

// ============================================================================
// Confidence probe
// ============================================================================

#[test]
fn test_experiment_snapshot_round_trip() {
    let mut recorder = recorder();
    let probe = ExperimentProbe::builder(
        5,
        ProbeStates::Features(vec![vec![0.1, 0.2], vec![-0.5, 0.4], vec![0.9, -0.3]]),
        vec![vec![10.0, 0.0], vec![1.0, 1.0], vec![0.0, 3.0]],
    )
    .bounds(vec![-1.0, -1.0], vec![1.0, 1.0])
    .apply_softmax(true)
    .build();
    recorder.record_experiment_snapshot(&probe).unwrap();
    let engine = engine(recorder);

    let snapshot = engine.experiment_snapshot(5).unwrap();
    assert_eq!(snapshot.min_episode, Some(5));
    assert_eq!(snapshot.max_episode, Some(5));
    assert_eq!(snapshot.step, Some(0));
    assert_eq!(snapshot.min_state, Some(vec![-1.0, -1.0]));
    assert_eq!(snapshot.max_state, Some(vec![1.0, 1.0]));

    let values = snapshot.values.unwrap();
    assert_eq!(values.len(), 3);
    assert!(values.iter().all(|row| row.len() == 6));

    // [x, y, action, confidence, state...]
    assert_eq!(values[0][2], 0.0);
    assert_eq!(values[2][2], 1.0);
    assert!((values[0][3] - 1.0).abs() < 1e-12, "lowest entropy is most confident");
    assert!(values[1][3].abs() < 1e-12, "uniform prediction is least confident");
    assert!(values.iter().all(|row| (0.0..=1.0).contains(&row[3])));
    assert_eq!(&values[1][4..], &[-0.5, 0.4]);
    assert!(values.iter().all(|row| row[0].is_finite() && row[1].is_finite()));

    assert_eq!(engine.first_snapshot_episode().unwrap().episode, 5);
}

#[test]
fn test_snapshot_episode_range_and_step() {
    let mut recorder = recorder();
    for episode in [30, 10, 20] {
        let probe = ExperimentProbe::builder(
            episode,
            ProbeStates::Features(vec![vec![0.0], vec![1.0]]),
            vec![vec![0.7, 0.3], vec![0.4, 0.6]],
        )
        .bounds(vec![0.0], vec![1.0])
        .build();
        recorder.record_experiment_snapshot(&probe).unwrap();
    }
    let engine = engine(recorder);

    assert_eq!(engine.snapshot_episodes().unwrap(), vec![10, 20, 30]);
    let snapshot = engine.experiment_snapshot(20).unwrap();
    assert_eq!(snapshot.min_episode, Some(10));
    assert_eq!(snapshot.max_episode, Some(30));
    assert_eq!(snapshot.step, Some(10));
    assert_eq!(snapshot.values.map(|rows| rows.len()), Some(2));

    // Range is known even for an episode that was never probed
    let unprobed = engine.experiment_snapshot(15).unwrap();
    assert_eq!(unprobed.min_episode, Some(10));
    assert!(unprobed.min_state.is_none());
    assert!(unprobed.values.is_none());
}

#[test]
fn test_image_probe_serves_confidence_frames() {
    let mut recorder = recorder();
    let probe = ExperimentProbe::builder(
        2,
        ProbeStates::Frames(vec![solid_frame(0), solid_frame(128), solid_frame(255)]),
        vec![vec![0.9, 0.1], vec![0.5, 0.5], vec![0.2, 0.8]],
    )
    .build();
    recorder.record_experiment_snapshot(&probe).unwrap();
    let engine = engine(recorder);

    let frame = engine.confidence_frame(2, 1).unwrap();
    assert_eq!(frame.confidence_frames.len(), 1);
    assert!(frame.confidence_frames[0].starts_with("iVBORw0KGgo"));

    assert!(engine.confidence_frame(2, 3).unwrap().confidence_frames.is_empty());
    assert!(engine.confidence_frame(7, 0).unwrap().confidence_frames.is_empty());

    let values = engine.experiment_snapshot(2).unwrap().values.unwrap();
    assert!(values.iter().all(|row| row[4..] == [0.0, 0.0]));
}

#[test]
fn test_no_probe_first_episode_is_negative() {
    let engine = engine(recorder());
    assert_eq!(engine.first_snapshot_episode().unwrap().episode, -1);
    let snapshot = engine.experiment_snapshot(0).unwrap();
    assert_eq!(serde_json::to_value(&snapshot).unwrap(), serde_json::json!({}));
}

// ============================================================================
// Frames, probabilities, weights, meanings
// ============================================================================

#[test]
fn test_episode_frames_in_timestep_order() {
    let mut recorder = recorder();
    recorder.record_frame(&solid_frame(10), 4, 1).unwrap();
    recorder.record_frame(&solid_frame(20), 4, 0).unwrap();
    recorder.record_frame(&solid_frame(30), 5, 0).unwrap();
    let engine = engine(recorder);

    let frames = engine.episode_frames(4).unwrap().frames;
    assert_eq!(frames.len(), 2);
    assert_ne!(frames[0], frames[1]);
    assert!(frames.iter().all(|f| f.starts_with("iVBORw0KGgo")));
    assert!(engine.episode_frames(6).unwrap().frames.is_empty());
}

#[test]
fn test_action_probabilities_by_position() {
    let mut recorder = recorder();
    recorder.record_action_probs(&[0.25, 0.75], 3, 10, false).unwrap();
    recorder.record_action_probs(&[0.0, 0.0], 3, 11, true).unwrap();
    let engine = engine(recorder);

    let probs = engine.action_probabilities(3).unwrap();
    assert_eq!(probs.len(), 2);
    assert_eq!(probs[&0][1].name, "action1");
    assert_eq!(probs[&0][1].value, 0.75);
    assert!((probs[&1][0].value - 0.5).abs() < 1e-12);
}

#[test]
fn test_weights_flattened_cells() {
    let mut recorder = recorder();
    recorder
        .record_weights(&[vec![0.1, 0.2], vec![0.3, 0.4]], 0, 1)
        .unwrap();
    let engine = engine(recorder);

    let weights = engine.weights(1).unwrap();
    let json = serde_json::to_value(&weights).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"0": [{"0,0": 0.1}, {"0,1": 0.2}, {"1,0": 0.3}, {"1,1": 0.4}]})
    );
}

#[test]
fn test_action_meanings_round_trip() {
    let mut recorder = recorder();
    recorder.record_action_meanings(["NOOP", "FIRE", "LEFT"]).unwrap();
    let engine = engine(recorder);
    assert_eq!(engine.action_meanings().unwrap().action_meanings, vec!["NOOP", "FIRE", "LEFT"]);
}

// ============================================================================
// Distributions
// ============================================================================

#[test]
fn test_action_distribution_names_and_counts() {
    let mut recorder = recorder();
    recorder.record_action_distribution(&[0.0, 1.0, 1.0, 2.0, 1.0], 0).unwrap();
    recorder.record_action_distribution(&[2.0], 1).unwrap();
    let engine = engine(recorder);

    let distributions = engine.action_distributions().unwrap();
    let episode0: Vec<(&str, f64)> = distributions[&0]
        .iter()
        .map(|entry| (entry.name.as_str(), entry.value))
        .collect();
    assert_eq!(episode0, vec![("action0", 1.0), ("action1", 3.0), ("action2", 1.0)]);
    assert_eq!(distributions[&1].len(), 1);
}

#[test]
fn test_custom_distribution_counts_sum_to_input() {
    let values = [0.5, 0.5, 1.5, -2.0, 0.5, 1.5];
    let mut recorder = recorder();
    recorder.record_custom_distribution(&values, "step_rewards", 3).unwrap();
    let engine = engine(recorder);

    let series = engine.custom_distribution("step_rewards").unwrap();
    let total: f64 = series[&3].iter().map(|entry| entry.value).sum();
    assert!((total - values.len() as f64).abs() < f64::EPSILON);
    assert_eq!(series[&3][0].name, "-2");

    assert_eq!(engine.distribution_tags().unwrap().log_tags, vec!["step_rewards"]);
    assert!(engine.custom_distribution("unknown").unwrap().is_empty());
}

#[test]
fn test_builtin_category_cannot_hold_custom_distribution() {
    let mut recorder = recorder();
    for name in ["scalars", "weights", "action_distributions", ""] {
        let err = recorder.record_custom_distribution(&[1.0], name, 0).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)), "{name}");
    }
    assert!(recorder.into_inner().is_empty());
}

// ============================================================================
// Catalog
// ============================================================================

#[test]
fn test_catalog_lists_every_category() {
    let mut recorder = recorder();
    recorder.record_episode_return(1.0, 0).unwrap();
    recorder.record_action_probs(&[1.0], 0, 0, false).unwrap();
    recorder.record_custom_distribution(&[1.0], "rewards", 0).unwrap();
    let engine = engine(recorder);

    let catalog = engine.catalog().unwrap();
    assert_eq!(catalog["scalars"], vec!["episode-rewards"]);
    assert_eq!(catalog["action_probs"], vec!["e0"]);
    assert_eq!(catalog["rewards"], vec!["rewards"]);
    assert_eq!(catalog.len(), 3);
}
