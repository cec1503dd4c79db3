//! Route tests: status codes and JSON shapes of every dashboard route

use drlvis::api::{Route, JSON_CONTENT_TYPE};
use drlvis::query::QueryEngine;
use drlvis::recorder::TelemetryRecorder;
use drlvis::store::MemoryEventStore;
use serde_json::{json, Value};

fn sample_engine() -> QueryEngine<MemoryEventStore> {
    let mut recorder = TelemetryRecorder::new(MemoryEventStore::new());
    recorder.record_episode_return(10.0, 0).unwrap();
    recorder.record_episode_return(20.0, 1).unwrap();
    recorder.record_custom_episode_scalar(0.5, 0, "loss").unwrap();
    recorder.record_custom_timestep_scalar(1.0, 0, 0, "reward").unwrap();
    recorder.record_custom_timestep_scalar(2.0, 1, 0, "reward").unwrap();
    recorder.record_custom_timestep_scalar(0.7, 0, 0, "q-value").unwrap();
    recorder.record_action_probs(&[0.25, 0.75], 0, 0, false).unwrap();
    recorder.record_action_meanings(["NOOP", "FIRE"]).unwrap();
    recorder.record_action_distribution(&[1.0, 1.0, 0.0], 0).unwrap();
    recorder.record_custom_distribution(&[2.0], "rewards", 0).unwrap();
    QueryEngine::new(recorder.into_inner())
}

fn ok_body(engine: &QueryEngine<MemoryEventStore>, path: &str, user: Option<&str>) -> Value {
    let response = engine.handle(path, user);
    assert_eq!(response.status, 200, "{path}: {}", response.body);
    assert_eq!(response.content_type, JSON_CONTENT_TYPE);
    response.body
}

// ============================================================================
// Success responses
// ============================================================================

#[test]
fn test_scalar_routes() {
    let engine = sample_engine();

    let rewards = ok_body(&engine, "/episode-rewards", None);
    assert_eq!(rewards["0"][0], 10.0);
    assert_eq!(rewards["1"][0], 20.0);
    assert!(rewards["1"][1].as_f64().is_some());

    let by_tag = ok_body(&engine, "/get-tag-scalars", Some("reward-e0"));
    assert_eq!(by_tag["0"][0], 1.0);
    assert_eq!(by_tag["1"][0], 2.0);
    assert_eq!(ok_body(&engine, "/get-rewards", Some("0")), by_tag);

    assert_eq!(ok_body(&engine, "/action-divergences", None), json!({}));
}

#[test]
fn test_listing_routes() {
    let engine = sample_engine();

    assert_eq!(ok_body(&engine, "/get-log-tags", None), json!({"logTags": ["loss"]}));
    assert_eq!(
        ok_body(&engine, "/get-timestep-log-tags", None),
        json!({"timestepLogTags": ["q-value"]})
    );
    assert_eq!(
        ok_body(&engine, "/get-distribution-log-tags", None),
        json!({"logTags": ["rewards"]})
    );
}

#[test]
fn test_tensor_routes() {
    let engine = sample_engine();

    assert_eq!(
        ok_body(&engine, "/get-probs", Some("0")),
        json!({"0": [{"name": "action0", "value": 0.25}, {"name": "action1", "value": 0.75}]})
    );
    assert_eq!(
        ok_body(&engine, "/get-action-meanings", None),
        json!({"action_meanings": ["NOOP", "FIRE"]})
    );
    assert_eq!(ok_body(&engine, "/get-weights-for-episode", Some("0")), json!({}));
}

#[test]
fn test_distribution_routes() {
    let engine = sample_engine();

    assert_eq!(
        ok_body(&engine, "/get-action-distributions", None),
        json!({"0": [{"name": "action0", "value": 1.0}, {"name": "action1", "value": 2.0}]})
    );
    assert_eq!(
        ok_body(&engine, "/get-custom-distribution", Some("rewards")),
        json!({"0": [{"name": "2", "value": 1.0}]})
    );
}

#[test]
fn test_empty_views_for_missing_data() {
    let engine = sample_engine();

    assert_eq!(ok_body(&engine, "/get-frames", Some("9")), json!({"frames": []}));
    assert_eq!(
        ok_body(&engine, "/get-confidence-frame", Some("9,0")),
        json!({"confidenceFrames": []})
    );
    assert_eq!(
        ok_body(&engine, "/get-confidence-exp-first-episode", None),
        json!({"episode": -1})
    );
    assert_eq!(ok_body(&engine, "/get-experiment-random-states-data", Some("0")), json!({}));
    assert_eq!(ok_body(&engine, "/get-tag-scalars", Some("never-logged")), json!({}));
}

// ============================================================================
// Error responses
// ============================================================================

#[test]
fn test_bad_requests() {
    let engine = sample_engine();
    for (path, user) in [
        ("/unknown", None),
        ("/get-frames", None),
        ("/get-frames", Some("one")),
        ("/get-confidence-frame", Some("3")),
        ("/get-custom-distribution", None),
    ] {
        let response = engine.handle(path, user);
        assert_eq!(response.status, 400, "{path} {user:?}");
        assert!(response.body["error"].as_str().unwrap().starts_with("Bad request"));
    }
}

#[test]
fn test_route_paths_parse_back() {
    let routes = [
        (Route::EpisodeRewards, None),
        (Route::ActionDivergences, None),
        (Route::Frames { episode: 1 }, Some("1")),
        (Route::ActionProbs { episode: 2 }, Some("2")),
        (Route::Rewards { episode: 3 }, Some("3")),
        (Route::ExperimentSnapshot { episode: 4 }, Some("4")),
        (Route::ConfidenceFrame { episode: 5, index: 6 }, Some("5,6")),
        (Route::FirstConfidenceEpisode, None),
        (Route::ActionDistributions, None),
        (Route::Weights { episode: 7 }, Some("7")),
        (Route::ActionMeanings, None),
        (Route::LogTags, None),
        (Route::TagScalars { tag: "loss".into() }, Some("loss")),
        (Route::TimestepLogTags, None),
        (Route::CustomDistribution { name: "rewards".into() }, Some("rewards")),
        (Route::DistributionLogTags, None),
    ];
    for (route, user) in routes {
        assert_eq!(Route::parse(&format!("/{}", route.path()), user).unwrap(), route);
    }
}
