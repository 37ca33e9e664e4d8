//! The persisted run state as other tools see it.

mod common;

use common::*;
use ledit_core::EngineError;
use serde_json::Value;
use std::fs;

#[tokio::test]
async fn test_state_file_layout() {
    let env = TestEnv::new();
    let process = process(
        vec![agent("dev")],
        vec![step("a", "dev", &[]), step("b", "dev", &["a"])],
    );
    env.scheduler().run(&process).await.unwrap();

    let path = env.dir.path().join(".ledit/orchestration_state.json");
    let json: Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();

    assert_eq!(json["status"], "completed");
    assert_eq!(json["goal"], "Build the test project");
    assert_eq!(json["steps"][0]["step_id"], "a");
    assert_eq!(json["steps"][0]["status"], "completed");
    assert_eq!(json["steps"][1]["depends_on"][0], "a");
    assert_eq!(json["steps"][1]["history"][0]["outcome"], "accepted");
    assert_eq!(json["agents"]["dev"]["tokens_used"], 20);
}

#[tokio::test]
async fn test_no_temp_files_are_left_behind() {
    let env = TestEnv::new();
    let process = process(vec![agent("dev")], vec![step("a", "dev", &[])]);
    env.scheduler().run(&process).await.unwrap();

    let names: Vec<String> = fs::read_dir(env.dir.path().join(".ledit"))
        .unwrap()
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["orchestration_state.json".to_string()]);
}

fn backups(dir: &std::path::Path) -> Vec<String> {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".bak"))
        .collect()
}

#[tokio::test]
async fn test_corrupt_state_file_is_backed_up_and_run_starts_fresh() {
    let env = TestEnv::new();
    let state_dir = env.dir.path().join(".ledit");
    fs::create_dir_all(&state_dir).unwrap();
    fs::write(state_dir.join("orchestration_state.json"), "{ not json").unwrap();
    let process = process(vec![agent("dev")], vec![step("a", "dev", &[])]);

    let outcome = env.scheduler().run(&process).await.unwrap();

    assert!(outcome.is_success());
    assert_eq!(env.llm_calls(), 1);
    assert_eq!(env.saved_state().process_id, outcome.state.process_id);

    let saved = backups(&state_dir);
    assert_eq!(saved.len(), 1);
    assert!(saved[0].starts_with("orchestration_state.json."));
    assert_eq!(
        fs::read_to_string(state_dir.join(&saved[0])).unwrap(),
        "{ not json"
    );
}

#[tokio::test]
async fn test_legacy_plan_file_is_replaced_by_a_fresh_run() {
    let env = TestEnv::new();
    let state_dir = env.dir.path().join(".ledit");
    fs::create_dir_all(&state_dir).unwrap();
    // Plan-shaped file from an older engine: no run bookkeeping at all.
    fs::write(
        state_dir.join("requirements.json"),
        r#"{"goal":"Build the test project","agents":[{"id":"dev"}],"steps":[{"id":"a","agent_id":"dev","status":"completed"}]}"#,
    )
    .unwrap();
    let process = process(vec![agent("dev")], vec![step("a", "dev", &[])]);

    let outcome = env.scheduler().run(&process).await.unwrap();

    assert!(outcome.is_success());
    assert_eq!(outcome.state.step("a").unwrap().attempts, 1);
    assert_eq!(env.llm_calls(), 1);
    assert!(!state_dir.join("requirements.json").exists());
    assert!(state_dir.join("orchestration_state.json").exists());
    assert_eq!(backups(&state_dir).len(), 1);
}

#[tokio::test]
async fn test_unreadable_state_dir_is_an_error() {
    let env = TestEnv::new();
    let state_dir = env.dir.path().join(".ledit");
    // A directory where the state file should be cannot be read as a file.
    fs::create_dir_all(state_dir.join("orchestration_state.json")).unwrap();
    let process = process(vec![agent("dev")], vec![step("a", "dev", &[])]);

    let err = env.scheduler().run(&process).await.unwrap_err();

    assert!(matches!(err, EngineError::State(_)));
    assert_eq!(env.llm_calls(), 0);
}
