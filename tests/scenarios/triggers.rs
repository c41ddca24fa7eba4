//! Test: trigger matching decides whether an event starts a run

use crate::helpers::*;
use matrixci::core::{Event, EventKind};
use matrixci::execution::SchedulingStrategy;

const TRIGGERED: &str = r#"
name: triggered
on:
  push:
    branches: [main]
  pull_request:
    branches: [main, "release/*"]
    branches_ignore: ["release/old-*"]
steps:
  - name: build
    run: make
"#;

async fn handle(yaml: &str, kind: EventKind, branch: &str) -> (bool, ScriptedAction) {
    let action = ScriptedAction::new();
    let (engine, _root) = scripted_engine(&action, SchedulingStrategy::Parallel);

    let result = engine
        .handle_event(pipeline_from_yaml(yaml), Event::new(kind, branch))
        .await
        .unwrap();
    (result.is_some(), action)
}

#[tokio::test]
async fn test_push_to_main_runs() {
    let (ran, action) = handle(TRIGGERED, EventKind::Push, "main").await;
    assert!(ran);
    assert_eq!(action.calls().len(), 1);
}

#[tokio::test]
async fn test_push_to_other_branch_is_discarded() {
    let (ran, action) = handle(TRIGGERED, EventKind::Push, "develop").await;
    assert!(!ran);
    assert!(action.calls().is_empty());
}

#[tokio::test]
async fn test_pull_request_glob_and_ignore() {
    assert!(handle(TRIGGERED, EventKind::PullRequest, "release/2.0").await.0);
    assert!(!handle(TRIGGERED, EventKind::PullRequest, "release/old-1.0").await.0);
    assert!(!handle(TRIGGERED, EventKind::PullRequest, "feature/x").await.0);
}

#[tokio::test]
async fn test_pipeline_without_triggers_discards_everything() {
    let yaml = "name: manual\nsteps:\n  - name: build\n    run: make\n";
    assert!(!handle(yaml, EventKind::Push, "main").await.0);
    assert!(!handle(yaml, EventKind::PullRequest, "main").await.0);
}

#[tokio::test]
async fn test_result_records_event() {
    let action = ScriptedAction::new();
    let (engine, _root) = scripted_engine(&action, SchedulingStrategy::Parallel);

    let result = engine
        .handle_event(pipeline_from_yaml(TRIGGERED), Event::new(EventKind::Push, "main"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(result.event.unwrap().to_string(), "push:main");
}
