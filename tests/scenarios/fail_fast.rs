//! Test: fail-fast step execution and opt-in sibling cancellation

use crate::helpers::*;
use matrixci::core::{AbortReason, RunStatus};
use matrixci::execution::SchedulingStrategy;

const THREE_STEPS: &str = r#"
name: fail-fast
strategy:
  matrix:
    n: ["1", "2", "3"]
steps:
  - name: first
    run: one
  - name: second
    run: two
  - name: third
    run: three
"#;

#[tokio::test]
async fn test_first_step_failure_stops_run() {
    let action = ScriptedAction::new().fail_step_when("first", "MATRIX_N", "2", 1);

    let result = run_with_mock(THREE_STEPS, &action).await;

    assert_run_failed_at(&result, 1, "first");
    assert_eq!(action.executed_steps(1), vec!["first"]);
    assert_eq!(result.outcome(1).unwrap().steps.len(), 1);
}

#[tokio::test]
async fn test_last_step_failure() {
    let action = ScriptedAction::new().fail_step("third", 7);

    let result = run_with_mock(THREE_STEPS, &action).await;

    for index in 0..3 {
        assert_run_failed_at(&result, index, "third");
    }
    let outcome = result.outcome(0).unwrap();
    assert!(matches!(outcome.status, RunStatus::Failed { step_index: 2, .. }));
    assert_eq!(outcome.steps[2].exit_code, Some(7));
}

/// Without cancel_on_failure siblings run to completion
#[tokio::test]
async fn test_siblings_not_cancelled_by_default() {
    let action = ScriptedAction::new().fail_step_when("first", "MATRIX_N", "1", 1);
    let (engine, _root) = scripted_engine(&action, SchedulingStrategy::Sequential);

    let result = engine.execute(pipeline_from_yaml(THREE_STEPS), None).await.unwrap();

    assert_run_failed_at(&result, 0, "first");
    assert_run_succeeded(&result, 1);
    assert_run_succeeded(&result, 2);
}

#[tokio::test]
async fn test_cancel_on_failure_aborts_later_runs() {
    let yaml = THREE_STEPS.replace(
        "strategy:\n",
        "strategy:\n  cancel_on_failure: true\n",
    );
    let action = ScriptedAction::new().fail_step_when("second", "MATRIX_N", "1", 1);
    let (engine, _root) = scripted_engine(&action, SchedulingStrategy::Sequential);

    let result = engine.execute(pipeline_from_yaml(&yaml), None).await.unwrap();

    assert_run_failed_at(&result, 0, "second");
    for index in 1..3 {
        assert_run_aborted(&result, index);
        assert_eq!(
            result.outcome(index).unwrap().status,
            RunStatus::Aborted {
                reason: AbortReason::Cancelled
            }
        );
        assert!(action.executed_steps(index).is_empty());
    }
}

#[tokio::test]
async fn test_step_timeout_is_failure() {
    let yaml = r#"
name: timeout
steps:
  - name: slow
    run: sleep 5
    timeout_secs: 1
  - name: never
    run: echo never
"#;
    let (engine, _root) = real_engine(SchedulingStrategy::Sequential);

    let result = engine.execute(pipeline_from_yaml(yaml), None).await.unwrap();

    assert_run_failed_at(&result, 0, "slow");
    let outcome = result.outcome(0).unwrap();
    assert_eq!(outcome.executed_steps(), vec!["slow"]);
    match &outcome.status {
        RunStatus::Failed { error, .. } => assert!(error.contains("Timeout")),
        other => panic!("unexpected status {:?}", other),
    }
}

#[tokio::test]
async fn test_spawn_error_is_failure() {
    let yaml = r#"
name: spawn
steps:
  - name: bad-shell
    run: "true"
    shell: no-such-shell-binary
  - name: never
    run: echo never
"#;
    let (engine, _root) = real_engine(SchedulingStrategy::Sequential);

    let result = engine.execute(pipeline_from_yaml(yaml), None).await.unwrap();

    assert_run_failed_at(&result, 0, "bad-shell");
    assert_eq!(result.outcome(0).unwrap().steps[0].exit_code, None);
}
