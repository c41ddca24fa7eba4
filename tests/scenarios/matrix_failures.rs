//! Test: one failing run configuration does not affect its siblings

use crate::helpers::*;
use matrixci::core::ExecutionStatus;
use matrixci::execution::SchedulingStrategy;

const PYTHON_PACKAGE: &str = r#"
name: python-package
variables:
  package: spark_config
strategy:
  matrix:
    version: ["3.8", "3.10", "3.13"]
steps:
  - name: checkout
    uses: checkout
  - name: setup
    run: setup-python ${{ matrix.version }}
  - name: lint
    run: flake8 ${{ vars.package }}
  - name: install
    run: pip install -e .
  - name: test
    run: pytest
  - name: echo
    run: echo "python ${{ matrix.version }} done"
"#;

/// Lint fails for 3.8 only: 3.8 stops at lint, the others run every step
#[tokio::test]
async fn test_lint_fails_for_one_version() {
    let action = ScriptedAction::new().fail_step_when("lint", "MATRIX_VERSION", "3.8", 1);

    let result = run_with_mock(PYTHON_PACKAGE, &action).await;

    assert!(!result.succeeded());
    assert_eq!(result.status(), ExecutionStatus::Failed);
    assert_eq!(result.failures().len(), 1);

    assert_run_failed_at(&result, 0, "lint");
    assert_run_succeeded(&result, 1);
    assert_run_succeeded(&result, 2);

    assert_eq!(action.executed_steps(0), vec!["checkout", "setup", "lint"]);
    let all = vec!["checkout", "setup", "lint", "install", "test", "echo"];
    assert_eq!(action.executed_steps(1), all);
    assert_eq!(action.executed_steps(2), all);
}

/// The informational echo step never runs after a failure
#[tokio::test]
async fn test_echo_never_runs_after_failure() {
    let action = ScriptedAction::new().fail_step_when("test", "MATRIX_VERSION", "3.13", 1);

    let result = run_with_mock(PYTHON_PACKAGE, &action).await;

    assert_run_failed_at(&result, 2, "test");
    assert!(!action.executed_steps(2).contains(&"echo".to_string()));
    assert!(action.executed_steps(0).contains(&"echo".to_string()));
}

#[tokio::test]
async fn test_every_version_fails() {
    let action = ScriptedAction::new().fail_step("install", 2);

    let result = run_with_mock(PYTHON_PACKAGE, &action).await;

    assert_eq!(result.failures().len(), 3);
    for index in 0..3 {
        assert_run_failed_at(&result, index, "install");
        assert_eq!(action.executed_steps(index).len(), 4);
    }
}

#[tokio::test]
async fn test_all_versions_succeed() {
    let action = ScriptedAction::new();

    let result = run_with_mock(PYTHON_PACKAGE, &action).await;

    assert!(result.succeeded());
    assert_eq!(result.outcomes.len(), 3);
    assert_eq!(action.calls().len(), 18);
}

/// Outcomes come back in index order regardless of strategy
#[tokio::test]
async fn test_outcomes_ordered_for_every_strategy() {
    for strategy in [
        SchedulingStrategy::Sequential,
        SchedulingStrategy::Parallel,
        SchedulingStrategy::LimitedParallel(2),
    ] {
        let action = ScriptedAction::new().fail_step_when("lint", "MATRIX_VERSION", "3.10", 1);
        let (engine, _root) = scripted_engine(&action, strategy);

        let result = engine
            .execute(pipeline_from_yaml(PYTHON_PACKAGE), None)
            .await
            .unwrap();

        let labels: Vec<String> = result.outcomes.iter().map(|o| o.run.label()).collect();
        assert_eq!(
            labels,
            vec!["version=3.8", "version=3.10", "version=3.13"],
            "strategy {:?}",
            strategy
        );
        assert_run_failed_at(&result, 1, "lint");
    }
}

/// Same example with real shell steps
#[tokio::test]
async fn test_real_shell_matrix() {
    let yaml = r#"
name: shell-matrix
strategy:
  matrix:
    version: ["3.8", "3.10", "3.13"]
steps:
  - name: setup
    run: echo "${{ matrix.version }}" > version.txt
  - name: lint
    run: test "$(cat version.txt)" != "3.8"
  - name: test
    run: test "$MATRIX_VERSION" = "${{ matrix.version }}"
  - name: echo
    run: echo done
"#;
    let (engine, _root) = real_engine(SchedulingStrategy::Parallel);

    let result = engine.execute(pipeline_from_yaml(yaml), None).await.unwrap();

    assert_run_failed_at(&result, 0, "lint");
    assert_run_succeeded(&result, 1);
    assert_run_succeeded(&result, 2);
    assert_eq!(result.outcome(0).unwrap().executed_steps(), vec!["setup", "lint"]);
    assert_eq!(result.outcome(0).unwrap().steps[1].exit_code, Some(1));
}
