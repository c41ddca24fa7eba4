//! Test: ${{ ... }} substitution and the action environment

use crate::helpers::*;
use matrixci::core::{config::PipelineConfig, RunStatus};
use matrixci::execution::SchedulingStrategy;
use std::sync::Arc;

const SUBSTITUTION: &str = r#"
name: subst
variables:
  package: spark_config
env:
  PIP_DISABLE_PIP_VERSION_CHECK: 1
strategy:
  matrix:
    python-version: ["3.10"]
    os: [linux]
steps:
  - name: install
    run: pip install ${{ vars.package }}==${{ matrix.python-version }}
    env:
      TARGET: "${{ matrix.os }}-${{ run.index }}"
  - name: report
    uses: checkout
    with:
      label: "${{ pipeline.name }} ${{ run.label }}"
      pip: "${{ env.PIP_DISABLE_PIP_VERSION_CHECK }}"
"#;

#[tokio::test]
async fn test_inputs_are_rendered() {
    let action = ScriptedAction::new();
    let result = run_with_mock(SUBSTITUTION, &action).await;
    assert!(result.succeeded());

    let calls = action.calls();
    assert_eq!(calls[0].inputs["script"], "pip install spark_config==3.10");
    assert_eq!(
        calls[1].inputs["label"],
        "subst python-version=3.10, os=linux"
    );
    assert_eq!(calls[1].inputs["pip"], "1");
}

#[tokio::test]
async fn test_action_environment() {
    let action = ScriptedAction::new();
    run_with_mock(SUBSTITUTION, &action).await;

    let env = &action.calls()[0].env;
    assert_eq!(env["CI"], "true");
    assert_eq!(env["MATRIX_PYTHON_VERSION"], "3.10");
    assert_eq!(env["MATRIX_OS"], "linux");
    assert_eq!(env["MATRIXCI_RUN_INDEX"], "0");
    assert_eq!(env["PIP_DISABLE_PIP_VERSION_CHECK"], "1");
    assert_eq!(env["TARGET"], "linux-0");
    assert!(env.contains_key("MATRIXCI_WORKSPACE"));

    // Step env does not leak into later steps
    assert!(!action.calls()[1].env.contains_key("TARGET"));
}

#[tokio::test]
async fn test_variable_override() {
    let config = PipelineConfig::from_yaml(SUBSTITUTION).unwrap();
    let mut pipeline = config.to_pipeline().unwrap();
    pipeline
        .variables
        .insert("package".to_string(), "other_pkg".to_string());

    let action = ScriptedAction::new();
    let (engine, _root) = scripted_engine(&action, SchedulingStrategy::Sequential);
    engine.execute(Arc::new(pipeline), None).await.unwrap();

    assert_eq!(action.calls()[0].inputs["script"], "pip install other_pkg==3.10");
}

#[tokio::test]
async fn test_undefined_variable_fails_step_before_action() {
    let yaml = r#"
name: undefined
steps:
  - name: ok
    run: echo ok
  - name: broken
    run: echo ${{ vars.missing }}
  - name: after
    run: echo after
"#;
    let action = ScriptedAction::new();
    let result = run_with_mock(yaml, &action).await;

    assert_run_failed_at(&result, 0, "broken");
    match &result.outcome(0).unwrap().status {
        RunStatus::Failed { error, .. } => assert!(error.contains("vars.missing")),
        other => panic!("unexpected status {:?}", other),
    }
    assert_eq!(action.executed_steps(0), vec!["ok"]);
}

/// A key only an include entry adds is empty in the other configurations
#[tokio::test]
async fn test_include_only_key_runs_everywhere() {
    let yaml = r#"
name: include-only
strategy:
  matrix:
    version: ["1", "2"]
    include:
      - version: "2"
        experimental: "true"
steps:
  - name: a
    run: echo ${{ matrix.experimental }}
"#;
    let action = ScriptedAction::new();
    let result = run_with_mock(yaml, &action).await;

    assert_run_succeeded(&result, 0);
    assert_run_succeeded(&result, 1);
    let mut scripts: Vec<(usize, String)> = action
        .calls()
        .into_iter()
        .map(|c| (c.run_index, c.inputs["script"].clone()))
        .collect();
    scripts.sort();
    assert_eq!(
        scripts,
        vec![(0, "echo ".to_string()), (1, "echo true".to_string())]
    );
}
