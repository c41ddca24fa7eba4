//! Test utility functions for matrixci
#![allow(dead_code)]

use matrixci::actions::{Action, ActionError, ActionOutput, ActionParams, ActionRegistry};
use matrixci::core::{config::PipelineConfig, Pipeline, PipelineResult, RunStatus};
use matrixci::execution::{ExecutionEngine, SchedulingStrategy};
use matrixci::workspace::Workspace;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One recorded action invocation
#[derive(Debug, Clone)]
pub struct Call {
    pub run_index: usize,
    pub step_id: String,
    pub inputs: BTreeMap<String, String>,
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
struct FailureRule {
    step_id: String,
    /// Only fail when this env var has this value
    when: Option<(String, String)>,
    exit_code: i32,
}

/// Mock action with scripted failures that records every call
#[derive(Clone, Default)]
pub struct ScriptedAction {
    failures: Vec<FailureRule>,
    calls: Arc<Mutex<Vec<Call>>>,
    delay: Option<Duration>,
}

impl ScriptedAction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail `step_id` in every run configuration
    pub fn fail_step(mut self, step_id: &str, exit_code: i32) -> Self {
        self.failures.push(FailureRule {
            step_id: step_id.to_string(),
            when: None,
            exit_code,
        });
        self
    }

    /// Fail `step_id` only where the action environment has `key=value`
    pub fn fail_step_when(mut self, step_id: &str, key: &str, value: &str, exit_code: i32) -> Self {
        self.failures.push(FailureRule {
            step_id: step_id.to_string(),
            when: Some((key.to_string(), value.to_string())),
            exit_code,
        });
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Step IDs executed for one run configuration, in order
    pub fn executed_steps(&self, run_index: usize) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.run_index == run_index)
            .map(|c| c.step_id)
            .collect()
    }
}

#[async_trait]
impl Action for ScriptedAction {
    async fn execute(
        &self,
        params: &ActionParams,
        workspace: &Workspace,
    ) -> Result<ActionOutput, ActionError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.calls.lock().unwrap().push(Call {
            run_index: workspace.run_index(),
            step_id: params.step_id.clone(),
            inputs: params.inputs.clone(),
            env: params.env.clone(),
        });

        let failure = self.failures.iter().find(|rule| {
            rule.step_id == params.step_id
                && rule
                    .when
                    .as_ref()
                    .map_or(true, |(k, v)| params.env.get(k) == Some(v))
        });

        Ok(match failure {
            Some(rule) => ActionOutput::new(rule.exit_code, format!("{} failed", params.step_id)),
            None => ActionOutput::success(format!("{} ok", params.step_id)),
        })
    }
}

/// Compile a pipeline from YAML
pub fn pipeline_from_yaml(yaml: &str) -> Arc<Pipeline> {
    let config = PipelineConfig::from_yaml(yaml).expect("valid pipeline YAML");
    Arc::new(config.to_pipeline().expect("valid pipeline"))
}

/// Engine whose `shell` and `checkout` actions are the scripted mock
pub fn scripted_engine(
    action: &ScriptedAction,
    strategy: SchedulingStrategy,
) -> (ExecutionEngine, tempfile::TempDir) {
    let mut registry = ActionRegistry::new();
    registry.register("shell", action.clone());
    registry.register("checkout", action.clone());

    let root = tempfile::tempdir().expect("workspace root");
    let engine = ExecutionEngine::new(registry, strategy).with_workspace_root(root.path());
    (engine, root)
}

/// Engine with the real built-in actions
pub fn real_engine(strategy: SchedulingStrategy) -> (ExecutionEngine, tempfile::TempDir) {
    let root = tempfile::tempdir().expect("workspace root");
    let engine = ExecutionEngine::new(ActionRegistry::with_builtins(), strategy)
        .with_workspace_root(root.path());
    (engine, root)
}

/// Run a pipeline with the scripted mock in parallel mode
pub async fn run_with_mock(yaml: &str, action: &ScriptedAction) -> PipelineResult {
    let (engine, _root) = scripted_engine(action, SchedulingStrategy::Parallel);
    engine
        .execute(pipeline_from_yaml(yaml), None)
        .await
        .expect("pipeline accepted")
}

/// Assert that a run configuration succeeded
pub fn assert_run_succeeded(result: &PipelineResult, index: usize) {
    let outcome = result.outcome(index).expect("run configuration exists");
    assert!(
        outcome.status.is_success(),
        "Run {} should have succeeded, got {:?}",
        outcome.run,
        outcome.status
    );
}

/// Assert that a run configuration failed at the given step
pub fn assert_run_failed_at(result: &PipelineResult, index: usize, step_id: &str) {
    let outcome = result.outcome(index).expect("run configuration exists");
    match &outcome.status {
        RunStatus::Failed { step_id: failed, .. } => assert_eq!(
            failed, step_id,
            "Run {} failed at the wrong step",
            outcome.run
        ),
        other => panic!("Run {} should have failed at {}, got {:?}", outcome.run, step_id, other),
    }
}

/// Assert that a run configuration was aborted
pub fn assert_run_aborted(result: &PipelineResult, index: usize) {
    let outcome = result.outcome(index).expect("run configuration exists");
    assert!(
        matches!(outcome.status, RunStatus::Aborted { .. }),
        "Run {} should have been aborted, got {:?}",
        outcome.run,
        outcome.status
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_action_conditional_failure() {
        let action = ScriptedAction::new().fail_step_when("lint", "MATRIX_V", "1", 2);
        let workspace = Workspace::temporary(0).unwrap();

        let mut params = ActionParams {
            step_id: "lint".to_string(),
            ..Default::default()
        };
        params.env.insert("MATRIX_V".to_string(), "1".to_string());
        assert_eq!(action.execute(&params, &workspace).await.unwrap().exit_code, 2);

        params.env.insert("MATRIX_V".to_string(), "2".to_string());
        assert!(action.execute(&params, &workspace).await.unwrap().is_success());

        assert_eq!(action.executed_steps(0), vec!["lint", "lint"]);
    }
}
