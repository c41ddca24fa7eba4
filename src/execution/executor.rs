//! Step executor - runs the ordered step list for one run configuration

use crate::{
    actions::{ActionError, ActionOutput, ActionParams, ActionRegistry},
    core::{
        AbortReason, ExecutorState, Pipeline, RunConfiguration, RunContext, RunOutcome, RunStatus,
        Step, StepRecord, StepStatus, UndefinedVariable,
    },
    execution::engine::{EventSink, ExecutionEvent},
    workspace::{Workspace, WorkspaceManager},
};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, warn};

/// Lines of action output kept in a step record
const OUTPUT_TAIL_LINES: usize = 20;

/// Why a step failed
#[derive(Debug, Error)]
pub enum StepFailure {
    #[error(transparent)]
    Render(#[from] UndefinedVariable),

    #[error(transparent)]
    Action(#[from] ActionError),

    #[error("Unknown action '{0}'")]
    UnknownAction(String),

    #[error("Exited with code {0}")]
    ExitCode(i32),
}

/// Executes one run configuration: workspace, then steps in order, fail-fast
pub struct StepExecutor {
    pipeline: Arc<Pipeline>,
    registry: Arc<ActionRegistry>,
    events: EventSink,
}

impl StepExecutor {
    pub fn new(pipeline: Arc<Pipeline>, registry: Arc<ActionRegistry>, events: EventSink) -> Self {
        Self {
            pipeline,
            registry,
            events,
        }
    }

    /// Provision a workspace, run every step and release the workspace
    pub async fn execute(
        &self,
        run: RunConfiguration,
        workspaces: &WorkspaceManager,
        cancelled: &AtomicBool,
    ) -> RunOutcome {
        let started_at = Utc::now();
        self.events
            .emit(ExecutionEvent::RunStarted { run: run.clone() })
            .await;

        if cancelled.load(Ordering::SeqCst) {
            info!("Run {} cancelled before provisioning", run);
            let status = RunStatus::Aborted {
                reason: AbortReason::Cancelled,
            };
            return self.finish(run, status, Vec::new(), started_at).await;
        }

        let workspace = match workspaces.acquire(&run).await {
            Ok(workspace) => workspace,
            Err(e) => {
                error!("Run {}: {}", run, e);
                let status = RunStatus::Aborted {
                    reason: AbortReason::Provisioning(e.to_string()),
                };
                return self.finish(run, status, Vec::new(), started_at).await;
            }
        };

        self.events
            .emit(ExecutionEvent::WorkspaceReady {
                run_index: run.index(),
                path: workspace.path().to_path_buf(),
            })
            .await;

        let (status, steps) = self.run_steps(&run, &workspace, cancelled).await;

        if let Err(e) = workspaces.release(workspace) {
            warn!("Run {}: {}", run, e);
        }

        self.finish(run, status, steps, started_at).await
    }

    /// Run the steps in order inside an already provisioned workspace
    pub async fn run_steps(
        &self,
        run: &RunConfiguration,
        workspace: &Workspace,
        cancelled: &AtomicBool,
    ) -> (RunStatus, Vec<StepRecord>) {
        let context = RunContext::for_run(&self.pipeline, run, workspace.path());
        let mut records = Vec::with_capacity(self.pipeline.steps.len());
        let mut state = ExecutorState::Pending;
        debug!("Run {} -> {:?}", run, state);

        for (index, step) in self.pipeline.steps.iter().enumerate() {
            if cancelled.load(Ordering::SeqCst) {
                state = ExecutorState::Aborted;
                debug!("Run {} -> {:?} before step {}", run, state, step.id);
                return (
                    RunStatus::Aborted {
                        reason: AbortReason::Cancelled,
                    },
                    records,
                );
            }

            state = ExecutorState::Running(index);
            debug!("Run {} -> {:?}", run, state);
            info!("Run {}: executing step {}", run, step.id);
            self.events
                .emit(ExecutionEvent::StepStarted {
                    run_index: run.index(),
                    step_index: index,
                    step_id: step.id.clone(),
                })
                .await;

            let started_at = Utc::now();
            let result = self.run_step(step, &context, workspace).await;
            let completed_at = Utc::now();

            let (exit_code, output) = match &result {
                Ok(out) => (Some(out.exit_code), tail(&out.output, OUTPUT_TAIL_LINES)),
                Err(_) => (None, String::new()),
            };

            let failure = match result {
                Ok(out) if out.is_success() => None,
                Ok(out) => Some(StepFailure::ExitCode(out.exit_code)),
                Err(e) => Some(e),
            };

            records.push(StepRecord {
                index,
                step_id: step.id.clone(),
                status: if failure.is_none() {
                    StepStatus::Succeeded
                } else {
                    StepStatus::Failed
                },
                exit_code,
                output: output.clone(),
                started_at,
                completed_at,
            });

            if let Some(failure) = failure {
                state = ExecutorState::Failed(index);
                warn!("Run {}: step {} failed: {}", run, step.id, failure);
                self.events
                    .emit(ExecutionEvent::StepFailed {
                        run_index: run.index(),
                        step_id: step.id.clone(),
                        error: failure.to_string(),
                        output,
                    })
                    .await;
                debug!("Run {} -> {:?}", run, state);

                // Fail-fast: nothing after the failing step runs
                return (
                    RunStatus::Failed {
                        step_index: index,
                        step_id: step.id.clone(),
                        error: failure.to_string(),
                    },
                    records,
                );
            }

            self.events
                .emit(ExecutionEvent::StepSucceeded {
                    run_index: run.index(),
                    step_id: step.id.clone(),
                    output,
                })
                .await;
        }

        state = ExecutorState::Succeeded;
        debug!("Run {} -> {:?}", run, state);
        (RunStatus::Succeeded, records)
    }

    /// Render parameters, resolve the action and call it under the step timeout
    async fn run_step(
        &self,
        step: &Step,
        context: &RunContext,
        workspace: &Workspace,
    ) -> Result<ActionOutput, StepFailure> {
        let rendered = step.render(context)?;
        debug!("Step {} inputs: {:?}", step.id, rendered.inputs);

        let action = self
            .registry
            .get(&step.action)
            .ok_or_else(|| StepFailure::UnknownAction(step.action.clone()))?;

        let params = ActionParams {
            step_id: step.id.clone(),
            inputs: rendered.inputs,
            env: rendered.env,
        };

        let output = timeout(
            Duration::from_secs(step.timeout_secs),
            action.execute(&params, workspace),
        )
        .await
        .map_err(|_| ActionError::Timeout(step.timeout_secs))??;

        Ok(output)
    }

    async fn finish(
        &self,
        run: RunConfiguration,
        status: RunStatus,
        steps: Vec<StepRecord>,
        started_at: chrono::DateTime<Utc>,
    ) -> RunOutcome {
        self.events
            .emit(ExecutionEvent::RunFinished {
                run: run.clone(),
                status: status.clone(),
            })
            .await;

        RunOutcome {
            run,
            status,
            steps,
            started_at,
            completed_at: Utc::now(),
        }
    }
}

/// Last `lines` lines of `output`
fn tail(output: &str, lines: usize) -> String {
    let all: Vec<&str> = output.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}
