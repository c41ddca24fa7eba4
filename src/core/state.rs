//! Execution state models

use crate::core::{Event, RunConfiguration};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Overall pipeline execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Every run configuration succeeded
    Completed,
    /// At least one run configuration failed or aborted
    Failed,
}

/// State machine of a single step executor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    Pending,
    /// Executing the step at this index
    Running(usize),
    Succeeded,
    /// Step at this index failed; later steps never run
    Failed(usize),
    Aborted,
}

impl ExecutorState {
    /// Check if the executor is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutorState::Succeeded | ExecutorState::Failed(_) | ExecutorState::Aborted
        )
    }
}

/// Why a run configuration ended before its steps could finish
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbortReason {
    /// The workspace could not be provisioned
    Provisioning(String),
    /// A sibling run failed and `cancel_on_failure` is set
    Cancelled,
    /// The worker running this configuration died
    WorkerLost(String),
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Provisioning(reason) => write!(f, "workspace provisioning failed: {}", reason),
            AbortReason::Cancelled => write!(f, "cancelled after a sibling run failed"),
            AbortReason::WorkerLost(reason) => write!(f, "worker lost: {}", reason),
        }
    }
}

/// Terminal status of one run configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Succeeded,
    Failed {
        step_index: usize,
        step_id: String,
        error: String,
    },
    Aborted {
        reason: AbortReason,
    },
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Succeeded)
    }

    /// ID of the failing step, if a step failed
    pub fn failed_step(&self) -> Option<&str> {
        match self {
            RunStatus::Failed { step_id, .. } => Some(step_id),
            _ => None,
        }
    }
}

/// Outcome of one executed step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    Succeeded,
    Failed,
}

/// Record of one executed step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub index: usize,
    pub step_id: String,
    pub status: StepStatus,
    /// Exit code reported by the action, if it ran to completion
    pub exit_code: Option<i32>,
    /// Tail of the captured output
    pub output: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Outcome of one run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub run: RunConfiguration,
    pub status: RunStatus,
    /// Executed steps in order
    pub steps: Vec<StepRecord>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl RunOutcome {
    /// IDs of executed steps in execution order
    pub fn executed_steps(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.step_id.as_str()).collect()
    }
}

/// Aggregate of every run outcome for a triggered event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Unique execution ID
    pub execution_id: Uuid,

    pub pipeline_name: String,

    /// Triggering event (none when the run was forced)
    pub event: Option<Event>,

    /// Outcomes ordered by run index
    pub outcomes: Vec<RunOutcome>,

    pub started_at: DateTime<Utc>,

    pub completed_at: DateTime<Utc>,
}

impl PipelineResult {
    /// Succeeded iff every run outcome succeeded
    pub fn succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.status.is_success())
    }

    pub fn status(&self) -> ExecutionStatus {
        if self.succeeded() {
            ExecutionStatus::Completed
        } else {
            ExecutionStatus::Failed
        }
    }

    /// Outcomes that did not succeed
    pub fn failures(&self) -> Vec<&RunOutcome> {
        self.outcomes
            .iter()
            .filter(|o| !o.status.is_success())
            .collect()
    }

    /// Find the outcome for a run index
    pub fn outcome(&self, index: usize) -> Option<&RunOutcome> {
        self.outcomes.iter().find(|o| o.run.index() == index)
    }
}
