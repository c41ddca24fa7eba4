//! matrixci - a matrix-parameterized, fail-fast CI pipeline executor

pub mod actions;
pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;
pub mod workspace;

// Re-export commonly used types
pub use actions::{Action, ActionError, ActionOutput, ActionParams, ActionRegistry};
pub use core::{
    ConfigError, Event, EventKind, ExecutionStatus, MatrixExpander, Pipeline, PipelineResult,
    RunConfiguration, RunOutcome, RunStatus, Step, TriggerMatcher,
};
pub use execution::{ExecutionEngine, ExecutionEvent, SchedulingStrategy};
pub use workspace::{Materializer, ProvisioningError, Workspace, WorkspaceManager};
