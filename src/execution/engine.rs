//! Main execution engine - orchestrates a triggered pipeline run

use crate::{
    actions::ActionRegistry,
    core::{ConfigError, Event, ExecutionStatus, Pipeline, PipelineResult, RunConfiguration, RunStatus},
    execution::{RunCoordinator, SchedulingStrategy, StepExecutor, WorkerPool},
    workspace::{Materializer, WorkspaceManager},
};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// Events that can occur during pipeline execution
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    PipelineStarted {
        execution_id: Uuid,
        pipeline_name: String,
        total_runs: usize,
    },
    RunStarted {
        run: RunConfiguration,
    },
    WorkspaceReady {
        run_index: usize,
        path: PathBuf,
    },
    StepStarted {
        run_index: usize,
        step_index: usize,
        step_id: String,
    },
    StepSucceeded {
        run_index: usize,
        step_id: String,
        output: String,
    },
    StepFailed {
        run_index: usize,
        step_id: String,
        error: String,
        output: String,
    },
    RunFinished {
        run: RunConfiguration,
        status: RunStatus,
    },
    PipelineCompleted {
        execution_id: Uuid,
        status: ExecutionStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Fan-out of execution events to registered handlers
#[derive(Clone, Default)]
pub struct EventSink {
    handlers: Arc<Mutex<Vec<EventHandler>>>,
}

impl EventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, handler: EventHandler) {
        self.handlers.lock().await.push(handler);
    }

    /// Emit an event to all handlers
    pub async fn emit(&self, event: ExecutionEvent) {
        let handlers = self.handlers.lock().await;
        for handler in handlers.iter() {
            handler(event.clone());
        }
    }
}

/// Main pipeline execution engine
pub struct ExecutionEngine {
    registry: Arc<ActionRegistry>,
    strategy: SchedulingStrategy,
    workspace_root: PathBuf,
    materializer: Option<Arc<dyn Materializer>>,
    events: EventSink,
}

impl ExecutionEngine {
    pub fn new(registry: ActionRegistry, strategy: SchedulingStrategy) -> Self {
        Self {
            registry: Arc::new(registry),
            strategy,
            workspace_root: WorkspaceManager::default_root(),
            materializer: None,
            events: EventSink::new(),
        }
    }

    /// Directory under which run workspaces are created
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = root.into();
        self
    }

    /// Fill workspaces with this materializer instead of the pipeline's checkout source
    pub fn with_materializer(mut self, materializer: Arc<dyn Materializer>) -> Self {
        self.materializer = Some(materializer);
        self
    }

    /// Add an event handler
    pub async fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(Arc::new(handler)).await;
    }

    /// Check that every step refers to a registered action
    pub fn validate(&self, pipeline: &Pipeline) -> Result<(), ConfigError> {
        self.registry.check(pipeline)
    }

    /// Run the pipeline for an event, or discard the event if no trigger admits it
    pub async fn handle_event(
        &self,
        pipeline: Arc<Pipeline>,
        event: Event,
    ) -> Result<Option<PipelineResult>, ConfigError> {
        if !pipeline.admits(&event) {
            info!("Event {} discarded by pipeline {}", event, pipeline.name);
            return Ok(None);
        }

        self.execute(pipeline, Some(event)).await.map(Some)
    }

    /// Execute every run configuration of the pipeline
    ///
    /// Configuration errors are raised before any run starts. Everything
    /// after that is reported through the returned [`PipelineResult`].
    pub async fn execute(
        &self,
        pipeline: Arc<Pipeline>,
        event: Option<Event>,
    ) -> Result<PipelineResult, ConfigError> {
        self.validate(&pipeline)?;

        let execution_id = Uuid::new_v4();
        let started_at = Utc::now();
        let configurations = pipeline.configurations().to_vec();

        let strategy = self.strategy.with_max_parallel(pipeline.max_parallel);
        info!(
            "Starting pipeline execution: {} ({}) with {} run configurations, {:?}",
            pipeline.name,
            execution_id,
            configurations.len(),
            strategy
        );
        self.events
            .emit(ExecutionEvent::PipelineStarted {
                execution_id,
                pipeline_name: pipeline.name.clone(),
                total_runs: configurations.len(),
            })
            .await;

        let materializer = self
            .materializer
            .clone()
            .unwrap_or_else(|| pipeline.checkout.materializer());
        let workspaces = WorkspaceManager::new(&self.workspace_root, materializer);
        let executor = StepExecutor::new(pipeline.clone(), self.registry.clone(), self.events.clone());

        let coordinator = RunCoordinator::new(
            Arc::new(executor),
            Arc::new(workspaces),
            WorkerPool::new(strategy),
            pipeline.cancel_on_failure,
        );
        let outcomes = coordinator.run_all(configurations).await;

        let result = PipelineResult {
            execution_id,
            pipeline_name: pipeline.name.clone(),
            event,
            outcomes,
            started_at,
            completed_at: Utc::now(),
        };

        info!(
            "Pipeline execution finished: {} - {:?}",
            result.pipeline_name,
            result.status()
        );
        self.events
            .emit(ExecutionEvent::PipelineCompleted {
                execution_id,
                status: result.status(),
            })
            .await;

        Ok(result)
    }
}
