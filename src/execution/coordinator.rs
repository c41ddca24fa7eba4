//! Run coordinator - one worker per run configuration on a bounded pool

use crate::{
    core::{AbortReason, RunConfiguration, RunOutcome, RunStatus},
    execution::{StepExecutor, WorkerPool},
    workspace::WorkspaceManager,
};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

pub struct RunCoordinator {
    executor: Arc<StepExecutor>,
    workspaces: Arc<WorkspaceManager>,
    pool: WorkerPool,
    cancel_on_failure: bool,
}

impl RunCoordinator {
    pub fn new(
        executor: Arc<StepExecutor>,
        workspaces: Arc<WorkspaceManager>,
        pool: WorkerPool,
        cancel_on_failure: bool,
    ) -> Self {
        Self {
            executor,
            workspaces,
            pool,
            cancel_on_failure,
        }
    }

    /// Run every configuration and collect the outcomes in index order
    ///
    /// A failing configuration never stops its siblings unless
    /// `cancel_on_failure` is set, in which case their remaining steps abort.
    pub async fn run_all(&self, configurations: Vec<RunConfiguration>) -> Vec<RunOutcome> {
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::with_capacity(configurations.len());

        for run in configurations {
            let executor = self.executor.clone();
            let workspaces = self.workspaces.clone();
            let pool = self.pool.clone();
            let cancelled = cancelled.clone();
            let cancel_on_failure = self.cancel_on_failure;
            let spawned = run.clone();

            let handle = tokio::spawn(async move {
                let _slot = pool.acquire().await;
                debug!("Worker slot acquired for run {}", spawned);

                let outcome = executor.execute(spawned, &workspaces, &cancelled).await;
                if cancel_on_failure && !outcome.status.is_success() {
                    cancelled.store(true, Ordering::SeqCst);
                }
                outcome
            });

            handles.push((run, handle));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (run, handle) in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    error!("Worker for run {} died: {}", run, e);
                    let now = Utc::now();
                    outcomes.push(RunOutcome {
                        run,
                        status: RunStatus::Aborted {
                            reason: AbortReason::WorkerLost(e.to_string()),
                        },
                        steps: Vec::new(),
                        started_at: now,
                        completed_at: now,
                    });
                }
            }
        }

        outcomes.sort_by_key(|o| o.run.index());
        info!(
            "{} of {} run configurations succeeded",
            outcomes.iter().filter(|o| o.status.is_success()).count(),
            outcomes.len()
        );
        outcomes
    }
}
