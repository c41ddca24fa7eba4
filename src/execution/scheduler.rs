//! Scheduling strategy - how many run configurations execute at once

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Strategy for scheduling run configurations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulingStrategy {
    /// One run configuration at a time, in index order
    #[default]
    Sequential,

    /// Every run configuration at once
    Parallel,

    /// At most N run configurations at once
    LimitedParallel(usize),
}

impl SchedulingStrategy {
    /// Apply a descriptor-level `max_parallel`, which takes precedence
    pub fn with_max_parallel(self, max_parallel: Option<usize>) -> Self {
        match max_parallel {
            Some(n) => SchedulingStrategy::LimitedParallel(n),
            None => self,
        }
    }

    /// Number of worker slots (`None` = unbounded)
    pub fn permits(&self) -> Option<usize> {
        match self {
            SchedulingStrategy::Sequential => Some(1),
            SchedulingStrategy::Parallel => None,
            SchedulingStrategy::LimitedParallel(n) => Some((*n).max(1)),
        }
    }
}

/// Bounded pool of worker slots shared by the coordinator's tasks
#[derive(Debug, Clone)]
pub struct WorkerPool {
    slots: Option<Arc<Semaphore>>,
}

impl WorkerPool {
    pub fn new(strategy: SchedulingStrategy) -> Self {
        Self {
            slots: strategy.permits().map(|n| Arc::new(Semaphore::new(n))),
        }
    }

    /// Wait for a free slot; the slot is returned when the permit drops
    pub async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        match &self.slots {
            Some(slots) => slots.clone().acquire_owned().await.ok(),
            None => None,
        }
    }

    pub fn available(&self) -> Option<usize> {
        self.slots.as_ref().map(|s| s.available_permits())
    }
}
