//! Pipeline execution engine

pub mod coordinator;
pub mod engine;
pub mod executor;
pub mod scheduler;

pub use coordinator::RunCoordinator;
pub use engine::{EventHandler, EventSink, ExecutionEngine, ExecutionEvent};
pub use executor::{StepExecutor, StepFailure};
pub use scheduler::{SchedulingStrategy, WorkerPool};
