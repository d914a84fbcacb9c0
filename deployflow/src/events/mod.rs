//! Deployment lifecycle events.
//!
//! The orchestrator and executor report progress through an [`EventSink`].
//! Event names are dotted strings (`run.started`, `task.deployed`, ...) with
//! an optional JSON payload.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Event type names.
pub mod event_types {
    /// A run began.
    pub const RUN_STARTED: &str = "run.started";
    /// A run finished.
    pub const RUN_COMPLETED: &str = "run.completed";
    /// A task is about to execute.
    pub const TASK_STARTED: &str = "task.started";
    /// A task was deployed.
    pub const TASK_DEPLOYED: &str = "task.deployed";
    /// A task was already deployed.
    pub const TASK_SKIPPED: &str = "task.skipped";
    /// A dry run planned a deployment.
    pub const TASK_PLANNED: &str = "task.planned";
    /// A task failed.
    pub const TASK_FAILED: &str = "task.failed";
    /// A task was not attempted.
    pub const TASK_BLOCKED: &str = "task.blocked";
    /// A pending transaction from an earlier run was confirmed and recorded.
    pub const TASK_RECOVERED: &str = "task.recovered";
}
