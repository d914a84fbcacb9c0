//! Per-task outcomes and their status.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::record::DeploymentRecord;
use super::value::ArgValue;
use crate::errors::{BlockedByDependencyFailure, TaskError};

/// The status of a task after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Deployed during this run.
    Deployed,
    /// Already deployed; nothing sent.
    Skipped,
    /// Would be deployed (dry run).
    Planned,
    /// Attempted and failed.
    Failed,
    /// Not attempted because a dependency did not complete.
    Blocked,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deployed => write!(f, "deployed"),
            Self::Skipped => write!(f, "skipped"),
            Self::Planned => write!(f, "planned"),
            Self::Failed => write!(f, "failed"),
            Self::Blocked => write!(f, "blocked"),
        }
    }
}

impl OutcomeStatus {
    /// Returns true if the task's deployment is in place (or would be).
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Deployed | Self::Skipped | Self::Planned)
    }

    /// Returns true if the status makes the run fail.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Blocked)
    }
}

/// What a dry run would do for a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedDeployment {
    /// The task name.
    pub task: String,
    /// The network.
    pub network: String,
    /// The contract to deploy.
    pub contract: String,
    /// Resolved arguments; `None` when they depend on a task that is itself
    /// only planned.
    pub args: Option<Vec<ArgValue>>,
    /// A submitted-but-unrecorded transaction that would be looked up first.
    pub pending_tx: Option<String>,
    /// Whether an existing record would be replaced.
    pub redeploy: bool,
}

/// The result of executing one task.
#[derive(Debug)]
pub enum RunOutcome {
    /// Deployed in this run.
    Deployed(DeploymentRecord),
    /// Already deployed with the same arguments.
    Skipped(DeploymentRecord),
    /// Dry run: would be deployed.
    WouldDeploy(PlannedDeployment),
    /// Failed with a cause.
    Failed(TaskError),
    /// Not attempted.
    Blocked(BlockedByDependencyFailure),
}

impl RunOutcome {
    /// Returns the status of this outcome.
    #[must_use]
    pub fn status(&self) -> OutcomeStatus {
        match self {
            Self::Deployed(_) => OutcomeStatus::Deployed,
            Self::Skipped(_) => OutcomeStatus::Skipped,
            Self::WouldDeploy(_) => OutcomeStatus::Planned,
            Self::Failed(_) => OutcomeStatus::Failed,
            Self::Blocked(_) => OutcomeStatus::Blocked,
        }
    }

    /// Returns the deployment record, if there is one.
    #[must_use]
    pub fn record(&self) -> Option<&DeploymentRecord> {
        match self {
            Self::Deployed(record) | Self::Skipped(record) => Some(record),
            _ => None,
        }
    }

    /// Returns the error, if the task failed.
    #[must_use]
    pub fn error(&self) -> Option<&TaskError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Returns true if this outcome lets dependents proceed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status().is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{BlockCause, ResolutionError};

    #[test]
    fn test_status_display() {
        assert_eq!(OutcomeStatus::Deployed.to_string(), "deployed");
        assert_eq!(OutcomeStatus::Blocked.to_string(), "blocked");
    }

    #[test]
    fn test_status_serialize() {
        let json = serde_json::to_string(&OutcomeStatus::Skipped).unwrap();
        assert_eq!(json, r#""skipped""#);
    }

    #[test]
    fn test_outcome_status_mapping() {
        let failed = RunOutcome::Failed(TaskError::from(ResolutionError::UnknownTask(
            "x".to_string(),
        )));
        assert_eq!(failed.status(), OutcomeStatus::Failed);
        assert!(failed.error().is_some());
        assert!(failed.record().is_none());
        assert!(!failed.is_success());

        let blocked = RunOutcome::Blocked(BlockedByDependencyFailure {
            task: "B".to_string(),
            cause: BlockCause::Dependency {
                dependency: "A".to_string(),
            },
        });
        assert!(blocked.status().is_failure());
    }
}
