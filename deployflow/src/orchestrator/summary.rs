//! Run results, summaries and serializable reports.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

use crate::core::{ArgValue, OutcomeStatus, RunOutcome};
use crate::errors::{BlockCause, TaskError};

/// How the orchestrator reacts to a failed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Keep running tasks that do not depend on the failure (default).
    #[default]
    ContinueOnFailure,
    /// Stop at the first failure and block everything after it.
    FailFast,
}

/// Per-status task counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Tasks deployed in this run.
    pub deployed: usize,
    /// Tasks already deployed.
    pub skipped: usize,
    /// Tasks a dry run would deploy.
    pub planned: usize,
    /// Tasks that failed.
    pub failed: usize,
    /// Tasks not attempted.
    pub blocked: usize,
}

impl RunSummary {
    /// Counts one outcome.
    pub fn record(&mut self, status: OutcomeStatus) {
        match status {
            OutcomeStatus::Deployed => self.deployed += 1,
            OutcomeStatus::Skipped => self.skipped += 1,
            OutcomeStatus::Planned => self.planned += 1,
            OutcomeStatus::Failed => self.failed += 1,
            OutcomeStatus::Blocked => self.blocked += 1,
        }
    }

    /// Returns the number of tasks counted.
    #[must_use]
    pub fn total(&self) -> usize {
        self.deployed + self.skipped + self.planned + self.failed + self.blocked
    }

    /// Returns true if any task failed or was blocked.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed + self.blocked > 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} deployed, {} skipped", self.deployed, self.skipped)?;
        if self.planned > 0 {
            write!(f, ", {} planned", self.planned)?;
        }
        write!(f, ", {} failed, {} blocked", self.failed, self.blocked)
    }
}

/// Everything one orchestrator run produced. Not persisted.
#[derive(Debug)]
pub struct RunResult {
    /// Unique, time-ordered run id.
    pub run_id: Uuid,
    /// The target network.
    pub network: String,
    /// The requested tags; empty means every task.
    pub tags: BTreeSet<String>,
    /// Whether this was a dry run.
    pub dry_run: bool,
    /// Outcomes in execution order.
    pub outcomes: Vec<(String, RunOutcome)>,
    /// Status counts.
    pub summary: RunSummary,
    /// Wall-clock duration.
    pub duration_ms: u64,
}

impl RunResult {
    /// Creates an empty result for a run.
    #[must_use]
    pub fn new(network: impl Into<String>, tags: BTreeSet<String>, dry_run: bool) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            network: network.into(),
            tags,
            dry_run,
            outcomes: Vec::new(),
            summary: RunSummary::default(),
            duration_ms: 0,
        }
    }

    /// Appends a task outcome and counts it.
    pub fn push(&mut self, task: impl Into<String>, outcome: RunOutcome) {
        self.summary.record(outcome.status());
        self.outcomes.push((task.into(), outcome));
    }

    /// Returns the outcome of a task.
    #[must_use]
    pub fn outcome(&self, task: &str) -> Option<&RunOutcome> {
        self.outcomes
            .iter()
            .find(|(name, _)| name == task)
            .map(|(_, outcome)| outcome)
    }

    /// Returns the task names in execution order.
    #[must_use]
    pub fn task_order(&self) -> Vec<&str> {
        self.outcomes.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Returns true if nothing failed or was blocked.
    #[must_use]
    pub fn is_success(&self) -> bool {
        !self.summary.has_failures()
    }

    /// Returns the process exit code for this result: 0 on success, 1 otherwise.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        u8::from(!self.is_success())
    }

    /// Builds the serializable report.
    #[must_use]
    pub fn report(&self) -> RunReport {
        RunReport {
            run_id: self.run_id.to_string(),
            network: self.network.clone(),
            tags: self.tags.iter().cloned().collect(),
            dry_run: self.dry_run,
            success: self.is_success(),
            summary: self.summary,
            duration_ms: self.duration_ms,
            tasks: self
                .outcomes
                .iter()
                .map(|(task, outcome)| OutcomeReport::new(task, outcome))
                .collect(),
        }
    }
}

/// Serializable view of a [`RunResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// The run id.
    pub run_id: String,
    /// The target network.
    pub network: String,
    /// The requested tags.
    pub tags: Vec<String>,
    /// Whether this was a dry run.
    pub dry_run: bool,
    /// Whether the run succeeded.
    pub success: bool,
    /// Status counts.
    pub summary: RunSummary,
    /// Wall-clock duration.
    pub duration_ms: u64,
    /// One entry per task, in execution order.
    pub tasks: Vec<OutcomeReport>,
}

/// Serializable view of one task outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeReport {
    /// The task name.
    pub task: String,
    /// The outcome status.
    pub status: OutcomeStatus,
    /// The deployed address, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// The deployment or pending transaction hash, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    /// Constructor arguments, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<ArgValue>>,
    /// Short error class for failed tasks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    /// Human-readable failure or block reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Why a blocked task was not attempted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<BlockCause>,
}

impl OutcomeReport {
    /// Describes one outcome.
    #[must_use]
    pub fn new(task: &str, outcome: &RunOutcome) -> Self {
        let mut report = Self {
            task: task.to_string(),
            status: outcome.status(),
            address: None,
            tx_hash: None,
            args: None,
            error_kind: None,
            error: None,
            blocked_by: None,
        };

        match outcome {
            RunOutcome::Deployed(record) | RunOutcome::Skipped(record) => {
                report.address = Some(record.address.clone());
                report.tx_hash = Some(record.tx_hash.clone());
                report.args = Some(record.args.clone());
            }
            RunOutcome::WouldDeploy(plan) => {
                report.tx_hash = plan.pending_tx.clone();
                report.args = plan.args.clone();
            }
            RunOutcome::Failed(err) => {
                if let TaskError::Orphaned(orphan) = err {
                    report.address = Some(orphan.address.clone());
                    report.tx_hash = Some(orphan.tx_hash.clone());
                }
                report.error_kind = Some(err.kind().to_string());
                report.error = Some(err.to_string());
            }
            RunOutcome::Blocked(blocked) => {
                report.error = Some(blocked.to_string());
                report.blocked_by = Some(blocked.cause.clone());
            }
        }
        report
    }
}
