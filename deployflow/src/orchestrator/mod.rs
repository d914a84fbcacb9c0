//! Run orchestration.
//!
//! Selects tasks by tag, pulls in their dependencies, orders them and runs
//! them one at a time through the [`DeploymentExecutor`]. A failed task only
//! blocks the tasks that depend on it, unless [`FailureMode::FailFast`] is
//! chosen.

mod summary;


pub use summary::{FailureMode, OutcomeReport, RunReport, RunResult, RunSummary};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::chain::AccountProvider;
use crate::core::{NetworkContext, RunOutcome};
use crate::errors::{AccountError, BlockCause, BlockedByDependencyFailure, DeployflowError, RegistryError};
use crate::events::{event_types, EventSink, NoOpEventSink};
use crate::executor::DeploymentExecutor;
use crate::registry::{Task, TaskRegistry};

/// How a network behaves, as configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkProfile {
    /// Real consensus; never auto-mined.
    pub live: bool,
    /// Mine each deployment immediately (local networks only).
    pub auto_mine: bool,
}

impl Default for NetworkProfile {
    /// Unknown networks are treated as live.
    fn default() -> Self {
        Self {
            live: true,
            auto_mine: false,
        }
    }
}

impl NetworkProfile {
    /// A local development network that auto-mines.
    #[must_use]
    pub fn local() -> Self {
        Self {
            live: false,
            auto_mine: true,
        }
    }
}

/// Runs selected tasks against one network.
pub struct Orchestrator {
    registry: Arc<TaskRegistry>,
    executor: DeploymentExecutor,
    accounts: Arc<dyn AccountProvider>,
    networks: BTreeMap<String, NetworkProfile>,
    failure_mode: FailureMode,
    events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("tasks", &self.registry.len())
            .field("executor", &self.executor)
            .field("networks", &self.networks)
            .field("failure_mode", &self.failure_mode)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Creates an orchestrator.
    pub fn new(
        registry: Arc<TaskRegistry>,
        executor: DeploymentExecutor,
        accounts: Arc<dyn AccountProvider>,
    ) -> Self {
        Self {
            registry,
            executor,
            accounts,
            networks: BTreeMap::new(),
            failure_mode: FailureMode::default(),
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Declares how a network behaves.
    #[must_use]
    pub fn with_network(mut self, name: impl Into<String>, profile: NetworkProfile) -> Self {
        self.networks.insert(name.into(), profile);
        self
    }

    /// Sets the failure mode.
    #[must_use]
    pub fn with_failure_mode(mut self, mode: FailureMode) -> Self {
        self.failure_mode = mode;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Builds the context for a network from its profile and deployer.
    pub fn network_context(&self, network: &str) -> Result<NetworkContext, AccountError> {
        let deployer = self.accounts.deployer_account(network)?;
        let profile = self.networks.get(network).copied().unwrap_or_default();

        Ok(NetworkContext::new(network, deployer)
            .with_live(profile.live)
            .with_auto_mine(profile.auto_mine))
    }

    /// Returns the tasks a run with `tags` would execute, in order.
    pub fn plan(&self, tags: &BTreeSet<String>) -> Result<Vec<&Task>, RegistryError> {
        let selected = self.registry.select_by_tags(tags);
        let expanded = self.registry.with_dependencies(&selected);
        self.registry.resolve_dependency_order(&expanded)
    }

    /// Runs every task selected by `tags` (and their dependencies) on
    /// `network`.
    ///
    /// # Errors
    ///
    /// Only startup problems abort the run: no deployer account, a registry
    /// error, or the network being locked by another run. Task failures are
    /// reported in the returned [`RunResult`].
    pub async fn run(&self, tags: &BTreeSet<String>, network: &str) -> Result<RunResult, DeployflowError> {
        let started = Instant::now();
        let dry_run = self.executor.config().dry_run;

        let ctx = self.network_context(network)?;
        let tasks = self.plan(tags)?;

        let _lock = if dry_run {
            None
        } else {
            Some(self.executor.store().lock_network(network).await?)
        };

        let mut result = RunResult::new(network, tags.clone(), dry_run);
        info!(
            run_id = %result.run_id,
            network = %network,
            tasks = tasks.len(),
            dry_run,
            "Starting deployment run"
        );
        self.events
            .emit(
                event_types::RUN_STARTED,
                Some(json!({
                    "run_id": result.run_id.to_string(),
                    "network": network,
                    "tags": tags,
                    "tasks": tasks.iter().map(|t| t.name()).collect::<Vec<_>>(),
                    "dry_run": dry_run,
                })),
            )
            .await;

        let mut incomplete: HashSet<&str> = HashSet::new();
        let mut halted_after: Option<String> = None;

        for task in tasks {
            let blocked_by = match &halted_after {
                Some(after) => Some(BlockCause::RunHalted {
                    after: after.clone(),
                }),
                None => task
                    .dependencies()
                    .iter()
                    .find(|dep| incomplete.contains(dep.as_str()))
                    .map(|dep| BlockCause::Dependency {
                        dependency: dep.clone(),
                    }),
            };

            let outcome = match blocked_by {
                Some(cause) => RunOutcome::Blocked(BlockedByDependencyFailure {
                    task: task.name().to_string(),
                    cause,
                }),
                None => {
                    self.events
                        .emit(
                            event_types::TASK_STARTED,
                            Some(json!({ "task": task.name(), "network": network })),
                        )
                        .await;
                    self.executor.execute(task, &ctx).await
                }
            };

            if !outcome.is_success() {
                incomplete.insert(task.name());
                if self.failure_mode == FailureMode::FailFast
                    && halted_after.is_none()
                    && matches!(outcome, RunOutcome::Failed(_))
                {
                    warn!(task = %task.name(), "Fail-fast: blocking remaining tasks");
                    halted_after = Some(task.name().to_string());
                }
            }

            let (event_type, data) = outcome_event(task.name(), network, &outcome);
            self.events.emit(event_type, Some(data)).await;
            result.push(task.name(), outcome);
        }

        result.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        info!(
            run_id = %result.run_id,
            network = %network,
            summary = %result.summary,
            duration_ms = result.duration_ms,
            "Deployment run finished"
        );
        self.events
            .emit(
                event_types::RUN_COMPLETED,
                Some(json!({
                    "run_id": result.run_id.to_string(),
                    "network": network,
                    "success": result.is_success(),
                    "summary": result.summary,
                    "duration_ms": result.duration_ms,
                })),
            )
            .await;

        Ok(result)
    }
}

fn outcome_event(task: &str, network: &str, outcome: &RunOutcome) -> (&'static str, Value) {
    match outcome {
        RunOutcome::Deployed(record) => (
            event_types::TASK_DEPLOYED,
            json!({ "task": task, "network": network, "address": record.address, "tx_hash": record.tx_hash }),
        ),
        RunOutcome::Skipped(record) => (
            event_types::TASK_SKIPPED,
            json!({ "task": task, "network": network, "address": record.address }),
        ),
        RunOutcome::WouldDeploy(plan) => (
            event_types::TASK_PLANNED,
            json!({ "task": task, "network": network, "args": plan.args, "redeploy": plan.redeploy }),
        ),
        RunOutcome::Failed(err) => (
            event_types::TASK_FAILED,
            json!({ "task": task, "network": network, "kind": err.kind(), "error": err.to_string() }),
        ),
        RunOutcome::Blocked(blocked) => (
            event_types::TASK_BLOCKED,
            json!({ "task": task, "network": network, "cause": blocked.cause }),
        ),
    }
}
