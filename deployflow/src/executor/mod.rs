//! Deployment executor.
//!
//! Performs the idempotent deploy-or-skip step for one task on one network:
//! resolve arguments, consult the store, submit and confirm when nothing is
//! recorded, then persist the record.

use chrono::Utc;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::chain::{ArtifactSource, ChainClient, DeployOptions, DeployRequest};
use crate::core::{
    format_arguments, ArgValue, DeploymentRecord, NetworkContext, PendingDeployment,
    PlannedDeployment, RunOutcome, TransactionReceipt,
};
use crate::errors::{ChainError, OrphanedDeploymentError, ResolutionError, TaskError};
use crate::events::{event_types, EventSink, NoOpEventSink};
use crate::registry::Task;
use crate::resolver::ParameterResolver;
use crate::store::ArtifactStore;

/// Default time to wait for a deployment to be mined.
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Executor settings for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// How long to wait for confirmation before reporting the task unconfirmed.
    pub confirmation_timeout: Duration,
    /// Redeploy tasks whose recorded arguments differ from the resolved ones.
    pub force_redeploy: bool,
    /// Resolve and check only; never submit or write.
    pub dry_run: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
            force_redeploy: false,
            dry_run: false,
        }
    }
}

impl ExecutorConfig {
    /// Sets the confirmation timeout.
    #[must_use]
    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    /// Enables or disables forced redeploys.
    #[must_use]
    pub fn with_force_redeploy(mut self, force: bool) -> Self {
        self.force_redeploy = force;
        self
    }

    /// Enables or disables dry-run mode.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Executes single tasks against a network.
pub struct DeploymentExecutor {
    resolver: ParameterResolver,
    store: Arc<dyn ArtifactStore>,
    chain: Arc<dyn ChainClient>,
    artifacts: Arc<dyn ArtifactSource>,
    events: Arc<dyn EventSink>,
    config: ExecutorConfig,
}

impl std::fmt::Debug for DeploymentExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploymentExecutor")
            .field("resolver", &self.resolver)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// What the store says about a task before anything is sent.
enum Plan {
    Done(RunOutcome),
    Deploy {
        args: Vec<ArgValue>,
        redeploy: bool,
    },
}

impl DeploymentExecutor {
    /// Creates an executor with default settings and no event sink.
    pub fn new(
        resolver: ParameterResolver,
        store: Arc<dyn ArtifactStore>,
        chain: Arc<dyn ChainClient>,
        artifacts: Arc<dyn ArtifactSource>,
    ) -> Self {
        Self {
            resolver,
            store,
            chain,
            artifacts,
            events: Arc::new(NoOpEventSink),
            config: ExecutorConfig::default(),
        }
    }

    /// Sets the executor settings.
    #[must_use]
    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Returns the executor settings.
    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Returns the artifact store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    /// Deploys `task` on the context's network unless it is already recorded.
    ///
    /// Never panics and never returns early with an error: every failure is
    /// reported as [`RunOutcome::Failed`].
    pub async fn execute(&self, task: &Task, ctx: &NetworkContext) -> RunOutcome {
        match self.try_execute(task, ctx).await {
            Ok(outcome) => outcome,
            Err(err) => {
                if matches!(err, TaskError::Orphaned(_)) {
                    error!(task = %task.name(), network = %ctx.network, error = %err, "Deployment orphaned");
                } else {
                    warn!(task = %task.name(), network = %ctx.network, error = %err, "Task failed");
                }
                RunOutcome::Failed(err)
            }
        }
    }

    async fn try_execute(&self, task: &Task, ctx: &NetworkContext) -> Result<RunOutcome, TaskError> {
        let (args, redeploy) = match self.plan(task, ctx).await? {
            Plan::Done(outcome) => return Ok(outcome),
            Plan::Deploy { args, redeploy } => (args, redeploy),
        };

        let pending = self.store.get_pending(task.name(), &ctx.network).await?;

        if self.config.dry_run {
            return Ok(RunOutcome::WouldDeploy(PlannedDeployment {
                task: task.name().to_string(),
                network: ctx.network.clone(),
                contract: task.contract().to_string(),
                args: Some(args),
                pending_tx: pending.map(|p| p.tx_hash),
                redeploy,
            }));
        }

        if let Some(pending) = pending {
            return self.recover(task, ctx, pending, &args, redeploy).await;
        }

        self.deploy(task, ctx, args, redeploy).await
    }

    /// Resolves arguments and decides between skip, fail and deploy.
    async fn plan(&self, task: &Task, ctx: &NetworkContext) -> Result<Plan, TaskError> {
        let network = ctx.network.as_str();

        let mut dependencies = BTreeMap::new();
        for dep in task.dependencies() {
            if let Some(record) = self.store.get(dep, network).await? {
                dependencies.insert(dep.clone(), record);
            }
        }

        let resolved = self.resolver.resolve(task.name(), ctx, &dependencies);
        let existing = self.store.get(task.name(), network).await?;

        let args = match resolved {
            Ok(args) => args,
            Err(ResolutionError::DependencyNotDeployed { .. }) if self.config.dry_run => {
                // The dependency is only planned, so its address is unknown yet.
                let outcome = match existing {
                    Some(record) => RunOutcome::Skipped(record),
                    None => RunOutcome::WouldDeploy(PlannedDeployment {
                        task: task.name().to_string(),
                        network: network.to_string(),
                        contract: task.contract().to_string(),
                        args: None,
                        pending_tx: None,
                        redeploy: false,
                    }),
                };
                return Ok(Plan::Done(outcome));
            }
            Err(err) => return Err(err.into()),
        };

        let Some(record) = existing else {
            return Ok(Plan::Deploy {
                args,
                redeploy: false,
            });
        };

        if record.matches_args(&args) {
            debug!(task = %task.name(), network = %network, address = %record.address, "Already deployed");
            return Ok(Plan::Done(RunOutcome::Skipped(record)));
        }

        if !self.config.force_redeploy {
            return Err(ResolutionError::ArgumentMismatch {
                task: task.name().to_string(),
                network: network.to_string(),
                recorded: record.args,
                resolved: args,
            }
            .into());
        }

        warn!(
            task = %task.name(),
            network = %network,
            recorded = %format_arguments(&record.args),
            resolved = %format_arguments(&args),
            "Arguments changed; redeploying"
        );
        Ok(Plan::Deploy {
            args,
            redeploy: true,
        })
    }

    async fn deploy(
        &self,
        task: &Task,
        ctx: &NetworkContext,
        args: Vec<ArgValue>,
        redeploy: bool,
    ) -> Result<RunOutcome, TaskError> {
        if ctx.auto_mine && ctx.is_live {
            warn!(network = %ctx.network, "auto_mine ignored on live network");
        }

        let artifact = self.artifacts.load(task.contract()).await?;
        let request = DeployRequest {
            artifact,
            args: args.clone(),
            from: ctx.deployer.clone(),
            options: DeployOptions {
                auto_mine: ctx.effective_auto_mine(),
            },
        };

        let submitted = self.chain.submit(&request).await?;
        info!(
            task = %task.name(),
            network = %ctx.network,
            contract = %task.contract(),
            tx_hash = %submitted.tx_hash,
            args = %format_arguments(&args),
            "Deployment submitted"
        );

        let pending = PendingDeployment {
            task: task.name().to_string(),
            network: ctx.network.clone(),
            contract: task.contract().to_string(),
            tx_hash: submitted.tx_hash.clone(),
            args,
            deployer: ctx.deployer.clone(),
            submitted_at: Utc::now(),
        };
        let journaled = match self.store.put_pending(&pending).await {
            Ok(()) => true,
            Err(err) => {
                warn!(tx_hash = %pending.tx_hash, error = %err, "Could not journal pending transaction");
                false
            }
        };

        let receipt = self.await_receipt(task, ctx, &submitted.tx_hash, journaled).await?;
        let record = self.persist(pending, &receipt, redeploy).await?;

        info!(
            task = %task.name(),
            network = %ctx.network,
            address = %record.address,
            tx_hash = %record.tx_hash,
            "Deployed"
        );
        Ok(RunOutcome::Deployed(record))
    }

    /// Looks up a transaction an earlier run submitted but never recorded.
    async fn recover(
        &self,
        task: &Task,
        ctx: &NetworkContext,
        pending: PendingDeployment,
        args: &[ArgValue],
        redeploy: bool,
    ) -> Result<RunOutcome, TaskError> {
        warn!(
            task = %task.name(),
            network = %ctx.network,
            tx_hash = %pending.tx_hash,
            "Found unrecorded transaction from an earlier run; checking chain"
        );
        if pending.args != args {
            warn!(
                task = %task.name(),
                pending = %format_arguments(&pending.args),
                resolved = %format_arguments(args),
                "Pending transaction used different arguments"
            );
        }

        let tx_hash = pending.tx_hash.clone();
        let receipt = self.await_receipt(task, ctx, &tx_hash, true).await?;
        let record = self.persist(pending, &receipt, redeploy).await?;

        self.events
            .emit(
                event_types::TASK_RECOVERED,
                Some(json!({
                    "task": task.name(),
                    "network": ctx.network,
                    "address": record.address,
                    "tx_hash": record.tx_hash,
                })),
            )
            .await;
        Ok(RunOutcome::Deployed(record))
    }

    async fn await_receipt(
        &self,
        task: &Task,
        ctx: &NetworkContext,
        tx_hash: &str,
        journaled: bool,
    ) -> Result<TransactionReceipt, TaskError> {
        let timeout = self.config.confirmation_timeout;

        match tokio::time::timeout(timeout, self.chain.confirm(tx_hash)).await {
            Ok(Ok(receipt)) => Ok(receipt),
            Ok(Err(ChainError::Reverted { reason, .. })) => {
                // A reverted transaction created nothing; forget it.
                self.store.clear_pending(task.name(), &ctx.network).await?;
                Err(ChainError::Reverted {
                    tx_hash: Some(tx_hash.to_string()),
                    reason,
                }
                .into())
            }
            Ok(Err(err)) => Err(err.into()),
            Err(_) => Err(ChainError::Unconfirmed {
                tx_hash: tx_hash.to_string(),
                waited: timeout,
                journaled,
            }
            .into()),
        }
    }

    /// Writes the record for a confirmed transaction.
    async fn persist(
        &self,
        pending: PendingDeployment,
        receipt: &TransactionReceipt,
        redeploy: bool,
    ) -> Result<DeploymentRecord, TaskError> {
        let record = pending.into_record(receipt);
        let (task, network) = (record.task.as_str(), record.network.as_str());

        let written = if redeploy {
            self.store.replace(task, network, &record).await
        } else {
            self.store.put(task, network, &record).await
        };

        if let Err(cause) = written {
            return Err(OrphanedDeploymentError {
                task: record.task.clone(),
                network: record.network.clone(),
                address: record.address.clone(),
                tx_hash: record.tx_hash.clone(),
                cause,
            }
            .into());
        }

        if let Err(err) = self.store.clear_pending(task, network).await {
            warn!(task = %task, network = %network, error = %err, "Could not clear pending entry");
        }
        Ok(record)
    }
}
