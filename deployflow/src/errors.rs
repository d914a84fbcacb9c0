//! Error types for deployflow.
//!
//! Startup-class errors (registry misuse, configuration, locking, accounts)
//! abort a run before anything is deployed. Per-task errors are wrapped in
//! [`TaskError`] and reported through the run result instead.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::core::ArgValue;

/// The main error type for deployflow operations.
#[derive(Debug, Error)]
pub enum DeployflowError {
    /// The task registry was misused.
    #[error("{0}")]
    Registry(#[from] RegistryError),

    /// Arguments could not be resolved.
    #[error("{0}")]
    Resolution(#[from] ResolutionError),

    /// The chain client failed.
    #[error("{0}")]
    Chain(#[from] ChainError),

    /// The artifact store failed.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// No deployer account could be determined.
    #[error("{0}")]
    Account(#[from] AccountError),

    /// The project configuration is invalid.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeployflowError {
    /// Returns the diagnostic info attached to the error, if any.
    #[must_use]
    pub fn error_info(&self) -> Option<&ErrorInfo> {
        match self {
            Self::Registry(err) => err.error_info(),
            _ => None,
        }
    }
}

/// Diagnostic metadata attached to registry errors.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Error code (e.g., "REGISTRY-002-CYCLE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: BTreeMap<String, String>,
}

impl ErrorInfo {
    /// Creates a new error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: BTreeMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Errors raised while building or querying the task registry.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// A task name was registered twice.
    #[error("{0}")]
    Duplicate(#[from] DuplicateTaskError),

    /// Task dependencies form a cycle.
    #[error("{0}")]
    Cycle(#[from] CycleDetectedError),

    /// A task depends on a task that was never registered.
    #[error("Task '{task}' depends on unknown task '{dependency}'")]
    MissingDependency {
        /// The dependent task.
        task: String,
        /// The unknown dependency.
        dependency: String,
        /// Diagnostic info.
        error_info: ErrorInfo,
    },

    /// A parameter builder references a task that is not a declared dependency.
    #[error("{0}")]
    UndeclaredDependency(#[from] UndeclaredDependencyError),

    /// A task name was looked up but is not registered.
    #[error("Unknown task '{0}'")]
    UnknownTask(String),
}

impl RegistryError {
    /// Creates a missing dependency error.
    #[must_use]
    pub fn missing_dependency(task: impl Into<String>, dependency: impl Into<String>) -> Self {
        let task = task.into();
        let dependency = dependency.into();
        let error_info = ErrorInfo::new(
            "REGISTRY-003-MISSING_DEP",
            format!("Dependency '{dependency}' not found"),
        )
        .with_fix_hint("Register the dependency or fix the typo in the task's dependency list.")
        .with_context_entry("task", task.clone());

        Self::MissingDependency {
            task,
            dependency,
            error_info,
        }
    }

    /// Returns the diagnostic info for this error, if it carries one.
    #[must_use]
    pub fn error_info(&self) -> Option<&ErrorInfo> {
        match self {
            Self::Duplicate(err) => Some(&err.error_info),
            Self::Cycle(err) => Some(&err.error_info),
            Self::MissingDependency { error_info, .. } => Some(error_info),
            Self::UndeclaredDependency(err) => Some(&err.error_info),
            Self::UnknownTask(_) => None,
        }
    }
}

/// Error raised when a task name is registered twice.
#[derive(Debug, Clone, Error)]
#[error("Duplicate task: '{name}' is already registered")]
pub struct DuplicateTaskError {
    /// The duplicated task name.
    pub name: String,
    /// Diagnostic info.
    pub error_info: ErrorInfo,
}

impl DuplicateTaskError {
    /// Creates a new duplicate task error.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let error_info = ErrorInfo::new(
            "REGISTRY-001-DUPLICATE",
            format!("Task '{name}' registered more than once"),
        )
        .with_fix_hint("Task names must be unique; rename one of the tasks.");
        Self { name, error_info }
    }
}

/// Error raised when a cycle is detected in task dependencies.
#[derive(Debug, Clone, Error)]
#[error("Cycle detected in task dependencies: {}", cycle_path.join(" -> "))]
pub struct CycleDetectedError {
    /// The path of tasks forming the cycle.
    pub cycle_path: Vec<String>,
    /// Diagnostic info.
    pub error_info: ErrorInfo,
}

impl CycleDetectedError {
    /// Creates a new cycle detected error.
    #[must_use]
    pub fn new(cycle_path: Vec<String>) -> Self {
        let error_info = ErrorInfo::new(
            "REGISTRY-002-CYCLE",
            format!("Tasks contain a dependency cycle: {}", cycle_path.join(" -> ")),
        )
        .with_fix_hint("Remove one of the dependencies in the cycle to break it.");

        Self {
            cycle_path,
            error_info,
        }
    }
}

/// Error raised when a parameter builder reads an address it did not declare.
#[derive(Debug, Clone, Error)]
#[error("Undeclared dependency: task '{task}' uses the address of '{referenced}' which is not one of its dependencies")]
pub struct UndeclaredDependencyError {
    /// The task whose arguments reference another task.
    pub task: String,
    /// The referenced task.
    pub referenced: String,
    /// Diagnostic info.
    pub error_info: ErrorInfo,
}

impl UndeclaredDependencyError {
    /// Creates a new undeclared dependency error.
    #[must_use]
    pub fn new(task: impl Into<String>, referenced: impl Into<String>) -> Self {
        let task = task.into();
        let referenced = referenced.into();
        let error_info = ErrorInfo::new(
            "REGISTRY-004-UNDECLARED",
            format!("'{task}' reads the address of '{referenced}'"),
        )
        .with_fix_hint(format!("Add '{referenced}' to the dependencies of '{task}'."));
        Self {
            task,
            referenced,
            error_info,
        }
    }
}

/// Errors raised while resolving constructor arguments for a network.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolutionError {
    /// The task has no argument mapping for the network.
    #[error("No constructor arguments for task '{task}' on network '{network}'")]
    UnmappedNetwork {
        /// The task name.
        task: String,
        /// The requested network.
        network: String,
    },

    /// The task is not registered.
    #[error("Cannot resolve arguments for unknown task '{0}'")]
    UnknownTask(String),

    /// A dependency whose address is needed has no record on this network.
    #[error("Task '{task}' needs '{dependency}' which is not deployed on '{network}'")]
    DependencyNotDeployed {
        /// The task name.
        task: String,
        /// The missing dependency.
        dependency: String,
        /// The network.
        network: String,
    },

    /// The recorded arguments differ from the freshly resolved ones.
    #[error("Arguments for '{task}' on '{network}' changed since deployment (recorded {recorded:?}, resolved {resolved:?}); redeploy with --force to replace it")]
    ArgumentMismatch {
        /// The task name.
        task: String,
        /// The network.
        network: String,
        /// Arguments stored in the existing record.
        recorded: Vec<ArgValue>,
        /// Arguments resolved for this run.
        resolved: Vec<ArgValue>,
    },

    /// A builder produced an invalid argument list.
    #[error("Invalid arguments for '{task}': {reason}")]
    Invalid {
        /// The task name.
        task: String,
        /// What went wrong.
        reason: String,
    },
}

/// Errors reported by the chain client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// The deployer cannot pay for the transaction.
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    /// The constructor reverted.
    #[error("Transaction reverted: {reason}")]
    Reverted {
        /// The transaction hash, when one was assigned.
        tx_hash: Option<String>,
        /// The revert reason.
        reason: String,
    },

    /// The transaction was submitted but not confirmed in time.
    #[error("Transaction {tx_hash} unconfirmed after {}s; {}", waited.as_secs(), unconfirmed_advice(*journaled))]
    Unconfirmed {
        /// The submitted transaction hash.
        tx_hash: String,
        /// How long we waited.
        waited: Duration,
        /// Whether the transaction is in the pending journal. If not, the
        /// next run cannot recover it and would submit again.
        journaled: bool,
    },

    /// The node returned a JSON-RPC error.
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// The error code.
        code: i64,
        /// The error message.
        message: String,
    },

    /// The node could not be reached.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Constructor arguments could not be encoded.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// The compiled artifact could not be loaded.
    #[error("Artifact for contract '{contract}' unavailable: {reason}")]
    Artifact {
        /// The contract name.
        contract: String,
        /// What went wrong.
        reason: String,
    },
}

impl ChainError {
    /// Returns true if the transaction may still land on chain.
    #[must_use]
    pub fn is_unconfirmed(&self) -> bool {
        matches!(self, Self::Unconfirmed { .. })
    }
}

fn unconfirmed_advice(journaled: bool) -> &'static str {
    if journaled {
        "inspect chain state before retrying"
    } else {
        "it was NOT journaled, so a retry would deploy again; record it by hand once mined"
    }
}

/// Errors raised by artifact stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O operation failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// The path involved.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A persisted entry could not be read back.
    #[error("Corrupted entry at {location}: {reason}")]
    Corrupted {
        /// Where the entry lives.
        location: String,
        /// What went wrong.
        reason: String,
    },

    /// A record already exists for the key.
    #[error("A deployment record for '{task}' on '{network}' already exists")]
    Conflict {
        /// The task name.
        task: String,
        /// The network.
        network: String,
    },

    /// Another run holds the network lock.
    #[error("Network '{network}' is locked by another run ({holder})")]
    Locked {
        /// The network.
        network: String,
        /// Description of the lock holder.
        holder: String,
    },

    /// The record does not belong to the key it was written under.
    #[error("Record for '{record_task}'@'{record_network}' written under key '{task}'@'{network}'")]
    KeyMismatch {
        /// The key task name.
        task: String,
        /// The key network.
        network: String,
        /// The record's task.
        record_task: String,
        /// The record's network.
        record_network: String,
    },
}

impl StoreError {
    /// Wraps an I/O error with its path.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns a hint for the operator, if the error has an obvious remedy.
    #[must_use]
    pub fn fix_hint(&self) -> Option<String> {
        match self {
            Self::Locked { network, .. } => Some(format!(
                "If no deploy is running on '{network}', the previous one was killed; \
                 run `deployflow unlock --network {network}` and deploy again to resume"
            )),
            _ => None,
        }
    }
}

/// A contract was deployed on chain but its record could not be persisted.
///
/// Retrying would deploy a duplicate, so this needs manual reconciliation.
#[derive(Debug, Error)]
#[error("ORPHANED DEPLOYMENT: '{task}' on '{network}' is live at {address} (tx {tx_hash}) but was not recorded: {cause}")]
pub struct OrphanedDeploymentError {
    /// The task name.
    pub task: String,
    /// The network.
    pub network: String,
    /// The deployed address.
    pub address: String,
    /// The confirmed transaction hash.
    pub tx_hash: String,
    /// Why the record could not be written.
    #[source]
    pub cause: StoreError,
}

/// Errors raised by account providers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    /// No deployer is configured for the network.
    #[error("No deployer account configured for network '{0}'")]
    Unconfigured(String),
}

/// Errors raised while loading the project configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Cannot read config {}: {source}", path.display())]
    Read {
        /// The config path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for the schema.
    #[error("Cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration is syntactically valid but inconsistent.
    #[error("Invalid config: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Why a single task failed.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Arguments could not be resolved.
    #[error("{0}")]
    Resolution(#[from] ResolutionError),

    /// The chain client failed.
    #[error("{0}")]
    Chain(#[from] ChainError),

    /// The store failed before anything was submitted.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// Deployed but unrecorded.
    #[error("{0}")]
    Orphaned(#[from] OrphanedDeploymentError),
}

impl TaskError {
    /// Returns a short, stable name for the error class.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Resolution(ResolutionError::ArgumentMismatch { .. }) => "argument_mismatch",
            Self::Resolution(_) => "resolution",
            Self::Chain(ChainError::Unconfirmed { .. }) => "unconfirmed",
            Self::Chain(_) => "chain",
            Self::Store(_) => "store",
            Self::Orphaned(_) => "orphaned_deployment",
        }
    }
}

/// Why a task was not attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockCause {
    /// A dependency failed or was itself blocked.
    Dependency {
        /// The dependency that did not complete.
        dependency: String,
    },
    /// The run stopped after a failure in fail-fast mode.
    RunHalted {
        /// The task whose failure halted the run.
        after: String,
    },
}

/// A task was skipped because something it needs did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Task '{task}' blocked: {}", describe_cause(cause))]
pub struct BlockedByDependencyFailure {
    /// The blocked task.
    pub task: String,
    /// Why the task was blocked.
    pub cause: BlockCause,
}

fn describe_cause(cause: &BlockCause) -> String {
    match cause {
        BlockCause::Dependency { dependency } => format!("dependency '{dependency}' did not complete"),
        BlockCause::RunHalted { after } => format!("run halted after '{after}' failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locked_store_error_has_unlock_hint() {
        let err = StoreError::Locked {
            network: "sepolia".to_string(),
            holder: "pid 1 since then".to_string(),
        };
        let hint = err.fix_hint().unwrap();
        assert!(hint.contains("deployflow unlock --network sepolia"));

        let other = StoreError::Conflict {
            task: "Auction".to_string(),
            network: "sepolia".to_string(),
        };
        assert!(other.fix_hint().is_none());
    }

    #[test]
    fn test_error_info_creation() {
        let info = ErrorInfo::new("TEST-001", "Test error")
            .with_fix_hint("Fix this by doing that")
            .with_context_entry("task", "Auction");

        assert_eq!(info.code, "TEST-001");
        assert_eq!(info.fix_hint, Some("Fix this by doing that".to_string()));
        assert_eq!(info.context.get("task"), Some(&"Auction".to_string()));
    }

    #[test]
    fn test_cycle_detected_error() {
        let err = CycleDetectedError::new(vec![
            "a".to_string(),
            "b".to_string(),
            "a".to_string(),
        ]);

        assert!(err.to_string().contains("a -> b -> a"));
        assert_eq!(err.error_info.code, "REGISTRY-002-CYCLE");
    }

    #[test]
    fn test_registry_error_info_codes() {
        let dup: RegistryError = DuplicateTaskError::new("Auction").into();
        assert_eq!(dup.error_info().map(|i| i.code.as_str()), Some("REGISTRY-001-DUPLICATE"));

        let missing = RegistryError::missing_dependency("Market", "Token");
        assert_eq!(
            missing.error_info().map(|i| i.code.as_str()),
            Some("REGISTRY-003-MISSING_DEP")
        );
        assert!(missing.to_string().contains("'Token'"));

        let wrapped = DeployflowError::from(missing);
        assert!(wrapped.error_info().is_some());
    }

    #[test]
    fn test_task_error_kind() {
        let err = TaskError::from(ChainError::Unconfirmed {
            tx_hash: "0xabc".to_string(),
            waited: Duration::from_secs(30),
            journaled: true,
        });
        assert_eq!(err.kind(), "unconfirmed");
        assert!(err.to_string().contains("0xabc"));
        assert!(err.to_string().contains("inspect chain state"));

        let unjournaled = ChainError::Unconfirmed {
            tx_hash: "0xabc".to_string(),
            waited: Duration::from_secs(30),
            journaled: false,
        };
        assert!(unjournaled.to_string().contains("NOT journaled"));

        let err = TaskError::from(ResolutionError::UnmappedNetwork {
            task: "Auction".to_string(),
            network: "unknownnet".to_string(),
        });
        assert_eq!(err.kind(), "resolution");
    }

    #[test]
    fn test_blocked_display() {
        let blocked = BlockedByDependencyFailure {
            task: "Market".to_string(),
            cause: BlockCause::Dependency {
                dependency: "Token".to_string(),
            },
        };
        assert_eq!(
            blocked.to_string(),
            "Task 'Market' blocked: dependency 'Token' did not complete"
        );
    }
}
