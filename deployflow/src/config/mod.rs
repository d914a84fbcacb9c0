//! Project configuration (`deployflow.toml`).
//!
//! Declares networks, deployer accounts and tasks with their per-network
//! constructor arguments.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::debug;

use crate::chain::ConfiguredAccounts;
use crate::core::ArgValue;
use crate::errors::{ConfigError, RegistryError};
use crate::orchestrator::{FailureMode, NetworkProfile};
use crate::registry::{Task, TaskRegistry, TaskRegistryBuilder};
use crate::resolver::{ArgTemplate, NetworkTable};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "deployflow.toml";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Where deployment records are kept.
    pub deployments_dir: PathBuf,
    /// Where compiled contract artifacts are read from.
    pub artifacts_dir: PathBuf,
    /// Seconds to wait for a deployment to be mined.
    pub confirmation_timeout_secs: u64,
    /// Receipt polling interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Reaction to failed tasks.
    pub failure_mode: FailureMode,
    /// Networks by name.
    pub networks: BTreeMap<String, NetworkConfig>,
    /// Tasks in registration order.
    pub tasks: Vec<TaskConfig>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            deployments_dir: PathBuf::from("deployments"),
            artifacts_dir: PathBuf::from("artifacts"),
            confirmation_timeout_secs: 120,
            poll_interval_ms: 500,
            failure_mode: FailureMode::default(),
            networks: BTreeMap::new(),
            tasks: Vec::new(),
        }
    }
}

/// One network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// JSON-RPC endpoint.
    pub rpc_url: Option<String>,
    /// Live networks are never auto-mined.
    pub live: bool,
    /// Mine each deployment immediately.
    pub auto_mine: bool,
    /// The deployer account.
    pub deployer: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rpc_url: None,
            live: true,
            auto_mine: false,
            deployer: None,
        }
    }
}

/// One deployment task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Unique task name.
    pub name: String,
    /// Contract to deploy; defaults to the task name.
    #[serde(default)]
    pub contract: Option<String>,
    /// Selection tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Tasks that must be deployed first.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Constructor arguments by network.
    #[serde(default)]
    pub args: BTreeMap<String, Vec<ArgValue>>,
}

impl DeployConfig {
    /// Loads and validates a configuration file.
    ///
    /// Relative directories are resolved against the file's directory.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let mut config = Self::from_toml_str(&content)?;
        if let Some(base) = path.parent() {
            config.deployments_dir = base.join(&config.deployments_dir);
            config.artifacts_dir = base.join(&config.artifacts_dir);
        }

        debug!(
            path = %path.display(),
            tasks = config.tasks.len(),
            networks = config.networks.len(),
            "Loaded config"
        );
        Ok(config)
    }

    /// Parses and validates configuration text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values for consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.confirmation_timeout_secs == 0 {
            errors.push("confirmation_timeout_secs must be greater than 0".to_string());
        }
        if self.poll_interval_ms == 0 {
            errors.push("poll_interval_ms must be greater than 0".to_string());
        }
        if self.networks.keys().any(|name| name.trim().is_empty()) {
            errors.push("network names must not be empty".to_string());
        }

        // Duplicate names are left to the registry, which reports them with
        // its diagnostic code.
        for task in &self.tasks {
            if task.name.trim().is_empty() {
                errors.push("task names must not be empty".to_string());
                continue;
            }

            for (network, args) in &task.args {
                for arg in args {
                    if let ArgTemplate::AddressOf(target) = ArgTemplate::parse(arg.clone()) {
                        if !task.dependencies.contains(&target) {
                            errors.push(format!(
                                "task '{}' uses ${{address:{target}}} on '{network}' but does not depend on '{target}'",
                                task.name
                            ));
                        }
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    /// Returns the confirmation timeout.
    #[must_use]
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    /// Returns the receipt polling interval.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Returns the RPC endpoint of a network.
    #[must_use]
    pub fn rpc_url(&self, network: &str) -> Option<&str> {
        self.networks.get(network)?.rpc_url.as_deref()
    }

    /// Builds the task registry.
    pub fn build_registry(&self) -> Result<TaskRegistry, RegistryError> {
        let mut builder = TaskRegistryBuilder::new();

        for task in &self.tasks {
            let mut table = NetworkTable::new();
            for (network, args) in &task.args {
                table.insert(network.clone(), args.iter().cloned().map(ArgTemplate::parse).collect());
            }

            let mut definition = Task::new(task.name.clone(), table)
                .with_tags(task.tags.iter().cloned())
                .with_dependencies(task.dependencies.iter().cloned());
            if let Some(contract) = &task.contract {
                definition = definition.with_contract(contract.clone());
            }
            builder.register(definition)?;
        }

        builder.build()
    }

    /// Returns the configured deployer accounts.
    #[must_use]
    pub fn accounts(&self) -> ConfiguredAccounts {
        self.networks
            .iter()
            .filter_map(|(name, net)| net.deployer.clone().map(|d| (name.clone(), d)))
            .collect()
    }

    /// Returns how each configured network behaves.
    pub fn network_profiles(&self) -> impl Iterator<Item = (&str, NetworkProfile)> {
        self.networks.iter().map(|(name, net)| {
            (
                name.as_str(),
                NetworkProfile {
                    live: net.live,
                    auto_mine: net.auto_mine,
                },
            )
        })
    }
}
