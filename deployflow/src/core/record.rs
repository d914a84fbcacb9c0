//! Persisted deployment records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::value::{hash_arguments, ArgValue};

/// Durable proof that a task has been deployed on a network.
///
/// Created once per (task, network) on the first confirmed deployment and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    /// The task name.
    pub task: String,
    /// The network identifier.
    pub network: String,
    /// The contract that was deployed.
    pub contract: String,
    /// The deployed contract address.
    pub address: String,
    /// Constructor arguments, in order.
    pub args: Vec<ArgValue>,
    /// Digest of `args`.
    pub args_hash: String,
    /// The deployment transaction hash.
    pub tx_hash: String,
    /// The account that sent the transaction.
    pub deployer: String,
    /// Block the transaction was included in, when the chain reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    /// When confirmation was observed.
    pub confirmed_at: DateTime<Utc>,
}

impl DeploymentRecord {
    /// Builds a record from a confirmed receipt.
    #[must_use]
    pub fn new(
        task: impl Into<String>,
        network: impl Into<String>,
        contract: impl Into<String>,
        deployer: impl Into<String>,
        args: Vec<ArgValue>,
        receipt: &TransactionReceipt,
    ) -> Self {
        Self {
            task: task.into(),
            network: network.into(),
            contract: contract.into(),
            address: receipt.contract_address.clone(),
            args_hash: hash_arguments(&args),
            args,
            tx_hash: receipt.tx_hash.clone(),
            deployer: deployer.into(),
            block_number: receipt.block_number,
            confirmed_at: Utc::now(),
        }
    }

    /// Returns true if the record was deployed with exactly these arguments.
    #[must_use]
    pub fn matches_args(&self, args: &[ArgValue]) -> bool {
        self.args == args
    }
}

/// A confirmed deployment transaction as reported by the chain client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    /// The transaction hash.
    pub tx_hash: String,
    /// The created contract address.
    pub contract_address: String,
    /// The block the transaction landed in.
    pub block_number: Option<u64>,
}

/// A deployment transaction that was submitted but is not yet recorded.
///
/// Written before waiting for confirmation so an interrupted run can look
/// the transaction up instead of sending a second one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDeployment {
    /// The task name.
    pub task: String,
    /// The network identifier.
    pub network: String,
    /// The contract being deployed.
    pub contract: String,
    /// The submitted transaction hash.
    pub tx_hash: String,
    /// The arguments that were submitted.
    pub args: Vec<ArgValue>,
    /// The sending account.
    pub deployer: String,
    /// When the transaction was submitted.
    pub submitted_at: DateTime<Utc>,
}

impl PendingDeployment {
    /// Turns the pending entry into a record once its receipt is known.
    #[must_use]
    pub fn into_record(self, receipt: &TransactionReceipt) -> DeploymentRecord {
        DeploymentRecord::new(
            self.task,
            self.network,
            self.contract,
            self.deployer,
            self.args,
            receipt,
        )
    }
}
