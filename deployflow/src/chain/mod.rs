//! Chain-facing collaborators: the deployment client, compiled artifacts and
//! deployer accounts.
//!
//! The executor only depends on the traits here. [`JsonRpcChainClient`]
//! (feature `rpc`) is the production client; tests use the doubles in
//! [`crate::testing`].

pub mod abi;
mod accounts;
mod artifacts;
#[cfg(feature = "rpc")]
mod rpc;

pub use accounts::{AccountProvider, ConfiguredAccounts};
pub use artifacts::{ArtifactDirectory, ArtifactSource, ContractArtifact};
#[cfg(feature = "rpc")]
pub use rpc::JsonRpcChainClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{ArgValue, TransactionReceipt};
use crate::errors::ChainError;

/// Per-submission options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployOptions {
    /// Ask the node to mine a block right after submission.
    ///
    /// The executor never sets this for live networks.
    pub auto_mine: bool,
}

/// A contract creation to submit.
#[derive(Debug, Clone, PartialEq)]
pub struct DeployRequest {
    /// The compiled contract.
    pub artifact: ContractArtifact,
    /// Constructor arguments, in order.
    pub args: Vec<ArgValue>,
    /// The sending account.
    pub from: String,
    /// Submission options.
    pub options: DeployOptions,
}

/// A transaction accepted by the node but not yet confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedTransaction {
    /// The transaction hash.
    pub tx_hash: String,
}

/// Narrow interface to the chain.
///
/// Deployment is split in two so the caller can journal the transaction hash
/// between sending and waiting.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Sends the contract-creation transaction.
    async fn submit(&self, request: &DeployRequest) -> Result<SubmittedTransaction, ChainError>;

    /// Waits until the transaction is mined and returns its receipt.
    ///
    /// Callers bound the wait with their own timeout.
    async fn confirm(&self, tx_hash: &str) -> Result<TransactionReceipt, ChainError>;
}
