//! Recording and failure-injecting doubles.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::chain::{ArtifactSource, ChainClient, ContractArtifact, DeployRequest, SubmittedTransaction};
use crate::core::{DeploymentRecord, PendingDeployment, TransactionReceipt};
use crate::errors::{ChainError, StoreError};
use crate::store::{ArtifactStore, NetworkLock};

#[derive(Debug, Default)]
struct ChainState {
    submissions: Vec<DeployRequest>,
    confirmations: Vec<String>,
    in_flight: HashMap<String, (String, String)>,
    submit_failures: HashMap<String, ChainError>,
    confirm_failures: HashMap<String, ChainError>,
    stalled: BTreeSet<String>,
    block: u64,
}

/// A chain that records every call and derives addresses deterministically.
///
/// Failures are scripted per contract name.
#[derive(Debug, Default)]
pub struct RecordingChain {
    state: Mutex<ChainState>,
}

impl RecordingChain {
    /// Creates a chain where every deployment succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `submit` fail for a contract.
    pub fn fail_submit(&self, contract: impl Into<String>, error: ChainError) {
        self.state.lock().submit_failures.insert(contract.into(), error);
    }

    /// Makes `confirm` fail for a contract's transactions.
    pub fn fail_confirm(&self, contract: impl Into<String>, error: ChainError) {
        self.state.lock().confirm_failures.insert(contract.into(), error);
    }

    /// Makes a contract's transactions never confirm.
    pub fn never_confirm(&self, contract: impl Into<String>) {
        self.state.lock().stalled.insert(contract.into());
    }

    /// Removes every scripted failure for a contract.
    pub fn heal(&self, contract: &str) {
        let mut state = self.state.lock();
        state.submit_failures.remove(contract);
        state.confirm_failures.remove(contract);
        state.stalled.remove(contract);
    }

    /// Returns how many transactions were submitted.
    #[must_use]
    pub fn submit_count(&self) -> usize {
        self.state.lock().submissions.len()
    }

    /// Returns every submitted request, in order.
    #[must_use]
    pub fn submissions(&self) -> Vec<DeployRequest> {
        self.state.lock().submissions.clone()
    }

    /// Returns the contract names that were submitted, in order.
    #[must_use]
    pub fn submitted_contracts(&self) -> Vec<String> {
        self.state
            .lock()
            .submissions
            .iter()
            .map(|r| r.artifact.contract_name.clone())
            .collect()
    }

    /// Returns the transaction hashes `confirm` was called with.
    #[must_use]
    pub fn confirmations(&self) -> Vec<String> {
        self.state.lock().confirmations.clone()
    }
}

fn digest_hex(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

#[async_trait]
impl ChainClient for RecordingChain {
    async fn submit(&self, request: &DeployRequest) -> Result<SubmittedTransaction, ChainError> {
        let mut state = self.state.lock();
        state.submissions.push(request.clone());

        let contract = request.artifact.contract_name.clone();
        if let Some(error) = state.submit_failures.get(&contract) {
            return Err(error.clone());
        }

        let nonce = state.submissions.len().to_string();
        let tx_hash = format!("0x{}", digest_hex(&["tx", &contract, &request.from, &nonce]));
        let address = format!("0x{}", &digest_hex(&["address", &tx_hash])[..40]);
        state.in_flight.insert(tx_hash.clone(), (contract, address));

        Ok(SubmittedTransaction { tx_hash })
    }

    async fn confirm(&self, tx_hash: &str) -> Result<TransactionReceipt, ChainError> {
        let outcome = {
            let mut state = self.state.lock();
            state.confirmations.push(tx_hash.to_string());

            match state.in_flight.get(tx_hash).cloned() {
                None => Some(Err(ChainError::Rpc {
                    code: -32000,
                    message: format!("unknown transaction {tx_hash}"),
                })),
                Some((contract, _)) if state.stalled.contains(&contract) => None,
                Some((contract, address)) => match state.confirm_failures.get(&contract) {
                    Some(error) => Some(Err(error.clone())),
                    None => {
                        state.block += 1;
                        Some(Ok(TransactionReceipt {
                            tx_hash: tx_hash.to_string(),
                            contract_address: address,
                            block_number: Some(state.block),
                        }))
                    }
                },
            }
        };

        match outcome {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }
}

/// Serves a minimal artifact for any contract unless told otherwise.
#[derive(Debug, Clone, Default)]
pub struct StaticArtifactSource {
    artifacts: BTreeMap<String, ContractArtifact>,
    missing: BTreeSet<String>,
}

impl StaticArtifactSource {
    /// Creates a source that synthesizes artifacts on demand.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves a specific artifact for its contract.
    #[must_use]
    pub fn with_artifact(mut self, artifact: ContractArtifact) -> Self {
        self.artifacts.insert(artifact.contract_name.clone(), artifact);
        self
    }

    /// Reports a contract as not compiled.
    #[must_use]
    pub fn with_missing(mut self, contract: impl Into<String>) -> Self {
        self.missing.insert(contract.into());
        self
    }
}

#[async_trait]
impl ArtifactSource for StaticArtifactSource {
    async fn load(&self, contract: &str) -> Result<ContractArtifact, ChainError> {
        if self.missing.contains(contract) {
            return Err(ChainError::Artifact {
                contract: contract.to_string(),
                reason: "not compiled".to_string(),
            });
        }
        Ok(self.artifacts.get(contract).cloned().unwrap_or_else(|| ContractArtifact {
            contract_name: contract.to_string(),
            abi: json!([]),
            bytecode: "0x6080604052".to_string(),
        }))
    }
}

/// Wraps a store and fails reads, record writes or journal writes on demand.
#[derive(Debug, Default)]
pub struct FlakyStore<S> {
    inner: S,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    fail_journal: AtomicBool,
}

impl<S: ArtifactStore> FlakyStore<S> {
    /// Wraps `inner`; nothing fails until asked to.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_writes: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            fail_journal: AtomicBool::new(false),
        }
    }

    /// Makes `put` and `replace` fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes `put_pending` fail.
    pub fn fail_journal(&self, fail: bool) {
        self.fail_journal.store(fail, Ordering::SeqCst);
    }

    /// Makes record reads fail.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Returns the wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn check(&self, flag: &AtomicBool, what: &str) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::io(
                format!("<flaky {what}>"),
                io::Error::other("no space left on device"),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl<S: ArtifactStore> ArtifactStore for FlakyStore<S> {
    async fn get(&self, task: &str, network: &str) -> Result<Option<DeploymentRecord>, StoreError> {
        self.check(&self.fail_reads, "read")?;
        self.inner.get(task, network).await
    }

    async fn put(&self, task: &str, network: &str, record: &DeploymentRecord) -> Result<(), StoreError> {
        self.check(&self.fail_writes, "write")?;
        self.inner.put(task, network, record).await
    }

    async fn replace(&self, task: &str, network: &str, record: &DeploymentRecord) -> Result<(), StoreError> {
        self.check(&self.fail_writes, "write")?;
        self.inner.replace(task, network, record).await
    }

    async fn list(&self, network: &str) -> Result<Vec<DeploymentRecord>, StoreError> {
        self.inner.list(network).await
    }

    async fn get_pending(&self, task: &str, network: &str) -> Result<Option<PendingDeployment>, StoreError> {
        self.inner.get_pending(task, network).await
    }

    async fn put_pending(&self, pending: &PendingDeployment) -> Result<(), StoreError> {
        self.check(&self.fail_journal, "journal")?;
        self.inner.put_pending(pending).await
    }

    async fn clear_pending(&self, task: &str, network: &str) -> Result<(), StoreError> {
        self.inner.clear_pending(task, network).await
    }

    async fn list_pending(&self, network: &str) -> Result<Vec<PendingDeployment>, StoreError> {
        self.inner.list_pending(network).await
    }

    async fn lock_network(&self, network: &str) -> Result<NetworkLock, StoreError> {
        self.inner.lock_network(network).await
    }
}
