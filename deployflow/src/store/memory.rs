//! In-memory artifact store.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use super::{check_key, ArtifactStore, NetworkLock};
use crate::core::{DeploymentRecord, PendingDeployment};
use crate::errors::StoreError;

type Key = (String, String);

fn key(task: &str, network: &str) -> Key {
    (network.to_string(), task.to_string())
}

#[derive(Debug, Default)]
struct State {
    records: BTreeMap<Key, DeploymentRecord>,
    pending: BTreeMap<Key, PendingDeployment>,
    locks: HashSet<String>,
    writes: usize,
}

/// Artifact store that lives only as long as the process.
///
/// Clones share state, so a test can keep a handle while the executor owns
/// another.
#[derive(Debug, Clone, Default)]
pub struct InMemoryArtifactStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryArtifactStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of records across all networks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    /// Returns true if no record has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().records.is_empty()
    }

    /// Returns how many record writes (`put` or `replace`) succeeded.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.state.lock().writes
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn get(&self, task: &str, network: &str) -> Result<Option<DeploymentRecord>, StoreError> {
        Ok(self.state.lock().records.get(&key(task, network)).cloned())
    }

    async fn put(&self, task: &str, network: &str, record: &DeploymentRecord) -> Result<(), StoreError> {
        check_key(task, network, record)?;
        let mut state = self.state.lock();
        let k = key(task, network);
        if state.records.contains_key(&k) {
            return Err(StoreError::Conflict {
                task: task.to_string(),
                network: network.to_string(),
            });
        }
        state.records.insert(k, record.clone());
        state.writes += 1;
        Ok(())
    }

    async fn replace(&self, task: &str, network: &str, record: &DeploymentRecord) -> Result<(), StoreError> {
        check_key(task, network, record)?;
        let mut state = self.state.lock();
        state.records.insert(key(task, network), record.clone());
        state.writes += 1;
        Ok(())
    }

    async fn list(&self, network: &str) -> Result<Vec<DeploymentRecord>, StoreError> {
        Ok(self
            .state
            .lock()
            .records
            .iter()
            .filter(|((net, _), _)| net == network)
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn get_pending(&self, task: &str, network: &str) -> Result<Option<PendingDeployment>, StoreError> {
        Ok(self.state.lock().pending.get(&key(task, network)).cloned())
    }

    async fn put_pending(&self, pending: &PendingDeployment) -> Result<(), StoreError> {
        self.state
            .lock()
            .pending
            .insert(key(&pending.task, &pending.network), pending.clone());
        Ok(())
    }

    async fn clear_pending(&self, task: &str, network: &str) -> Result<(), StoreError> {
        self.state.lock().pending.remove(&key(task, network));
        Ok(())
    }

    async fn list_pending(&self, network: &str) -> Result<Vec<PendingDeployment>, StoreError> {
        Ok(self
            .state
            .lock()
            .pending
            .iter()
            .filter(|((net, _), _)| net == network)
            .map(|(_, pending)| pending.clone())
            .collect())
    }

    async fn lock_network(&self, network: &str) -> Result<NetworkLock, StoreError> {
        if !self.state.lock().locks.insert(network.to_string()) {
            return Err(StoreError::Locked {
                network: network.to_string(),
                holder: "another run in this process".to_string(),
            });
        }

        let state = Arc::clone(&self.state);
        let name = network.to_string();
        Ok(NetworkLock::new(network, move || {
            state.lock().locks.remove(&name);
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ArgValue, TransactionReceipt};
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn record(task: &str, network: &str) -> DeploymentRecord {
        let receipt = TransactionReceipt {
            tx_hash: format!("0xtx{task}"),
            contract_address: format!("0xaddr{task}"),
            block_number: Some(1),
        };
        DeploymentRecord::new(task, network, task, "0xdeployer", vec![ArgValue::from(1_i64)], &receipt)
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let store = InMemoryArtifactStore::new();
        assert!(!store.has("Auction", "local").await.unwrap());

        let rec = record("Auction", "local");
        store.put("Auction", "local", &rec).await.unwrap();

        assert!(store.has("Auction", "local").await.unwrap());
        assert_eq!(store.get("Auction", "local").await.unwrap(), Some(rec));
        assert!(store.get("Auction", "sepolia").await.unwrap().is_none());
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_put_is_create_only() {
        let store = InMemoryArtifactStore::new();
        store.put("Auction", "local", &record("Auction", "local")).await.unwrap();

        let err = store
            .put("Auction", "local", &record("Auction", "local"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));

        store.replace("Auction", "local", &record("Auction", "local")).await.unwrap();
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn test_put_rejects_foreign_record() {
        let store = InMemoryArtifactStore::new();
        let err = store
            .put("Auction", "local", &record("Token", "local"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::KeyMismatch { .. }));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_list_is_per_network_and_sorted() {
        let store = InMemoryArtifactStore::new();
        store.put("Token", "local", &record("Token", "local")).await.unwrap();
        store.put("Auction", "local", &record("Auction", "local")).await.unwrap();
        store.put("Auction", "sepolia", &record("Auction", "sepolia")).await.unwrap();

        let tasks: Vec<String> = store
            .list("local")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.task)
            .collect();
        assert_eq!(tasks, vec!["Auction", "Token"]);
    }

    #[tokio::test]
    async fn test_pending_journal() {
        let store = InMemoryArtifactStore::new();
        let pending = PendingDeployment {
            task: "Auction".to_string(),
            network: "local".to_string(),
            contract: "Auction".to_string(),
            tx_hash: "0xtx".to_string(),
            args: vec![],
            deployer: "0xdeployer".to_string(),
            submitted_at: Utc::now(),
        };

        store.put_pending(&pending).await.unwrap();
        assert_eq!(store.get_pending("Auction", "local").await.unwrap(), Some(pending));
        assert_eq!(store.list_pending("local").await.unwrap().len(), 1);

        store.clear_pending("Auction", "local").await.unwrap();
        store.clear_pending("Auction", "local").await.unwrap();
        assert!(store.get_pending("Auction", "local").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_network_lock_is_exclusive() {
        let store = InMemoryArtifactStore::new();
        let lock = store.lock_network("local").await.unwrap();

        let err = store.lock_network("local").await.unwrap_err();
        assert!(matches!(err, StoreError::Locked { .. }));
        assert!(store.lock_network("sepolia").await.is_ok());

        drop(lock);
        assert!(store.lock_network("local").await.is_ok());
    }
}
