//! Artifact stores.
//!
//! A store persists one [`DeploymentRecord`] per (task, network) and the
//! pending-transaction journal that makes interrupted runs resumable.
//! Records are create-only: [`ArtifactStore::put`] refuses to overwrite, and
//! only [`ArtifactStore::replace`] (used by forced redeploys) may.

mod file;
mod memory;

pub use file::FileArtifactStore;
pub use memory::InMemoryArtifactStore;

use async_trait::async_trait;
use std::fmt;

use crate::core::{DeploymentRecord, PendingDeployment};
use crate::errors::StoreError;

/// Durable storage for deployment records.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Returns true if a record exists for the key.
    async fn has(&self, task: &str, network: &str) -> Result<bool, StoreError> {
        Ok(self.get(task, network).await?.is_some())
    }

    /// Reads the record for the key.
    async fn get(&self, task: &str, network: &str) -> Result<Option<DeploymentRecord>, StoreError>;

    /// Writes a new record.
    ///
    /// # Errors
    ///
    /// [`StoreError::Conflict`] if a record already exists for the key, and
    /// [`StoreError::KeyMismatch`] if the record belongs to another key.
    async fn put(&self, task: &str, network: &str, record: &DeploymentRecord) -> Result<(), StoreError>;

    /// Writes a record, replacing any existing one.
    async fn replace(&self, task: &str, network: &str, record: &DeploymentRecord) -> Result<(), StoreError>;

    /// Lists every record for a network, sorted by task name.
    async fn list(&self, network: &str) -> Result<Vec<DeploymentRecord>, StoreError>;

    /// Reads the pending transaction for the key.
    async fn get_pending(&self, task: &str, network: &str) -> Result<Option<PendingDeployment>, StoreError>;

    /// Journals a submitted transaction.
    async fn put_pending(&self, pending: &PendingDeployment) -> Result<(), StoreError>;

    /// Removes the pending entry for the key. Missing entries are fine.
    async fn clear_pending(&self, task: &str, network: &str) -> Result<(), StoreError>;

    /// Lists the pending entries of a network, sorted by task name.
    async fn list_pending(&self, network: &str) -> Result<Vec<PendingDeployment>, StoreError>;

    /// Takes the exclusive lock for a network.
    ///
    /// # Errors
    ///
    /// [`StoreError::Locked`] if another run holds it.
    async fn lock_network(&self, network: &str) -> Result<NetworkLock, StoreError>;
}

/// Guard for an exclusive network lock. The lock is released on drop.
pub struct NetworkLock {
    network: String,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl NetworkLock {
    /// Creates a guard that runs `release` when dropped.
    pub fn new(network: impl Into<String>, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            network: network.into(),
            release: Some(Box::new(release)),
        }
    }

    /// Returns the locked network.
    #[must_use]
    pub fn network(&self) -> &str {
        &self.network
    }
}

impl fmt::Debug for NetworkLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkLock")
            .field("network", &self.network)
            .field("held", &self.release.is_some())
            .finish()
    }
}

impl Drop for NetworkLock {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// Rejects a record whose own task/network differ from its key.
pub(crate) fn check_key(task: &str, network: &str, record: &DeploymentRecord) -> Result<(), StoreError> {
    if record.task == task && record.network == network {
        return Ok(());
    }
    Err(StoreError::KeyMismatch {
        task: task.to_string(),
        network: network.to_string(),
        record_task: record.task.clone(),
        record_network: record.network.clone(),
    })
}
