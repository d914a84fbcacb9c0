//! File-backed artifact store.
//!
//! Layout under the root directory:
//!
//! ```text
//! <network>/<Task>.json          deployment record
//! <network>/.pending/<Task>.json submitted, not yet recorded
//! <network>/.lock                held by the running deploy
//! ```

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::{check_key, ArtifactStore, NetworkLock};
use crate::core::{DeploymentRecord, PendingDeployment};
use crate::errors::StoreError;

const PENDING_DIR: &str = ".pending";
const LOCK_FILE: &str = ".lock";

/// Stores one pretty-printed JSON document per (network, task).
#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    root: PathBuf,
}

impl FileArtifactStore {
    /// Opens a store rooted at `root`, creating it if needed.
    ///
    /// Temporary files left by interrupted writes are removed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| StoreError::io(&root, e))?;

        let store = Self { root };
        store.recover_interrupted_writes().await;
        Ok(store)
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn network_dir(&self, network: &str) -> Result<PathBuf, StoreError> {
        Ok(self.root.join(segment(&self.root, network)?))
    }

    fn record_path(&self, task: &str, network: &str) -> Result<PathBuf, StoreError> {
        let dir = self.network_dir(network)?;
        let file = format!("{}.json", segment(&dir, task)?);
        Ok(dir.join(file))
    }

    fn pending_path(&self, task: &str, network: &str) -> Result<PathBuf, StoreError> {
        let dir = self.network_dir(network)?.join(PENDING_DIR);
        let file = format!("{}.json", segment(&dir, task)?);
        Ok(dir.join(file))
    }

    async fn recover_interrupted_writes(&self) {
        let Ok(mut networks) = fs::read_dir(&self.root).await else {
            return;
        };
        while let Ok(Some(entry)) = networks.next_entry().await {
            let dir = entry.path();
            if dir.is_dir() {
                remove_tmp_files(&dir).await;
                remove_tmp_files(&dir.join(PENDING_DIR)).await;
            }
        }
    }

    async fn write_record(&self, task: &str, network: &str, record: &DeploymentRecord, create_only: bool) -> Result<(), StoreError> {
        check_key(task, network, record)?;
        let path = self.record_path(task, network)?;
        let content = to_json(&path, record)?;
        write_atomic(&path, &content, create_only)
            .await
            .map_err(|e| match e {
                WriteError::Exists => StoreError::Conflict {
                    task: task.to_string(),
                    network: network.to_string(),
                },
                WriteError::Store(err) => err,
            })?;

        debug!(task = %task, network = %network, path = %path.display(), "Record written");
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for FileArtifactStore {
    async fn get(&self, task: &str, network: &str) -> Result<Option<DeploymentRecord>, StoreError> {
        let path = self.record_path(task, network)?;
        let Some(record) = read_json::<DeploymentRecord>(&path).await? else {
            return Ok(None);
        };

        if record.task != task || record.network != network {
            return Err(StoreError::Corrupted {
                location: path.display().to_string(),
                reason: format!(
                    "record is for '{}'@'{}', not '{task}'@'{network}'",
                    record.task, record.network
                ),
            });
        }
        Ok(Some(record))
    }

    async fn put(&self, task: &str, network: &str, record: &DeploymentRecord) -> Result<(), StoreError> {
        self.write_record(task, network, record, true).await
    }

    async fn replace(&self, task: &str, network: &str, record: &DeploymentRecord) -> Result<(), StoreError> {
        self.write_record(task, network, record, false).await
    }

    async fn list(&self, network: &str) -> Result<Vec<DeploymentRecord>, StoreError> {
        let dir = self.network_dir(network)?;
        let mut records: Vec<DeploymentRecord> = read_all_json(&dir).await?;
        records.sort_by(|a, b| a.task.cmp(&b.task));
        Ok(records)
    }

    async fn get_pending(&self, task: &str, network: &str) -> Result<Option<PendingDeployment>, StoreError> {
        read_json(&self.pending_path(task, network)?).await
    }

    async fn put_pending(&self, pending: &PendingDeployment) -> Result<(), StoreError> {
        let path = self.pending_path(&pending.task, &pending.network)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent, e))?;
        }
        let content = to_json(&path, pending)?;
        write_atomic(&path, &content, false).await.map_err(WriteError::into_store)
    }

    async fn clear_pending(&self, task: &str, network: &str) -> Result<(), StoreError> {
        let path = self.pending_path(task, network)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    async fn list_pending(&self, network: &str) -> Result<Vec<PendingDeployment>, StoreError> {
        let dir = self.network_dir(network)?.join(PENDING_DIR);
        let mut pending: Vec<PendingDeployment> = read_all_json(&dir).await?;
        pending.sort_by(|a, b| a.task.cmp(&b.task));
        Ok(pending)
    }

    async fn lock_network(&self, network: &str) -> Result<NetworkLock, StoreError> {
        let dir = self.network_dir(network)?;
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io(&dir, e))?;

        let path = dir.join(LOCK_FILE);
        let mut file = match create_lock_file(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let holder = read_holder(&path).await;
                if !holder_is_gone(&holder) {
                    return Err(StoreError::Locked {
                        network: network.to_string(),
                        holder,
                    });
                }

                warn!(network = %network, holder = %holder, "Removing stale network lock");
                remove_lock_file(&path).await?;
                // A concurrent run may win the race for the freed lock.
                create_lock_file(&path).await.map_err(|e| match e.kind() {
                    ErrorKind::AlreadyExists => StoreError::Locked {
                        network: network.to_string(),
                        holder: "another run".to_string(),
                    },
                    _ => StoreError::io(&path, e),
                })?
            }
            Err(e) => return Err(StoreError::io(path, e)),
        };

        let holder = format!("pid {} since {}", std::process::id(), Utc::now().to_rfc3339());
        file.write_all(holder.as_bytes())
            .await
            .map_err(|e| StoreError::io(&path, e))?;
        file.flush().await.map_err(|e| StoreError::io(&path, e))?;

        debug!(network = %network, path = %path.display(), "Network lock acquired");
        Ok(NetworkLock::new(network, move || {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "Failed to remove network lock");
            }
        }))
    }
}

impl FileArtifactStore {
    /// Removes the lock of `network` regardless of who holds it.
    ///
    /// For recovering after a run was killed. Returns the holder that was
    /// removed, or `None` if the network was not locked.
    pub async fn break_lock(&self, network: &str) -> Result<Option<String>, StoreError> {
        let path = self.network_dir(network)?.join(LOCK_FILE);
        if !path.exists() {
            return Ok(None);
        }

        let holder = read_holder(&path).await;
        remove_lock_file(&path).await?;
        warn!(network = %network, holder = %holder, "Network lock broken");
        Ok(Some(holder))
    }
}

async fn create_lock_file(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
}

async fn remove_lock_file(path: &Path) -> Result<(), StoreError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

async fn read_holder(path: &Path) -> String {
    fs::read_to_string(path)
        .await
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| "unknown holder".to_string())
}

/// Parses the pid out of a `pid <n> since <time>` holder line.
fn holder_pid(holder: &str) -> Option<u32> {
    holder.strip_prefix("pid ")?.split_whitespace().next()?.parse().ok()
}

/// True when the holder process is known to have exited.
///
/// Liveness is only checked where `/proc` exists; elsewhere a lock is never
/// considered stale and must be broken explicitly.
fn holder_is_gone(holder: &str) -> bool {
    let Some(pid) = holder_pid(holder) else {
        return false;
    };
    if pid == std::process::id() {
        return false;
    }

    let proc_root = Path::new("/proc");
    proc_root.join("self").exists() && !proc_root.join(pid.to_string()).exists()
}

/// Rejects names that would escape their directory.
fn segment<'a>(dir: &Path, name: &'a str) -> Result<&'a str, StoreError> {
    let invalid = name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\'])
        || name.contains('\0');
    if invalid {
        return Err(StoreError::io(
            dir,
            std::io::Error::new(ErrorKind::InvalidInput, format!("invalid store key '{name}'")),
        ));
    }
    Ok(name)
}

fn to_json<T: Serialize>(path: &Path, value: &T) -> Result<String, StoreError> {
    serde_json::to_string_pretty(value).map_err(|e| StoreError::Corrupted {
        location: path.display().to_string(),
        reason: e.to_string(),
    })
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path, e)),
    };

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| StoreError::Corrupted {
            location: path.display().to_string(),
            reason: e.to_string(),
        })
}

async fn read_all_json<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>, StoreError> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::io(dir, e)),
    };

    let mut items = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| StoreError::io(dir, e))?
    {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") && path.is_file() {
            if let Some(item) = read_json(&path).await? {
                items.push(item);
            }
        }
    }
    Ok(items)
}

async fn remove_tmp_files(dir: &Path) {
    let Ok(mut entries) = fs::read_dir(dir).await else {
        return;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "tmp") {
            debug!(path = %path.display(), "Removing interrupted write");
            let _ = fs::remove_file(&path).await;
        }
    }
}

enum WriteError {
    Exists,
    Store(StoreError),
}

impl WriteError {
    fn into_store(self) -> StoreError {
        match self {
            Self::Exists => StoreError::Corrupted {
                location: "pending journal".to_string(),
                reason: "unexpected existing entry".to_string(),
            },
            Self::Store(err) => err,
        }
    }
}

/// Writes `content` next to `path`, syncs it, then moves it into place.
///
/// With `create_only`, the final step is a hard link that fails if `path`
/// exists, so concurrent writers cannot both succeed.
async fn write_atomic(path: &Path, content: &str, create_only: bool) -> Result<(), WriteError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| WriteError::Store(StoreError::io(parent, e)))?;
    }

    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, content)
        .await
        .map_err(|e| WriteError::Store(StoreError::io(&tmp_path, e)))?;

    let sync_path = tmp_path.clone();
    match tokio::task::spawn_blocking(move || std::fs::File::open(&sync_path).and_then(|f| f.sync_all())).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Failed to sync temp file to disk"),
        Err(e) => warn!(error = %e, "Failed to sync temp file to disk"),
    }

    let result = if create_only {
        let linked = fs::hard_link(&tmp_path, path).await;
        let _ = fs::remove_file(&tmp_path).await;
        match linked {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(WriteError::Exists),
            Err(e) => Err(WriteError::Store(StoreError::io(path, e))),
        }
    } else {
        fs::rename(&tmp_path, path)
            .await
            .map_err(|e| WriteError::Store(StoreError::io(path, e)))
    };

    if result.is_ok() {
        debug!(path = %path.display(), "Atomic write completed");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ArgValue, TransactionReceipt};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn record(task: &str, network: &str) -> DeploymentRecord {
        let receipt = TransactionReceipt {
            tx_hash: "0xtx".to_string(),
            contract_address: "0xc0ffee".to_string(),
            block_number: Some(12),
        };
        DeploymentRecord::new(
            task,
            network,
            task,
            "0xdeployer",
            vec![ArgValue::from("0xe84680C37f320c56d9F26E549155D33Bd412e7E3")],
            &receipt,
        )
    }

    async fn store() -> (TempDir, FileArtifactStore) {
        let dir = TempDir::new().unwrap();
        let store = FileArtifactStore::open(dir.path().join("deployments")).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_record_survives_reopen() {
        let (_dir, store) = store().await;
        let rec = record("Auction", "local");
        store.put("Auction", "local", &rec).await.unwrap();

        let path = store.root().join("local").join("Auction.json");
        assert!(path.exists());

        let reopened = FileArtifactStore::open(store.root()).await.unwrap();
        assert_eq!(reopened.get("Auction", "local").await.unwrap(), Some(rec));
        assert!(reopened.has("Auction", "local").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_record_is_none() {
        let (_dir, store) = store().await;
        assert!(store.get("Auction", "local").await.unwrap().is_none());
        assert!(store.list("local").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_put_conflict_and_replace() {
        let (_dir, store) = store().await;
        store.put("Auction", "local", &record("Auction", "local")).await.unwrap();

        let err = store
            .put("Auction", "local", &record("Auction", "local"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));

        let mut newer = record("Auction", "local");
        newer.address = "0xbeef".to_string();
        store.replace("Auction", "local", &newer).await.unwrap();
        assert_eq!(
            store.get("Auction", "local").await.unwrap().map(|r| r.address),
            Some("0xbeef".to_string())
        );
    }

    #[tokio::test]
    async fn test_corrupted_record() {
        let (_dir, store) = store().await;
        let dir = store.root().join("local");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("Auction.json"), "{ not json").unwrap();

        let err = store.get("Auction", "local").await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupted { .. }));
    }

    #[tokio::test]
    async fn test_record_under_wrong_key_is_corrupted() {
        let (_dir, store) = store().await;
        let dir = store.root().join("local");
        std::fs::create_dir_all(&dir).unwrap();
        let foreign = serde_json::to_string(&record("Token", "local")).unwrap();
        std::fs::write(dir.join("Auction.json"), foreign).unwrap();

        assert!(matches!(
            store.get("Auction", "local").await,
            Err(StoreError::Corrupted { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_skips_pending_and_lock() {
        let (_dir, store) = store().await;
        store.put("Token", "local", &record("Token", "local")).await.unwrap();
        store.put("Auction", "local", &record("Auction", "local")).await.unwrap();
        let _lock = store.lock_network("local").await.unwrap();
        store
            .put_pending(&PendingDeployment {
                task: "Market".to_string(),
                network: "local".to_string(),
                contract: "Market".to_string(),
                tx_hash: "0xpending".to_string(),
                args: vec![],
                deployer: "0xdeployer".to_string(),
                submitted_at: Utc::now(),
            })
            .await
            .unwrap();

        let tasks: Vec<String> = store.list("local").await.unwrap().into_iter().map(|r| r.task).collect();
        assert_eq!(tasks, vec!["Auction", "Token"]);

        let pending = store.list_pending("local").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].tx_hash, "0xpending");

        store.clear_pending("Market", "local").await.unwrap();
        assert!(store.get_pending("Market", "local").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_interrupted_writes_removed_on_open() {
        let (_dir, store) = store().await;
        let dir = store.root().join("local");
        std::fs::create_dir_all(&dir).unwrap();
        let tmp = dir.join("Auction.json.tmp");
        std::fs::write(&tmp, "partial").unwrap();

        let reopened = FileArtifactStore::open(store.root()).await.unwrap();
        assert!(!tmp.exists());
        assert!(reopened.get("Auction", "local").await.unwrap().is_none());
    }

    #[test]
    fn test_holder_pid_parsing() {
        assert_eq!(holder_pid("pid 4242 since 2026-01-01T00:00:00Z"), Some(4242));
        assert_eq!(holder_pid("unknown holder"), None);
        assert!(!holder_is_gone("unknown holder"));
        assert!(!holder_is_gone(&format!("pid {} since now", std::process::id())));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_stale_lock_of_exited_process_is_replaced() {
        let (_dir, store) = store().await;
        let lock_path = store.root().join("local").join(".lock");
        std::fs::create_dir_all(lock_path.parent().unwrap()).unwrap();
        std::fs::write(&lock_path, "pid 4294967295 since 2026-01-01T00:00:00Z").unwrap();

        let lock = store.lock_network("local").await.unwrap();
        let holder = std::fs::read_to_string(&lock_path).unwrap();
        assert!(holder.contains(&std::process::id().to_string()));

        drop(lock);
        assert!(!lock_path.exists());
    }

    #[tokio::test]
    async fn test_break_lock_frees_a_leaked_lock() {
        let (_dir, store) = store().await;
        std::mem::forget(store.lock_network("local").await.unwrap());
        assert!(matches!(
            store.lock_network("local").await,
            Err(StoreError::Locked { .. })
        ));

        let holder = store.break_lock("local").await.unwrap();
        assert!(holder.unwrap().starts_with("pid "));
        assert_eq!(store.break_lock("local").await.unwrap(), None);
        assert!(store.lock_network("local").await.is_ok());
    }

    #[tokio::test]
    async fn test_lock_file_lifecycle() {
        let (_dir, store) = store().await;
        let lock_path = store.root().join("local").join(".lock");

        let lock = store.lock_network("local").await.unwrap();
        assert!(lock_path.exists());
        let holder = std::fs::read_to_string(&lock_path).unwrap();
        assert!(holder.contains(&std::process::id().to_string()));

        let err = store.lock_network("local").await.unwrap_err();
        assert!(matches!(err, StoreError::Locked { ref holder, .. } if holder.starts_with("pid ")));

        drop(lock);
        assert!(!lock_path.exists());
        assert!(store.lock_network("local").await.is_ok());
    }

    #[tokio::test]
    async fn test_rejects_path_like_keys() {
        let (_dir, store) = store().await;
        assert!(store.get("../escape", "local").await.is_err());
        assert!(store.get("Auction", "..").await.is_err());
    }
}
