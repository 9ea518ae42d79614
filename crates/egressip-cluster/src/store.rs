//! Persistence of host subnets
//!
//! [`FileHostSubnetStore`] keeps every host subnet in one versioned JSON file
//! (`.egressip/host-subnets.json` by default). A save writes a temp file next
//! to it and renames it into place, after copying the previous file to
//! `.backup`. Loading falls back to the backup when the main file is gone.

use crate::subnet::HostSubnet;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use egressip_core::{EgressIpError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};

const STATE_VERSION: u32 = 1;

/// Storage of the per-host routing records
#[async_trait]
pub trait HostSubnetStore: Send + Sync {
    async fn get(&self, host: &str) -> Result<Option<HostSubnet>>;

    async fn list(&self) -> Result<Vec<HostSubnet>>;

    async fn put(&self, subnet: HostSubnet) -> Result<()> {
        self.put_all(vec![subnet]).await
    }

    /// Write several subnets as one update.
    async fn put_all(&self, subnets: Vec<HostSubnet>) -> Result<()>;
}

/// In-memory store, used by tests and by embedders that sync the records
/// from the cluster API themselves.
#[derive(Debug, Default)]
pub struct MemoryHostSubnetStore {
    subnets: RwLock<BTreeMap<String, HostSubnet>>,
}

impl MemoryHostSubnetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subnets(subnets: impl IntoIterator<Item = HostSubnet>) -> Self {
        let subnets = subnets
            .into_iter()
            .map(|subnet| (subnet.host.clone(), subnet))
            .collect();
        Self {
            subnets: RwLock::new(subnets),
        }
    }
}

#[async_trait]
impl HostSubnetStore for MemoryHostSubnetStore {
    async fn get(&self, host: &str) -> Result<Option<HostSubnet>> {
        Ok(self.subnets.read().await.get(host).cloned())
    }

    async fn list(&self) -> Result<Vec<HostSubnet>> {
        Ok(self.subnets.read().await.values().cloned().collect())
    }

    async fn put_all(&self, subnets: Vec<HostSubnet>) -> Result<()> {
        let mut guard = self.subnets.write().await;
        for subnet in subnets {
            guard.insert(subnet.host.clone(), subnet);
        }
        Ok(())
    }
}

/// Contents of the state file
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SubnetState {
    version: u32,
    updated_at: DateTime<Utc>,
    subnets: BTreeMap<String, HostSubnet>,
}

impl Default for SubnetState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            subnets: BTreeMap::new(),
        }
    }
}

/// JSON file backed store
pub struct FileHostSubnetStore {
    path: PathBuf,
    // held by the writer task until the file is in place
    lock: Arc<Mutex<()>>,
}

impl FileHostSubnetStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

async fn read_state(path: &Path) -> Result<SubnetState> {
    let content = fs::read_to_string(path).await?;
    let state: SubnetState = serde_json::from_str(&content)?;

    if state.version > STATE_VERSION {
        return Err(EgressIpError::backend(format!(
            "state file version {} is newer than supported version {}",
            state.version, STATE_VERSION
        )));
    }
    Ok(state)
}

async fn load(path: &Path) -> Result<SubnetState> {
    let state = if path.exists() {
        read_state(path).await?
    } else {
        let backup = sibling(path, ".backup");
        if !backup.exists() {
            tracing::debug!("State file {} not found, starting empty", path.display());
            return Ok(SubnetState::default());
        }
        tracing::warn!(
            "State file {} missing, restoring from {}",
            path.display(),
            backup.display()
        );
        read_state(&backup).await?
    };

    tracing::debug!("Loaded {} host subnets", state.subnets.len());
    Ok(state)
}

async fn save(path: &Path, state: &SubnetState) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            fs::create_dir_all(dir).await?;
            tracing::debug!("Created state directory: {}", dir.display());
        }
    }

    let temp = sibling(path, ".tmp");
    fs::write(&temp, serde_json::to_string_pretty(state)?).await?;

    if path.exists() {
        fs::copy(path, sibling(path, ".backup")).await?;
    }
    fs::rename(&temp, path).await?;

    tracing::debug!("Saved {} host subnets", state.subnets.len());
    Ok(())
}

#[async_trait]
impl HostSubnetStore for FileHostSubnetStore {
    async fn get(&self, host: &str) -> Result<Option<HostSubnet>> {
        let _guard = self.lock.lock().await;
        Ok(load(&self.path).await?.subnets.remove(host))
    }

    async fn list(&self) -> Result<Vec<HostSubnet>> {
        let _guard = self.lock.lock().await;
        Ok(load(&self.path).await?.subnets.into_values().collect())
    }

    /// The update runs on its own task. Once the lock is taken it completes
    /// even if the caller goes away, and later reads wait for it.
    async fn put_all(&self, subnets: Vec<HostSubnet>) -> Result<()> {
        let guard = self.lock.clone().lock_owned().await;
        let path = self.path.clone();

        let task = tokio::spawn(async move {
            let _guard = guard;
            let mut state = load(&path).await?;
            for subnet in subnets {
                state.subnets.insert(subnet.host.clone(), subnet);
            }
            state.updated_at = Utc::now();
            save(&path, &state).await
        });

        task.await
            .map_err(|e| EgressIpError::backend(format!("state write task failed: {}", e)))?
    }
}
