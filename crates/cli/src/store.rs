//! Subscription store persisted as a single JSON file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;
use workflow::{EventSubscription, PackageRef, StoreError, SubscriptionStore, UpsertOutcome};

/// Keeps all subscriptions in one JSON array.
///
/// Writes go to a sibling temporary file that is synced, renamed over the
/// store, and made durable by syncing the parent directory, so readers never
/// see a partially written file. Access from this process is serialized; the
/// store is not meant to be shared between processes.
#[derive(Debug)]
pub struct JsonFileSubscriptionStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileSubscriptionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Vec<EventSubscription>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StoreError::new(format!(
                    "reading {}: {e}",
                    self.path.display()
                )))
            }
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::new(format!("parsing {}: {e}", self.path.display())))
    }

    async fn save(&self, records: &[EventSubscription]) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(records)
            .map_err(|e| StoreError::new(format!("serializing subscriptions: {e}")))?;
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::new(format!("creating {}: {e}", parent.display())))?;

        let tmp = self.path.with_extension("json.tmp");
        let writing = |e: std::io::Error| StoreError::new(format!("writing {}: {e}", tmp.display()));
        let mut file = tokio::fs::File::create(&tmp).await.map_err(writing)?;
        file.write_all(&json).await.map_err(writing)?;
        file.sync_all().await.map_err(writing)?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StoreError::new(format!("replacing {}: {e}", self.path.display())))?;
        sync_dir(parent)
            .await
            .map_err(|e| StoreError::new(format!("syncing {}: {e}", parent.display())))
    }
}

/// Persists directory entries (the rename) to disk.
async fn sync_dir(dir: &Path) -> std::io::Result<()> {
    tokio::fs::File::open(dir).await?.sync_all().await
}

#[async_trait]
impl SubscriptionStore for JsonFileSubscriptionStore {
    async fn upsert(&self, subscription: EventSubscription) -> Result<UpsertOutcome, StoreError> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        let key = subscription.key();
        if records.iter().any(|existing| existing.key() == key) {
            return Ok(UpsertOutcome::AlreadyPresent);
        }
        records.push(subscription);
        self.save(&records).await?;
        debug!(path = %self.path.display(), count = records.len(), "subscriptions saved");
        Ok(UpsertOutcome::Created)
    }

    async fn list_for_package(
        &self,
        package: &PackageRef,
    ) -> Result<Vec<EventSubscription>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self
            .load()
            .await?
            .into_iter()
            .filter(|s| &s.package == package)
            .collect())
    }
}
