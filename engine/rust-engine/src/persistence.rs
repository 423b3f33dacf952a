//! Durable snapshot store, keyed by attempt id.
//!
//! Saves carry the session's monotonically increasing version; a gateway
//! rejects any save that is not newer than the last persisted one, so an
//! older snapshot can never overwrite a newer one (last writer wins).

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::PersistenceError;
use crate::models::attempt::AttemptSnapshot;

#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn save(
        &self,
        attempt_id: &str,
        snapshot: &AttemptSnapshot,
    ) -> Result<(), PersistenceError>;

    async fn load(&self, attempt_id: &str) -> Result<Option<AttemptSnapshot>, PersistenceError>;
}

/// Volatile store for tests and embeddings that bring their own durability.
pub struct InMemoryGateway {
    snapshots: RwLock<HashMap<String, AttemptSnapshot>>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self {
            snapshots: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PersistenceGateway for InMemoryGateway {
    async fn save(
        &self,
        attempt_id: &str,
        snapshot: &AttemptSnapshot,
    ) -> Result<(), PersistenceError> {
        let mut snapshots = self.snapshots.write().await;
        if let Some(existing) = snapshots.get(attempt_id) {
            if existing.version >= snapshot.version {
                return Err(PersistenceError::StaleVersion {
                    attempted: snapshot.version,
                    latest: existing.version,
                });
            }
        }
        snapshots.insert(attempt_id.to_string(), snapshot.clone());
        Ok(())
    }

    async fn load(&self, attempt_id: &str) -> Result<Option<AttemptSnapshot>, PersistenceError> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots.get(attempt_id).cloned())
    }
}

/// Durable store: one JSON document per attempt id under a spool directory.
pub struct JsonFileGateway {
    spool_dir: PathBuf,
}

impl JsonFileGateway {
    pub fn new(spool_dir: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let spool_dir = spool_dir.into();
        std::fs::create_dir_all(&spool_dir)?;
        Ok(Self { spool_dir })
    }

    fn document_path(&self, attempt_id: &str) -> PathBuf {
        self.spool_dir.join(format!("{}.json", attempt_id))
    }

    async fn read_document(
        &self,
        attempt_id: &str,
    ) -> Result<Option<AttemptSnapshot>, PersistenceError> {
        let path = self.document_path(attempt_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let snapshot: AttemptSnapshot = serde_json::from_slice(&bytes)?;
                Ok(Some(snapshot))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl PersistenceGateway for JsonFileGateway {
    async fn save(
        &self,
        attempt_id: &str,
        snapshot: &AttemptSnapshot,
    ) -> Result<(), PersistenceError> {
        if let Some(existing) = self.read_document(attempt_id).await? {
            if existing.version >= snapshot.version {
                return Err(PersistenceError::StaleVersion {
                    attempted: snapshot.version,
                    latest: existing.version,
                });
            }
        }

        let json = serde_json::to_vec_pretty(snapshot)?;
        tokio::fs::write(self.document_path(attempt_id), json).await?;

        tracing::debug!(
            "Snapshot persisted: attempt={}, version={}",
            attempt_id,
            snapshot.version
        );
        Ok(())
    }

    async fn load(&self, attempt_id: &str) -> Result<Option<AttemptSnapshot>, PersistenceError> {
        self.read_document(attempt_id).await
    }
}
