//! Holding area for conflicts awaiting manual resolution
//!
//! Conflicts are parked durably in the `syncConflicts` collection. When the
//! durable write fails the conflict is kept in a process-lifetime map
//! instead and the vault reports itself degraded; a restart loses
//! fallback-only conflicts, which is the documented limitation of running
//! without working local storage.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::warn;

use crate::error::{Error, Result};
use crate::models::{ConflictId, SyncConflict};
use crate::store::{collections, LocalStore};

/// Persistence health of the vault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VaultHealth {
    /// Conflicts are being persisted durably
    Healthy,
    /// At least one conflict is held only in process memory
    Degraded,
}

/// Durable-with-fallback storage for unresolved conflicts.
pub struct ConflictVault<S> {
    store: Arc<S>,
    fallback: Mutex<HashMap<ConflictId, SyncConflict>>,
    degraded: AtomicBool,
}

impl<S: LocalStore> ConflictVault<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            fallback: Mutex::new(HashMap::new()),
            degraded: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn health(&self) -> VaultHealth {
        if self.degraded.load(Ordering::SeqCst) {
            VaultHealth::Degraded
        } else {
            VaultHealth::Healthy
        }
    }

    /// Park an unresolved conflict so it can be resolved later.
    ///
    /// An earlier parked conflict for the same entity record is replaced, so
    /// repeated passes over the same divergence do not pile up duplicates.
    /// Never loses the conflict: a failed durable write falls back to memory.
    pub async fn park(&self, conflict: SyncConflict) -> Result<()> {
        self.evict_same_record(&conflict).await;

        let mut parked = conflict;
        parked.resolution = None;

        match serde_json::to_value(&parked) {
            Ok(body) => {
                let key = parked.id.to_string();
                if let Err(error) = self.store.put(collections::SYNC_CONFLICTS, &key, &body).await {
                    warn!(conflict = %parked.id, %error, "durable conflict write failed, keeping conflict in memory");
                    self.degraded.store(true, Ordering::SeqCst);
                    self.fallback_map().insert(parked.id, parked);
                }
            }
            Err(error) => {
                warn!(conflict = %parked.id, %error, "conflict serialization failed, keeping conflict in memory");
                self.degraded.store(true, Ordering::SeqCst);
                self.fallback_map().insert(parked.id, parked);
            }
        }
        Ok(())
    }

    /// All parked conflicts, oldest first. Durable entries win on id
    /// collision with the in-memory fallback.
    pub async fn pending(&self) -> Result<Vec<SyncConflict>> {
        let mut conflicts: Vec<SyncConflict> = self
            .store
            .get_all(collections::SYNC_CONFLICTS)
            .await?
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(Error::from))
            .collect::<Result<_>>()?;

        let durable_ids: Vec<ConflictId> = conflicts.iter().map(|c| c.id).collect();
        for (id, conflict) in self.fallback_map().iter() {
            if !durable_ids.contains(id) {
                conflicts.push(conflict.clone());
            }
        }

        conflicts.sort_by_key(|conflict| (conflict.created_at, conflict.id));
        Ok(conflicts)
    }

    /// Fetch one parked conflict by id
    pub async fn get(&self, id: ConflictId) -> Result<Option<SyncConflict>> {
        if let Some(value) = self
            .store
            .get(collections::SYNC_CONFLICTS, &id.to_string())
            .await?
        {
            return Ok(Some(serde_json::from_value(value)?));
        }
        Ok(self.fallback_map().get(&id).cloned())
    }

    /// Drop a parked conflict once it has been resolved
    pub async fn remove(&self, id: ConflictId) -> Result<()> {
        let in_fallback = self.fallback_map().remove(&id).is_some();
        match self
            .store
            .delete(collections::SYNC_CONFLICTS, &id.to_string())
            .await
        {
            Ok(()) => Ok(()),
            Err(error) if in_fallback => {
                warn!(conflict = %id, %error, "durable conflict delete failed");
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    async fn evict_same_record(&self, conflict: &SyncConflict) {
        let Ok(existing) = self.pending().await else {
            return;
        };
        for parked in existing {
            if parked.entity == conflict.entity
                && parked.entity_id == conflict.entity_id
                && parked.id != conflict.id
            {
                if let Err(error) = self.remove(parked.id).await {
                    warn!(conflict = %parked.id, %error, "stale parked conflict could not be removed");
                }
            }
        }
    }

    fn fallback_map(&self) -> std::sync::MutexGuard<'_, HashMap<ConflictId, SyncConflict>> {
        self.fallback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
