//! Sync pass orchestration
//!
//! The sync manager drives one synchronization pass at a time: it pulls
//! pending operations from the queue, checks each against current remote
//! state, executes the clear ones, and routes divergences through the
//! per-entity resolver registry. It is constructed explicitly from its
//! collaborators so tests can substitute fakes; there is no process-wide
//! instance.

mod vault;

pub use vault::{ConflictVault, VaultHealth};

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::gateway::RemoteGateway;
use crate::models::{
    ConflictId, ConflictKind, ConflictResolution, EntityKind, OperationId, OperationKind,
    OperationStatus, ResolutionStrategy, SyncConflict, SyncOperation,
};
use crate::queue::OperationQueue;
use crate::resolve::{ConflictResolver, ResolverRegistry};
use crate::store::LocalStore;
use crate::util::unix_millis_now;

/// Clock-skew tolerance: a local/remote timestamp gap at or below this is
/// treated as jitter, not divergence.
pub const CONFLICT_TOLERANCE_MS: i64 = 1000;

/// Aggregated outcome of one sync pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncResult {
    /// True only with zero failed operations and zero errors
    pub success: bool,
    /// Operations applied to the remote side this pass
    pub synced: usize,
    /// Operations that failed this pass
    pub failed: usize,
    /// Conflicts detected this pass, with the resolution each received
    pub conflicts: Vec<SyncConflict>,
    pub errors: Vec<String>,
}

impl SyncResult {
    fn empty() -> Self {
        Self {
            success: true,
            synced: 0,
            failed: 0,
            conflicts: Vec::new(),
            errors: Vec::new(),
        }
    }
}

/// Callback invoked with the result of every completed pass
pub type SyncListener = Box<dyn Fn(&SyncResult) + Send + Sync>;

/// Handle for unregistering a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

enum ConflictCheck {
    /// No divergence; execute the operation
    Clear,
    /// Delete against an absent remote record: nothing to do
    AlreadyGone,
    Conflict(SyncConflict),
}

/// Orchestrates synchronization passes over a local store and remote gateway.
pub struct SyncManager<S, G> {
    store: Arc<S>,
    gateway: G,
    queue: OperationQueue<S>,
    vault: ConflictVault<S>,
    resolvers: Mutex<ResolverRegistry>,
    listeners: Mutex<Vec<(ListenerId, SyncListener)>>,
    next_listener_id: AtomicU64,
    in_flight: AtomicBool,
    cancelled: AtomicBool,
}

impl<S: LocalStore, G: RemoteGateway> SyncManager<S, G> {
    /// Manager with the built-in resolver policies
    pub fn new(store: Arc<S>, gateway: G) -> Self {
        Self::with_resolvers(store, gateway, ResolverRegistry::with_defaults())
    }

    /// Manager with a caller-provided resolver registry
    pub fn with_resolvers(store: Arc<S>, gateway: G, resolvers: ResolverRegistry) -> Self {
        Self {
            queue: OperationQueue::new(Arc::clone(&store)),
            vault: ConflictVault::new(Arc::clone(&store)),
            store,
            gateway,
            resolvers: Mutex::new(resolvers),
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
            in_flight: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
        }
    }

    /// The durable operation queue feeding this manager
    pub const fn queue(&self) -> &OperationQueue<S> {
        &self.queue
    }

    /// Persistence health of the manual-conflict holding area
    #[must_use]
    pub fn vault_health(&self) -> VaultHealth {
        self.vault.health()
    }

    /// Add or override the resolver for an entity kind
    pub fn register_resolver(&self, kind: EntityKind, resolver: Arc<dyn ConflictResolver>) {
        self.lock_resolvers().register(kind, resolver);
    }

    /// Register a listener notified after every pass
    pub fn add_listener(
        &self,
        listener: impl Fn(&SyncResult) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::SeqCst));
        self.lock_listeners().push((id, Box::new(listener)));
        id
    }

    /// Unregister a listener; returns whether it was registered
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock_listeners();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Request cooperative cancellation: the in-flight pass (or the next one,
    /// if none is running) stops cleanly before its next operation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Drive one full synchronization pass.
    ///
    /// Refuses to overlap with an in-flight pass. Listeners are notified
    /// with the result; a listener panic is isolated and logged.
    pub async fn perform_sync(&self) -> Result<SyncResult> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(Error::SyncInProgress);
        }
        let outcome = self.run_pass().await;
        self.cancelled.store(false, Ordering::SeqCst);
        self.in_flight.store(false, Ordering::SeqCst);

        let result = outcome?;
        self.notify_listeners(&result);
        Ok(result)
    }

    /// Conflicts parked for manual resolution, oldest first
    pub async fn pending_conflicts(&self) -> Result<Vec<SyncConflict>> {
        self.vault.pending().await
    }

    /// Apply a human-chosen resolution to a parked conflict and drop it.
    pub async fn resolve_conflict_manually(
        &self,
        id: ConflictId,
        resolution: ConflictResolution,
    ) -> Result<()> {
        if resolution.strategy == ResolutionStrategy::Manual {
            return Err(Error::InvalidOperation(
                "manual resolution must pick a concrete strategy".to_string(),
            ));
        }
        let conflict = self
            .vault
            .get(id)
            .await?
            .ok_or_else(|| Error::ConflictNotFound(id.to_string()))?;

        self.apply_resolution(&conflict, &resolution).await?;
        self.vault.remove(id).await?;
        info!(conflict = %id, strategy = %resolution.strategy, "conflict resolved manually");
        Ok(())
    }

    async fn run_pass(&self) -> Result<SyncResult> {
        let operations = self.queue.pending_operations().await?;
        if operations.is_empty() {
            return Ok(SyncResult::empty());
        }
        info!(operations = operations.len(), "sync pass started");

        let mut result = SyncResult::empty();
        let mut detected: Vec<(OperationId, SyncConflict)> = Vec::new();

        for operation in operations {
            if self.cancelled.load(Ordering::SeqCst) {
                info!("sync pass cancelled, remaining operations stay pending");
                break;
            }

            let operation = self
                .queue
                .update_status(operation.id, OperationStatus::Processing)
                .await?;

            match self.check_conflict(&operation).await {
                ConflictCheck::Conflict(conflict) => {
                    debug!(
                        operation = %operation.id,
                        entity_id = %conflict.entity_id,
                        kind = ?conflict.kind,
                        "conflict detected, execution skipped this pass"
                    );
                    detected.push((operation.id, conflict));
                }
                ConflictCheck::AlreadyGone => {
                    debug!(operation = %operation.id, "remote record already absent, delete is a no-op");
                    self.queue
                        .update_status(operation.id, OperationStatus::Completed)
                        .await?;
                    result.synced += 1;
                }
                ConflictCheck::Clear => match self.execute(&operation).await {
                    Ok(()) => {
                        self.queue
                            .update_status(operation.id, OperationStatus::Completed)
                            .await?;
                        result.synced += 1;
                    }
                    Err(error) => {
                        warn!(operation = %operation.id, %error, "operation failed");
                        result.errors.push(format!("{}: {error}", operation.id));
                        self.queue
                            .update_status(
                                operation.id,
                                OperationStatus::Failed {
                                    message: error.to_string(),
                                },
                            )
                            .await?;
                        result.failed += 1;
                    }
                },
            }
        }

        // Conflicts are settled serially, in detection order, one resolver at
        // a time per entity record. The originating operation completes when
        // its conflict resolves automatically; otherwise it is marked failed
        // so it does not re-conflict on every pass.
        for (operation_id, mut conflict) in detected {
            let resolution = self.lock_resolvers().resolve(&conflict);
            debug!(conflict = %conflict.id, strategy = %resolution.strategy, "resolving conflict");

            if resolution.strategy == ResolutionStrategy::Manual {
                self.vault.park(conflict.clone()).await?;
                self.queue
                    .update_status(
                        operation_id,
                        OperationStatus::Failed {
                            message: format!(
                                "awaiting manual resolution of conflict {}",
                                conflict.id
                            ),
                        },
                    )
                    .await?;
                result.failed += 1;
            } else if let Err(error) = self.apply_resolution(&conflict, &resolution).await {
                warn!(conflict = %conflict.id, %error, "resolution could not be applied");
                result.errors.push(format!("conflict {}: {error}", conflict.id));
                self.vault.park(conflict.clone()).await?;
                self.queue
                    .update_status(
                        operation_id,
                        OperationStatus::Failed {
                            message: error.to_string(),
                        },
                    )
                    .await?;
                result.failed += 1;
            } else {
                self.queue
                    .update_status(operation_id, OperationStatus::Completed)
                    .await?;
                result.synced += 1;
            }

            conflict.resolution = Some(resolution);
            result.conflicts.push(conflict);
        }

        result.success = result.failed == 0 && result.errors.is_empty();
        info!(
            synced = result.synced,
            failed = result.failed,
            conflicts = result.conflicts.len(),
            success = result.success,
            "sync pass finished"
        );
        Ok(result)
    }

    /// Compare an operation against current remote state.
    ///
    /// A gateway read error is fail-open: progress is preferred over a
    /// perfect conflict check when the remote is unreachable, so the
    /// operation proceeds as if no remote record existed.
    async fn check_conflict(&self, operation: &SyncOperation) -> ConflictCheck {
        let entity_id = operation.entity_id();

        let remote = match self.gateway.fetch(operation.entity, entity_id).await {
            Ok(remote) => remote,
            Err(error) => {
                warn!(
                    operation = %operation.id,
                    %error,
                    "conflict check failed, proceeding without a conflict"
                );
                None
            }
        };

        let Some(remote) = remote else {
            if operation.kind == OperationKind::Delete {
                return ConflictCheck::AlreadyGone;
            }
            return ConflictCheck::Clear;
        };

        if remote == operation.data {
            return ConflictCheck::Clear;
        }
        let remote_timestamp = remote_timestamp(&remote);
        if (operation.timestamp - remote_timestamp).abs() <= CONFLICT_TOLERANCE_MS {
            return ConflictCheck::Clear;
        }

        ConflictCheck::Conflict(SyncConflict {
            id: ConflictId::new(),
            entity: operation.entity,
            entity_id: entity_id.to_string(),
            local_data: operation.data.clone(),
            remote_data: remote,
            local_timestamp: operation.timestamp,
            remote_timestamp,
            kind: conflict_kind(operation.kind),
            resolution: None,
            created_at: unix_millis_now(),
        })
    }

    async fn execute(&self, operation: &SyncOperation) -> Result<()> {
        match operation.kind {
            OperationKind::Create => self.gateway.create(operation.entity, &operation.data).await,
            OperationKind::Update => {
                self.gateway
                    .update(operation.entity, operation.entity_id(), &operation.data)
                    .await
            }
            OperationKind::Delete => {
                self.gateway
                    .delete(operation.entity, operation.entity_id())
                    .await
            }
        }
    }

    async fn apply_resolution(
        &self,
        conflict: &SyncConflict,
        resolution: &ConflictResolution,
    ) -> Result<()> {
        match resolution.strategy {
            ResolutionStrategy::LocalWins => {
                self.gateway
                    .update(conflict.entity, &conflict.entity_id, &conflict.local_data)
                    .await
            }
            ResolutionStrategy::RemoteWins => {
                self.store
                    .put(
                        conflict.entity.collection(),
                        &conflict.entity_id,
                        &conflict.remote_data,
                    )
                    .await
            }
            ResolutionStrategy::Merge => {
                let merged = resolution.resolved_data.as_ref().ok_or_else(|| {
                    Error::InvalidOperation("merge resolution carries no merged record".to_string())
                })?;
                self.store
                    .put(conflict.entity.collection(), &conflict.entity_id, merged)
                    .await?;
                self.gateway
                    .update(conflict.entity, &conflict.entity_id, merged)
                    .await
            }
            ResolutionStrategy::Manual => Err(Error::InvalidOperation(
                "manual resolutions are parked, not applied".to_string(),
            )),
        }
    }

    fn notify_listeners(&self, result: &SyncResult) {
        let listeners = self.lock_listeners();
        for (id, listener) in listeners.iter() {
            if catch_unwind(AssertUnwindSafe(|| listener(result))).is_err() {
                warn!(listener = id.0, "sync listener panicked");
            }
        }
    }

    fn lock_resolvers(&self) -> std::sync::MutexGuard<'_, ResolverRegistry> {
        self.resolvers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, Vec<(ListenerId, SyncListener)>> {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Remote record timestamp used for the skew check: `updated_at` when
/// present, then `timestamp`, else 0 (treated as very stale).
fn remote_timestamp(remote: &Value) -> i64 {
    remote
        .get("updated_at")
        .and_then(Value::as_i64)
        .or_else(|| remote.get("timestamp").and_then(Value::as_i64))
        .unwrap_or(0)
}

const fn conflict_kind(kind: OperationKind) -> ConflictKind {
    match kind {
        OperationKind::Create => ConflictKind::CreateConflict,
        OperationKind::Update => ConflictKind::UpdateConflict,
        OperationKind::Delete => ConflictKind::DeleteConflict,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::collections::HashMap;

    /// Scripted remote side: a seedable record map with switchable failures
    /// and a log of mutating calls.
    #[derive(Default)]
    struct FakeGateway {
        remote: Mutex<HashMap<(EntityKind, String), Value>>,
        fail_fetch: AtomicBool,
        fail_writes: AtomicBool,
        calls: Mutex<Vec<String>>,
    }

    impl FakeGateway {
        fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn seed(&self, entity: EntityKind, id: &str, value: Value) {
            self.lock_remote().insert((entity, id.to_string()), value);
        }

        fn remote_record(&self, entity: EntityKind, id: &str) -> Option<Value> {
            self.lock_remote().get(&(entity, id.to_string())).cloned()
        }

        fn calls(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        fn record_call(&self, call: String) {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(call);
        }

        fn lock_remote(
            &self,
        ) -> std::sync::MutexGuard<'_, HashMap<(EntityKind, String), Value>> {
            self.remote.lock().unwrap_or_else(PoisonError::into_inner)
        }

        fn check_writable(&self) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(Error::Gateway {
                    status: 502,
                    message: "remote write refused".to_string(),
                });
            }
            Ok(())
        }
    }

    impl RemoteGateway for FakeGateway {
        async fn fetch(&self, entity: EntityKind, id: &str) -> Result<Option<Value>> {
            if self.fail_fetch.load(Ordering::SeqCst) {
                return Err(Error::Gateway {
                    status: 503,
                    message: "remote unreachable".to_string(),
                });
            }
            Ok(self.remote_record(entity, id))
        }

        async fn create(&self, entity: EntityKind, data: &Value) -> Result<()> {
            self.check_writable()?;
            let id = data["id"].as_str().unwrap_or_default().to_string();
            self.record_call(format!("POST {entity} {id} {data}"));
            self.lock_remote().insert((entity, id), data.clone());
            Ok(())
        }

        async fn update(&self, entity: EntityKind, id: &str, data: &Value) -> Result<()> {
            self.check_writable()?;
            self.record_call(format!("PUT {entity} {id} {data}"));
            self.lock_remote()
                .insert((entity, id.to_string()), data.clone());
            Ok(())
        }

        async fn delete(&self, entity: EntityKind, id: &str) -> Result<()> {
            self.check_writable()?;
            self.record_call(format!("DELETE {entity} {id}"));
            self.lock_remote().remove(&(entity, id.to_string()));
            Ok(())
        }
    }

    fn setup() -> (
        Arc<MemoryStore>,
        Arc<FakeGateway>,
        SyncManager<MemoryStore, Arc<FakeGateway>>,
    ) {
        let store = Arc::new(MemoryStore::new());
        let gateway = FakeGateway::new();
        let manager = SyncManager::new(Arc::clone(&store), Arc::clone(&gateway));
        (store, gateway, manager)
    }

    #[tokio::test]
    async fn empty_queue_yields_vacuous_success() {
        let (_, _, manager) = setup();
        let result = manager.perform_sync().await.unwrap();
        assert!(result.success);
        assert_eq!(result.synced, 0);
        assert_eq!(result.failed, 0);
        assert!(result.conflicts.is_empty());
    }

    #[tokio::test]
    async fn replaying_a_drained_queue_changes_nothing() {
        let (_, gateway, manager) = setup();
        manager
            .queue()
            .enqueue(
                OperationKind::Create,
                EntityKind::Workout,
                json!({"id": "w1", "name": "Push"}),
            )
            .await
            .unwrap();

        let first = manager.perform_sync().await.unwrap();
        assert!(first.success);
        assert_eq!(first.synced, 1);
        assert!(gateway.remote_record(EntityKind::Workout, "w1").is_some());

        let second = manager.perform_sync().await.unwrap();
        assert!(second.success);
        assert_eq!(second.synced, 0);
        assert_eq!(second.failed, 0);
        assert!(second.conflicts.is_empty());
    }

    #[tokio::test]
    async fn delete_against_absent_remote_is_a_no_op_success() {
        let (_, gateway, manager) = setup();
        let op = manager
            .queue()
            .enqueue(
                OperationKind::Delete,
                EntityKind::Workout,
                json!({"id": "gone"}),
            )
            .await
            .unwrap();

        let result = manager.perform_sync().await.unwrap();
        assert!(result.success);
        assert_eq!(result.synced, 1);
        assert!(gateway.calls().is_empty());

        let op = manager.queue().get(op.id).await.unwrap().unwrap();
        assert_eq!(op.status, OperationStatus::Completed);
    }

    #[tokio::test]
    async fn identical_remote_data_never_conflicts() {
        let (_, gateway, manager) = setup();
        let op = manager
            .queue()
            .enqueue(
                OperationKind::Update,
                EntityKind::Workout,
                json!({"id": "w1", "name": "Push"}),
            )
            .await
            .unwrap();
        // Same payload, remote timestamp far in the past.
        gateway.seed(EntityKind::Workout, "w1", op.data.clone());

        let result = manager.perform_sync().await.unwrap();
        assert!(result.conflicts.is_empty());
        assert_eq!(result.synced, 1);
    }

    #[tokio::test]
    async fn timestamp_gap_at_tolerance_is_not_a_conflict() {
        let (_, _, manager) = setup();
        let op = manager
            .queue()
            .enqueue(
                OperationKind::Update,
                EntityKind::Workout,
                json!({"id": "w1", "name": "local"}),
            )
            .await
            .unwrap();

        let (_, gateway, manager) = setup_with_op(op.clone()).await;
        gateway.seed(
            EntityKind::Workout,
            "w1",
            json!({"id": "w1", "name": "remote", "updated_at": op.timestamp - CONFLICT_TOLERANCE_MS}),
        );

        let result = manager.perform_sync().await.unwrap();
        assert!(result.conflicts.is_empty());
        assert_eq!(result.synced, 1);
    }

    #[tokio::test]
    async fn timestamp_gap_past_tolerance_conflicts() {
        let (_, _, manager) = setup();
        let op = manager
            .queue()
            .enqueue(
                OperationKind::Update,
                EntityKind::Workout,
                json!({"id": "w1", "name": "local"}),
            )
            .await
            .unwrap();

        let (_, gateway, manager) = setup_with_op(op.clone()).await;
        gateway.seed(
            EntityKind::Workout,
            "w1",
            json!({"id": "w1", "name": "remote", "updated_at": op.timestamp - CONFLICT_TOLERANCE_MS - 1}),
        );

        let result = manager.perform_sync().await.unwrap();
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].kind, ConflictKind::UpdateConflict);
    }

    /// Build a fresh manager whose queue already holds the given operation.
    async fn setup_with_op(
        op: SyncOperation,
    ) -> (
        Arc<MemoryStore>,
        Arc<FakeGateway>,
        SyncManager<MemoryStore, Arc<FakeGateway>>,
    ) {
        let (store, gateway, manager) = setup();
        store
            .put(
                crate::store::collections::SYNC_QUEUE,
                &op.id.to_string(),
                &serde_json::to_value(&op).unwrap(),
            )
            .await
            .unwrap();
        (store, gateway, manager)
    }

    #[tokio::test]
    async fn create_against_existing_remote_is_a_create_conflict() {
        let (_, _, manager) = setup();
        let op = manager
            .queue()
            .enqueue(
                OperationKind::Create,
                EntityKind::Workout,
                json!({"id": "w1", "name": "local"}),
            )
            .await
            .unwrap();

        let (_, gateway, manager) = setup_with_op(op.clone()).await;
        gateway.seed(
            EntityKind::Workout,
            "w1",
            json!({"id": "w1", "name": "remote", "updated_at": op.timestamp - 60_000}),
        );

        let result = manager.perform_sync().await.unwrap();
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].kind, ConflictKind::CreateConflict);
    }

    #[tokio::test]
    async fn local_newer_workout_conflict_pushes_local_state() {
        let (store, gateway, manager) = setup();
        let op = manager
            .queue()
            .enqueue(
                OperationKind::Update,
                EntityKind::Workout,
                json!({"id": "w1", "name": "local"}),
            )
            .await
            .unwrap();
        gateway.seed(
            EntityKind::Workout,
            "w1",
            json!({"id": "w1", "name": "remote", "updated_at": op.timestamp - 60_000}),
        );

        let result = manager.perform_sync().await.unwrap();
        assert!(result.success);
        assert_eq!(result.synced, 1);
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(
            result.conflicts[0].resolution.as_ref().unwrap().strategy,
            ResolutionStrategy::LocalWins
        );

        // Local state was pushed; the local store is untouched.
        assert_eq!(
            gateway.remote_record(EntityKind::Workout, "w1").unwrap()["name"],
            "local"
        );
        assert!(store.get("workouts", "w1").await.unwrap().is_none());

        let op = manager.queue().get(op.id).await.unwrap().unwrap();
        assert_eq!(op.status, OperationStatus::Completed);
    }

    #[tokio::test]
    async fn exercise_conflict_adopts_remote_state_locally() {
        let (store, gateway, manager) = setup();
        let op = manager
            .queue()
            .enqueue(
                OperationKind::Update,
                EntityKind::Exercise,
                json!({"id": "e1", "name": "local edit"}),
            )
            .await
            .unwrap();
        let remote = json!({"id": "e1", "name": "Barbell Row", "updated_at": op.timestamp - 60_000});
        gateway.seed(EntityKind::Exercise, "e1", remote.clone());

        let result = manager.perform_sync().await.unwrap();
        assert!(result.success);
        assert_eq!(
            result.conflicts[0].resolution.as_ref().unwrap().strategy,
            ResolutionStrategy::RemoteWins
        );

        // Remote copy wins and is written into the local collection.
        assert_eq!(store.get("exercises", "e1").await.unwrap().unwrap(), remote);
        assert_eq!(
            gateway.remote_record(EntityKind::Exercise, "e1").unwrap()["name"],
            "Barbell Row"
        );
    }

    #[tokio::test]
    async fn merge_resolution_writes_both_sides() {
        let (store, gateway, manager) = setup();
        let op = manager
            .queue()
            .enqueue(
                OperationKind::Update,
                EntityKind::Settings,
                json!({"id": "s1", "units": "kg"}),
            )
            .await
            .unwrap();
        gateway.seed(
            EntityKind::Settings,
            "s1",
            json!({"id": "s1", "units": "lb", "rest_timer_secs": 90, "updated_at": op.timestamp - 60_000}),
        );

        let result = manager.perform_sync().await.unwrap();
        assert!(result.success);
        assert_eq!(
            result.conflicts[0].resolution.as_ref().unwrap().strategy,
            ResolutionStrategy::Merge
        );

        let local = store.get("settings", "s1").await.unwrap().unwrap();
        let remote = gateway.remote_record(EntityKind::Settings, "s1").unwrap();
        assert_eq!(local, remote);
        assert_eq!(local["units"], "kg");
        assert_eq!(local["rest_timer_secs"], 90);
    }

    #[tokio::test]
    async fn manual_conflicts_are_parked_until_resolved() {
        let (_, gateway, manager) = setup();
        manager.register_resolver(
            EntityKind::Workout,
            Arc::new(|_: &SyncConflict| ConflictResolution::manual()),
        );

        let op = manager
            .queue()
            .enqueue(
                OperationKind::Update,
                EntityKind::Workout,
                json!({"id": "w1", "name": "local"}),
            )
            .await
            .unwrap();
        gateway.seed(
            EntityKind::Workout,
            "w1",
            json!({"id": "w1", "name": "remote", "updated_at": op.timestamp - 60_000}),
        );

        let result = manager.perform_sync().await.unwrap();
        assert!(!result.success);
        assert_eq!(result.failed, 1);
        assert!(result.conflicts[0]
            .resolution
            .as_ref()
            .unwrap()
            .requires_user_input);

        // Retrievable after the pass, gone only once resolved.
        let parked = manager.pending_conflicts().await.unwrap();
        assert_eq!(parked.len(), 1);
        let conflict_id = parked[0].id;

        manager
            .resolve_conflict_manually(conflict_id, ConflictResolution::local_wins())
            .await
            .unwrap();
        assert!(manager.pending_conflicts().await.unwrap().is_empty());
        assert_eq!(
            gateway.remote_record(EntityKind::Workout, "w1").unwrap()["name"],
            "local"
        );

        let op = manager.queue().get(op.id).await.unwrap().unwrap();
        assert!(matches!(op.status, OperationStatus::Failed { .. }));
    }

    #[tokio::test]
    async fn manual_resolution_rejects_manual_strategy_and_unknown_ids() {
        let (_, _, manager) = setup();
        let missing = manager
            .resolve_conflict_manually(ConflictId::new(), ConflictResolution::local_wins())
            .await;
        assert!(matches!(missing, Err(Error::ConflictNotFound(_))));

        let invalid = manager
            .resolve_conflict_manually(ConflictId::new(), ConflictResolution::manual())
            .await;
        assert!(matches!(invalid, Err(Error::InvalidOperation(_))));
    }

    #[tokio::test]
    async fn conflict_check_failure_is_fail_open() {
        let (_, gateway, manager) = setup();
        manager
            .queue()
            .enqueue(
                OperationKind::Create,
                EntityKind::Workout,
                json!({"id": "w1", "name": "Push"}),
            )
            .await
            .unwrap();
        gateway.fail_fetch.store(true, Ordering::SeqCst);

        let result = manager.perform_sync().await.unwrap();
        assert!(result.success);
        assert_eq!(result.synced, 1);
        assert!(result.conflicts.is_empty());
        assert!(gateway.remote_record(EntityKind::Workout, "w1").is_some());
    }

    #[tokio::test]
    async fn failed_execution_records_the_error_and_backs_off() {
        let (_, gateway, manager) = setup();
        let op = manager
            .queue()
            .enqueue(
                OperationKind::Create,
                EntityKind::Workout,
                json!({"id": "w1"}),
            )
            .await
            .unwrap();
        gateway.fail_writes.store(true, Ordering::SeqCst);

        let result = manager.perform_sync().await.unwrap();
        assert!(!result.success);
        assert_eq!(result.failed, 1);
        assert_eq!(result.errors.len(), 1);

        let op = manager.queue().get(op.id).await.unwrap().unwrap();
        match &op.status {
            OperationStatus::Failed { message } => assert!(message.contains("remote write refused")),
            other => panic!("expected failed status, got {other:?}"),
        }

        // Within the backoff window the operation is not re-surfaced.
        let replay = manager.perform_sync().await.unwrap();
        assert_eq!(replay.failed, 0);
        assert_eq!(replay.synced, 0);
    }

    #[tokio::test]
    async fn same_entity_operations_keep_enqueue_order() {
        let (_, gateway, manager) = setup();
        manager
            .queue()
            .enqueue(
                OperationKind::Update,
                EntityKind::Workout,
                json!({"id": "w1", "rev": 1}),
            )
            .await
            .unwrap();
        manager
            .queue()
            .enqueue(
                OperationKind::Update,
                EntityKind::Workout,
                json!({"id": "w1", "rev": 2}),
            )
            .await
            .unwrap();

        let result = manager.perform_sync().await.unwrap();
        assert_eq!(result.synced, 2);

        let calls = gateway.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].contains("\"rev\":1"));
        assert!(calls[1].contains("\"rev\":2"));
        assert_eq!(
            gateway.remote_record(EntityKind::Workout, "w1").unwrap()["rev"],
            2
        );
    }

    #[tokio::test]
    async fn listeners_are_notified_and_panics_are_isolated() {
        let (_, _, manager) = setup();
        manager
            .queue()
            .enqueue(
                OperationKind::Create,
                EntityKind::Workout,
                json!({"id": "w1"}),
            )
            .await
            .unwrap();

        let seen: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
        manager.add_listener(|_result| panic!("listener bug"));
        let sink = Arc::clone(&seen);
        manager.add_listener(move |result: &SyncResult| {
            sink.lock().unwrap_or_else(PoisonError::into_inner).push(result.synced);
        });

        let result = manager.perform_sync().await.unwrap();
        assert!(result.success);
        assert_eq!(
            seen.lock().unwrap_or_else(PoisonError::into_inner).as_slice(),
            &[1]
        );
    }

    #[tokio::test]
    async fn removed_listeners_are_not_notified() {
        let (_, _, manager) = setup();
        let seen: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = manager.add_listener(move |result: &SyncResult| {
            sink.lock().unwrap_or_else(PoisonError::into_inner).push(result.synced);
        });

        assert!(manager.remove_listener(id));
        assert!(!manager.remove_listener(id));

        manager.perform_sync().await.unwrap();
        assert!(seen.lock().unwrap_or_else(PoisonError::into_inner).is_empty());
    }

    #[tokio::test]
    async fn cancelled_pass_leaves_operations_pending() {
        let (_, gateway, manager) = setup();
        for i in 0..3 {
            manager
                .queue()
                .enqueue(
                    OperationKind::Create,
                    EntityKind::Workout,
                    json!({"id": format!("w{i}")}),
                )
                .await
                .unwrap();
        }

        manager.cancel();
        let result = manager.perform_sync().await.unwrap();
        assert_eq!(result.synced, 0);
        assert_eq!(result.failed, 0);
        assert!(gateway.calls().is_empty());

        // The flag is consumed: the next pass runs normally.
        let next = manager.perform_sync().await.unwrap();
        assert_eq!(next.synced, 3);
    }

    #[tokio::test]
    async fn remote_timestamp_prefers_updated_at() {
        assert_eq!(
            remote_timestamp(&json!({"updated_at": 5, "timestamp": 9})),
            5
        );
        assert_eq!(remote_timestamp(&json!({"timestamp": 9})), 9);
        assert_eq!(remote_timestamp(&json!({})), 0);
    }
}
